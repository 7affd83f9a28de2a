use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Grouping key for a free-text neighborhood label.
///
/// Trims, lowercases, strips diacritics and then drops everything outside
/// `[a-z0-9]`, so "La Fe", "LaFe" and "la-fe" share a key. Spaces are
/// removed rather than collapsed; existing groupings depend on that.
pub fn normalize(label: Option<&str>) -> String {
    let Some(label) = label else {
        return String::new();
    };

    label
        .trim()
        .to_lowercase()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_none_is_empty() {
        assert_eq!(normalize(None), "");
    }

    #[test]
    fn test_case_and_accents_fold() {
        let key = normalize(Some("alamo"));
        assert_eq!(normalize(Some("Álamo")), key);
        assert_eq!(normalize(Some("ALAMO")), key);
        assert_eq!(normalize(Some("  ÁLAMO ")), key);
    }

    #[test]
    fn test_spacing_and_punctuation_collide() {
        let key = normalize(Some("La Fe"));
        assert_eq!(key, "lafe");
        assert_eq!(normalize(Some("LaFe")), key);
        assert_eq!(normalize(Some("la-fe")), key);
        assert_eq!(normalize(Some("La  Fe.")), key);
    }

    #[test]
    fn test_enye_folds_to_n() {
        assert_eq!(normalize(Some("Niño Jesús")), "ninojesus");
    }

    #[test]
    fn test_digits_kept() {
        assert_eq!(normalize(Some("Barrio 7 de Agosto")), "barrio7deagosto");
    }

    #[test]
    fn test_non_latin_dropped() {
        assert_eq!(normalize(Some("ß—✓")), "");
        assert_eq!(normalize(Some("   ")), "");
    }

    #[test]
    fn test_idempotent() {
        for label in ["Álamo", "La Fe", "  Cabí-Pandeyuca ", "Sin barrio", "ÑAÑA 12", ""] {
            let once = normalize(Some(label));
            assert_eq!(normalize(Some(&once)), once, "label {:?}", label);
        }
    }
}
