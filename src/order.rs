use std::cmp::Ordering;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// District that always goes last, on screen and in print.
pub const ZONAS_RURALES: &str = "Zonas Rurales";

/// Ordering of district names shared by every consumer.
///
/// "Zonas Rurales" sorts after everything else. The rest follow a
/// collation in the style of a locale compare with numeric ordering:
/// spaces and punctuation before digit runs (compared by value), digit
/// runs before letters; accents break ties next, then case with
/// lowercase first, and finally the raw strings.
pub fn compare_comunas(a: &str, b: &str) -> Ordering {
    match (a == ZONAS_RURALES, b == ZONAS_RURALES) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => collate(a, b),
    }
}

pub fn sort_comunas<S: AsRef<str>>(names: &mut [S]) {
    names.sort_by(|a, b| compare_comunas(a.as_ref(), b.as_ref()));
}

// Variant order is the primary weight order.
#[derive(Debug)]
enum Element<'a> {
    Punct(char),
    Number(&'a str),
    Letter(char),
}

impl Element<'_> {
    fn rank(&self) -> u8 {
        match self {
            Element::Punct(_) => 0,
            Element::Number(_) => 1,
            Element::Letter(_) => 2,
        }
    }
}

impl Ord for Element<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Element::Punct(a), Element::Punct(b)) => a.cmp(b),
            (Element::Number(a), Element::Number(b)) => compare_digits(a, b),
            (Element::Letter(a), Element::Letter(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialEq for Element<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Element<'_> {}

impl PartialOrd for Element<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn collate(a: &str, b: &str) -> Ordering {
    let base_a = fold(a);
    let base_b = fold(b);
    elements(&base_a)
        .cmp(elements(&base_b))
        .then_with(|| accent_marks(a).cmp(&accent_marks(b)))
        .then_with(|| case_bits(a).cmp(case_bits(b)))
        .then_with(|| a.cmp(b))
}

fn fold(s: &str) -> String {
    s.to_lowercase()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect()
}

fn elements(s: &str) -> impl Iterator<Item = Element<'_>> {
    let mut rest = s;
    std::iter::from_fn(move || {
        let first = rest.chars().next()?;
        if first.is_ascii_digit() {
            let end = rest
                .find(|c: char| !c.is_ascii_digit())
                .unwrap_or(rest.len());
            let (digits, tail) = rest.split_at(end);
            rest = tail;
            return Some(Element::Number(digits));
        }
        rest = &rest[first.len_utf8()..];
        Some(if first.is_alphanumeric() {
            Element::Letter(first)
        } else {
            Element::Punct(first)
        })
    })
}

// Combining marks attached to each base character, unaccented first.
fn accent_marks(s: &str) -> Vec<Vec<char>> {
    let mut slots: Vec<Vec<char>> = Vec::new();
    for c in s.to_lowercase().nfd() {
        match slots.last_mut() {
            Some(slot) if is_combining_mark(c) => slot.push(c),
            _ => slots.push(Vec::new()),
        }
    }
    slots
}

// Lowercase sorts before uppercase.
fn case_bits(s: &str) -> impl Iterator<Item = bool> + '_ {
    s.nfd()
        .filter(|c| !is_combining_mark(*c))
        .map(|c| c.is_uppercase())
}

// Arbitrary length, so compare as digit strings rather than parsing.
fn compare_digits(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}
