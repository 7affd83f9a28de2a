use crate::order::sort_comunas;
use anyhow::{anyhow, Result};
use image::Rgba;
use serde::Serialize;

/// Marker color for any district missing from the table.
pub const FALLBACK_COLOR: &str = "#7f8c8d";

// Keyed by the exact district string; no trimming or case folding.
const COMUNA_COLORS: &[(&str, &str)] = &[
    ("Comuna 1", "#e74c3c"),
    ("Comuna 2", "#3498db"),
    ("Comuna 3", "#2ecc71"),
    ("Comuna 4", "#f39c12"),
    ("Comuna 5", "#9b59b6"),
    ("Comuna 6", "#1abc9c"),
    ("Zonas Rurales", "#8d6e63"),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LegendEntry {
    pub comuna: String,
    pub color: &'static str,
}

pub fn color_for(comuna: &str) -> &'static str {
    COMUNA_COLORS
        .iter()
        .find(|(name, _)| *name == comuna)
        .map_or(FALLBACK_COLOR, |&(_, color)| color)
}

pub fn rgba_for(comuna: Option<&str>) -> Rgba<u8> {
    let hex = comuna.map_or(FALLBACK_COLOR, color_for);
    hex_to_rgba(hex).unwrap_or(Rgba([0x7f, 0x8c, 0x8d, 255]))
}

pub fn hex_to_rgba(hex: &str) -> Result<Rgba<u8>> {
    let digits = hex.trim_start_matches('#');
    if digits.len() != 6 || !digits.is_ascii() {
        return Err(anyhow!("Invalid hex color: {:?}", hex));
    }
    let channel = |range: std::ops::Range<usize>| {
        u8::from_str_radix(&digits[range], 16)
            .map_err(|e| anyhow!("Invalid hex color {:?}: {}", hex, e))
    };
    Ok(Rgba([channel(0..2)?, channel(2..4)?, channel(4..6)?, 255]))
}

/// One entry per distinct district, in display order.
pub fn legend<'a, I>(comunas: I) -> Vec<LegendEntry>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut names: Vec<&str> = comunas.into_iter().collect();
    sort_comunas(&mut names);
    names.dedup();
    names
        .into_iter()
        .map(|comuna| LegendEntry {
            comuna: comuna.to_string(),
            color: color_for(comuna),
        })
        .collect()
}
