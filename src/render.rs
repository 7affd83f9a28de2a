use crate::config::{AppConfig, MAX_MARKER_RADIUS};
use crate::palette::rgba_for;
use crate::project::{Canvas, ProjectedPoint};
use crate::types::Marker;
use anyhow::{Context, Result};
use image::imageops::FilterType;
use image::{ImageBuffer, Rgba, RgbaImage};
use std::fs;
use tracing::info;

const BACKGROUND: Rgba<u8> = Rgba([255, 255, 255, 255]);

pub fn generate_map(config: &AppConfig, markers: &[Marker]) -> Result<()> {
    let canvas = config.projection.canvas();
    let mut img = match &config.output.basemap {
        Some(path) => {
            let base = image::open(path)
                .with_context(|| format!("Failed to open basemap: {:?}", path))?;
            base.resize_exact(canvas.width, canvas.height, FilterType::Triangle).to_rgba8()
        }
        None => ImageBuffer::from_pixel(canvas.width, canvas.height, BACKGROUND),
    };

    draw_markers(&mut img, &canvas, markers, config.output.marker_radius);

    fs::create_dir_all(&config.output.dir).context("Failed to create output directory")?;
    let path = config.map_path();
    img.save(&path).with_context(|| format!("Failed to save map {:?}", path))?;
    info!("Wrote map with {} markers to {:?}", markers.len(), path);
    Ok(())
}

/// Pixel a marker's disc is centred on. Hit-testing uses the same centre.
pub fn disc_center(marker: &Marker) -> (i64, i64) {
    (marker.x.floor() as i64, marker.y.floor() as i64)
}

/// Paints each marker as a filled disc in its district color. Later
/// markers paint over earlier ones; pixels off the canvas are dropped.
pub fn draw_markers(img: &mut RgbaImage, canvas: &Canvas, markers: &[Marker], radius: u32) {
    let r = radius.min(MAX_MARKER_RADIUS) as i64;
    for marker in markers {
        let color = rgba_for(marker.comuna.as_deref());
        let (cx, cy) = disc_center(marker);
        for dy in -r..=r {
            for dx in -r..=r {
                if dx * dx + dy * dy > r * r {
                    continue;
                }
                let point = ProjectedPoint {
                    x: cx.saturating_add(dx) as f64,
                    y: cy.saturating_add(dy) as f64,
                };
                if let Some((px, py)) = point.pixel(canvas) {
                    img.put_pixel(px, py, color);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::palette::{hex_to_rgba, FALLBACK_COLOR};

    fn marker(comuna: Option<&str>, x: f64, y: f64) -> Marker {
        Marker {
            comuna: comuna.map(str::to_string),
            barrio: None,
            x,
            y,
        }
    }

    fn blank(canvas: &Canvas) -> RgbaImage {
        ImageBuffer::from_pixel(canvas.width, canvas.height, BACKGROUND)
    }

    #[test]
    fn test_disc_drawn_in_district_color() {
        let canvas = Canvas { width: 20, height: 20 };
        let mut img = blank(&canvas);
        draw_markers(&mut img, &canvas, &[marker(Some("Comuna 1"), 10.0, 10.0)], 2);

        let red = hex_to_rgba("#e74c3c").unwrap();
        assert_eq!(*img.get_pixel(10, 10), red);
        assert_eq!(*img.get_pixel(12, 10), red);
        assert_eq!(*img.get_pixel(10, 8), red);
        // Corner of the bounding square is outside the disc.
        assert_eq!(*img.get_pixel(12, 12), BACKGROUND);
        assert_eq!(*img.get_pixel(13, 10), BACKGROUND);
    }

    #[test]
    fn test_unknown_district_uses_fallback() {
        let canvas = Canvas { width: 5, height: 5 };
        let mut img = blank(&canvas);
        draw_markers(&mut img, &canvas, &[marker(Some("Barrio Nuevo"), 2.0, 2.0)], 0);
        assert_eq!(*img.get_pixel(2, 2), hex_to_rgba(FALLBACK_COLOR).unwrap());
    }

    #[test]
    fn test_markers_clipped_at_edges() {
        let canvas = Canvas { width: 10, height: 10 };
        let mut img = blank(&canvas);
        let markers = [
            marker(Some("Comuna 2"), 0.0, 10.0),
            marker(Some("Comuna 2"), -50.0, -50.0),
            marker(Some("Comuna 2"), 1e12, 3.0),
        ];
        draw_markers(&mut img, &canvas, &markers, 3);
        assert_eq!(*img.get_pixel(0, 9), hex_to_rgba("#3498db").unwrap());
    }

    #[test]
    fn test_oversized_radius_is_capped() {
        let canvas = Canvas { width: 5, height: 5 };
        let mut img = blank(&canvas);
        draw_markers(&mut img, &canvas, &[marker(Some("Comuna 1"), 2.0, 2.0)], u32::MAX);
        assert_eq!(*img.get_pixel(0, 0), hex_to_rgba("#e74c3c").unwrap());
    }

    #[test]
    fn test_later_markers_on_top() {
        let canvas = Canvas { width: 5, height: 5 };
        let mut img = blank(&canvas);
        let markers = [marker(Some("Comuna 1"), 2.0, 2.0), marker(Some("Comuna 3"), 2.0, 2.0)];
        draw_markers(&mut img, &canvas, &markers, 1);
        assert_eq!(*img.get_pixel(2, 2), hex_to_rgba("#2ecc71").unwrap());
    }
}
