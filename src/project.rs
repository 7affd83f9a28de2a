use crate::types::{BeneficiaryRecord, Marker};
use rayon::prelude::*;
use serde::Serialize;

/// Geographic corners of the basemap image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Canvas {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProjectedPoint {
    pub x: f64,
    pub y: f64,
}

impl Bounds {
    pub const REFERENCE: Bounds = Bounds {
        min_lat: 5.6800,
        max_lat: 5.7000,
        min_lng: -76.6820,
        max_lng: -76.6400,
    };
}

impl Canvas {
    pub const REFERENCE: Canvas = Canvas {
        width: 1200,
        height: 900,
    };
}

impl ProjectedPoint {
    /// Integer pixel under the point, if it falls on the canvas.
    pub fn pixel(&self, canvas: &Canvas) -> Option<(u32, u32)> {
        let (px, py) = (self.x.floor(), self.y.floor());
        if px < 0.0 || py < 0.0 || px >= canvas.width as f64 || py >= canvas.height as f64 {
            return None;
        }
        Some((px as u32, py as u32))
    }
}

/// Linear mapping of a coordinate pair onto the canvas.
///
/// Not a map projection: the basemap is a static image with known corner
/// coordinates, so x follows longitude and y follows latitude with the
/// axis flipped (pixel rows grow southwards). Points outside the bounds
/// land outside the canvas; nothing is clamped.
pub fn project(lat: f64, lng: f64, bounds: &Bounds, canvas: &Canvas) -> ProjectedPoint {
    let width = canvas.width as f64;
    let height = canvas.height as f64;
    let x = (lng - bounds.min_lng) / (bounds.max_lng - bounds.min_lng) * width;
    let y = height - (lat - bounds.min_lat) / (bounds.max_lat - bounds.min_lat) * height;
    ProjectedPoint { x, y }
}

/// Marker list for the map overlay, in input order.
///
/// Records without a full, finite coordinate pair are left out here; they
/// are still counted by the aggregation.
pub fn markers(records: &[BeneficiaryRecord], bounds: &Bounds, canvas: &Canvas) -> Vec<Marker> {
    records
        .par_iter()
        .filter_map(|record| {
            let (lat, lng) = record.coordinates()?;
            let point = project(lat, lng, bounds, canvas);
            Some(Marker {
                comuna: record.comuna.clone(),
                barrio: record.barrio.clone(),
                x: point.x,
                y: point.y,
            })
        })
        .collect()
}
