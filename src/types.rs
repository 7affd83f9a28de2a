use serde::{Deserialize, Serialize};

/// One row of the beneficiary directory, reduced to the location fields.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct BeneficiaryRecord {
    pub comuna: Option<String>,
    pub barrio: Option<String>,
    #[serde(rename = "barrio_lat", default, deserialize_with = "csv::invalid_option")]
    pub lat: Option<f64>,
    #[serde(rename = "barrio_lng", default, deserialize_with = "csv::invalid_option")]
    pub lng: Option<f64>,
}

impl BeneficiaryRecord {
    /// Both coordinates, only when each is present and finite.
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        match (self.lat, self.lng) {
            (Some(lat), Some(lng)) if lat.is_finite() && lng.is_finite() => Some((lat, lng)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Marker {
    pub comuna: Option<String>,
    pub barrio: Option<String>,
    pub x: f64,
    pub y: f64,
}

#[cfg(test)]
impl BeneficiaryRecord {
    pub fn new(comuna: Option<&str>, barrio: Option<&str>) -> Self {
        Self {
            comuna: comuna.map(str::to_string),
            barrio: barrio.map(str::to_string),
            lat: None,
            lng: None,
        }
    }

    pub fn at(mut self, lat: Option<f64>, lng: Option<f64>) -> Self {
        self.lat = lat;
        self.lng = lng;
        self
    }
}
