use crate::project::{Bounds, Canvas};
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Largest marker disc, in pixels.
pub const MAX_MARKER_RADIUS: u32 = 100;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub input: InputConfig,
    #[serde(default)]
    pub projection: ProjectionConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct InputConfig {
    pub records: PathBuf, // .csv or .json
}

/// Corner coordinates of the basemap and the pixel canvas they map onto.
#[derive(Debug, Deserialize, Clone)]
pub struct ProjectionConfig {
    #[serde(default = "default_min_lat")]
    pub min_lat: f64,
    #[serde(default = "default_max_lat")]
    pub max_lat: f64,
    #[serde(default = "default_min_lng")]
    pub min_lng: f64,
    #[serde(default = "default_max_lng")]
    pub max_lng: f64,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    pub dir: PathBuf,
    #[serde(default = "default_map_file")]
    pub map_file: String,
    #[serde(default = "default_report_file")]
    pub report_file: String,
    #[serde(default = "default_export_file")]
    pub export_file: String,
    #[serde(default = "default_lines_per_page")]
    pub lines_per_page: usize,
    #[serde(default = "default_marker_radius")]
    pub marker_radius: u32,
    pub basemap: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_min_lat() -> f64 {
    Bounds::REFERENCE.min_lat
}

fn default_max_lat() -> f64 {
    Bounds::REFERENCE.max_lat
}

fn default_min_lng() -> f64 {
    Bounds::REFERENCE.min_lng
}

fn default_max_lng() -> f64 {
    Bounds::REFERENCE.max_lng
}

fn default_width() -> u32 {
    Canvas::REFERENCE.width
}

fn default_height() -> u32 {
    Canvas::REFERENCE.height
}

fn default_map_file() -> String {
    "mapa.png".to_string()
}

fn default_report_file() -> String {
    "reporte.txt".to_string()
}

fn default_export_file() -> String {
    "conteo.csv".to_string()
}

fn default_lines_per_page() -> usize {
    40
}

fn default_marker_radius() -> u32 {
    6
}

fn default_port() -> u16 {
    8080
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            min_lat: default_min_lat(),
            max_lat: default_max_lat(),
            min_lng: default_min_lng(),
            max_lng: default_max_lng(),
            width: default_width(),
            height: default_height(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: default_port() }
    }
}

impl ProjectionConfig {
    pub fn bounds(&self) -> Bounds {
        Bounds {
            min_lat: self.min_lat,
            max_lat: self.max_lat,
            min_lng: self.min_lng,
            max_lng: self.max_lng,
        }
    }

    pub fn canvas(&self) -> Canvas {
        Canvas {
            width: self.width,
            height: self.height,
        }
    }

    fn validate(&self) -> Result<()> {
        if !(self.max_lat > self.min_lat) {
            return Err(anyhow!(
                "projection: max_lat ({}) must be greater than min_lat ({})",
                self.max_lat,
                self.min_lat
            ));
        }
        if !(self.max_lng > self.min_lng) {
            return Err(anyhow!(
                "projection: max_lng ({}) must be greater than min_lng ({})",
                self.max_lng,
                self.min_lng
            ));
        }
        if self.width == 0 || self.height == 0 {
            return Err(anyhow!(
                "projection: canvas must be at least 1x1, got {}x{}",
                self.width,
                self.height
            ));
        }
        Ok(())
    }
}

impl OutputConfig {
    fn validate(&self) -> Result<()> {
        if self.marker_radius > MAX_MARKER_RADIUS {
            return Err(anyhow!(
                "output: marker_radius must be at most {}, got {}",
                MAX_MARKER_RADIUS,
                self.marker_radius
            ));
        }
        Ok(())
    }
}

impl AppConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        Self::from_toml(&content)
            .with_context(|| format!("Invalid configuration in {:?}", path))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(content)
            .with_context(|| "Failed to parse TOML configuration")?;
        config.projection.validate()?;
        config.output.validate()?;
        Ok(config)
    }

    pub fn map_path(&self) -> PathBuf {
        self.output.dir.join(&self.output.map_file)
    }

    pub fn report_path(&self) -> PathBuf {
        self.output.dir.join(&self.output.report_file)
    }

    pub fn export_path(&self) -> PathBuf {
        self.output.dir.join(&self.output.export_file)
    }
}
