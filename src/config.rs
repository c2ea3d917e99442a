use crate::types::LatLon;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

const NYC_CENTER: LatLon = LatLon(40.7128, -74.0060);

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub input: InputConfig,
    pub heat_risk: HeatRiskConfig,
    pub hvi: HviConfig,
    pub output: OutputConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct InputConfig {
    pub hvi_csv: PathBuf,
    pub nta_geometry: PathBuf, // .geojson, .json or .shp
    pub join_column_geometry: String,
    pub join_column_csv: String,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            hvi_csv: PathBuf::from("data/hvi-nta-2020.csv"),
            nta_geometry: PathBuf::from("data/Neighborhood Areas1.geojson"),
            join_column_geometry: "nta2020".to_string(),
            join_column_csv: "NTACode".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HeatRiskConfig {
    pub center: LatLon,
    pub zoom: u8,
    pub wms_url: String,
    pub layer: String,
    pub format: String,
    pub transparent: bool,
    pub attribution: String,
    pub width: u32,
    pub height: u32,
}

impl Default for HeatRiskConfig {
    fn default() -> Self {
        Self {
            center: NYC_CENTER,
            zoom: 9,
            wms_url: "https://mapservices.weather.noaa.gov/experimental/services/NWS_HeatRisk/ImageServer/WMSServer?".to_string(),
            layer: "NWS_HeatRisk".to_string(),
            format: "image/png".to_string(),
            transparent: true,
            attribution: "NOAA/NWS HeatRisk".to_string(),
            width: 900,
            height: 600,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HviConfig {
    pub center: LatLon,
    pub zoom: u8,
    pub width: u32,
    pub height: u32,
    pub fill_opacity: f32,
    pub line_opacity: f32,
    pub legend_name: String,
}

impl Default for HviConfig {
    fn default() -> Self {
        Self {
            center: NYC_CENTER,
            zoom: 11,
            width: 1000,
            height: 700,
            fill_opacity: 0.7,
            line_opacity: 0.3,
            legend_name: "Heat Vulnerability Index (1-5)".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct OutputConfig {
    pub page: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            page: PathBuf::from("output/index.html"),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 8080 }
    }
}

impl AppConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config: AppConfig = toml::from_str(&content)
            .with_context(|| "Failed to parse TOML configuration")?;
        Ok(config)
    }
}
