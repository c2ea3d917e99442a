use geo::MultiPolygon;
use serde::{Deserialize, Serialize};

/// One row of the heat vulnerability CSV.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HviRecord {
    #[serde(rename = "NTACode")]
    pub nta_code: String,
    pub ntaname: String,
    #[serde(rename = "GEONAME")]
    pub geoname: String,
    #[serde(rename = "HVI_RANK")]
    pub hvi_rank: Option<u8>,
    #[serde(rename = "MEDIAN_INCOME")]
    pub median_income: Option<f64>,
    #[serde(rename = "PCT_HOUSEHOLDS_AC")]
    pub pct_households_ac: Option<f64>,
}

/// A geometry row as read from the neighborhood file, before the join.
#[derive(Debug, Clone)]
pub struct NtaFeature {
    // None when the feature carries no usable key
    pub code: Option<String>,
    pub geometry: MultiPolygon<f64>,
    pub properties: serde_json::Map<String, serde_json::Value>,
}

/// A neighborhood after the left join. `vulnerability` is None when the CSV had no row for it.
#[derive(Debug, Clone)]
pub struct Neighborhood {
    pub code: Option<String>,
    pub geometry: MultiPolygon<f64>,
    pub properties: serde_json::Map<String, serde_json::Value>,
    pub vulnerability: Option<HviRecord>,
}

impl Neighborhood {
    pub fn hvi_rank(&self) -> Option<u8> {
        self.vulnerability.as_ref().and_then(|v| v.hvi_rank)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLon(pub f64, pub f64);
