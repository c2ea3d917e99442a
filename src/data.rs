use crate::config::AppConfig;
use crate::types::{HviRecord, NtaFeature};
use anyhow::{anyhow, Context, Result};
use csv::{ReaderBuilder, StringRecord};
use geo::MultiPolygon;
use serde_json::Value as JsonValue;
use shapefile::Reader;
use std::collections::HashMap;
use std::fs::File;
use std::path::Path;
use tracing::info;

pub const HVI_COLUMNS: [&str; 6] = [
    "NTACode",
    "ntaname",
    "GEONAME",
    "HVI_RANK",
    "MEDIAN_INCOME",
    "PCT_HOUSEHOLDS_AC",
];

// Attribute columns; the key column is whatever `join_column_csv` names.
const VALUE_COLUMNS: [&str; 5] = ["ntaname", "GEONAME", "HVI_RANK", "MEDIAN_INCOME", "PCT_HOUSEHOLDS_AC"];

/// Reads the vulnerability CSV. Rows with an empty join key are skipped.
pub fn load_hvi_records(config: &AppConfig) -> Result<Vec<HviRecord>> {
    let path = &config.input.hvi_csv;
    let file = File::open(path)
        .with_context(|| format!("Failed to open CSV file: {:?}", path))?;
    let mut rdr = ReaderBuilder::new().from_reader(file);
    let headers = rdr.headers()?.clone();

    let col_indices: HashMap<&str, usize> = headers.iter().enumerate()
        .map(|(i, h)| (h, i))
        .collect();

    let key_idx = *col_indices.get(config.input.join_column_csv.as_str())
        .ok_or_else(|| anyhow!("Join column '{}' not found in CSV", config.input.join_column_csv))?;

    let mut idx = [0usize; VALUE_COLUMNS.len()];
    for (slot, name) in idx.iter_mut().zip(VALUE_COLUMNS) {
        *slot = *col_indices.get(name)
            .ok_or_else(|| anyhow!("Required column '{}' not found in CSV {:?}", name, path))?;
    }

    let mut records = Vec::new();
    for (line, result) in rdr.records().enumerate() {
        let record = result.with_context(|| format!("Malformed CSV row {} in {:?}", line + 2, path))?;
        let id = field(&record, key_idx);
        if id.is_empty() { continue; }

        records.push(HviRecord {
            nta_code: id.to_string(),
            ntaname: field(&record, idx[0]).to_string(),
            geoname: field(&record, idx[1]).to_string(),
            hvi_rank: parse_rank(field(&record, idx[2]))
                .with_context(|| format!("Bad HVI_RANK for '{}'", id))?,
            median_income: parse_number(field(&record, idx[3]))
                .with_context(|| format!("Bad MEDIAN_INCOME for '{}'", id))?,
            pct_households_ac: parse_number(field(&record, idx[4]))
                .with_context(|| format!("Bad PCT_HOUSEHOLDS_AC for '{}'", id))?,
        });
    }

    info!("Loaded CSV data for {} areas", records.len());
    Ok(records)
}

fn field(record: &StringRecord, idx: usize) -> &str {
    record.get(idx).unwrap_or("")
}

fn parse_number(raw: &str) -> Result<Option<f64>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse::<f64>()
        .map(Some)
        .map_err(|_| anyhow!("'{}' is not a number", raw))
}

// Ranks may arrive as "3" or "3.0" depending on the exporter.
fn parse_rank(raw: &str) -> Result<Option<u8>> {
    match parse_number(raw)? {
        None => Ok(None),
        Some(v) if v.fract() == 0.0 && (0.0..=255.0).contains(&v) => Ok(Some(v as u8)),
        Some(v) => Err(anyhow!("'{}' is not a whole rank", v)),
    }
}

/// Reads neighborhood polygons from GeoJSON or a Shapefile, keeping file order.
pub fn load_nta_features(config: &AppConfig) -> Result<Vec<NtaFeature>> {
    let path = &config.input.nta_geometry;
    let extension = path.extension()
        .and_then(|e| e.to_str())
        .map(|s: &str| s.to_lowercase())
        .ok_or_else(|| anyhow!("Input geometry file has no extension"))?;

    let features = match extension.as_str() {
        "shp" => load_shapefile(path, &config.input.join_column_geometry)?,
        "json" | "geojson" => load_geojson(path, &config.input.join_column_geometry)?,
        _ => return Err(anyhow!("Unsupported geometry format: {}", extension)),
    };

    info!("Loaded geometry for {} neighborhoods", features.len());
    Ok(features)
}

fn load_geojson(path: &Path, key_column: &str) -> Result<Vec<NtaFeature>> {
    use geojson::GeoJson;
    use std::io::BufReader;

    let file = File::open(path)
        .with_context(|| format!("Failed to open GeoJSON file: {:?}", path))?;
    let geojson = GeoJson::from_reader(BufReader::new(file)).context("Failed to parse GeoJSON")?;

    let collection = match geojson {
        GeoJson::FeatureCollection(fc) => fc,
        _ => return Err(anyhow!("GeoJSON must be a FeatureCollection")),
    };

    let mut features = Vec::with_capacity(collection.features.len());

    for (i, feature) in collection.features.into_iter().enumerate() {
        let properties = feature.properties.unwrap_or_default();
        let code = match properties.get(key_column) {
            Some(JsonValue::String(s)) => Some(s.clone()),
            Some(JsonValue::Number(n)) => Some(n.to_string()),
            _ => None,
        };

        let geom = feature.geometry
            .ok_or_else(|| anyhow!("Feature {} ({:?}) has no geometry", i, code))?;
        let geometry: geo::Geometry<f64> = geom.value.try_into()
            .map_err(|e| anyhow!("Failed to convert geojson geometry of feature {}: {:?}", i, e))?;
        let geometry = match geometry {
            geo::Geometry::MultiPolygon(mp) => mp,
            geo::Geometry::Polygon(p) => MultiPolygon::new(vec![p]),
            _ => return Err(anyhow!("Feature {} ({:?}) is not a polygon", i, code)),
        };

        features.push(NtaFeature { code, geometry, properties });
    }

    Ok(features)
}

fn load_shapefile(path: &Path, key_column: &str) -> Result<Vec<NtaFeature>> {
    use shapefile::dbase::FieldValue;

    let mut reader = Reader::from_path(path)
        .with_context(|| format!("Failed to open Shapefile: {:?}", path))?;

    let mut features = Vec::new();

    for (i, result) in reader.iter_shapes_and_records().enumerate() {
        let (shape, record) = result?;

        let code = match record.get(key_column) {
            Some(FieldValue::Character(Some(s))) => Some(s.clone()),
            Some(FieldValue::Numeric(Some(n))) => Some(n.to_string()),
            Some(_) => None,
            None => return Err(anyhow!("Join column '{}' not found in Shapefile", key_column)),
        };

        let geometry: MultiPolygon<f64> = match shape {
            shapefile::Shape::Polygon(polygon) => polygon.try_into()
                .map_err(|e| anyhow!("Failed to convert polygon: {:?}", e))?,
            shapefile::Shape::PolygonM(polygon) => polygon.try_into()
                .map_err(|e| anyhow!("Failed to convert polygonM: {:?}", e))?,
            shapefile::Shape::PolygonZ(polygon) => polygon.try_into()
                .map_err(|e| anyhow!("Failed to convert polygonZ: {:?}", e))?,
            _ => return Err(anyhow!("Shape {} ({:?}) is not a polygon", i, code)),
        };

        let properties = HashMap::<String, FieldValue>::from(record).into_iter()
            .map(|(name, value)| (name, dbase_to_json(value)))
            .collect();

        features.push(NtaFeature { code, geometry, properties });
    }

    Ok(features)
}

fn dbase_to_json(value: shapefile::dbase::FieldValue) -> JsonValue {
    use shapefile::dbase::FieldValue;

    match value {
        FieldValue::Character(Some(s)) => JsonValue::String(s),
        FieldValue::Memo(s) => JsonValue::String(s),
        FieldValue::Numeric(Some(n)) => serde_json::json!(n),
        FieldValue::Double(n) => serde_json::json!(n),
        FieldValue::Float(Some(n)) => serde_json::json!(n),
        FieldValue::Integer(n) => serde_json::json!(n),
        FieldValue::Logical(Some(b)) => JsonValue::Bool(b),
        _ => JsonValue::Null,
    }
}
