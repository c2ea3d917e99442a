use crate::config::AppConfig;
use crate::data;
use crate::types::{HviRecord, Neighborhood, NtaFeature};
use anyhow::{anyhow, Result};
use std::collections::HashMap;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JoinSummary {
    pub total: usize,
    pub matched: usize,
    pub unmatched: usize,
    /// Unmatched keys that would have matched after trimming and upper-casing.
    pub near_misses: usize,
}

/// Left-joins geometry rows to CSV rows on the exact, case-sensitive key.
///
/// Every feature yields one output row in input order. A CSV key seen twice
/// is an error since it would make the match ambiguous.
pub fn left_join(
    features: Vec<NtaFeature>,
    records: Vec<HviRecord>,
) -> Result<(Vec<Neighborhood>, JoinSummary)> {
    info!("Joining {} neighborhoods with {} vulnerability rows...", features.len(), records.len());

    let mut by_code: HashMap<String, HviRecord> = HashMap::with_capacity(records.len());
    for record in records {
        if by_code.contains_key(&record.nta_code) {
            return Err(anyhow!("Duplicate join key '{}' in CSV", record.nta_code));
        }
        by_code.insert(record.nta_code.clone(), record);
    }

    let normalized: HashMap<String, &str> = by_code.keys()
        .map(|k| (normalize_key(k), k.as_str()))
        .collect();

    let mut summary = JoinSummary { total: features.len(), ..Default::default() };
    let mut neighborhoods = Vec::with_capacity(features.len());

    for feature in features {
        let vulnerability = feature.code.as_ref().and_then(|c| by_code.get(c)).cloned();

        if vulnerability.is_some() {
            summary.matched += 1;
        } else {
            summary.unmatched += 1;
            if let Some(code) = &feature.code {
                if let Some(csv_key) = normalized.get(&normalize_key(code)) {
                    summary.near_misses += 1;
                    warn!(
                        geometry_key = %code,
                        csv_key = %csv_key,
                        "Key differs only by case or whitespace; left unmatched"
                    );
                }
            }
        }

        neighborhoods.push(Neighborhood {
            code: feature.code,
            geometry: feature.geometry,
            properties: feature.properties,
            vulnerability,
        });
    }

    info!(
        "Joined {} neighborhoods: {} matched, {} unmatched, {} near misses",
        summary.total, summary.matched, summary.unmatched, summary.near_misses
    );

    Ok((neighborhoods, summary))
}

/// Loads both inputs and joins them. Any load or join error aborts.
pub fn load_neighborhoods(config: &AppConfig) -> Result<(Vec<Neighborhood>, JoinSummary)> {
    let records = data::load_hvi_records(config)?;
    let features = data::load_nta_features(config)?;
    left_join(features, records)
}

fn normalize_key(key: &str) -> String {
    key.trim().to_uppercase()
}
