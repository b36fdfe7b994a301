//! Loading and validating pipeline parameters.

use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::books::BookNameMap;
use crate::models::AlignmentParams;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("feature_names must name at least one feature")]
    EmptyFeatureNames,
    #[error("span_policy.short_phrase_max must be at least 1")]
    ZeroShortPhraseMax,
    #[error("min_alignment_rate must be within 0..=100, got {0}")]
    InvalidRate(f64),
    #[error(
        "clause range [{clause_offset}, +{capacity}) and phrase range [{phrase_offset}, +{capacity}) overlap"
    )]
    OverlappingNamespaces {
        clause_offset: u64,
        phrase_offset: u64,
        capacity: u64,
    },
    #[error("namespace capacity must be positive")]
    ZeroCapacity,
    #[error("namespace ranges reach past the largest storable id ({})", i64::MAX)]
    NamespaceTooLarge,
}

/// Read parameters from a JSON file. Missing fields take their defaults.
pub fn load_params(path: &Path) -> Result<AlignmentParams, ConfigError> {
    let text = fs::read_to_string(path)?;
    let params: AlignmentParams = serde_json::from_str(&text)?;
    validate(&params)?;
    Ok(params)
}

/// Reject parameter sets the pipeline cannot run with.
pub fn validate(params: &AlignmentParams) -> Result<(), ConfigError> {
    if params.feature_names.is_empty() {
        return Err(ConfigError::EmptyFeatureNames);
    }
    if params.span_policy.short_phrase_max == 0 {
        return Err(ConfigError::ZeroShortPhraseMax);
    }
    if let Some(rate) = params.min_alignment_rate {
        if !(0.0..=100.0).contains(&rate) {
            return Err(ConfigError::InvalidRate(rate));
        }
    }

    let layout = &params.namespaces;
    if layout.capacity == 0 {
        return Err(ConfigError::ZeroCapacity);
    }
    match layout.max_assigned() {
        Some(max) if max <= i64::MAX as u64 => {}
        _ => return Err(ConfigError::NamespaceTooLarge),
    }
    if !layout.is_disjoint() {
        return Err(ConfigError::OverlappingNamespaces {
            clause_offset: layout.clause_offset,
            phrase_offset: layout.phrase_offset,
            capacity: layout.capacity,
        });
    }
    Ok(())
}

/// Built-in table, then database overrides, then config overrides.
pub fn book_name_map(params: &AlignmentParams, db_overrides: Option<BookNameMap>) -> BookNameMap {
    let mut map = BookNameMap::new_testament();
    if let Some(overrides) = db_overrides {
        map.extend(overrides);
    }
    if let Some(overrides) = &params.book_names {
        map.extend(overrides.clone());
    }
    map
}
