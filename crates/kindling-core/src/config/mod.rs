//! Engine configuration, loadable from TOML.

use serde::{Deserialize, Serialize};

use crate::errors::{KindlingError, KindlingResult};

mod defaults {
    pub use crate::constants::{
        DEFAULT_MAX_RECOMMENDATIONS, DEFAULT_RATING, DEFAULT_STALENESS_WINDOW_SECS, MAX_RATING,
    };
}

/// Recommender engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecommenderConfig {
    /// Rating used when an insertion does not carry one.
    pub default_rating: f64,
    /// Top of the rating scale; used to seed cold-start popularity scores.
    pub max_rating: f64,
    /// Maximum age of the co-occurrence model before a read forces a rebuild (seconds).
    pub staleness_window_secs: u64,
    /// Recommendation count used when a request does not name one.
    pub max_recommendations: usize,
}

impl Default for RecommenderConfig {
    fn default() -> Self {
        Self {
            default_rating: defaults::DEFAULT_RATING,
            max_rating: defaults::MAX_RATING,
            staleness_window_secs: defaults::DEFAULT_STALENESS_WINDOW_SECS,
            max_recommendations: defaults::DEFAULT_MAX_RECOMMENDATIONS,
        }
    }
}

impl RecommenderConfig {
    /// Parse a configuration from a TOML document. Missing keys fall back
    /// to their defaults.
    pub fn from_toml_str(raw: &str) -> KindlingResult<Self> {
        toml::from_str(raw).map_err(|e| KindlingError::Config {
            message: e.to_string(),
        })
    }
}
