//! Fixed-order feature vectors and the schema tag shared by the model and
//! the normalization keys.
//!
//! ### Layout (ppa-efficiency v1)
//! - channels 0..15: home offense `EfficiencyMetrics`, in `METRIC_NAMES` order
//! - channels 15..30: away offense `EfficiencyMetrics`, same order

use serde::{Deserialize, Serialize};
use std::fmt;

use super::efficiency::{ContestEfficiency, METRIC_DIM, METRIC_NAMES};
use crate::db::models::Contest;
use crate::error::{PipelineError, Result};

/// Number of input channels.
pub const FEATURE_DIM: usize = 2 * METRIC_DIM;

pub const FEATURE_SCHEMA_NAME: &str = "ppa-efficiency";

/// Increment whenever the channel layout changes.
pub const FEATURE_SCHEMA_VERSION: u32 = 1;

/// Identifies the channel layout an artifact was produced against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaTag {
    pub name: String,
    pub version: u32,
    pub channels: usize,
}

impl SchemaTag {
    pub fn current() -> Self {
        SchemaTag {
            name: FEATURE_SCHEMA_NAME.to_string(),
            version: FEATURE_SCHEMA_VERSION,
            channels: FEATURE_DIM,
        }
    }

    /// Fail fast when an artifact was built for a different layout.
    pub fn ensure_current(&self) -> Result<()> {
        let expected = Self::current();
        if *self != expected {
            return Err(PipelineError::SchemaMismatch {
                expected: expected.to_string(),
                found: self.to_string(),
            });
        }
        Ok(())
    }
}

impl fmt::Display for SchemaTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} v{} ({} channels)", self.name, self.version, self.channels)
    }
}

/// Channel names, e.g. `home_ppa` … `away_pass_rate`.
pub fn channel_names() -> Vec<String> {
    ["home", "away"]
        .iter()
        .flat_map(|side| METRIC_NAMES.iter().map(move |m| format!("{}_{}", side, m)))
        .collect()
}

/// Raw (unnormalized) model input for one contest
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector(pub [f64; FEATURE_DIM]);

impl FeatureVector {
    pub fn from_efficiency(eff: &ContestEfficiency) -> Self {
        let mut values = [0.0; FEATURE_DIM];
        values[..METRIC_DIM].copy_from_slice(&eff.home.to_array());
        values[METRIC_DIM..].copy_from_slice(&eff.away.to_array());
        FeatureVector(values)
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }
}

/// A labeled example for the offline corpus
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingExample {
    pub contest_id: i64,
    pub season: i32,
    pub week: i32,
    pub features: FeatureVector,
    /// 1.0 if the home side won, 0.0 otherwise
    pub label: f64,
}

impl TrainingExample {
    pub fn build(contest: &Contest, eff: &ContestEfficiency) -> Self {
        TrainingExample {
            contest_id: contest.id,
            season: contest.season,
            week: contest.week,
            features: FeatureVector::from_efficiency(eff),
            label: contest.home_label(),
        }
    }
}
