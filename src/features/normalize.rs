//! Min-max scaling against fixed reference ranges.
//!
//! Keys are fitted once over a training corpus and reused verbatim for every
//! later inference. A channel whose range collapsed (`max == min`) maps to 0
//! and is reported back to the caller.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

use super::vector::{channel_names, FeatureVector, SchemaTag, FEATURE_DIM};
use crate::error::{PipelineError, Result};

/// Value substituted for channels whose reference range is empty.
pub const DEGENERATE_CHANNEL_VALUE: f64 = 0.0;

/// Per-channel reference range
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelRange {
    pub mins: Vec<f64>,
    pub maxes: Vec<f64>,
}

impl ChannelRange {
    fn fit<'a>(width: usize, rows: impl Iterator<Item = &'a [f64]>) -> Self {
        let mut mins = vec![f64::INFINITY; width];
        let mut maxes = vec![f64::NEG_INFINITY; width];
        for row in rows {
            for (i, v) in row.iter().enumerate() {
                mins[i] = mins[i].min(*v);
                maxes[i] = maxes[i].max(*v);
            }
        }
        ChannelRange { mins, maxes }
    }

    fn len(&self) -> usize {
        self.mins.len()
    }

    /// Scale channel `i`; `None` when its range is empty.
    fn scale(&self, i: usize, value: f64) -> Option<f64> {
        let span = self.maxes[i] - self.mins[i];
        if span == 0.0 {
            None
        } else {
            Some((value - self.mins[i]) / span)
        }
    }

    fn validate(&self, what: &str, width: usize) -> Result<()> {
        if self.mins.len() != width || self.maxes.len() != width {
            return Err(PipelineError::InvalidKeys(format!(
                "{} expects {} channels, found {} mins and {} maxes",
                what,
                width,
                self.mins.len(),
                self.maxes.len()
            )));
        }
        for (i, (min, max)) in self.mins.iter().zip(&self.maxes).enumerate() {
            if !min.is_finite() || !max.is_finite() {
                return Err(PipelineError::InvalidKeys(format!(
                    "{} channel {} has a non-finite range",
                    what, i
                )));
            }
            if max < min {
                return Err(PipelineError::InvalidKeys(format!(
                    "{} channel {} has max {} below min {}",
                    what, i, max, min
                )));
            }
        }
        Ok(())
    }

    fn degenerate_channels(&self) -> Vec<usize> {
        (0..self.len())
            .filter(|&i| self.maxes[i] == self.mins[i])
            .collect()
    }
}

/// Serialized `{input:{mins,maxes}, output:{mins,maxes}}` artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizationKeys {
    /// Absent in keys produced before the layout was versioned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<SchemaTag>,
    pub input: ChannelRange,
    pub output: ChannelRange,
}

/// Normalized model input plus the channels that hit an empty range
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedVector {
    pub values: [f64; FEATURE_DIM],
    pub degenerate: Vec<usize>,
}

impl NormalizationKeys {
    /// Fit ranges over `(features, label)` pairs.
    pub fn fit(examples: &[(FeatureVector, f64)]) -> Result<Self> {
        if examples.is_empty() {
            return Err(PipelineError::EmptyCorpus);
        }
        let input = ChannelRange::fit(FEATURE_DIM, examples.iter().map(|(v, _)| v.as_slice()));
        let output = ChannelRange::fit(1, examples.iter().map(|(_, y)| std::slice::from_ref(y)));
        let keys = NormalizationKeys {
            schema: Some(SchemaTag::current()),
            input,
            output,
        };
        keys.validate()?;

        let names = channel_names();
        for i in keys.input.degenerate_channels() {
            warn!(
                "Input channel {} ({}) has a single value {} across the corpus; it will normalize to {}",
                i, names[i], keys.input.mins[i], DEGENERATE_CHANNEL_VALUE
            );
        }
        if !keys.output.degenerate_channels().is_empty() {
            warn!("Every example in the corpus carries the same outcome label");
        }
        Ok(keys)
    }

    /// Normalize one input vector. Never mutates the keys.
    pub fn apply(&self, v: &FeatureVector) -> NormalizedVector {
        let mut values = [0.0; FEATURE_DIM];
        let mut degenerate = Vec::new();
        for (i, raw) in v.0.iter().enumerate() {
            values[i] = match self.input.scale(i, *raw) {
                Some(scaled) => scaled,
                None => {
                    degenerate.push(i);
                    DEGENERATE_CHANNEL_VALUE
                }
            };
        }
        NormalizedVector { values, degenerate }
    }

    /// Normalize an outcome label against the output channel.
    pub fn apply_output(&self, label: f64) -> f64 {
        self.output
            .scale(0, label)
            .unwrap_or(DEGENERATE_CHANNEL_VALUE)
    }

    /// Check widths, finiteness, ordering and the schema tag.
    pub fn validate(&self) -> Result<()> {
        match &self.schema {
            Some(tag) => tag.ensure_current()?,
            None => warn!(
                "Normalization keys carry no schema tag; assuming {}",
                SchemaTag::current()
            ),
        }
        if self.input.len() != FEATURE_DIM {
            return Err(PipelineError::SchemaMismatch {
                expected: SchemaTag::current().to_string(),
                found: format!("keys with {} input channels", self.input.len()),
            });
        }
        self.input.validate("input", FEATURE_DIM)?;
        self.output.validate("output", 1)?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let keys: Self = serde_json::from_str(&content)?;
        keys.validate()?;
        Ok(keys)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
