//! Feed-forward perceptron loaded from a JSON artifact.
//!
//! Architecture is whatever the artifact describes, as long as the first
//! layer reads `FEATURE_DIM` inputs and the last layer emits one value:
//!
//! ```text
//! x(30) → [W₁·x + b₁ → act₁] → … → [Wₙ·h + bₙ → actₙ] → y(1)
//! ```
//!
//! Evaluation only borrows the network, so one loaded instance can serve any
//! number of callers.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

use crate::error::{PipelineError, Result};
use crate::features::vector::{SchemaTag, FEATURE_DIM};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    #[default]
    Logistic,
    Tanh,
    Relu,
    Identity,
}

impl Activation {
    fn apply(self, x: f64) -> f64 {
        match self {
            Activation::Logistic => sigmoid(x),
            Activation::Tanh => x.tanh(),
            Activation::Relu => x.max(0.0),
            Activation::Identity => x,
        }
    }
}

fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        let z = (-x).exp();
        1.0 / (1.0 + z)
    } else {
        let z = x.exp();
        z / (1.0 + z)
    }
}

/// Fully connected layer. `weights[j]` holds the incoming weights of unit `j`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseLayer {
    pub weights: Vec<Vec<f64>>,
    pub biases: Vec<f64>,
    #[serde(default)]
    pub activation: Activation,
}

impl DenseLayer {
    pub fn input_dim(&self) -> usize {
        self.weights.first().map_or(0, Vec::len)
    }

    pub fn output_dim(&self) -> usize {
        self.biases.len()
    }

    fn forward(&self, input: &[f64]) -> Vec<f64> {
        self.weights
            .iter()
            .zip(&self.biases)
            .map(|(row, bias)| {
                let z: f64 = row.iter().zip(input).map(|(w, x)| w * x).sum::<f64>() + bias;
                self.activation.apply(z)
            })
            .collect()
    }
}

/// Trained network with a 30-channel input and a single output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedForwardNetwork {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<SchemaTag>,
    pub layers: Vec<DenseLayer>,
}

impl FeedForwardNetwork {
    pub fn new(layers: Vec<DenseLayer>) -> Result<Self> {
        let network = FeedForwardNetwork {
            schema: Some(SchemaTag::current()),
            layers,
        };
        network.validate()?;
        Ok(network)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let network: Self = serde_json::from_str(content)?;
        network.validate()?;
        Ok(network)
    }

    /// Check the schema tag and that layer shapes chain from 30 inputs to 1
    /// output with finite parameters.
    pub fn validate(&self) -> Result<()> {
        match &self.schema {
            Some(tag) => tag.ensure_current()?,
            None => warn!(
                "Model artifact carries no schema tag; assuming {}",
                SchemaTag::current()
            ),
        }

        let first = self
            .layers
            .first()
            .ok_or_else(|| PipelineError::InvalidModel("network has no layers".into()))?;
        if first.input_dim() != FEATURE_DIM {
            return Err(PipelineError::SchemaMismatch {
                expected: SchemaTag::current().to_string(),
                found: format!("model with {} input channels", first.input_dim()),
            });
        }

        let mut width = FEATURE_DIM;
        for (n, layer) in self.layers.iter().enumerate() {
            if layer.weights.len() != layer.biases.len() {
                return Err(PipelineError::InvalidModel(format!(
                    "layer {} has {} weight rows but {} biases",
                    n,
                    layer.weights.len(),
                    layer.biases.len()
                )));
            }
            if layer.weights.is_empty() {
                return Err(PipelineError::InvalidModel(format!("layer {} has no units", n)));
            }
            if let Some(row) = layer.weights.iter().find(|row| row.len() != width) {
                return Err(PipelineError::InvalidModel(format!(
                    "layer {} expects {} inputs, found a row of {}",
                    n,
                    width,
                    row.len()
                )));
            }
            let finite = layer.weights.iter().flatten().chain(&layer.biases).all(|w| w.is_finite());
            if !finite {
                return Err(PipelineError::InvalidModel(format!(
                    "layer {} has non-finite parameters",
                    n
                )));
            }
            width = layer.output_dim();
        }

        if width != 1 {
            return Err(PipelineError::InvalidModel(format!(
                "network must emit 1 output, final layer emits {}",
                width
            )));
        }
        Ok(())
    }

    /// Forward pass over a normalized input. The output is not clamped.
    pub fn activate(&self, input: &[f64]) -> Result<f64> {
        if input.len() != FEATURE_DIM {
            return Err(PipelineError::Dimension {
                expected: FEATURE_DIM,
                actual: input.len(),
            });
        }
        let mut signal = input.to_vec();
        for layer in &self.layers {
            signal = layer.forward(&signal);
        }
        signal
            .first()
            .copied()
            .ok_or_else(|| PipelineError::InvalidModel("network produced no output".into()))
    }
}
