use serde::{Deserialize, Serialize};

/// Central configuration for the interaction model architecture.
#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default)]
pub struct ModelConfig {
    /// Dimensionality of a single protein embedding (ESM2-650M produces 1280).
    pub embedding_dim: usize,
    /// Hidden layer widths of the shared feature extractor.
    pub hidden_dims: Vec<usize>,
    /// Dropout probability between hidden layers.
    pub dropout: f32,
    /// Closed set of interaction-type labels predicted by the auxiliary head.
    pub interaction_types: Vec<String>,
    /// Probability thresholds used to bucket raw scores into confidence levels.
    pub confidence: ConfidenceThresholds,
}

impl ModelConfig {
    /// Input width of the network: two concatenated embeddings.
    pub fn input_dim(&self) -> usize {
        2 * self.embedding_dim
    }

    pub fn num_types(&self) -> usize {
        self.interaction_types.len()
    }

    /// Index of a type label within the closed label set, if present.
    pub fn type_index(&self, label: &str) -> Option<usize> {
        self.interaction_types.iter().position(|t| t == label)
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        ModelConfig {
            embedding_dim: 1280,
            hidden_dims: vec![512, 256, 128],
            dropout: 0.3,
            interaction_types: vec![
                "binding".to_string(),
                "regulatory".to_string(),
                "catalytic".to_string(),
                "structural".to_string(),
                "other".to_string(),
            ],
            confidence: ConfidenceThresholds::default(),
        }
    }
}

/// Hyper-parameters for a training run.
#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default)]
pub struct TrainParams {
    pub batch_size: usize,
    pub learning_rate: f64,
    pub epochs: usize,
    /// Weight of the interaction-type auxiliary loss relative to the binary
    /// loss. Only applied to examples that carry a type label.
    pub aux_loss_weight: f64,
    pub seed: u64,
}

impl Default for TrainParams {
    fn default() -> Self {
        TrainParams {
            batch_size: 32,
            learning_rate: 1e-4,
            epochs: 10,
            aux_loss_weight: 0.5,
            seed: 42,
        }
    }
}

/// Policy constants for mapping an interaction probability to a confidence
/// bucket. Tunable, not structural.
#[derive(Deserialize, Serialize, Debug, Clone, Copy)]
#[serde(default)]
pub struct ConfidenceThresholds {
    /// Probabilities strictly below this are low confidence.
    pub low_below: f32,
    /// Probabilities strictly above this are high confidence.
    pub high_above: f32,
}

impl Default for ConfidenceThresholds {
    fn default() -> Self {
        ConfidenceThresholds {
            low_below: 0.4,
            high_above: 0.7,
        }
    }
}

/// Confidence level reported with every prediction.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    pub fn from_probability(probability: f32, thresholds: &ConfidenceThresholds) -> Self {
        if probability < thresholds.low_below {
            Confidence::Low
        } else if probability > thresholds.high_above {
            Confidence::High
        } else {
            Confidence::Medium
        }
    }
}
