use thiserror::Error;

/// Error taxonomy shared by the cache, dataset builder, model, and the
/// inference service.
///
/// Training-time errors are fail-fast; serving-time errors are isolated per
/// request. The only deliberately suppressed failure is the zero-vector
/// fallback for a sequence that cannot be resolved, which is handled above
/// this layer and never represented as an error value.
#[derive(Debug, Error)]
pub enum PpiError {
    /// Malformed or empty sequence supplied for embedding. Never poisons
    /// the cache: the entry is rejected before the embedder runs.
    #[error("invalid sequence for '{id}': {reason}")]
    InvalidSequence { id: String, reason: String },

    /// Negative sampling could not reach its target count within the
    /// bounded number of draws. Fatal to the training run.
    #[error(
        "negative sampling exhausted after {attempts} draws: generated {generated} of {requested} requested negatives"
    )]
    InsufficientNegativeSpace {
        requested: usize,
        generated: usize,
        attempts: usize,
    },

    /// An embedding vector of unexpected size reached the model or cache.
    /// Never silently reshaped.
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The embedder or model failed at serving time. Retryable.
    #[error("prediction unavailable: {0}")]
    PredictionUnavailable(String),

    /// Malformed inference request. Surfaced before any embedding work.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Tensor execution failure inside the interaction model.
    #[error("model execution failed: {0}")]
    Model(#[from] candle_core::Error),
}
