use std::collections::HashMap;
use std::sync::Arc;

use ppi_model::embedding::{EmbeddingCache, SequenceEmbedder};
use ppi_model::error::PpiError;

/// Outcome of resolving one protein identifier to an embedding.
///
/// Degraded resolutions are first-class values rather than silent zero
/// vectors: the caller decides how to fill the feature slot and must report
/// which inputs were degraded, so a caller can never mistake a fallback for
/// a real embedding.
#[derive(Debug, Clone)]
pub enum Resolution {
    Real(Arc<[f32]>),
    Degraded { identifier: String },
}

impl Resolution {
    pub fn is_degraded(&self) -> bool {
        matches!(self, Resolution::Degraded { .. })
    }

    /// The embedding to feed the model: the real vector, or all zeros for a
    /// degraded input.
    pub fn vector(&self, dim: usize) -> Vec<f32> {
        match self {
            Resolution::Real(v) => v.to_vec(),
            Resolution::Degraded { .. } => vec![0.0; dim],
        }
    }
}

/// Resolves an identifier to an embedding, in order of preference: cache
/// hit, sequence supplied with the request, locally known sequence. An
/// identifier none of those cover resolves as degraded.
///
/// A resolvable-but-failing input is not degraded: an invalid sequence or
/// an embedder failure is returned as the error it is.
pub fn resolve_embedding(
    cache: &EmbeddingCache,
    embedder: &dyn SequenceEmbedder,
    sequences: &HashMap<String, String>,
    identifier: &str,
    supplied_sequence: Option<&str>,
) -> Result<Resolution, PpiError> {
    if let Some(vector) = cache.lookup(identifier) {
        return Ok(Resolution::Real(vector));
    }

    let sequence = supplied_sequence.or_else(|| sequences.get(identifier).map(String::as_str));
    match sequence {
        Some(sequence) => {
            let vector = cache.get_or_compute(identifier, sequence, embedder)?;
            Ok(Resolution::Real(vector))
        }
        None => {
            log::warn!(
                "No embedding or sequence available for '{}'; using degraded zero vector",
                identifier
            );
            Ok(Resolution::Degraded {
                identifier: identifier.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ppi_model::embedding::KmerProjectionEmbedder;

    #[test]
    fn unknown_identifier_resolves_degraded() {
        let cache = EmbeddingCache::new(8);
        let embedder = KmerProjectionEmbedder::new(8);
        let sequences = HashMap::new();

        let resolution =
            resolve_embedding(&cache, &embedder, &sequences, "P404", None).unwrap();
        assert!(resolution.is_degraded());
        assert_eq!(resolution.vector(8), vec![0.0; 8]);
    }

    #[test]
    fn supplied_sequence_is_embedded_and_cached() {
        let cache = EmbeddingCache::new(8);
        let embedder = KmerProjectionEmbedder::new(8);
        let sequences = HashMap::new();

        let resolution =
            resolve_embedding(&cache, &embedder, &sequences, "P1", Some("MKVAAA")).unwrap();
        assert!(!resolution.is_degraded());
        assert!(cache.contains("P1"));
    }

    #[test]
    fn local_sequence_table_is_consulted() {
        let cache = EmbeddingCache::new(8);
        let embedder = KmerProjectionEmbedder::new(8);
        let mut sequences = HashMap::new();
        sequences.insert("P2".to_string(), "GGGGGG".to_string());

        let resolution = resolve_embedding(&cache, &embedder, &sequences, "P2", None).unwrap();
        assert!(!resolution.is_degraded());
    }

    #[test]
    fn invalid_supplied_sequence_is_an_error_not_degraded() {
        let cache = EmbeddingCache::new(8);
        let embedder = KmerProjectionEmbedder::new(8);
        let sequences = HashMap::new();

        let err = resolve_embedding(&cache, &embedder, &sequences, "P3", Some("MK1VA"))
            .unwrap_err();
        assert!(matches!(err, PpiError::InvalidSequence { .. }));
        assert!(!cache.contains("P3"));
    }
}
