//! Sequence embedding contract and the read-through embedding cache.
//!
//! The embedder itself is an external collaborator (a pretrained sequence
//! transformer in production); this module pins down its contract, offers a
//! deterministic baseline implementation so the pipeline runs end-to-end
//! without model downloads, and wraps any embedder with a wall-clock timeout
//! for serving.
pub mod cache;
pub mod embedder;

pub use cache::EmbeddingCache;
pub use embedder::{KmerProjectionEmbedder, SequenceEmbedder, TimedEmbedder};

use crate::error::PpiError;

/// Amino-acid alphabet accepted for embedding, including the ambiguity
/// codes (B, J, X, Z) and the non-standard residues (U, O) emitted by
/// UniProt FASTA records.
const AMINO_ALPHABET: &str = "ACDEFGHIKLMNPQRSTVWYBJXZUO";

/// Checks that a sequence is non-empty and drawn from the amino-acid
/// alphabet. Runs before any embedder invocation so a malformed input can
/// never poison the cache.
pub fn validate_sequence(id: &str, sequence: &str) -> Result<(), PpiError> {
    if sequence.is_empty() {
        return Err(PpiError::InvalidSequence {
            id: id.to_string(),
            reason: "sequence is empty".to_string(),
        });
    }
    for (pos, c) in sequence.chars().enumerate() {
        if !AMINO_ALPHABET.contains(c.to_ascii_uppercase()) {
            return Err(PpiError::InvalidSequence {
                id: id.to_string(),
                reason: format!("unexpected character '{}' at position {}", c, pos),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_standard_sequences() {
        assert!(validate_sequence("P01308", "MALWMRLLPLLALLALWGPDPAAA").is_ok());
        assert!(validate_sequence("P01308", "mkv").is_ok(), "lowercase is valid");
    }

    #[test]
    fn rejects_empty_sequence() {
        let err = validate_sequence("P01308", "").unwrap_err();
        assert!(matches!(err, PpiError::InvalidSequence { .. }));
    }

    #[test]
    fn rejects_non_amino_characters() {
        assert!(validate_sequence("P01308", "MKV1").is_err());
        assert!(validate_sequence("P01308", "MK V").is_err());
    }
}
