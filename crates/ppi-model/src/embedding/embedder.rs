use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::error::PpiError;

/// Deterministic map from an amino-acid sequence to a fixed-length vector.
///
/// Implementations are expected to be pure: the same sequence must produce
/// a bit-identical vector across calls and across processes, which is what
/// makes the append-only cache sound. Calls may take seconds; they are the
/// single long-latency operation in the pipeline.
pub trait SequenceEmbedder: Send + Sync {
    /// Output dimensionality. Fixed for the lifetime of the embedder.
    fn dim(&self) -> usize;

    /// Embeds a validated sequence. Failures are transient infrastructure
    /// problems and surface as [`PpiError::PredictionUnavailable`].
    fn embed(&self, sequence: &str) -> Result<Vec<f32>, PpiError>;
}

/// Deterministic baseline embedder built on hashed k-mer composition.
///
/// Each overlapping k-mer hashes to a signed bucket of the output vector;
/// the result is L2-normalized. This is a stand-in for a pretrained
/// transformer with the same contract and dimension: cheap, dependency-free,
/// and stable across runs, which keeps the shipped binary runnable without a
/// model download. Production deployments substitute an ESM-backed
/// implementation of [`SequenceEmbedder`].
pub struct KmerProjectionEmbedder {
    dim: usize,
    k: usize,
}

impl KmerProjectionEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim, k: 3 }
    }

    pub fn with_kmer_size(dim: usize, k: usize) -> Self {
        Self { dim, k: k.max(1) }
    }
}

impl SequenceEmbedder for KmerProjectionEmbedder {
    fn dim(&self) -> usize {
        self.dim
    }

    fn embed(&self, sequence: &str) -> Result<Vec<f32>, PpiError> {
        let upper = sequence.to_ascii_uppercase();
        let bytes = upper.as_bytes();
        let mut v = vec![0f32; self.dim];

        let windows: Box<dyn Iterator<Item = &[u8]>> = if bytes.len() < self.k {
            Box::new(std::iter::once(bytes))
        } else {
            Box::new(bytes.windows(self.k))
        };

        for kmer in windows {
            let h = fnv1a(kmer);
            let idx = (h % self.dim as u64) as usize;
            let sign = if (h >> 32) & 1 == 0 { 1.0 } else { -1.0 };
            v[idx] += sign;
        }

        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in v.iter_mut() {
                *x /= norm;
            }
        }
        Ok(v)
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for b in bytes {
        hash ^= u64::from(*b);
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

/// Bounds any embedder call with a wall-clock timeout.
///
/// The inner call runs on a worker thread; a call that outlives the timeout
/// surfaces as [`PpiError::PredictionUnavailable`] instead of hanging the
/// request. The abandoned worker finishes in the background and its result
/// is dropped; the embedder is deterministic, so a later retry recomputes
/// the same value.
pub struct TimedEmbedder<E> {
    inner: Arc<E>,
    timeout: Duration,
}

impl<E> TimedEmbedder<E> {
    pub fn new(inner: E, timeout: Duration) -> Self {
        Self {
            inner: Arc::new(inner),
            timeout,
        }
    }
}

impl<E: SequenceEmbedder + 'static> SequenceEmbedder for TimedEmbedder<E> {
    fn dim(&self) -> usize {
        self.inner.dim()
    }

    fn embed(&self, sequence: &str) -> Result<Vec<f32>, PpiError> {
        let (tx, rx) = mpsc::channel();
        let inner = Arc::clone(&self.inner);
        let owned = sequence.to_string();
        thread::spawn(move || {
            let _ = tx.send(inner.embed(&owned));
        });
        match rx.recv_timeout(self.timeout) {
            Ok(result) => result,
            Err(_) => Err(PpiError::PredictionUnavailable(format!(
                "embedding timed out after {:?}",
                self.timeout
            ))),
        }
    }
}
