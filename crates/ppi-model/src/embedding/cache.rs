use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use std::sync::{Arc, RwLock};

use anyhow::{Context, Result};

use crate::embedding::{validate_sequence, SequenceEmbedder};
use crate::error::PpiError;

/// Read-through cache from protein identifier to embedding vector.
///
/// The cache exclusively owns the stored vectors; callers receive cheap
/// `Arc<[f32]>` views. Entries are append-only: created on first miss,
/// never mutated, never evicted. Concurrent readers are unaffected by a
/// writer; two concurrent computes for the same identifier may duplicate
/// embedder work, but the stored value is last-writer-wins over identical
/// data because the embedder is deterministic.
pub struct EmbeddingCache {
    dim: usize,
    entries: RwLock<HashMap<String, Arc<[f32]>>>,
}

impl EmbeddingCache {
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Expected dimensionality of every stored vector.
    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().unwrap().is_empty()
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.entries.read().unwrap().contains_key(identifier)
    }

    /// Pure read. Never invokes an embedder, never writes.
    pub fn lookup(&self, identifier: &str) -> Option<Arc<[f32]>> {
        self.entries.read().unwrap().get(identifier).cloned()
    }

    /// Resolves an identifier through the cache, computing and storing the
    /// embedding on a miss.
    ///
    /// The sequence is validated and the embedder output dimension checked
    /// before anything is written, so no failure path can leave a partial or
    /// corrupt entry behind.
    pub fn get_or_compute(
        &self,
        identifier: &str,
        sequence: &str,
        embedder: &dyn SequenceEmbedder,
    ) -> Result<Arc<[f32]>, PpiError> {
        if let Some(vector) = self.lookup(identifier) {
            return Ok(vector);
        }

        validate_sequence(identifier, sequence)?;
        let vector = embedder.embed(sequence)?;
        if vector.len() != self.dim {
            return Err(PpiError::DimensionMismatch {
                expected: self.dim,
                actual: vector.len(),
            });
        }

        let vector: Arc<[f32]> = vector.into();
        self.entries
            .write()
            .unwrap()
            .insert(identifier.to_string(), Arc::clone(&vector));
        Ok(vector)
    }

    /// Inserts a precomputed vector, e.g. when rebuilding a cache from an
    /// external embedding dump.
    pub fn insert(&self, identifier: &str, vector: Vec<f32>) -> Result<(), PpiError> {
        if vector.len() != self.dim {
            return Err(PpiError::DimensionMismatch {
                expected: self.dim,
                actual: vector.len(),
            });
        }
        self.entries
            .write()
            .unwrap()
            .insert(identifier.to_string(), vector.into());
        Ok(())
    }

    /// Serializes the full table to a JSON file. Writes go through a single
    /// snapshot under the read lock, so a concurrent compute never
    /// interleaves with the on-disk representation. The file is replaced
    /// atomically via a sibling temp file, so an interrupted save never
    /// leaves a truncated cache behind.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let snapshot: BTreeMap<String, Vec<f32>> = self
            .entries
            .read()
            .unwrap()
            .iter()
            .map(|(id, v)| (id.clone(), v.to_vec()))
            .collect();
        let json = serde_json::to_string(&snapshot)?;

        let mut tmp = path.as_ref().as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = std::path::PathBuf::from(tmp);
        fs::write(&tmp, json)
            .with_context(|| format!("failed to write embedding cache to {:?}", tmp))?;
        fs::rename(&tmp, path.as_ref())
            .with_context(|| format!("failed to replace embedding cache at {:?}", path.as_ref()))?;
        log::info!(
            "Saved embedding cache ({} entries) to {:?}",
            snapshot.len(),
            path.as_ref()
        );
        Ok(())
    }

    /// Loads a serialized cache, verifying every vector against the expected
    /// dimensionality. The full table is held in memory for O(1) lookups.
    pub fn load<P: AsRef<Path>>(path: P, dim: usize) -> Result<Self> {
        let json = fs::read_to_string(path.as_ref())
            .with_context(|| format!("failed to read embedding cache from {:?}", path.as_ref()))?;
        let table: BTreeMap<String, Vec<f32>> = serde_json::from_str(&json)
            .with_context(|| format!("malformed embedding cache file {:?}", path.as_ref()))?;

        let cache = Self::new(dim);
        {
            let mut entries = cache.entries.write().unwrap();
            for (id, vector) in table {
                if vector.len() != dim {
                    anyhow::bail!(
                        "cache entry '{}' has dimension {} (expected {})",
                        id,
                        vector.len(),
                        dim
                    );
                }
                entries.insert(id, vector.into());
            }
        }
        log::info!(
            "Loaded embedding cache ({} entries) from {:?}",
            cache.len(),
            path.as_ref()
        );
        Ok(cache)
    }

    /// Identifiers currently present, sorted for stable iteration.
    pub fn identifiers(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.entries.read().unwrap().keys().cloned().collect();
        ids.sort_unstable();
        ids
    }
}
