//! Interaction pair datasets: ground-truth loading, negative sampling,
//! and stratified train/validation splitting.
//!
//! Positive pairs come from a ground-truth interaction table (HINT-style
//! TSV). Negatives are generated by rejection sampling over the identifier
//! universe: the positive set is sparse relative to all possible pairs, so
//! random draws with a dedup lookup are efficient without enumerating the
//! complement.
use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::PpiError;

/// Binary interaction label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    Positive,
    Negative,
}

/// A candidate interacting pair with its label. A pair and its reverse are
/// equivalent for deduplication purposes; orientation is preserved only for
/// feature assembly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionPair {
    pub protein_a: String,
    pub protein_b: String,
    pub label: Label,
    pub interaction_type: Option<String>,
}

impl InteractionPair {
    pub fn positive(a: impl Into<String>, b: impl Into<String>) -> Self {
        InteractionPair {
            protein_a: a.into(),
            protein_b: b.into(),
            label: Label::Positive,
            interaction_type: None,
        }
    }

    /// Orientation-invariant key for dedup lookups.
    fn canonical_key(&self) -> (String, String) {
        canonical_key(&self.protein_a, &self.protein_b)
    }
}

fn canonical_key(a: &str, b: &str) -> (String, String) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

/// A labeled example ready for the model: concatenated embeddings plus the
/// binary label and an optional interaction-type class index. The type label
/// is a sum type, not a sentinel: absent means the auxiliary loss skips this
/// row.
#[derive(Debug, Clone)]
pub struct TrainingExample {
    pub features: Vec<f32>,
    pub label: Label,
    pub type_label: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct PairRecord {
    #[serde(alias = "Uniprot_A", alias = "uniprot_a", alias = "protein_a")]
    protein_a: String,
    #[serde(alias = "Uniprot_B", alias = "uniprot_b", alias = "protein_b")]
    protein_b: String,
    #[serde(
        default,
        alias = "Interaction_Type",
        alias = "interaction_type",
        alias = "type"
    )]
    interaction_type: Option<String>,
}

/// Loads known-positive pairs from a TSV/CSV table with `Uniprot_A` and
/// `Uniprot_B` columns and an optional `Interaction_Type` column.
pub fn load_positive_pairs<P: AsRef<Path>>(path: P) -> Result<Vec<InteractionPair>> {
    let delimiter = match path.as_ref().extension().and_then(|e| e.to_str()) {
        Some("csv") => b',',
        _ => b'\t',
    };
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_path(path.as_ref())
        .with_context(|| format!("failed to open pair table {:?}", path.as_ref()))?;

    let mut pairs = Vec::new();
    for record in reader.deserialize() {
        let record: PairRecord = record.context("malformed row in pair table")?;
        let interaction_type = record
            .interaction_type
            .filter(|t| !t.trim().is_empty())
            .map(|t| t.trim().to_string());
        pairs.push(InteractionPair {
            protein_a: record.protein_a.trim().to_string(),
            protein_b: record.protein_b.trim().to_string(),
            label: Label::Positive,
            interaction_type,
        });
    }
    log::info!("Loaded {} positive pairs from {:?}", pairs.len(), path.as_ref());
    Ok(pairs)
}

/// All unique identifiers appearing in the given pairs, sorted.
pub fn unique_identifiers(pairs: &[InteractionPair]) -> Vec<String> {
    let mut ids: Vec<String> = pairs
        .iter()
        .flat_map(|p| [p.protein_a.clone(), p.protein_b.clone()])
        .collect();
    ids.sort_unstable();
    ids.dedup();
    ids
}

/// Builds a labeled dataset: every positive pair, plus
/// `round(negative_ratio * |positives|)` sampled negatives.
///
/// A candidate negative is rejected and redrawn when it equals a positive
/// pair in either orientation, duplicates an already emitted negative in
/// either orientation, or pairs an identifier with itself. Draws are bounded
/// at ten times the target (plus fixed slack for tiny targets); exhausting
/// the budget fails with [`PpiError::InsufficientNegativeSpace`], which
/// protects against universes where almost every pair is positive.
pub fn build_pair_dataset<R: Rng>(
    positives: &[InteractionPair],
    negative_ratio: f64,
    universe: &[String],
    rng: &mut R,
) -> Result<Vec<InteractionPair>, PpiError> {
    let requested = (negative_ratio * positives.len() as f64).round() as usize;

    let positive_keys: HashSet<(String, String)> =
        positives.iter().map(|p| p.canonical_key()).collect();
    let mut negative_keys: HashSet<(String, String)> = HashSet::with_capacity(requested);
    let mut negatives: Vec<InteractionPair> = Vec::with_capacity(requested);

    let max_attempts = requested.saturating_mul(10) + 100;
    let mut attempts = 0usize;

    if requested > 0 && universe.len() < 2 {
        return Err(PpiError::InsufficientNegativeSpace {
            requested,
            generated: 0,
            attempts,
        });
    }

    while negatives.len() < requested {
        if attempts >= max_attempts {
            return Err(PpiError::InsufficientNegativeSpace {
                requested,
                generated: negatives.len(),
                attempts,
            });
        }
        attempts += 1;

        let a = universe.choose(rng).expect("universe checked non-empty");
        let b = universe.choose(rng).expect("universe checked non-empty");
        if a == b {
            continue;
        }
        let key = canonical_key(a, b);
        if positive_keys.contains(&key) || negative_keys.contains(&key) {
            continue;
        }

        negative_keys.insert(key);
        negatives.push(InteractionPair {
            protein_a: a.clone(),
            protein_b: b.clone(),
            label: Label::Negative,
            interaction_type: None,
        });
    }

    log::info!(
        "Generated {} negative pairs in {} draws ({} positives)",
        negatives.len(),
        attempts,
        positives.len()
    );

    let mut dataset = positives.to_vec();
    dataset.extend(negatives);
    Ok(dataset)
}

/// Partitions items into training and validation subsets, stratified so both
/// retain the positive/negative ratio (±1 for rounding). Items are shuffled
/// within each class before the split.
pub fn stratified_split<T, F, R>(
    items: Vec<T>,
    is_positive: F,
    validation_fraction: f64,
    rng: &mut R,
) -> (Vec<T>, Vec<T>)
where
    F: Fn(&T) -> bool,
    R: Rng,
{
    let (mut positives, mut negatives): (Vec<T>, Vec<T>) =
        items.into_iter().partition(|item| is_positive(item));
    positives.shuffle(rng);
    negatives.shuffle(rng);

    let mut train = Vec::new();
    let mut validation = Vec::new();
    for mut class in [positives, negatives] {
        let val_n = (class.len() as f64 * validation_fraction).round() as usize;
        let val_n = val_n.min(class.len());
        validation.extend(class.drain(..val_n));
        train.extend(class);
    }
    (train, validation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn canonical_key_is_orientation_invariant() {
        assert_eq!(canonical_key("P1", "P2"), canonical_key("P2", "P1"));
    }

    #[test]
    fn unique_identifiers_sorted_dedup() {
        let pairs = vec![
            InteractionPair::positive("P3", "P1"),
            InteractionPair::positive("P1", "P2"),
        ];
        assert_eq!(unique_identifiers(&pairs), vec!["P1", "P2", "P3"]);
    }

    #[test]
    fn negative_ratio_rounds_to_nearest() {
        let positives = vec![
            InteractionPair::positive("P1", "P2"),
            InteractionPair::positive("P3", "P4"),
            InteractionPair::positive("P5", "P6"),
        ];
        let universe = unique_identifiers(&positives);
        let mut rng = StdRng::seed_from_u64(7);
        let dataset = build_pair_dataset(&positives, 0.5, &universe, &mut rng).unwrap();
        let negatives = dataset.iter().filter(|p| p.label == Label::Negative).count();
        assert_eq!(negatives, 2, "round(0.5 * 3) = 2");
    }
}
