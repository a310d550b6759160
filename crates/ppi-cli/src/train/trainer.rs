use std::path::Path;

use anyhow::{anyhow, Context, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;

use ppi_model::dataset::{
    build_pair_dataset, load_positive_pairs, stratified_split, unique_identifiers, Label,
    TrainingExample,
};
use ppi_model::embedding::{EmbeddingCache, KmerProjectionEmbedder, SequenceEmbedder};
use ppi_model::models::{get_device, InteractionModel};
use ppi_model::stats::TrainingPhase;

use crate::sequences::load_sequence_table;
use crate::train::input::TrainConfig;

/// Runs the end-to-end training procedure: load positives, embed every
/// unique identifier through the cache, build the labeled dataset,
/// stratified split, fit, checkpoint.
///
/// Every step is fail-fast. A missing sequence or a failed embedding aborts
/// the run rather than silently dropping pairs, since silent drops would
/// bias the dataset unpredictably.
pub fn run_training(config: &TrainConfig) -> Result<()> {
    let start_time = std::time::Instant::now();

    // Step 1: load ground-truth positive pairs.
    let positives = load_positive_pairs(&config.train_data)?;
    if positives.is_empty() {
        anyhow::bail!("no positive pairs found in {}", config.train_data);
    }
    let identifiers = unique_identifiers(&positives);
    log::info!(
        "{} positive pairs over {} unique proteins",
        positives.len(),
        identifiers.len()
    );

    // Step 2: resolve every identifier to an embedding through the cache.
    let sequences = load_sequence_table(&config.sequence_data)?;
    let cache = if Path::new(&config.cache_file).exists() {
        EmbeddingCache::load(&config.cache_file, config.model.embedding_dim)?
    } else {
        log::info!("No embedding cache at {}; starting cold", config.cache_file);
        EmbeddingCache::new(config.model.embedding_dim)
    };

    let embedder = KmerProjectionEmbedder::new(config.model.embedding_dim);
    embed_all(&identifiers, &sequences, &cache, &embedder)?;

    // Step 3: negative sampling.
    let mut rng = StdRng::seed_from_u64(config.train.seed);
    let dataset = build_pair_dataset(&positives, config.negative_ratio, &identifiers, &mut rng)?;
    let negatives = dataset.iter().filter(|p| p.label == Label::Negative).count();
    log::info!(
        "Dataset: {} examples ({} positive, {} negative)",
        dataset.len(),
        dataset.len() - negatives,
        negatives
    );

    // Assemble feature vectors from the cache.
    let mut examples = Vec::with_capacity(dataset.len());
    for pair in &dataset {
        let emb_a = cache
            .lookup(&pair.protein_a)
            .ok_or_else(|| anyhow!("missing embedding for {}", pair.protein_a))?;
        let emb_b = cache
            .lookup(&pair.protein_b)
            .ok_or_else(|| anyhow!("missing embedding for {}", pair.protein_b))?;

        let mut features = Vec::with_capacity(2 * config.model.embedding_dim);
        features.extend_from_slice(&emb_a);
        features.extend_from_slice(&emb_b);

        let type_label = match &pair.interaction_type {
            Some(label) => match config.model.type_index(label) {
                Some(index) => Some(index as u32),
                None => {
                    log::warn!(
                        "Unknown interaction type '{}' for pair ({}, {}); skipping type label",
                        label,
                        pair.protein_a,
                        pair.protein_b
                    );
                    None
                }
            },
            None => None,
        };

        examples.push(TrainingExample {
            features,
            label: pair.label,
            type_label,
        });
    }

    // Step 4: stratified train/validation split.
    let (train_set, validation_set) = stratified_split(
        examples,
        |e| e.label == Label::Positive,
        config.validation_fraction,
        &mut rng,
    );
    log::info!(
        "Split: {} training / {} validation examples",
        train_set.len(),
        validation_set.len()
    );

    // Step 5: fit.
    let device = get_device(&config.device)?;
    let mut model = InteractionModel::new_untrained(config.model.clone(), device)?;
    let validation = if validation_set.is_empty() {
        None
    } else {
        Some(validation_set.as_slice())
    };
    let metrics = model
        .train(&train_set, validation, &config.train)
        .context("model training failed")?;

    if let Some((loss, accuracy)) = metrics.last_for_phase(TrainingPhase::Validation) {
        log::info!("Final validation: loss {:.4}, accuracy {:.4}", loss, accuracy);
    }

    // Step 6: checkpoint model weights and the embedding cache.
    model.save(&config.output_file)?;
    cache.save(&config.cache_file)?;

    log::info!("Training completed in {:?}", start_time.elapsed());
    Ok(())
}

/// Embeds every identifier not already cached. Embedding dominates
/// wall-clock time on a cold cache, so misses run in parallel; any failure
/// aborts the run with the underlying error unchanged.
fn embed_all(
    identifiers: &[String],
    sequences: &std::collections::HashMap<String, String>,
    cache: &EmbeddingCache,
    embedder: &dyn SequenceEmbedder,
) -> Result<()> {
    let missing: Vec<&String> = identifiers
        .iter()
        .filter(|id| !cache.contains(id))
        .collect();
    log::info!(
        "Embedding {} proteins ({} cache hits)",
        missing.len(),
        identifiers.len() - missing.len()
    );

    missing.par_iter().try_for_each(|id| -> Result<()> {
        let sequence = sequences
            .get(id.as_str())
            .ok_or_else(|| anyhow!("no sequence available for identifier '{}'", id))?;
        cache
            .get_or_compute(id, sequence, embedder)
            .with_context(|| format!("failed to embed '{}'", id))?;
        Ok(())
    })
}
