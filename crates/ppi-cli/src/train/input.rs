use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::ArgMatches;
use serde::{Deserialize, Serialize};

use ppi_model::config::{ModelConfig, TrainParams};

/// Configuration for a training run, read from a JSON file with CLI
/// overrides layered on top.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct TrainConfig {
    /// TSV/CSV table of known-positive pairs (`Uniprot_A`, `Uniprot_B`,
    /// optional `Interaction_Type`).
    pub train_data: String,
    /// Two-column identifier/sequence TSV used to embed every identifier.
    pub sequence_data: String,
    /// Destination for the trained safetensors checkpoint.
    pub output_file: String,
    /// Embedding cache location: loaded if present, written after training.
    pub cache_file: String,
    /// Negative pairs per positive pair.
    pub negative_ratio: f64,
    /// Fraction of the combined dataset held out for validation.
    pub validation_fraction: f64,
    pub device: String,
    pub model: ModelConfig,
    pub train: TrainParams,
}

impl Default for TrainConfig {
    fn default() -> Self {
        TrainConfig {
            train_data: String::new(),
            sequence_data: String::new(),
            output_file: String::from("ppi_model.safetensors"),
            cache_file: String::from("embeddings_cache.json"),
            negative_ratio: 1.0,
            validation_fraction: 0.2,
            device: String::from("cpu"),
            model: ModelConfig::default(),
            train: TrainParams::default(),
        }
    }
}

impl TrainConfig {
    pub fn from_arguments(config_path: &PathBuf, matches: &ArgMatches) -> Result<Self> {
        let config_json = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;
        let mut config: TrainConfig = serde_json::from_str(&config_json)
            .with_context(|| format!("Malformed training config: {:?}", config_path))?;

        if let Some(train_data) = matches.get_one::<String>("train_data") {
            config.train_data = train_data.clone();
        }
        if let Some(sequence_data) = matches.get_one::<String>("sequence_data") {
            config.sequence_data = sequence_data.clone();
        }
        if let Some(output_file) = matches.get_one::<String>("output_file") {
            config.output_file = output_file.clone();
        }
        if let Some(cache_file) = matches.get_one::<String>("cache_file") {
            config.cache_file = cache_file.clone();
        }

        validate_tsv_or_csv_file(&config.train_data)?;
        validate_exists(&config.sequence_data)?;
        Ok(config)
    }
}

pub fn validate_tsv_or_csv_file(path: &str) -> Result<()> {
    let pb = PathBuf::from(path);
    let ext = pb
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_lowercase());
    match ext.as_deref() {
        Some("tsv") | Some("csv") | Some("txt") => {}
        _ => anyhow::bail!("File must have a .tsv, .csv, or .txt extension: {}", path),
    }
    validate_exists(path)
}

fn validate_exists(path: &str) -> Result<()> {
    if !PathBuf::from(path).exists() {
        anyhow::bail!("File does not exist: {}", path);
    }
    Ok(())
}
