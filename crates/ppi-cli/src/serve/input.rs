use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::ArgMatches;
use serde::{Deserialize, Serialize};

use ppi_model::config::ModelConfig;

/// Configuration for the inference service, read from a JSON file with CLI
/// overrides layered on top. The model architecture here must match the one
/// the checkpoint was trained with.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ServeConfig {
    /// Trained safetensors checkpoint. The service refuses to start
    /// without it.
    pub model_file: String,
    /// Embedding cache to warm-start from. Optional: the service starts
    /// cold and fills the cache as requests arrive.
    pub cache_file: Option<String>,
    /// Identifier/sequence table used to resolve identifiers the cache
    /// does not know. Optional.
    pub sequence_data: Option<String>,
    pub host: String,
    pub port: u16,
    /// Wall-clock bound on a single embedding computation.
    pub embed_timeout_secs: u64,
    pub device: String,
    pub model: ModelConfig,
}

impl Default for ServeConfig {
    fn default() -> Self {
        ServeConfig {
            model_file: String::from("ppi_model.safetensors"),
            cache_file: None,
            sequence_data: None,
            host: String::from("0.0.0.0"),
            port: 8080,
            embed_timeout_secs: 30,
            device: String::from("cpu"),
            model: ModelConfig::default(),
        }
    }
}

impl ServeConfig {
    pub fn from_arguments(config_path: &PathBuf, matches: &ArgMatches) -> Result<Self> {
        let config_json = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;
        let mut config: ServeConfig = serde_json::from_str(&config_json)
            .with_context(|| format!("Malformed serve config: {:?}", config_path))?;

        if let Some(model_file) = matches.get_one::<String>("model_file") {
            config.model_file = model_file.clone();
        }
        if let Some(cache_file) = matches.get_one::<String>("cache_file") {
            config.cache_file = Some(cache_file.clone());
        }
        if let Some(port) = matches.get_one::<u16>("port") {
            config.port = *port;
        }

        if !PathBuf::from(&config.model_file).exists() {
            anyhow::bail!("model checkpoint not found: {}", config.model_file);
        }
        Ok(config)
    }
}
