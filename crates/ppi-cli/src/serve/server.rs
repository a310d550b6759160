use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;

use ppi_model::config::{Confidence, ConfidenceThresholds};
use ppi_model::embedding::{
    EmbeddingCache, KmerProjectionEmbedder, SequenceEmbedder, TimedEmbedder,
};
use ppi_model::error::PpiError;
use ppi_model::models::{get_device, InteractionModel};

use crate::sequences::load_sequence_table;
use crate::serve::input::ServeConfig;
use crate::serve::resolve::{resolve_embedding, Resolution};

/// Shared state behind the service. Everything is immutable after startup
/// except the cache, which synchronizes internally, so handlers run without
/// any service-level locking.
pub struct AppState {
    pub model: InteractionModel,
    pub cache: EmbeddingCache,
    pub embedder: Arc<dyn SequenceEmbedder>,
    pub sequences: HashMap<String, String>,
}

impl AppState {
    pub fn new(
        model: InteractionModel,
        cache: EmbeddingCache,
        embedder: Arc<dyn SequenceEmbedder>,
        sequences: HashMap<String, String>,
    ) -> Self {
        Self {
            model,
            cache,
            embedder,
            sequences,
        }
    }

    pub fn from_config(config: &ServeConfig) -> Result<Self> {
        let device = get_device(&config.device)?;
        let model =
            InteractionModel::from_checkpoint(&config.model_file, config.model.clone(), device)
                .context("failed to load interaction model")?;

        let cache = match &config.cache_file {
            Some(path) if Path::new(path).exists() => {
                EmbeddingCache::load(path, config.model.embedding_dim)?
            }
            Some(path) => {
                log::warn!("Embedding cache {} not found; starting cold", path);
                EmbeddingCache::new(config.model.embedding_dim)
            }
            None => {
                log::warn!("No embedding cache configured; starting cold");
                EmbeddingCache::new(config.model.embedding_dim)
            }
        };

        let sequences = match &config.sequence_data {
            Some(path) => load_sequence_table(path)?,
            None => HashMap::new(),
        };

        let embedder: Arc<dyn SequenceEmbedder> = Arc::new(TimedEmbedder::new(
            KmerProjectionEmbedder::new(config.model.embedding_dim),
            Duration::from_secs(config.embed_timeout_secs),
        ));

        Ok(Self::new(model, cache, embedder, sequences))
    }

    fn thresholds(&self) -> &ConfidenceThresholds {
        &self.model.config().confidence
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct PredictRequest {
    pub protein_a: Option<String>,
    pub protein_b: Option<String>,
    /// Amino-acid sequences supplied inline, taking precedence over the
    /// local sequence table when the cache misses.
    pub protein_a_sequence: Option<String>,
    pub protein_b_sequence: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PredictResponse {
    pub protein_a: String,
    pub protein_b: String,
    pub interaction_probability: f32,
    pub interacts: bool,
    pub interaction_type: String,
    /// Probability of the reported interaction type.
    pub type_confidence: f32,
    pub type_probabilities: BTreeMap<String, f32>,
    pub confidence: Confidence,
    /// Identifiers that could not be resolved to a real embedding and were
    /// fed as zero vectors. Non-empty implies low confidence.
    pub degraded_inputs: Vec<String>,
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/ping", get(ping))
        .route("/invocations", post(invocations))
        .with_state(state)
}

/// Starts the HTTP service and blocks until it exits.
pub async fn run_server(config: ServeConfig) -> Result<()> {
    let state = Arc::new(AppState::from_config(&config)?);
    let app = build_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    log::info!("Inference service listening on {}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn ping() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn invocations(
    State(state): State<Arc<AppState>>,
    Json(request): Json<PredictRequest>,
) -> Result<Json<PredictResponse>, (StatusCode, Json<serde_json::Value>)> {
    let response = tokio::task::spawn_blocking(move || predict_blocking(&state, request))
        .await
        .map_err(|e| {
            log::error!("prediction task panicked: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "internal error" })),
            )
        })?
        .map_err(|e| error_response(&e))?;
    Ok(Json(response))
}

/// Full prediction path for one request. Runs on the blocking pool since
/// embedding and the forward pass are CPU-bound.
fn predict_blocking(state: &AppState, request: PredictRequest) -> Result<PredictResponse, PpiError> {
    let protein_a = required_identifier(request.protein_a.as_deref(), "protein_a")?;
    let protein_b = required_identifier(request.protein_b.as_deref(), "protein_b")?;

    let resolution_a = resolve_embedding(
        &state.cache,
        state.embedder.as_ref(),
        &state.sequences,
        &protein_a,
        request.protein_a_sequence.as_deref(),
    )?;
    let resolution_b = resolve_embedding(
        &state.cache,
        state.embedder.as_ref(),
        &state.sequences,
        &protein_b,
        request.protein_b_sequence.as_deref(),
    )?;

    let dim = state.model.config().embedding_dim;
    let emb_a = resolution_a.vector(dim);
    let emb_b = resolution_b.vector(dim);
    let prediction = state.model.predict_pair(&emb_a, &emb_b)?;

    let mut degraded_inputs = Vec::new();
    for resolution in [&resolution_a, &resolution_b] {
        if let Resolution::Degraded { identifier } = resolution {
            degraded_inputs.push(identifier.clone());
        }
    }

    // A prediction over zero-vector stand-ins is a guess, whatever the
    // model's raw score says.
    let confidence = if degraded_inputs.is_empty() {
        Confidence::from_probability(prediction.probability, state.thresholds())
    } else {
        Confidence::Low
    };

    let types = &state.model.config().interaction_types;
    let top = prediction.top_type_index();
    let interaction_type = top
        .and_then(|i| types.get(i).cloned())
        .unwrap_or_else(|| "unknown".to_string());
    let type_confidence = top
        .and_then(|i| prediction.type_probs.get(i).copied())
        .unwrap_or(0.0);
    let type_probabilities: BTreeMap<String, f32> = types
        .iter()
        .cloned()
        .zip(prediction.type_probs.iter().copied())
        .collect();

    Ok(PredictResponse {
        protein_a,
        protein_b,
        interaction_probability: prediction.probability,
        interacts: prediction.interacts(),
        interaction_type,
        type_confidence,
        type_probabilities,
        confidence,
        degraded_inputs,
    })
}

fn required_identifier(value: Option<&str>, field: &str) -> Result<String, PpiError> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(PpiError::BadRequest(format!(
            "missing required field '{}'",
            field
        ))),
    }
}

fn error_response(err: &PpiError) -> (StatusCode, Json<serde_json::Value>) {
    let status = match err {
        PpiError::BadRequest(_) | PpiError::InvalidSequence { .. } => StatusCode::BAD_REQUEST,
        PpiError::PredictionUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        log::error!("prediction failed: {}", err);
    }
    (status, Json(json!({ "error": err.to_string() })))
}
