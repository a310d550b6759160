use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use candle_core::{Device, Tensor};
use serde_json::{json, Value};
use tower::ServiceExt;

use ppi_cli::serve::server::{build_router, AppState};
use ppi_model::config::ModelConfig;
use ppi_model::embedding::{EmbeddingCache, SequenceEmbedder};
use ppi_model::error::PpiError;
use ppi_model::models::InteractionModel;

const DIM: usize = 2;

/// Embedder with a fixed two-sequence vocabulary and an invocation counter.
struct ToyEmbedder {
    calls: AtomicUsize,
}

impl ToyEmbedder {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }
}

impl SequenceEmbedder for ToyEmbedder {
    fn dim(&self) -> usize {
        DIM
    }

    fn embed(&self, sequence: &str) -> Result<Vec<f32>, PpiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if sequence.starts_with('A') {
            Ok(vec![1.0, 0.0])
        } else {
            Ok(vec![0.0, 1.0])
        }
    }
}

/// Embedder standing in for an unavailable backend.
struct FailingEmbedder;

impl SequenceEmbedder for FailingEmbedder {
    fn dim(&self) -> usize {
        DIM
    }

    fn embed(&self, _sequence: &str) -> Result<Vec<f32>, PpiError> {
        Err(PpiError::PredictionUnavailable(
            "embedding backend offline".to_string(),
        ))
    }
}

fn tiny_config() -> ModelConfig {
    ModelConfig {
        embedding_dim: DIM,
        hidden_dims: vec![3],
        dropout: 0.0,
        ..ModelConfig::default()
    }
}

/// Model whose output probability is exactly sigmoid(ln 3) = 0.75 for any
/// input: all weights zeroed, binary head bias pinned.
fn constant_model() -> InteractionModel {
    let mut model = InteractionModel::new_untrained(tiny_config(), Device::Cpu).unwrap();
    model.set_evaluation_mode();
    {
        let data = model.varmap().data().lock().unwrap();
        for var in data.values() {
            let zeros = var.as_tensor().zeros_like().unwrap();
            var.set(&zeros).unwrap();
        }
        let bias = Tensor::from_vec(vec![3.0f32.ln()], 1, &Device::Cpu).unwrap();
        data.get("binary_head.bias").unwrap().set(&bias).unwrap();
    }
    model
}

fn test_state(embedder: Arc<dyn SequenceEmbedder>) -> Arc<AppState> {
    Arc::new(AppState::new(
        constant_model(),
        EmbeddingCache::new(DIM),
        embedder,
        HashMap::new(),
    ))
}

async fn post_invocations(state: Arc<AppState>, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri("/invocations")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let response = build_router(state).oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn ping_reports_healthy() {
    let state = test_state(Arc::new(ToyEmbedder::new()));
    let request = Request::builder()
        .method("GET")
        .uri("/ping")
        .body(Body::empty())
        .unwrap();
    let response = build_router(state).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn missing_identifier_is_a_bad_request() {
    let state = test_state(Arc::new(ToyEmbedder::new()));
    let (status, body) = post_invocations(state, json!({ "protein_a": "P1" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("protein_b"));
}

#[tokio::test]
async fn empty_identifier_is_a_bad_request() {
    let state = test_state(Arc::new(ToyEmbedder::new()));
    let (status, _) =
        post_invocations(state, json!({ "protein_a": "  ", "protein_b": "P2" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_identifiers_degrade_and_force_low_confidence() {
    let state = test_state(Arc::new(ToyEmbedder::new()));
    let (status, body) =
        post_invocations(state, json!({ "protein_a": "P404", "protein_b": "P405" })).await;

    assert_eq!(status, StatusCode::OK);
    let degraded: Vec<&str> = body["degraded_inputs"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap())
        .collect();
    assert_eq!(degraded, vec!["P404", "P405"]);
    // The pinned model scores 0.75, which would bucket as high; degraded
    // inputs override it.
    let probability = body["interaction_probability"].as_f64().unwrap();
    assert!((probability - 0.75).abs() < 1e-4);
    assert_eq!(body["confidence"], "low");
}

#[tokio::test]
async fn cached_embeddings_bypass_the_embedder() {
    let embedder = Arc::new(ToyEmbedder::new());
    let state = test_state(embedder.clone());
    state.cache.insert("P1", vec![1.0, 0.0]).unwrap();
    state.cache.insert("P2", vec![0.0, 1.0]).unwrap();

    let started = std::time::Instant::now();
    let (status, body) =
        post_invocations(state, json!({ "protein_a": "P1", "protein_b": "P2" })).await;
    let elapsed = started.elapsed();

    assert_eq!(status, StatusCode::OK);
    assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    assert!(
        elapsed < std::time::Duration::from_secs(1),
        "warm-path request took {:?}",
        elapsed
    );
    assert!(body["degraded_inputs"].as_array().unwrap().is_empty());
    assert_eq!(body["confidence"], "high");
    assert_eq!(body["interacts"], true);
}

#[tokio::test]
async fn embedder_failure_maps_to_service_unavailable() {
    let state = test_state(Arc::new(FailingEmbedder));
    let (status, body) = post_invocations(
        state,
        json!({
            "protein_a": "P1",
            "protein_b": "P2",
            "protein_a_sequence": "AAAA",
            "protein_b_sequence": "GGGG"
        }),
    )
    .await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body["error"]
        .as_str()
        .unwrap()
        .contains("prediction unavailable"));
}

#[tokio::test]
async fn single_degraded_input_still_forces_low_confidence() {
    let state = test_state(Arc::new(ToyEmbedder::new()));
    state.cache.insert("P1", vec![1.0, 0.0]).unwrap();

    let (status, body) =
        post_invocations(state, json!({ "protein_a": "P1", "protein_b": "P404" })).await;

    assert_eq!(status, StatusCode::OK);
    let degraded: Vec<&str> = body["degraded_inputs"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap())
        .collect();
    assert_eq!(degraded, vec!["P404"]);
    assert_eq!(body["confidence"], "low");
}

#[tokio::test]
async fn supplied_sequences_are_embedded_and_cached() {
    let embedder = Arc::new(ToyEmbedder::new());
    let state = test_state(embedder.clone());

    let (status, body) = post_invocations(
        state.clone(),
        json!({
            "protein_a": "P1",
            "protein_b": "P2",
            "protein_a_sequence": "AAAA",
            "protein_b_sequence": "GGGG"
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(embedder.calls.load(Ordering::SeqCst), 2);
    assert!(body["degraded_inputs"].as_array().unwrap().is_empty());
    assert!(state.cache.contains("P1"));
    assert!(state.cache.contains("P2"));

    let types = body["type_probabilities"].as_object().unwrap();
    assert_eq!(types.len(), tiny_config().num_types());
    let sum: f64 = types.values().map(|v| v.as_f64().unwrap()).sum();
    assert!((sum - 1.0).abs() < 1e-4);
}

#[tokio::test]
async fn invalid_supplied_sequence_is_a_bad_request() {
    let state = test_state(Arc::new(ToyEmbedder::new()));
    let (status, body) = post_invocations(
        state,
        json!({
            "protein_a": "P1",
            "protein_b": "P2",
            "protein_a_sequence": "MK1VA",
            "protein_b_sequence": "GGGG"
        }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("P1"));
}
