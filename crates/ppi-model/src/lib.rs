//! ppi-model: protein-protein interaction prediction primitives.
//!
//! This crate provides the embedding contract and read-through embedding
//! cache, negative-sampling dataset construction, the candle-based
//! interaction classifier with its training loop, and the shared error
//! taxonomy used by the CLI and the inference service.
//!
//! The design favors small, testable modules: the expensive sequence
//! embedder sits behind a trait so training and serving can share the same
//! cache, and every component takes its collaborators by handle rather than
//! reaching for globals.
pub mod config;
pub mod dataset;
pub mod embedding;
pub mod error;
pub mod models;
pub mod stats;
