//! ppi-cli: training orchestration and the inference service for the
//! protein-protein interaction pipeline.
pub mod sequences;
pub mod serve;
pub mod train;
