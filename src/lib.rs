// Crowe Logic workbench - multi-agent hypothesis testing over uploaded datasets

pub mod config;
pub mod models;
pub mod types;
pub mod agents;
pub mod llm;
pub mod context;   // Dataset summaries and samples fed to the retrieval agent
pub mod datasets;  // CSV/TSV, JSON and FASTA upload parsing
pub mod routes;
pub mod middleware;
pub mod utils;

// Re-exports for convenience
pub use agents::{test_hypothesis_with_ai, HypothesisPipeline, PipelineStage};
pub use config::Config;
pub use models::AppState;

pub fn create_router(state: AppState) -> axum::Router {
    routes::create_router(state)
}
