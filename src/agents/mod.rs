//! Agent System
//!
//! The hypothesis tester runs three hosted-model agents in strict sequence:
//!
//! - **Retrieval Agent**: mines the dataset context for relevant evidence
//! - **Analysis Agent**: interprets that evidence statistically
//! - **Synthesis Agent**: integrates everything into the final conclusion
//!
//! ## Pipeline Overview
//!
//! ```text
//! Hypothesis + Datasets
//!      │
//!      ▼
//! ┌─────────────┐
//! │  Context    │  → summary + sample per dataset, relevant records
//! │  Builder    │
//! └─────────────┘
//!      │
//!      ▼
//! ┌─────────────┐
//! │  Retrieval  │  → evidence-0..n, step 1
//! │   Agent     │
//! └─────────────┘
//!      │
//!      ▼
//! ┌─────────────┐
//! │  Analysis   │  → + analysis-evidence, step 2
//! │   Agent     │
//! └─────────────┘
//!      │
//!      ▼
//! ┌─────────────┐
//! │  Synthesis  │  → confidence, conclusion, citations, step 3
//! │   Agent     │
//! └─────────────┘
//!      │
//!      ▼
//!  TestHypothesisResult
//! ```
//!
//! Any stage failure aborts the whole run; no partial result is returned and
//! nothing is retried.

pub mod client;
pub mod retrieval;
pub mod analysis;
pub mod synthesis;

pub use analysis::{AnalysisAgent, AnalysisResult};
pub use client::{AgentClient, ModelSettings};
pub use retrieval::{RetrievalAgent, RetrievalResult};
pub use synthesis::SynthesisAgent;

use std::sync::Arc;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use validator::Validate;

use crate::config::{HostedModelConfig, ResolvedModelConfig};
use crate::context::{build_context, extract_relevant};
use crate::llm::{AzureOpenAIAdapter, LLMAdapter};
use crate::models::{TestHypothesisRequest, TestHypothesisResult};
use crate::types::{AppError, AppResult};

/// Lifecycle of one hypothesis test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineStage {
    Idle,
    Retrieving,
    Analyzing,
    Synthesizing,
    Complete,
    Failed,
}

impl PipelineStage {
    pub fn is_terminal(self) -> bool {
        matches!(self, PipelineStage::Complete | PipelineStage::Failed)
    }

    pub fn can_transition_to(self, next: PipelineStage) -> bool {
        use PipelineStage::*;
        match (self, next) {
            (Idle, Retrieving)
            | (Retrieving, Analyzing)
            | (Analyzing, Synthesizing)
            | (Synthesizing, Complete) => true,
            (current, Failed) => !current.is_terminal(),
            _ => false,
        }
    }
}

struct StageTracker<F> {
    stage: PipelineStage,
    on_stage: F,
}

impl<F: FnMut(PipelineStage)> StageTracker<F> {
    fn new(on_stage: F) -> Self {
        Self {
            stage: PipelineStage::Idle,
            on_stage,
        }
    }

    fn advance(&mut self, next: PipelineStage) {
        debug_assert!(
            self.stage.can_transition_to(next),
            "invalid pipeline transition {:?} -> {:?}",
            self.stage,
            next
        );
        info!(from = ?self.stage, to = ?next, "Pipeline stage transition");
        self.stage = next;
        (self.on_stage)(next);
    }
}

/// Sequential retrieval → analysis → synthesis runner
#[derive(Clone)]
pub struct HypothesisPipeline {
    client: AgentClient,
}

impl HypothesisPipeline {
    /// Build against Azure OpenAI; fails before any network call when settings are missing
    pub fn from_config(config: &HostedModelConfig) -> AppResult<Self> {
        let resolved = config.resolve()?;
        let adapter: Arc<dyn LLMAdapter> = Arc::new(AzureOpenAIAdapter::new(&resolved));
        Ok(Self::with_adapter(adapter, &resolved))
    }

    pub fn with_adapter(adapter: Arc<dyn LLMAdapter>, config: &ResolvedModelConfig) -> Self {
        Self {
            client: AgentClient::new(adapter, ModelSettings::from(config)),
        }
    }

    pub async fn test_hypothesis(&self, request: TestHypothesisRequest) -> AppResult<TestHypothesisResult> {
        self.test_hypothesis_with_progress(request, &CancellationToken::new(), |_| {})
            .await
    }

    /// Run all three stages, reporting every state transition to `on_stage`
    pub async fn test_hypothesis_with_progress<F>(
        &self,
        request: TestHypothesisRequest,
        cancel: &CancellationToken,
        on_stage: F,
    ) -> AppResult<TestHypothesisResult>
    where
        F: FnMut(PipelineStage) + Send,
    {
        request
            .hypothesis
            .validate()
            .map_err(|e| AppError::InvalidRequest(format!("hypothesis is not testable: {}", e)))?;

        info!(
            hypothesis_id = ?request.hypothesis.id,
            dataset_count = request.datasets.len(),
            "Starting hypothesis test"
        );

        let mut tracker = StageTracker::new(on_stage);
        let outcome = self.run_stages(&request, cancel, &mut tracker).await;

        match &outcome {
            Ok(result) => {
                tracker.advance(PipelineStage::Complete);
                info!(
                    confidence = result.confidence,
                    evidence_count = result.evidence.len(),
                    "Hypothesis test complete"
                );
            }
            Err(e) => {
                tracker.advance(PipelineStage::Failed);
                error!(error = %e, "Hypothesis test failed");
            }
        }

        outcome
    }

    async fn run_stages<F>(
        &self,
        request: &TestHypothesisRequest,
        cancel: &CancellationToken,
        tracker: &mut StageTracker<F>,
    ) -> AppResult<TestHypothesisResult>
    where
        F: FnMut(PipelineStage) + Send,
    {
        let hypothesis = &request.hypothesis;

        tracker.advance(PipelineStage::Retrieving);
        let dataset_context = build_context(&request.datasets);
        let relevant = extract_relevant(&request.datasets, &hypothesis.variable_names());
        let retrieval = RetrievalAgent::execute(
            &self.client,
            hypothesis,
            &dataset_context,
            &relevant,
            request.session_context.as_deref(),
            cancel,
        )
        .await?;

        tracker.advance(PipelineStage::Analyzing);
        let analysis = AnalysisAgent::execute(&self.client, hypothesis, retrieval, cancel).await?;

        tracker.advance(PipelineStage::Synthesizing);
        SynthesisAgent::execute(&self.client, hypothesis, analysis, cancel).await
    }
}

/// Build a pipeline from `config` and test one hypothesis
pub async fn test_hypothesis_with_ai(
    config: &HostedModelConfig,
    request: TestHypothesisRequest,
) -> AppResult<TestHypothesisResult> {
    let pipeline = HypothesisPipeline::from_config(config)?;
    pipeline.test_hypothesis(request).await
}
