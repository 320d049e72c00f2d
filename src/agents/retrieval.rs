//! Retrieval Agent
//!
//! Mines the summarized datasets for data points relevant to the hypothesis
//! variables. First stage of the pipeline.

use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::info;
use validator::Validate;

use crate::agents::client::{decode, AgentClient};
use crate::context::RelevantData;
use crate::models::{AgentKind, Evidence, EvidenceKind, HypothesisModel, ReasoningStep};
use crate::types::AppResult;

/// Evidence gathered from the datasets plus the audit step for this stage
#[derive(Debug, Clone)]
pub struct RetrievalResult {
    pub evidence: Vec<Evidence>,
    pub reasoning: ReasoningStep,
}

#[derive(Debug, Deserialize, Validate)]
struct RetrievalResponse {
    #[validate(nested)]
    evidence: Vec<RawEvidence>,
    reasoning: String,
    #[validate(range(min = 0.0, max = 1.0))]
    confidence: f64,
}

/// Evidence item as returned by the model; `dataPoints` is not kept
#[derive(Debug, Deserialize, Validate)]
struct RawEvidence {
    content: String,
    source: String,
    #[validate(range(min = 0.0, max = 1.0))]
    relevance: f64,
}

pub struct RetrievalAgent;

impl RetrievalAgent {
    pub async fn execute(
        client: &AgentClient,
        hypothesis: &HypothesisModel,
        dataset_context: &str,
        relevant_data: &[RelevantData],
        session_context: Option<&str>,
        cancel: &CancellationToken,
    ) -> AppResult<RetrievalResult> {
        info!(
            variables = hypothesis.variables.len(),
            relevant_datasets = relevant_data.len(),
            "Retrieval agent searching datasets"
        );

        let prompt = Self::create_prompt(hypothesis, dataset_context, relevant_data, session_context);
        let raw = client.complete(AgentKind::Retrieval, &prompt, cancel).await?;
        let response: RetrievalResponse = decode(AgentKind::Retrieval, &raw)?;

        let evidence: Vec<Evidence> = response
            .evidence
            .into_iter()
            .enumerate()
            .map(|(index, e)| Evidence {
                id: format!("evidence-{}", index),
                kind: EvidenceKind::Data,
                content: e.content,
                source: e.source,
                relevance: e.relevance,
            })
            .collect();

        let reasoning = ReasoningStep {
            agent: AgentKind::Retrieval,
            action: "Data Collection".to_string(),
            input: format!("Query: {}", hypothesis.statement),
            output: format!("Retrieved {} relevant data points", evidence.len()),
            reasoning: response.reasoning,
            confidence: response.confidence,
            timestamp: chrono::Utc::now(),
        };

        info!(
            evidence_count = evidence.len(),
            confidence = reasoning.confidence,
            "Retrieval complete"
        );

        Ok(RetrievalResult { evidence, reasoning })
    }

    fn create_prompt(
        hypothesis: &HypothesisModel,
        dataset_context: &str,
        relevant_data: &[RelevantData],
        session_context: Option<&str>,
    ) -> String {
        let variables = if hypothesis.variables.is_empty() {
            "None specified".to_string()
        } else {
            hypothesis
                .variables
                .iter()
                .map(|v| format!("{} ({}): {}", v.name, v.var_type, v.description))
                .collect::<Vec<_>>()
                .join(", ")
        };

        let relevant = serde_json::to_string_pretty(relevant_data).unwrap_or_else(|_| "[]".to_string());

        let session = match session_context.map(str::trim) {
            Some(ctx) if !ctx.is_empty() => format!("\nSession Context:\n{}\n", ctx),
            _ => String::new(),
        };

        format!(r#"You are a data retrieval agent for scientific research. Your task is to search through datasets and find relevant information for hypothesis testing.

Hypothesis: {statement}

Expected Outcome: {expected}

Variables: {variables}
{session}
Available Datasets:
{dataset_context}

Relevant Data Found:
{relevant}

Task: Analyze the datasets and identify relevant data points that could support or refute this hypothesis. For each piece of evidence:
1. Extract the relevant data
2. Explain why it's relevant
3. Assign a relevance score (0-1)

If no relevant data is available, return an empty evidence list and explain why in your reasoning.

Return your findings in JSON format:
{{
  "evidence": [
    {{
      "content": "Description of the finding with specific data points",
      "source": "Dataset name or identifier",
      "relevance": 0.95,
      "dataPoints": "Specific data points found"
    }}
  ],
  "reasoning": "Your reasoning process for finding this evidence",
  "confidence": 0.9
}}"#,
            statement = hypothesis.statement,
            expected = hypothesis.expected_outcome,
            variables = variables,
            session = session,
            dataset_context = dataset_context,
            relevant = relevant,
        )
    }
}
