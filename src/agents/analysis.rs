//! Analysis Agent
//!
//! Statistically interprets the retrieval evidence and judges whether it
//! supports the hypothesis. The verdict is recorded but never gates the
//! pipeline; synthesis always runs.

use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use validator::Validate;

use crate::agents::client::{decode, AgentClient};
use crate::agents::retrieval::RetrievalResult;
use crate::models::{AgentKind, Evidence, EvidenceKind, HypothesisModel, ReasoningStep};
use crate::types::AppResult;

pub const ANALYSIS_EVIDENCE_ID: &str = "analysis-evidence";
pub const ANALYSIS_SOURCE: &str = "DeepParallel Statistical Analysis Agent";

#[derive(Debug, Clone)]
pub struct AnalysisResult {
    /// Retrieval evidence followed by exactly one analysis item
    pub evidence: Vec<Evidence>,
    /// Retrieval step followed by the analysis step
    pub reasoning: Vec<ReasoningStep>,
    pub supports_hypothesis: bool,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct AnalysisResponse {
    analysis: String,
    #[serde(default)]
    patterns: Vec<String>,
    statistical_significance: String,
    supports_hypothesis: bool,
    #[validate(range(min = 0.0, max = 1.0))]
    confidence: f64,
    /// Proposed extra findings; logged only, so left unvalidated
    #[serde(default)]
    additional_evidence: Vec<serde_json::Value>,
}

pub struct AnalysisAgent;

impl AnalysisAgent {
    pub async fn execute(
        client: &AgentClient,
        hypothesis: &HypothesisModel,
        retrieval: RetrievalResult,
        cancel: &CancellationToken,
    ) -> AppResult<AnalysisResult> {
        info!(evidence_count = retrieval.evidence.len(), "Analysis agent interpreting evidence");

        let prompt = Self::create_prompt(hypothesis, &retrieval.evidence);
        let raw = client.complete(AgentKind::Analysis, &prompt, cancel).await?;
        let response: AnalysisResponse = decode(AgentKind::Analysis, &raw)?;

        if !response.additional_evidence.is_empty() {
            debug!(
                count = response.additional_evidence.len(),
                "Analysis agent proposed additional evidence; not added to the evidence list"
            );
        }

        let analysis_evidence = Evidence {
            id: ANALYSIS_EVIDENCE_ID.to_string(),
            kind: EvidenceKind::Analysis,
            content: response.analysis.clone(),
            source: ANALYSIS_SOURCE.to_string(),
            relevance: response.confidence,
        };

        let step = ReasoningStep {
            agent: AgentKind::Analysis,
            action: "Statistical Analysis".to_string(),
            input: format!("{} evidence items", retrieval.evidence.len()),
            output: response.statistical_significance.clone(),
            reasoning: Self::step_reasoning(&response),
            confidence: response.confidence,
            timestamp: chrono::Utc::now(),
        };

        info!(
            supports_hypothesis = response.supports_hypothesis,
            confidence = response.confidence,
            "Analysis complete"
        );

        let RetrievalResult { mut evidence, reasoning } = retrieval;
        evidence.push(analysis_evidence);

        Ok(AnalysisResult {
            evidence,
            reasoning: vec![reasoning, step],
            supports_hypothesis: response.supports_hypothesis,
        })
    }

    fn step_reasoning(response: &AnalysisResponse) -> String {
        let verdict = if response.supports_hypothesis {
            "Verdict: evidence supports the hypothesis"
        } else {
            "Verdict: evidence does not support the hypothesis"
        };

        let mut text = format!("{}\n\n{}", response.analysis, verdict);
        if !response.patterns.is_empty() {
            text.push_str("\nPatterns: ");
            text.push_str(&response.patterns.join("; "));
        }
        text
    }

    fn create_prompt(hypothesis: &HypothesisModel, evidence: &[Evidence]) -> String {
        let evidence_list = if evidence.is_empty() {
            "No evidence was retrieved.".to_string()
        } else {
            evidence
                .iter()
                .enumerate()
                .map(|(i, e)| format!("{}. {} (Relevance: {})", i + 1, e.content, e.relevance))
                .collect::<Vec<_>>()
                .join("\n")
        };

        format!(r#"You are a statistical analysis agent for scientific research. Your task is to analyze data and determine if it supports or refutes a hypothesis.

Hypothesis: {statement}

Expected Outcome: {expected}

Evidence Found:
{evidence_list}

Task: Perform statistical analysis on this evidence:
1. Identify patterns and correlations
2. Calculate statistical significance
3. Determine if the evidence supports the hypothesis
4. Provide confidence score

Return your analysis in JSON format:
{{
  "analysis": "Your detailed statistical analysis",
  "patterns": ["Pattern 1", "Pattern 2"],
  "statisticalSignificance": "p-value and interpretation",
  "supportsHypothesis": true,
  "confidence": 0.85,
  "additionalEvidence": [
    {{
      "content": "Analysis finding",
      "source": "Statistical Analysis",
      "relevance": 0.9
    }}
  ]
}}"#,
            statement = hypothesis.statement,
            expected = hypothesis.expected_outcome,
            evidence_list = evidence_list,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(supports: bool, patterns: Vec<&str>) -> AnalysisResponse {
        AnalysisResponse {
            analysis: "Contamination rises with moisture".to_string(),
            patterns: patterns.into_iter().map(String::from).collect(),
            statistical_significance: "p < 0.01".to_string(),
            supports_hypothesis: supports,
            confidence: 0.8,
            additional_evidence: vec![],
        }
    }

    #[test]
    fn test_step_reasoning_records_verdict() {
        let text = AnalysisAgent::step_reasoning(&response(true, vec!["linear trend", "threshold at 65%"]));
        assert!(text.contains("supports the hypothesis"));
        assert!(text.contains("Patterns: linear trend; threshold at 65%"));

        let refuted = AnalysisAgent::step_reasoning(&response(false, vec![]));
        assert!(refuted.contains("does not support"));
        assert!(!refuted.contains("Patterns"));
    }

    #[test]
    fn test_prompt_lists_evidence_with_relevance() {
        let hypothesis = HypothesisModel {
            id: None,
            statement: "s".to_string(),
            expected_outcome: "e".to_string(),
            variables: vec![],
            conditions: vec![],
        };
        let evidence = vec![Evidence {
            id: "evidence-0".to_string(),
            kind: EvidenceKind::Data,
            content: "Batch B7 at 72% moisture had 40% contamination".to_string(),
            source: "grow-trial".to_string(),
            relevance: 0.9,
        }];
        let prompt = AnalysisAgent::create_prompt(&hypothesis, &evidence);
        assert!(prompt.contains("1. Batch B7 at 72% moisture had 40% contamination (Relevance: 0.9)"));
    }
}
