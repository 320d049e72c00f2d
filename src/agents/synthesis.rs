//! Synthesis Agent
//!
//! Integrates every evidence item and reasoning step into the final
//! conclusion. Its overall confidence replaces the per-stage confidences.

use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::info;
use validator::Validate;

use crate::agents::analysis::AnalysisResult;
use crate::agents::client::{decode, AgentClient};
use crate::models::{AgentKind, Citation, HypothesisModel, ReasoningStep, TestHypothesisResult};
use crate::types::AppResult;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct SynthesisResponse {
    conclusion: String,
    #[validate(range(min = 0.0, max = 1.0))]
    overall_confidence: f64,
    reasoning: String,
    #[serde(default)]
    key_findings: Vec<String>,
    #[serde(default)]
    citations: Vec<RawCitation>,
}

#[derive(Debug, Deserialize)]
struct RawCitation {
    title: String,
    #[serde(default)]
    authors: Vec<String>,
    year: i32,
    #[serde(default)]
    journal: Option<String>,
    #[serde(default)]
    doi: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

pub struct SynthesisAgent;

impl SynthesisAgent {
    pub async fn execute(
        client: &AgentClient,
        hypothesis: &HypothesisModel,
        analysis: AnalysisResult,
        cancel: &CancellationToken,
    ) -> AppResult<TestHypothesisResult> {
        info!(
            evidence_count = analysis.evidence.len(),
            step_count = analysis.reasoning.len(),
            "Synthesis agent integrating findings"
        );

        let prompt = Self::create_prompt(hypothesis, &analysis);
        let raw = client.complete(AgentKind::Synthesis, &prompt, cancel).await?;
        let response: SynthesisResponse = decode(AgentKind::Synthesis, &raw)?;

        let step = ReasoningStep {
            agent: AgentKind::Synthesis,
            action: "Evidence Integration".to_string(),
            input: format!(
                "{} evidence items + {} reasoning steps",
                analysis.evidence.len(),
                analysis.reasoning.len()
            ),
            output: response.conclusion.clone(),
            reasoning: response.reasoning,
            confidence: response.overall_confidence,
            timestamp: chrono::Utc::now(),
        };

        let citations: Vec<Citation> = response
            .citations
            .into_iter()
            .enumerate()
            .map(|(index, c)| Citation {
                id: format!("citation-{}", index),
                title: c.title,
                authors: c.authors,
                year: c.year,
                journal: non_empty(c.journal),
                doi: non_empty(c.doi),
                url: non_empty(c.url),
            })
            .collect();

        info!(
            confidence = response.overall_confidence,
            citation_count = citations.len(),
            "Synthesis complete"
        );

        let AnalysisResult { evidence, mut reasoning, .. } = analysis;
        reasoning.push(step);

        Ok(TestHypothesisResult {
            confidence: response.overall_confidence,
            conclusion: response.conclusion,
            key_findings: response.key_findings,
            evidence,
            reasoning,
            citations,
        })
    }

    fn create_prompt(hypothesis: &HypothesisModel, analysis: &AnalysisResult) -> String {
        let evidence = analysis
            .evidence
            .iter()
            .enumerate()
            .map(|(i, e)| format!("{}. [{}] {} (Relevance: {})", i + 1, e.kind, e.content, e.relevance))
            .collect::<Vec<_>>()
            .join("\n");

        let steps = analysis
            .reasoning
            .iter()
            .enumerate()
            .map(|(i, r)| format!("{}. {}: {} (Confidence: {})", i + 1, r.agent, r.reasoning, r.confidence))
            .collect::<Vec<_>>()
            .join("\n");

        format!(r#"You are a synthesis agent for scientific research. Your task is to integrate all findings and generate a comprehensive conclusion.

Hypothesis: {statement}

Expected Outcome: {expected}

Evidence Collected:
{evidence}

Reasoning Steps:
{steps}

Task: Synthesize all evidence and reasoning to:
1. Determine overall confidence in the hypothesis
2. Provide a clear conclusion
3. Suggest relevant citations (if applicable)
4. Explain the reasoning process

Return your synthesis in JSON format:
{{
  "conclusion": "Clear statement of whether hypothesis is supported",
  "overallConfidence": 0.89,
  "reasoning": "Explanation of how you reached this conclusion",
  "keyFindings": ["Finding 1", "Finding 2"],
  "citations": [
    {{
      "title": "Relevant paper title",
      "authors": ["Author 1", "Author 2"],
      "year": 2023,
      "journal": "Journal name",
      "doi": "10.xxxx/xxxxx"
    }}
  ]
}}"#,
            statement = hypothesis.statement,
            expected = hypothesis.expected_outcome,
            evidence = evidence,
            steps = steps,
        )
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
