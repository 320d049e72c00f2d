// Type definitions shared by the LLM layer and the agent pipeline

use crate::models::AgentKind;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct LLMRequest {
    pub model: String,
    pub messages: Vec<LLMMessage>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub system_instruction: Option<String>,
    /// Ask the provider to constrain output to a single JSON object
    #[serde(default)]
    pub json_response: bool,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct LLMMessage {
    pub role: String, // "user", "assistant", "system"
    pub content: String,
}

impl LLMMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", content)
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct LLMResponse {
    pub content: String,
    pub finish_reason: String,
    pub usage: TokenUsage,
}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Failed to retrieve relevant data: {0}")]
    RetrievalFailure(String),

    #[error("Failed to analyze data: {0}")]
    AnalysisFailure(String),

    #[error("Failed to synthesize results: {0}")]
    SynthesisFailure(String),

    #[error("Azure OpenAI API error ({status}): {body}")]
    Upstream { status: u16, body: String },

    #[error("{stage} agent did not respond within {seconds}s")]
    StageTimeout { stage: AgentKind, seconds: u64 },

    #[error("Hypothesis test cancelled during {stage} stage")]
    Cancelled { stage: AgentKind },

    #[error("LLM API error: {0}")]
    LLMApi(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// The stage-specific failure for an agent
    pub fn stage_failure(stage: AgentKind, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        match stage {
            AgentKind::Retrieval => AppError::RetrievalFailure(reason),
            AgentKind::Analysis => AppError::AnalysisFailure(reason),
            AgentKind::Synthesis => AppError::SynthesisFailure(reason),
        }
    }
}

pub type AppResult<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_failure_variant() {
        assert!(matches!(
            AppError::stage_failure(AgentKind::Retrieval, "bad json"),
            AppError::RetrievalFailure(_)
        ));
        assert!(matches!(
            AppError::stage_failure(AgentKind::Analysis, "bad json"),
            AppError::AnalysisFailure(_)
        ));
        assert!(matches!(
            AppError::stage_failure(AgentKind::Synthesis, "bad json"),
            AppError::SynthesisFailure(_)
        ));
    }

    #[test]
    fn test_upstream_message_contains_body() {
        let err = AppError::Upstream {
            status: 500,
            body: "deployment overloaded".to_string(),
        };
        assert!(err.to_string().contains("deployment overloaded"));
    }
}
