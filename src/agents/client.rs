//! Shared model-call primitive for the pipeline agents
//!
//! Every stage sends one chat completion: a system message naming the agent,
//! the stage prompt as the user message, fixed temperature and token cap, and
//! a JSON-object response format. The reply is decoded into the stage's
//! response type and validated before any field is used.

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use validator::Validate;

use crate::config::ResolvedModelConfig;
use crate::llm::LLMAdapter;
use crate::models::AgentKind;
use crate::types::{AppError, AppResult, LLMMessage, LLMRequest};

#[derive(Debug, Clone)]
pub struct ModelSettings {
    pub deployment: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub stage_timeout: Duration,
}

impl From<&ResolvedModelConfig> for ModelSettings {
    fn from(config: &ResolvedModelConfig) -> Self {
        Self {
            deployment: config.deployment.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            stage_timeout: config.stage_timeout,
        }
    }
}

#[derive(Clone)]
pub struct AgentClient {
    adapter: Arc<dyn LLMAdapter>,
    settings: ModelSettings,
}

impl AgentClient {
    pub fn new(adapter: Arc<dyn LLMAdapter>, settings: ModelSettings) -> Self {
        Self { adapter, settings }
    }

    pub fn system_prompt(agent: AgentKind) -> String {
        format!(
            "You are the {} agent in a multi-agent scientific reasoning system. Always respond with valid JSON.",
            agent
        )
    }

    /// One bounded, cancellable completion; returns the raw message content
    pub async fn complete(
        &self,
        agent: AgentKind,
        prompt: &str,
        cancel: &CancellationToken,
    ) -> AppResult<String> {
        let request = LLMRequest {
            model: self.settings.deployment.clone(),
            messages: vec![LLMMessage::user(prompt)],
            max_tokens: Some(self.settings.max_tokens),
            temperature: Some(self.settings.temperature),
            system_instruction: Some(Self::system_prompt(agent)),
            json_response: true,
        };

        debug!(agent = %agent, prompt_len = prompt.len(), "Calling hosted model");

        let timeout = self.settings.stage_timeout;
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                warn!(agent = %agent, "Stage cancelled");
                return Err(AppError::Cancelled { stage: agent });
            }
            outcome = tokio::time::timeout(timeout, self.adapter.create_chat_completion(&request)) => {
                match outcome {
                    Ok(result) => result,
                    Err(_) => {
                        warn!(agent = %agent, timeout_secs = timeout.as_secs_f64(), "Stage timed out");
                        return Err(AppError::StageTimeout {
                            stage: agent,
                            seconds: timeout.as_secs(),
                        });
                    }
                }
            }
        };

        match result {
            Ok(response) => {
                debug!(
                    agent = %agent,
                    total_tokens = response.usage.total_tokens,
                    finish_reason = %response.finish_reason,
                    "Hosted model responded"
                );
                Ok(response.content)
            }
            // Transport-level problems belong to the stage; HTTP status errors keep their body
            Err(AppError::LLMApi(msg)) => Err(AppError::stage_failure(agent, msg)),
            Err(other) => Err(other),
        }
    }
}

/// Decode a stage reply into `T` and validate it
pub fn decode<T>(agent: AgentKind, raw: &str) -> AppResult<T>
where
    T: DeserializeOwned + Validate,
{
    let json = extract_json(raw);
    let parsed: T = serde_json::from_str(json)
        .map_err(|e| AppError::stage_failure(agent, format!("malformed response: {}", e)))?;
    parsed
        .validate()
        .map_err(|e| AppError::stage_failure(agent, format!("response failed validation: {}", e)))?;
    Ok(parsed)
}

/// Strip a markdown code fence if the model wrapped its JSON in one
fn extract_json(response: &str) -> &str {
    let trimmed = response.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}
