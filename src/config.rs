use anyhow::Result;
use serde::Deserialize;
use std::env;
use std::time::Duration;

use crate::types::{AppError, AppResult};

pub const DEFAULT_API_VERSION: &str = "2024-02-15-preview";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub llm: HostedModelConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub cors_allowed_origins: Vec<String>,
}

/// Settings for the hosted chat-completion deployment used by every agent
#[derive(Debug, Clone, Deserialize)]
pub struct HostedModelConfig {
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub deployment: Option<String>,
    pub api_version: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub stage_timeout_secs: u64,
}

impl Default for HostedModelConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            deployment: None,
            api_version: DEFAULT_API_VERSION.to_string(),
            temperature: 0.7,
            max_tokens: 2000,
            stage_timeout_secs: 60,
        }
    }
}

/// A hosted model config whose required settings are known to be present
#[derive(Debug, Clone)]
pub struct ResolvedModelConfig {
    pub endpoint: String,
    pub api_key: String,
    pub deployment: String,
    pub api_version: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub stage_timeout: Duration,
}

impl HostedModelConfig {
    /// Check the required settings without touching the network
    pub fn resolve(&self) -> AppResult<ResolvedModelConfig> {
        let endpoint = required(&self.endpoint, "AZURE_OPENAI_ENDPOINT")?;
        let api_key = required(&self.api_key, "AZURE_OPENAI_API_KEY")?;
        let deployment = required(&self.deployment, "AZURE_OPENAI_DEPLOYMENT_NAME")?;

        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(AppError::Configuration(format!(
                "temperature must be within [0, 2], got {}",
                self.temperature
            )));
        }
        if self.stage_timeout_secs == 0 {
            return Err(AppError::Configuration(
                "stage timeout must be at least one second".to_string(),
            ));
        }

        Ok(ResolvedModelConfig {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key,
            deployment,
            api_version: self.api_version.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            stage_timeout: Duration::from_secs(self.stage_timeout_secs),
        })
    }
}

fn required(value: &Option<String>, name: &str) -> AppResult<String> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(AppError::Configuration(format!(
            "Azure OpenAI is not configured: {} is missing",
            name
        ))),
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            server: ServerConfig {
                port: env::var("PORT")
                    .unwrap_or_else(|_| "3000".to_string())
                    .parse()?,
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                cors_allowed_origins: env::var("ALLOWED_ORIGINS")
                    .unwrap_or_else(|_| "http://localhost:3000".to_string())
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .collect(),
            },
            llm: HostedModelConfig {
                endpoint: env::var("AZURE_OPENAI_ENDPOINT").ok(),
                api_key: env::var("AZURE_OPENAI_API_KEY").ok(),
                deployment: env::var("AZURE_OPENAI_DEPLOYMENT_NAME").ok(),
                api_version: env::var("AZURE_OPENAI_API_VERSION")
                    .unwrap_or_else(|_| DEFAULT_API_VERSION.to_string()),
                temperature: env::var("AGENT_TEMPERATURE")
                    .unwrap_or_else(|_| "0.7".to_string())
                    .parse()?,
                max_tokens: env::var("AGENT_MAX_TOKENS")
                    .unwrap_or_else(|_| "2000".to_string())
                    .parse()?,
                stage_timeout_secs: env::var("AGENT_STAGE_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "60".to_string())
                    .parse()?,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configured() -> HostedModelConfig {
        HostedModelConfig {
            endpoint: Some("https://crowe.openai.azure.com/".to_string()),
            api_key: Some("secret".to_string()),
            deployment: Some("gpt-4o".to_string()),
            ..HostedModelConfig::default()
        }
    }

    #[test]
    fn test_resolve_trims_endpoint() {
        let resolved = tokio_test::assert_ok!(configured().resolve());
        assert_eq!(resolved.endpoint, "https://crowe.openai.azure.com");
        assert_eq!(resolved.api_version, DEFAULT_API_VERSION);
        assert_eq!(resolved.stage_timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_missing_endpoint_is_configuration_error() {
        let config = HostedModelConfig {
            endpoint: None,
            ..configured()
        };
        match config.resolve() {
            Err(AppError::Configuration(msg)) => assert!(msg.contains("AZURE_OPENAI_ENDPOINT")),
            other => panic!("expected configuration error, got {:?}", other),
        }
    }

    #[test]
    fn test_blank_api_key_is_configuration_error() {
        let config = HostedModelConfig {
            api_key: Some("  ".to_string()),
            ..configured()
        };
        assert!(matches!(config.resolve(), Err(AppError::Configuration(_))));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let config = HostedModelConfig {
            stage_timeout_secs: 0,
            ..configured()
        };
        let err = tokio_test::assert_err!(config.resolve());
        assert!(matches!(err, AppError::Configuration(_)));
    }

    #[test]
    fn test_temperature_out_of_range_rejected() {
        let config = HostedModelConfig {
            temperature: 2.5,
            ..configured()
        };
        tokio_test::assert_err!(config.resolve());
    }
}
