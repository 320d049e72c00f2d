use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use std::sync::Arc;

use crate::agents::HypothesisPipeline;
use crate::config::Config;
use crate::context::stats::ColumnStatistics;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// Built once at startup; `Err` carries the configuration problem reported as 503
    pub pipeline: Result<Arc<HypothesisPipeline>, String>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let pipeline = HypothesisPipeline::from_config(&config.llm)
            .map(Arc::new)
            .map_err(|e| e.to_string());
        Self { config, pipeline }
    }

    pub fn with_pipeline(config: Config, pipeline: HypothesisPipeline) -> Self {
        Self {
            config,
            pipeline: Ok(Arc::new(pipeline)),
        }
    }
}

// Core models mirroring the workbench front-end JSON (camelCase on the wire)

/// Record layout of an uploaded dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataFormat {
    Csv,
    Json,
    Excel,
    Fasta,
    Genbank,
}

impl DataFormat {
    /// Sequence formats store `header`/`sequence`/`length` fields per record
    pub fn is_sequence(self) -> bool {
        matches!(self, DataFormat::Fasta | DataFormat::Genbank)
    }
}

impl std::fmt::Display for DataFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataFormat::Csv => write!(f, "csv"),
            DataFormat::Json => write!(f, "json"),
            DataFormat::Excel => write!(f, "excel"),
            DataFormat::Fasta => write!(f, "fasta"),
            DataFormat::Genbank => write!(f, "genbank"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
    pub id: String,
    pub name: String,
    pub format: DataFormat,
    #[serde(default)]
    pub records: Vec<DataRecord>,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataRecord {
    pub id: String,
    pub data: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableType {
    Numeric,
    Categorical,
    Boolean,
}

impl std::fmt::Display for VariableType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VariableType::Numeric => write!(f, "numeric"),
            VariableType::Categorical => write!(f, "categorical"),
            VariableType::Boolean => write!(f, "boolean"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    #[serde(rename = "type", default = "default_variable_type")]
    pub var_type: VariableType,
    #[serde(default)]
    pub description: String,
}

fn default_variable_type() -> VariableType {
    VariableType::Numeric
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConditionOperator {
    Equals,
    Greater,
    Less,
    Contains,
    Matches,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Condition {
    pub variable: String,
    pub operator: ConditionOperator,
    pub value: serde_json::Value,
}

/// A hypothesis submitted for testing. Never mutated by the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct HypothesisModel {
    #[serde(default)]
    pub id: Option<String>,
    #[validate(custom(function = "non_blank"))]
    pub statement: String,
    #[validate(custom(function = "non_blank"))]
    pub expected_outcome: String,
    #[serde(default)]
    pub variables: Vec<Variable>,
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

fn non_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }
    Ok(())
}

impl HypothesisModel {
    pub fn variable_names(&self) -> Vec<String> {
        self.variables.iter().map(|v| v.name.clone()).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvidenceKind {
    Data,
    Literature,
    Analysis,
}

impl std::fmt::Display for EvidenceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EvidenceKind::Data => write!(f, "data"),
            EvidenceKind::Literature => write!(f, "literature"),
            EvidenceKind::Analysis => write!(f, "analysis"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: EvidenceKind,
    pub content: String,
    pub source: String,
    pub relevance: f64,
}

/// The three pipeline agents, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentKind {
    Retrieval,
    Analysis,
    Synthesis,
}

impl AgentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AgentKind::Retrieval => "retrieval",
            AgentKind::Analysis => "analysis",
            AgentKind::Synthesis => "synthesis",
        }
    }
}

impl std::fmt::Display for AgentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasoningStep {
    pub agent: AgentKind,
    pub action: String,
    pub input: String,
    pub output: String,
    pub reasoning: String,
    pub confidence: f64,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub id: String,
    pub title: String,
    pub authors: Vec<String>,
    pub year: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub journal: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doi: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestHypothesisResult {
    pub confidence: f64,
    pub conclusion: String,
    pub key_findings: Vec<String>,
    pub evidence: Vec<Evidence>,
    pub reasoning: Vec<ReasoningStep>,
    pub citations: Vec<Citation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestHypothesisRequest {
    pub hypothesis: HypothesisModel,
    #[serde(default)]
    pub datasets: Vec<Dataset>,
    #[serde(default)]
    pub session_context: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub model_configured: bool,
}

// Dataset endpoints

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ParseDatasetRequest {
    #[validate(custom(function = "non_blank"))]
    pub filename: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ParseDatasetResponse {
    pub dataset: Dataset,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct DatasetStatsRequest {
    pub dataset: Dataset,
    #[validate(length(min = 1))]
    pub columns: Vec<String>,
    /// Pair of columns to correlate
    #[serde(default)]
    pub correlate: Option<(String, String)>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ColumnReport {
    pub column: String,
    /// `None` when the column has no numeric values
    pub statistics: Option<ColumnStatistics>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DatasetStatsResponse {
    pub dataset: String,
    pub columns: Vec<ColumnReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hypothesis_deserializes_from_workbench_json() {
        let json = serde_json::json!({
            "id": "hyp-1",
            "statement": "Higher moisture increases contamination",
            "expectedOutcome": "positive correlation >65% moisture",
            "variables": [
                {"name": "moisture", "type": "numeric", "description": "substrate moisture %"},
                {"name": "contamination_rate"}
            ],
            "conditions": [
                {"variable": "moisture", "operator": "greater", "value": 65}
            ]
        });
        let hypothesis: HypothesisModel = serde_json::from_value(json).unwrap();
        assert_eq!(hypothesis.expected_outcome, "positive correlation >65% moisture");
        assert_eq!(hypothesis.variables[1].var_type, VariableType::Numeric);
        assert_eq!(hypothesis.conditions[0].operator, ConditionOperator::Greater);
        assert!(hypothesis.validate().is_ok());
    }

    #[test]
    fn test_blank_statement_fails_validation() {
        let hypothesis = HypothesisModel {
            id: None,
            statement: "   ".to_string(),
            expected_outcome: "something".to_string(),
            variables: vec![],
            conditions: vec![],
        };
        assert!(hypothesis.validate().is_err());
    }

    #[test]
    fn test_evidence_kind_serializes_as_type() {
        let evidence = Evidence {
            id: "evidence-0".to_string(),
            kind: EvidenceKind::Data,
            content: "c".to_string(),
            source: "s".to_string(),
            relevance: 0.5,
        };
        let value = serde_json::to_value(&evidence).unwrap();
        assert_eq!(value["type"], "data");
    }

    #[test]
    fn test_sequence_formats() {
        assert!(DataFormat::Fasta.is_sequence());
        assert!(DataFormat::Genbank.is_sequence());
        assert!(!DataFormat::Csv.is_sequence());
        assert!(!DataFormat::Excel.is_sequence());
    }
}
