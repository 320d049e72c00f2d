//! Dataset Loader
//!
//! Parses uploaded files into [`Dataset`] values. CSV/TSV and JSON become
//! tabular records; FASTA becomes `header`/`sequence`/`length` records.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use csv::{ReaderBuilder, Trim};
use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::{info, warn};

use crate::models::{DataFormat, DataRecord, Dataset};

/// A problem that prevents the upload from becoming a dataset
#[derive(Debug, Clone, Serialize)]
pub struct ParseError {
    pub message: String,
}

impl ParseError {
    fn error(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ParsedData {
    pub format: DataFormat,
    pub records: Vec<DataRecord>,
    pub metadata: Map<String, Value>,
    pub errors: Vec<ParseError>,
    pub warnings: Vec<String>,
}

impl ParsedData {
    fn empty(format: DataFormat, error: ParseError) -> Self {
        Self {
            format,
            records: Vec::new(),
            metadata: Map::new(),
            errors: vec![error],
            warnings: Vec::new(),
        }
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn into_dataset(self, name: impl Into<String>) -> Dataset {
        Dataset {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            format: self.format,
            records: self.records,
            metadata: self.metadata,
        }
    }
}

/// Format implied by a file extension; unknown extensions are read as CSV
pub fn format_from_filename(filename: &str) -> DataFormat {
    let ext = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "json" => DataFormat::Json,
        "fasta" | "fa" | "fna" => DataFormat::Fasta,
        "gb" | "gbk" => DataFormat::Genbank,
        "xlsx" | "xls" => DataFormat::Excel,
        _ => DataFormat::Csv,
    }
}

/// Parse file content according to its extension
pub fn parse_content(filename: &str, content: &str) -> ParsedData {
    let format = format_from_filename(filename);
    let is_tsv = filename.to_lowercase().ends_with(".tsv");

    match format {
        DataFormat::Csv => parse_delimited(content, if is_tsv { b'\t' } else { b',' }),
        DataFormat::Json => parse_json(content),
        DataFormat::Fasta => parse_fasta(content),
        other => ParsedData::empty(other, ParseError::error(format!("Unsupported format: {}", other))),
    }
}

/// Read a dataset file from disk
pub fn load_dataset(path: &Path) -> Result<Dataset> {
    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .context("dataset path has no file name")?
        .to_string();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read dataset {}", path.display()))?;

    let parsed = parse_content(&filename, &content);
    for warning in &parsed.warnings {
        warn!(dataset = %filename, "{}", warning);
    }
    if parsed.has_errors() {
        let messages: Vec<&str> = parsed.errors.iter().map(|e| e.message.as_str()).collect();
        anyhow::bail!("Failed to parse {}: {}", filename, messages.join("; "));
    }

    info!(dataset = %filename, records = parsed.records.len(), format = %parsed.format, "Loaded dataset");
    Ok(parsed.into_dataset(filename))
}

pub fn parse_delimited(content: &str, delimiter: u8) -> ParsedData {
    if content.trim().is_empty() {
        return ParsedData::empty(DataFormat::Csv, ParseError::error("Empty file"));
    }

    let mut rdr = ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(content.as_bytes());

    let raw_headers: Vec<String> = match rdr.headers() {
        Ok(h) => h.iter().map(|s| s.to_string()).collect(),
        Err(e) => return ParsedData::empty(DataFormat::Csv, ParseError::error(e.to_string())),
    };

    let mut warnings = Vec::new();
    let headers = dedupe_headers(raw_headers, &mut warnings);
    let mut records = Vec::new();

    for (index, row) in rdr.records().enumerate() {
        let line = index + 2;
        let row = match row {
            Ok(r) => r,
            Err(e) => {
                warnings.push(format!("Line {} skipped: {}", line, e));
                continue;
            }
        };
        if row.iter().all(|v| v.is_empty()) {
            continue;
        }
        if row.len() != headers.len() {
            warnings.push(format!(
                "Line {} has {} fields, expected {}",
                line,
                row.len(),
                headers.len()
            ));
        }

        let data: Map<String, Value> = headers
            .iter()
            .enumerate()
            .map(|(i, header)| {
                let value = row.get(i).unwrap_or("");
                (header.clone(), Value::String(value.to_string()))
            })
            .collect();

        records.push(DataRecord {
            id: format!("record-{}", records.len()),
            data,
        });
    }

    let mut metadata = Map::new();
    metadata.insert("columns".to_string(), json!(headers));
    metadata.insert("rowCount".to_string(), json!(records.len()));

    ParsedData {
        format: DataFormat::Csv,
        records,
        metadata,
        errors: Vec::new(),
        warnings,
    }
}

/// Rename repeated header names to `name_2`, `name_3`, ... so no column is overwritten
fn dedupe_headers(headers: Vec<String>, warnings: &mut Vec<String>) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut unique = Vec::with_capacity(headers.len());

    for header in headers {
        let mut name = header.clone();
        let mut suffix = 2;
        while seen.contains(&name) {
            name = format!("{}_{}", header, suffix);
            suffix += 1;
        }
        if name != header {
            warnings.push(format!("Duplicate column \"{}\" renamed to \"{}\"", header, name));
        }
        seen.insert(name.clone());
        unique.push(name);
    }

    unique
}

pub fn parse_json(content: &str) -> ParsedData {
    let value: Value = match serde_json::from_str(content) {
        Ok(v) => v,
        Err(e) => return ParsedData::empty(DataFormat::Json, ParseError::error(e.to_string())),
    };

    let mut warnings = Vec::new();
    let items = match value {
        Value::Array(items) => items,
        other => vec![other],
    };

    let records: Vec<DataRecord> = items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            let data = match item {
                Value::Object(map) => map,
                scalar => {
                    warnings.push(format!("Item {} is not an object; stored under \"value\"", index));
                    let mut map = Map::new();
                    map.insert("value".to_string(), scalar);
                    map
                }
            };
            DataRecord {
                id: format!("record-{}", index),
                data,
            }
        })
        .collect();

    let mut metadata = Map::new();
    metadata.insert("recordCount".to_string(), json!(records.len()));

    ParsedData {
        format: DataFormat::Json,
        records,
        metadata,
        errors: Vec::new(),
        warnings,
    }
}

pub fn parse_fasta(content: &str) -> ParsedData {
    let mut records = Vec::new();
    let mut warnings = Vec::new();
    let mut current: Option<(String, String)> = None;

    for (index, line) in content.lines().enumerate() {
        if let Some(header) = line.strip_prefix('>') {
            push_sequence(&mut records, current.take());
            current = Some((header.trim().to_string(), String::new()));
        } else if let Some((_, sequence)) = current.as_mut() {
            sequence.push_str(line.trim());
        } else if !line.trim().is_empty() {
            warnings.push(format!("Line {} appears before any sequence header", index + 1));
        }
    }
    push_sequence(&mut records, current.take());

    let total_length: usize = records
        .iter()
        .filter_map(|r| r.data.get("length").and_then(Value::as_u64))
        .map(|l| l as usize)
        .sum();

    let mut metadata = Map::new();
    metadata.insert("sequenceCount".to_string(), json!(records.len()));
    metadata.insert("totalLength".to_string(), json!(total_length));

    ParsedData {
        format: DataFormat::Fasta,
        records,
        metadata,
        errors: Vec::new(),
        warnings,
    }
}

fn push_sequence(records: &mut Vec<DataRecord>, entry: Option<(String, String)>) {
    if let Some((header, sequence)) = entry {
        let length = sequence.chars().count();
        let mut data = Map::new();
        data.insert("header".to_string(), json!(header));
        data.insert("sequence".to_string(), json!(sequence));
        data.insert("length".to_string(), json!(length));
        records.push(DataRecord { id: header, data });
    }
}
