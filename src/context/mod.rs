//! Dataset Context Builder
//!
//! Turns uploaded datasets into bounded text that can be embedded in an agent
//! prompt: a statistical summary plus a short sample per dataset. Nothing here
//! performs I/O or fails; degenerate input produces explicit "no data" text.

pub mod stats;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::models::{DataRecord, Dataset};
use stats::{calculate_statistics, numeric_value};

pub const NO_DATASETS_SENTINEL: &str = "No datasets available for analysis.";
pub const DEFAULT_SAMPLE_RECORDS: usize = 5;
/// Longest tabular cell rendered before truncation
pub const TABULAR_VALUE_LIMIT: usize = 30;
/// Longest sequence preview or header rendered before truncation
pub const SEQUENCE_PREVIEW_LIMIT: usize = 60;
pub const MAX_RELEVANT_RECORDS: usize = 100;

const ELLIPSIS: &str = "...";

/// Records of one dataset whose fields mention a hypothesis variable
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelevantData {
    pub dataset: String,
    pub records: Vec<Map<String, Value>>,
}

/// Per-dataset summary and sample blocks, or the sentinel for no datasets
pub fn build_context(datasets: &[Dataset]) -> String {
    if datasets.is_empty() {
        return NO_DATASETS_SENTINEL.to_string();
    }

    datasets
        .iter()
        .enumerate()
        .map(|(index, dataset)| {
            format!(
                "\nDataset {}: {}\nFormat: {}\nRecords: {}\n{}\n\nSample Data:\n{}\n",
                index + 1,
                truncate(&dataset.name, SEQUENCE_PREVIEW_LIMIT),
                dataset.format,
                dataset.records.len(),
                summarize(dataset),
                sample(dataset, DEFAULT_SAMPLE_RECORDS),
            )
        })
        .collect::<Vec<_>>()
        .join("\n---\n")
}

/// Statistical summary of a dataset
pub fn summarize(dataset: &Dataset) -> String {
    if dataset.records.is_empty() {
        return "No records".to_string();
    }

    if dataset.format.is_sequence() {
        summarize_sequences(&dataset.records)
    } else {
        summarize_table(&dataset.records)
    }
}

fn summarize_sequences(records: &[DataRecord]) -> String {
    let lengths: Vec<usize> = records.iter().map(sequence_length).collect();
    let total: usize = lengths.iter().sum();
    let average = (total as f64 / lengths.len() as f64).round() as usize;
    let min = lengths.iter().copied().min().unwrap_or(0);
    let max = lengths.iter().copied().max().unwrap_or(0);

    format!(
        "Sequence Statistics:\n- Total sequences: {}\n- Average length: {} bp\n- Length range: {} - {} bp",
        records.len(),
        average,
        min,
        max
    )
}

fn summarize_table(records: &[DataRecord]) -> String {
    let columns = column_names(records);

    let stats: Vec<String> = columns
        .iter()
        .filter(|col| is_numeric_column(records, col))
        .filter_map(|col| {
            calculate_statistics(records, col).map(|s| {
                format!("  {}: avg={:.2}, min={}, max={}", truncate(col, TABULAR_VALUE_LIMIT), s.mean, s.min, s.max)
            })
        })
        .collect();

    let stats_text = if stats.is_empty() {
        "  No numeric columns".to_string()
    } else {
        stats.join("\n")
    };

    let column_list = columns
        .iter()
        .map(|c| truncate(c, TABULAR_VALUE_LIMIT))
        .collect::<Vec<_>>()
        .join(", ");

    format!("Columns: {}\nNumeric Statistics:\n{}", column_list, stats_text)
}

/// Up to `max_records` records rendered as a table or sequence preview
pub fn sample(dataset: &Dataset, max_records: usize) -> String {
    let records: Vec<&DataRecord> = dataset.records.iter().take(max_records).collect();
    if records.is_empty() {
        return "No data available".to_string();
    }

    if dataset.format.is_sequence() {
        records
            .iter()
            .enumerate()
            .map(|(index, record)| {
                let header = match record.data.get("header") {
                    Some(Value::String(h)) if !h.is_empty() => h.as_str(),
                    _ => "Sequence",
                };
                let sequence = record
                    .data
                    .get("sequence")
                    .and_then(Value::as_str)
                    .unwrap_or("");
                format!(
                    "{}. {} ({} bp)\n   {}",
                    index + 1,
                    truncate(header, SEQUENCE_PREVIEW_LIMIT),
                    sequence_length(record),
                    truncate(sequence, SEQUENCE_PREVIEW_LIMIT)
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    } else {
        let columns: Vec<&String> = records[0].data.keys().collect();
        let header = columns
            .iter()
            .map(|c| truncate(c, TABULAR_VALUE_LIMIT))
            .collect::<Vec<_>>()
            .join("\t");
        let rows: Vec<String> = records
            .iter()
            .map(|record| {
                columns
                    .iter()
                    .map(|col| render_cell(record.data.get(col.as_str())))
                    .collect::<Vec<_>>()
                    .join("\t")
            })
            .collect();

        format!("{}\n{}", header, rows.join("\n"))
    }
}

/// Records whose field names contain any variable name, case-insensitively
pub fn extract_relevant(datasets: &[Dataset], variable_names: &[String]) -> Vec<RelevantData> {
    let needles: Vec<String> = variable_names
        .iter()
        .map(|n| n.trim().to_lowercase())
        .filter(|n| !n.is_empty())
        .collect();
    if needles.is_empty() {
        return Vec::new();
    }

    datasets
        .iter()
        .filter_map(|dataset| {
            let records: Vec<Map<String, Value>> = dataset
                .records
                .iter()
                .filter(|record| {
                    record.data.keys().any(|key| {
                        let key = key.to_lowercase();
                        needles.iter().any(|needle| key.contains(needle.as_str()))
                    })
                })
                .take(MAX_RELEVANT_RECORDS)
                .map(|record| record.data.clone())
                .collect();

            if records.is_empty() {
                None
            } else {
                Some(RelevantData {
                    dataset: dataset.name.clone(),
                    records,
                })
            }
        })
        .collect()
}

/// Cut `value` to `limit` characters, marking the cut with an ellipsis
pub fn truncate(value: &str, limit: usize) -> String {
    if value.chars().count() > limit {
        let mut cut: String = value.chars().take(limit).collect();
        cut.push_str(ELLIPSIS);
        cut
    } else {
        value.to_string()
    }
}

fn render_cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => "-".to_string(),
        Some(Value::String(s)) => truncate(s, TABULAR_VALUE_LIMIT),
        Some(other) => truncate(&other.to_string(), TABULAR_VALUE_LIMIT),
    }
}

/// Column names in first-record order
fn column_names(records: &[DataRecord]) -> Vec<String> {
    match records.first() {
        Some(first) => first.data.keys().cloned().collect(),
        None => Vec::new(),
    }
}

/// A column is numeric when it has values and every present value parses
fn is_numeric_column(records: &[DataRecord], column: &str) -> bool {
    let mut seen = false;
    for value in records.iter().filter_map(|r| r.data.get(column)) {
        match value {
            Value::Null => continue,
            Value::String(s) if s.trim().is_empty() => continue,
            other => {
                if numeric_value(other).is_none() {
                    return false;
                }
                seen = true;
            }
        }
    }
    seen
}

fn sequence_length(record: &DataRecord) -> usize {
    match record.data.get("length").and_then(numeric_value) {
        Some(len) if len >= 0.0 => len as usize,
        _ => record
            .data
            .get("sequence")
            .and_then(Value::as_str)
            .map(|s| s.chars().count())
            .unwrap_or(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DataFormat;
    use serde_json::json;

    fn dataset(name: &str, format: DataFormat, rows: Vec<Value>) -> Dataset {
        Dataset {
            id: format!("{}-id", name),
            name: name.to_string(),
            format,
            records: rows
                .into_iter()
                .enumerate()
                .map(|(i, row)| DataRecord {
                    id: format!("record-{}", i),
                    data: row.as_object().cloned().unwrap_or_default(),
                })
                .collect(),
            metadata: Map::new(),
        }
    }

    fn grow_trial() -> Dataset {
        let rows = (0..20)
            .map(|i| {
                json!({
                    "batch": format!("B{}", i),
                    "moisture": 55 + i,
                    "contamination_rate": format!("{:.2}", 0.05 * i as f64),
                })
            })
            .collect();
        dataset("grow-trial", DataFormat::Csv, rows)
    }

    #[test]
    fn test_build_context_empty_is_sentinel() {
        assert_eq!(build_context(&[]), NO_DATASETS_SENTINEL);
    }

    #[test]
    fn test_build_context_joins_datasets() {
        let context = build_context(&[grow_trial(), grow_trial()]);
        assert!(context.contains("Dataset 1: grow-trial"));
        assert!(context.contains("Dataset 2: grow-trial"));
        assert!(context.contains("\n---\n"));
        assert!(context.contains("Records: 20"));
    }

    #[test]
    fn test_tabular_summary_numeric_columns_only() {
        let summary = summarize(&grow_trial());
        assert!(summary.starts_with("Columns: batch, moisture, contamination_rate"));
        assert!(summary.contains("  moisture: avg=64.50, min=55, max=74"));
        assert!(summary.contains("  contamination_rate: avg="));
        assert!(summary.contains("min=0, max=0.95"));
        assert!(!summary.contains("batch: avg"));
    }

    #[test]
    fn test_mixed_column_is_not_numeric() {
        let data = dataset(
            "mixed",
            DataFormat::Csv,
            vec![json!({"ph": 6.5}), json!({"ph": "acidic"}), json!({"ph": null})],
        );
        assert!(summarize(&data).contains("No numeric columns"));
    }

    #[test]
    fn test_missing_values_excluded_from_aggregation() {
        let data = dataset(
            "gaps",
            DataFormat::Csv,
            vec![json!({"temp": 20}), json!({"temp": ""}), json!({"temp": null}), json!({"temp": 24})],
        );
        assert!(summarize(&data).contains("temp: avg=22.00, min=20, max=24"));
    }

    #[test]
    fn test_empty_dataset_reports_no_data() {
        let empty = dataset("empty", DataFormat::Fasta, vec![]);
        assert_eq!(summarize(&empty), "No records");
        assert_eq!(sample(&empty, 5), "No data available");
    }

    #[test]
    fn test_sequence_summary() {
        let data = dataset(
            "its",
            DataFormat::Fasta,
            vec![
                json!({"header": "seq1", "sequence": "ACGT", "length": 4}),
                json!({"header": "seq2", "sequence": "ACGTACG"}),
            ],
        );
        let summary = summarize(&data);
        assert!(summary.contains("Total sequences: 2"));
        assert!(summary.contains("Average length: 6 bp"));
        assert!(summary.contains("Length range: 4 - 7 bp"));
    }

    #[test]
    fn test_sample_truncates_long_tabular_value() {
        let long = "x".repeat(500);
        let data = dataset("notes", DataFormat::Json, vec![json!({"note": long})]);
        let rendered = sample(&data, 5);
        let cell = rendered.lines().nth(1).unwrap();
        assert_eq!(cell.chars().count(), TABULAR_VALUE_LIMIT + 3);
        assert!(cell.ends_with("..."));
        assert!(cell.chars().count() <= 63);
    }

    #[test]
    fn test_sample_truncates_long_sequence() {
        let data = dataset(
            "genome",
            DataFormat::Genbank,
            vec![json!({"header": "contig", "sequence": "A".repeat(500), "length": 500})],
        );
        let rendered = sample(&data, 5);
        assert!(rendered.starts_with("1. contig (500 bp)"));
        let preview = rendered.lines().nth(1).unwrap().trim();
        assert_eq!(preview.chars().count(), SEQUENCE_PREVIEW_LIMIT + 3);
    }

    #[test]
    fn test_sample_limits_records_and_renders_missing() {
        let data = dataset(
            "rows",
            DataFormat::Csv,
            (0..10).map(|i| if i == 1 { json!({"a": 1, "b": null}) } else { json!({"a": i, "b": "x"}) }).collect(),
        );
        let rendered = sample(&data, 5);
        assert_eq!(rendered.lines().count(), 6);
        assert_eq!(rendered.lines().nth(2).unwrap(), "1\t-");
    }

    #[test]
    fn test_extract_relevant_matches_case_insensitively() {
        let other = dataset("weather", DataFormat::Csv, vec![json!({"wind": 3})]);
        let relevant = extract_relevant(
            &[grow_trial(), other],
            &["Moisture".to_string(), "contamination_rate".to_string()],
        );
        assert_eq!(relevant.len(), 1);
        assert_eq!(relevant[0].dataset, "grow-trial");
        assert_eq!(relevant[0].records.len(), 20);
    }

    #[test]
    fn test_extract_relevant_caps_records() {
        let rows = (0..250).map(|i| json!({"moisture_pct": i})).collect();
        let data = dataset("big", DataFormat::Csv, rows);
        let relevant = extract_relevant(&[data], &["moisture".to_string()]);
        assert_eq!(relevant[0].records.len(), MAX_RELEVANT_RECORDS);
    }

    #[test]
    fn test_extract_relevant_empty_inputs() {
        assert!(extract_relevant(&[], &["moisture".to_string()]).is_empty());
        assert!(extract_relevant(&[grow_trial()], &[]).is_empty());
        assert!(extract_relevant(&[grow_trial()], &["  ".to_string()]).is_empty());
    }
}
