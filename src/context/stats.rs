use serde::Serialize;
use serde_json::Value;

use crate::models::DataRecord;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnStatistics {
    pub mean: f64,
    pub median: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    pub count: usize,
}

/// Numeric reading of a cell: JSON numbers and strings that parse as numbers
pub fn numeric_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return None;
            }
            trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
        }
        _ => None,
    }
}

pub fn column_values(records: &[DataRecord], column: &str) -> Vec<f64> {
    records
        .iter()
        .filter_map(|r| r.data.get(column).and_then(numeric_value))
        .collect()
}

/// Descriptive statistics over the parseable values of one column
pub fn calculate_statistics(records: &[DataRecord], column: &str) -> Option<ColumnStatistics> {
    let values = column_values(records, column);
    if values.is_empty() {
        return None;
    }

    let count = values.len();
    let mean = values.iter().sum::<f64>() / count as f64;

    let mut sorted = values.clone();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let median = sorted[count / 2];

    // Population variance
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / count as f64;

    Some(ColumnStatistics {
        mean,
        median,
        std_dev: variance.sqrt(),
        min: sorted[0],
        max: sorted[count - 1],
        count,
    })
}

/// Pearson correlation over rows where both columns are numeric
pub fn calculate_correlation(records: &[DataRecord], column_a: &str, column_b: &str) -> Option<f64> {
    let pairs: Vec<(f64, f64)> = records
        .iter()
        .filter_map(|r| {
            let x = r.data.get(column_a).and_then(numeric_value)?;
            let y = r.data.get(column_b).and_then(numeric_value)?;
            Some((x, y))
        })
        .collect();

    if pairs.len() < 2 {
        return None;
    }

    let n = pairs.len() as f64;
    let (mut sum_x, mut sum_y, mut sum_xy, mut sum_x2, mut sum_y2) = (0.0, 0.0, 0.0, 0.0, 0.0);
    for (x, y) in &pairs {
        sum_x += x;
        sum_y += y;
        sum_xy += x * y;
        sum_x2 += x * x;
        sum_y2 += y * y;
    }

    let numerator = n * sum_xy - sum_x * sum_y;
    let denominator = ((n * sum_x2 - sum_x * sum_x) * (n * sum_y2 - sum_y * sum_y)).sqrt();

    if denominator == 0.0 || !denominator.is_finite() {
        return None;
    }

    Some(numerator / denominator)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn records(rows: Vec<Value>) -> Vec<DataRecord> {
        rows.into_iter()
            .enumerate()
            .map(|(i, row)| DataRecord {
                id: format!("record-{}", i),
                data: row.as_object().cloned().unwrap_or_default(),
            })
            .collect()
    }

    #[test]
    fn test_numeric_value() {
        assert_eq!(numeric_value(&json!(4)), Some(4.0));
        assert_eq!(numeric_value(&json!(" 2.5 ")), Some(2.5));
        assert_eq!(numeric_value(&json!("")), None);
        assert_eq!(numeric_value(&json!("high")), None);
        assert_eq!(numeric_value(&json!(true)), None);
        assert_eq!(numeric_value(&Value::Null), None);
    }

    #[test]
    fn test_statistics_skip_non_numeric() {
        let data = records(vec![
            json!({"yield": "2"}),
            json!({"yield": 4}),
            json!({"yield": "n/a"}),
            json!({"yield": 6}),
            json!({"other": 100}),
        ]);
        let stats = calculate_statistics(&data, "yield").unwrap();
        assert_eq!(stats.count, 3);
        assert_eq!(stats.mean, 4.0);
        assert_eq!(stats.median, 4.0);
        assert_eq!(stats.min, 2.0);
        assert_eq!(stats.max, 6.0);
        assert!((stats.std_dev - (8.0f64 / 3.0).sqrt()).abs() < 1e-9);
    }

    #[test]
    fn test_statistics_none_without_numbers() {
        let data = records(vec![json!({"strain": "oyster"})]);
        assert!(calculate_statistics(&data, "strain").is_none());
        assert!(calculate_statistics(&[], "strain").is_none());
    }

    #[test]
    fn test_perfect_positive_correlation() {
        let data = records(vec![
            json!({"moisture": 60, "contamination_rate": 0.1}),
            json!({"moisture": 65, "contamination_rate": 0.2}),
            json!({"moisture": 70, "contamination_rate": 0.3}),
        ]);
        let r = calculate_correlation(&data, "moisture", "contamination_rate").unwrap();
        assert!((r - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_correlation_degenerate_inputs() {
        let single = records(vec![json!({"a": 1, "b": 2})]);
        assert!(calculate_correlation(&single, "a", "b").is_none());

        let constant = records(vec![json!({"a": 1, "b": 2}), json!({"a": 1, "b": 3})]);
        assert!(calculate_correlation(&constant, "a", "b").is_none());
    }
}
