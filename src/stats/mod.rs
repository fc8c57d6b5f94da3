//! Statistical routines over the full record table
//!
//! - [`describe`]: count / mean / std / quartiles, plus box-plot geometry
//! - [`anova`]: one-way ANOVA (between-groups F test)
//! - [`ols`]: ordinary least squares with treatment-coded categorical terms
//! - [`ttest`]: independent two-sample Student t-test
//!
//! Distribution tails come from `statrs`; linear algebra from `nalgebra`.
//! Every routine fails loudly on empty groups, missing columns, non-numeric
//! data or degenerate variance rather than returning partial results.

pub mod anova;
pub mod describe;
pub mod ols;
pub mod ttest;

pub use anova::{one_way_anova, AnovaRow, AnovaTable};
pub use describe::{describe_groups, BoxSummary, Describe, GroupDescribe};
pub use ols::{fit_ols, Coefficient, OlsSummary, TermKind};
pub use ttest::{ttest_ind, TTestResult};

use crate::table::{group_positions, TableExt};
use crate::Result;
use arrow::record_batch::RecordBatch;

/// Numeric values of one group
#[derive(Debug, Clone, PartialEq)]
pub struct GroupValues {
    /// Group label (a condition level)
    pub label: String,
    /// Non-null values of the analysed column, in row order
    pub values: Vec<f64>,
}

/// Bucket a numeric column by a grouping column in one pass
///
/// Groups come out in `order`; levels found in the data but not listed in
/// `order` follow in order of first appearance. Listed levels with no rows are
/// kept with an empty value list so callers can reject them. Rows with a null
/// group or null value are skipped.
///
/// # Errors
/// Returns error if either column is missing or the value column is not numeric
pub fn group_values(
    table: &RecordBatch,
    group_column: &str,
    value_column: &str,
    order: &[String],
) -> Result<Vec<GroupValues>> {
    let labels = table.text_values(group_column)?;
    let values = table.numeric_values(value_column)?;

    let mut found = group_positions(&labels);
    let mut groups: Vec<GroupValues> = Vec::with_capacity(order.len().max(found.len()));

    let collect = |rows: &[usize]| -> Vec<f64> { rows.iter().filter_map(|&r| values[r]).collect() };

    for level in order {
        let rows = found
            .iter()
            .position(|(label, _)| label == level)
            .map(|i| found.remove(i).1)
            .unwrap_or_default();
        groups.push(GroupValues {
            label: level.clone(),
            values: collect(&rows),
        });
    }
    for (label, rows) in found {
        groups.push(GroupValues {
            values: collect(&rows),
            label,
        });
    }
    Ok(groups)
}

/// Arithmetic mean (`NaN` for an empty slice)
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample variance with `n - 1` denominator (`NaN` below two values)
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn sample_variance(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return f64::NAN;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Float64Array, StringArray};
    use arrow::datatypes::{DataType, Field, Schema};
    use std::sync::Arc;

    fn table() -> RecordBatch {
        let schema = Schema::new(vec![
            Field::new("Condition", DataType::Utf8, true),
            Field::new("Score", DataType::Float64, true),
        ]);
        RecordBatch::try_new(
            Arc::new(schema),
            vec![
                Arc::new(StringArray::from(vec![
                    Some("Adaptive"),
                    Some("Fixed"),
                    Some("Adaptive"),
                    None,
                    Some("Pilot"),
                    Some("Fixed"),
                ])),
                Arc::new(Float64Array::from(vec![
                    Some(1.0),
                    Some(2.0),
                    Some(3.0),
                    Some(4.0),
                    Some(5.0),
                    None,
                ])),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_group_values_respects_order_and_keeps_empty_levels() {
        let order = vec![
            "Task-only".to_string(),
            "Fixed".to_string(),
            "Adaptive".to_string(),
        ];
        let groups = group_values(&table(), "Condition", "Score", &order).unwrap();
        let labels: Vec<&str> = groups.iter().map(|g| g.label.as_str()).collect();
        assert_eq!(labels, vec!["Task-only", "Fixed", "Adaptive", "Pilot"]);
        assert!(groups[0].values.is_empty());
        assert_eq!(groups[1].values, vec![2.0]);
        assert_eq!(groups[2].values, vec![1.0, 3.0]);
        assert_eq!(groups[3].values, vec![5.0]);
    }

    #[test]
    fn test_mean_and_variance() {
        assert!((mean(&[1.0, 2.0, 3.0, 4.0]) - 2.5).abs() < 1e-12);
        assert!((sample_variance(&[1.0, 2.0, 3.0, 4.0]) - 5.0 / 3.0).abs() < 1e-12);
        assert!(mean(&[]).is_nan());
        assert!(sample_variance(&[1.0]).is_nan());
    }
}
