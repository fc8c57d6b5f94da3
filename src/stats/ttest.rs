//! Independent two-sample t-test (pooled variance)

use super::{mean, sample_variance, GroupValues};
use crate::{Error, Result};
use serde::Serialize;
use statrs::distribution::{ContinuousCDF, StudentsT};

/// Result of a two-sample Student t-test
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TTestResult {
    /// Label of the first sample
    pub label_a: String,
    /// Label of the second sample
    pub label_b: String,
    /// Size of the first sample
    pub n_a: usize,
    /// Size of the second sample
    pub n_b: usize,
    /// Mean of the first sample
    pub mean_a: f64,
    /// Mean of the second sample
    pub mean_b: f64,
    /// t statistic (`mean_a - mean_b` over its pooled standard error)
    pub statistic: f64,
    /// Degrees of freedom, `n_a + n_b - 2`
    pub df: usize,
    /// Two-sided p-value
    pub p_value: f64,
}

/// Student t-test assuming equal variances
///
/// # Errors
/// Returns [`Error::Statistics`] if either sample has fewer than one value,
/// there are no degrees of freedom, or the pooled variance is zero
#[allow(clippy::cast_precision_loss)]
pub fn ttest_ind(a: &GroupValues, b: &GroupValues) -> Result<TTestResult> {
    let (n_a, n_b) = (a.values.len(), b.values.len());
    if n_a == 0 || n_b == 0 || n_a + n_b < 3 {
        return Err(Error::Statistics(format!(
            "t-test of {} vs {}: not enough observations ({n_a} and {n_b})",
            a.label, b.label
        )));
    }

    let df = n_a + n_b - 2;
    let ss = |values: &[f64]| {
        if values.len() < 2 {
            0.0
        } else {
            sample_variance(values) * (values.len() - 1) as f64
        }
    };
    let pooled = (ss(&a.values) + ss(&b.values)) / df as f64;
    if pooled <= 0.0 {
        return Err(Error::Statistics(format!(
            "t-test of {} vs {}: zero pooled variance",
            a.label, b.label
        )));
    }

    let (mean_a, mean_b) = (mean(&a.values), mean(&b.values));
    let std_err = (pooled * (1.0 / n_a as f64 + 1.0 / n_b as f64)).sqrt();
    let statistic = (mean_a - mean_b) / std_err;

    let dist = StudentsT::new(0.0, 1.0, df as f64)
        .map_err(|e| Error::Statistics(format!("t-test of {} vs {}: {e}", a.label, b.label)))?;

    Ok(TTestResult {
        label_a: a.label.clone(),
        label_b: b.label.clone(),
        n_a,
        n_b,
        mean_a,
        mean_b,
        statistic,
        df,
        p_value: 2.0 * dist.sf(statistic.abs()),
    })
}
