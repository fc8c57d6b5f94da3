//! Descriptive statistics
//!
//! Quartiles use linear interpolation between order statistics
//! (position `q * (n - 1)`), standard deviation uses `n - 1`.

use super::{mean, sample_variance, GroupValues};
use serde::Serialize;

/// Count, mean, spread and quartiles of a sample
///
/// Empty samples report `count = 0` and `NaN` elsewhere.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Describe {
    /// Number of non-null values
    pub count: usize,
    /// Arithmetic mean
    pub mean: f64,
    /// Sample standard deviation
    pub std: f64,
    /// Minimum
    pub min: f64,
    /// 25th percentile
    pub q25: f64,
    /// Median
    pub q50: f64,
    /// 75th percentile
    pub q75: f64,
    /// Maximum
    pub max: f64,
}

impl Describe {
    /// Summarise a sample
    #[must_use]
    pub fn from_values(values: &[f64]) -> Self {
        let sorted = sorted(values);
        Self {
            count: values.len(),
            mean: mean(values),
            std: sample_variance(values).sqrt(),
            min: sorted.first().copied().unwrap_or(f64::NAN),
            q25: quantile_sorted(&sorted, 0.25),
            q50: quantile_sorted(&sorted, 0.5),
            q75: quantile_sorted(&sorted, 0.75),
            max: sorted.last().copied().unwrap_or(f64::NAN),
        }
    }
}

/// Descriptive statistics for one group of one column
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupDescribe {
    /// Group label
    pub group: String,
    /// Statistics of the group's values
    pub stats: Describe,
}

/// Describe every group
#[must_use]
pub fn describe_groups(groups: &[GroupValues]) -> Vec<GroupDescribe> {
    groups
        .iter()
        .map(|g| GroupDescribe {
            group: g.label.clone(),
            stats: Describe::from_values(&g.values),
        })
        .collect()
}

/// Box-plot geometry: quartile box, 1.5 IQR whiskers and outliers
#[derive(Debug, Clone, PartialEq)]
pub struct BoxSummary {
    /// Lower quartile (box bottom)
    pub q1: f64,
    /// Median line
    pub median: f64,
    /// Upper quartile (box top)
    pub q3: f64,
    /// Lowest value within `q1 - 1.5 IQR`
    pub whisker_low: f64,
    /// Highest value within `q3 + 1.5 IQR`
    pub whisker_high: f64,
    /// Values beyond the whiskers
    pub outliers: Vec<f64>,
}

impl BoxSummary {
    /// Box geometry of a sample, `None` when empty
    #[must_use]
    pub fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let sorted = sorted(values);
        let q1 = quantile_sorted(&sorted, 0.25);
        let q3 = quantile_sorted(&sorted, 0.75);
        let reach = 1.5 * (q3 - q1);
        let (lo_fence, hi_fence) = (q1 - reach, q3 + reach);

        let inside = || sorted.iter().copied().filter(|v| *v >= lo_fence && *v <= hi_fence);
        Some(Self {
            q1,
            median: quantile_sorted(&sorted, 0.5),
            q3,
            whisker_low: inside().next().unwrap_or(q1),
            whisker_high: inside().last().unwrap_or(q3),
            outliers: sorted
                .iter()
                .copied()
                .filter(|v| *v < lo_fence || *v > hi_fence)
                .collect(),
        })
    }
}

fn sorted(values: &[f64]) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    sorted
}

/// Linear-interpolation quantile of an ascending slice (`NaN` when empty)
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
#[must_use]
pub fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => f64::NAN,
        1 => sorted[0],
        n => {
            let pos = q.clamp(0.0, 1.0) * (n - 1) as f64;
            let lower = pos.floor() as usize;
            let upper = pos.ceil() as usize;
            let frac = pos - lower as f64;
            sorted[lower] + (sorted[upper] - sorted[lower]) * frac
        }
    }
}
