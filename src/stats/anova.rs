//! One-way ANOVA
//!
//! Between-groups sum of squares against the pooled within-group sum of
//! squares; the p-value is the upper tail of F(k - 1, N - k).

use super::{mean, GroupValues};
use crate::{Error, Result};
use serde::Serialize;
use statrs::distribution::{ContinuousCDF, FisherSnedecor};

/// One row of an ANOVA table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnovaRow {
    /// Source of variation (grouping column, or `Within`)
    pub source: String,
    /// Sum of squares
    pub ss: f64,
    /// Degrees of freedom
    pub df: usize,
    /// Mean square
    pub ms: f64,
    /// F statistic (between row only)
    pub f: Option<f64>,
    /// Upper-tail p-value (between row only)
    pub p_value: Option<f64>,
    /// Partial eta squared (between row only)
    pub np2: Option<f64>,
}

/// Detailed one-way ANOVA result
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnovaTable {
    /// Dependent variable
    pub dv: String,
    /// Between-groups row
    pub between: AnovaRow,
    /// Within-groups (residual) row
    pub within: AnovaRow,
}

impl AnovaTable {
    /// p-value of the between-groups effect
    #[must_use]
    pub fn p_value(&self) -> f64 {
        self.between.p_value.unwrap_or(f64::NAN)
    }

    /// F statistic of the between-groups effect
    #[must_use]
    pub fn f_statistic(&self) -> f64 {
        self.between.f.unwrap_or(f64::NAN)
    }
}

/// One-way ANOVA of `dv` across groups
///
/// # Errors
/// Returns [`Error::Statistics`] if fewer than two groups are given, any group
/// is empty, there are no residual degrees of freedom, or the within-group
/// variance is zero
#[allow(clippy::cast_precision_loss)]
pub fn one_way_anova(dv: &str, between: &str, groups: &[GroupValues]) -> Result<AnovaTable> {
    if groups.len() < 2 {
        return Err(Error::Statistics(format!(
            "ANOVA of {dv} needs at least two groups, got {}",
            groups.len()
        )));
    }
    if let Some(empty) = groups.iter().find(|g| g.values.is_empty()) {
        return Err(Error::Statistics(format!(
            "ANOVA of {dv}: group '{}' has no observations",
            empty.label
        )));
    }

    let k = groups.len();
    let n: usize = groups.iter().map(|g| g.values.len()).sum();
    if n <= k {
        return Err(Error::Statistics(format!(
            "ANOVA of {dv}: {n} observations leave no residual degrees of freedom for {k} groups"
        )));
    }

    let all: Vec<f64> = groups.iter().flat_map(|g| g.values.iter().copied()).collect();
    let grand_mean = mean(&all);

    let (ss_between, ss_within) = groups.iter().fold((0.0, 0.0), |(ssb, ssw), g| {
        let m = mean(&g.values);
        let within: f64 = g.values.iter().map(|v| (v - m).powi(2)).sum();
        (
            ssb + g.values.len() as f64 * (m - grand_mean).powi(2),
            ssw + within,
        )
    });

    if ss_within <= f64::EPSILON * (ss_between + ss_within) {
        return Err(Error::Statistics(format!(
            "ANOVA of {dv}: zero within-group variance"
        )));
    }

    let df_between = k - 1;
    let df_within = n - k;
    let ms_between = ss_between / df_between as f64;
    let ms_within = ss_within / df_within as f64;
    let f = ms_between / ms_within;

    let dist = FisherSnedecor::new(df_between as f64, df_within as f64)
        .map_err(|e| Error::Statistics(format!("ANOVA of {dv}: {e}")))?;
    let p_value = dist.sf(f);

    Ok(AnovaTable {
        dv: dv.to_string(),
        between: AnovaRow {
            source: between.to_string(),
            ss: ss_between,
            df: df_between,
            ms: ms_between,
            f: Some(f),
            p_value: Some(p_value),
            np2: Some(ss_between / (ss_between + ss_within)),
        },
        within: AnovaRow {
            source: "Within".to_string(),
            ss: ss_within,
            df: df_within,
            ms: ms_within,
            f: None,
            p_value: None,
            np2: None,
        },
    })
}
