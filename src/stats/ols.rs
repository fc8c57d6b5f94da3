//! Ordinary least squares regression
//!
//! Models are `response ~ term + term + ...` with an intercept. Text and
//! boolean columns enter as treatment-coded categoricals: the alphabetically
//! first level is the reference and every other level gets an indicator
//! column named `Column[T.level]`. Numeric columns enter as-is. Rows with a
//! missing response or predictor are dropped before fitting.
//!
//! The fit solves the normal equations through a Cholesky factorisation of
//! `XᵀX`; a design that is not positive definite is reported as singular.

use crate::table::TableExt;
use crate::{Error, Result};
use arrow::datatypes::DataType;
use arrow::record_batch::RecordBatch;
use nalgebra::{Cholesky, DMatrix, DVector};
use serde::Serialize;
use statrs::distribution::{ContinuousCDF, FisherSnedecor, StudentsT};
use std::collections::BTreeSet;
use std::f64::consts::PI;

const PIVOT_TOLERANCE: f64 = 1e-10;

/// How a predictor enters the design matrix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TermKind {
    /// Treatment-coded indicator columns
    Categorical,
    /// Single numeric column
    Numeric,
}

/// One estimated coefficient
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Coefficient {
    /// Design column name (`Intercept`, `Grade`, `Condition[T.Fixed]`, ...)
    pub name: String,
    /// Point estimate
    pub estimate: f64,
    /// Standard error
    pub std_error: f64,
    /// t statistic
    pub t: f64,
    /// Two-sided p-value
    pub p_value: f64,
    /// Lower bound of the 95% confidence interval
    pub ci_low: f64,
    /// Upper bound of the 95% confidence interval
    pub ci_high: f64,
}

/// Fitted model summary
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OlsSummary {
    /// Model formula, e.g. `Learning_gain_total ~ Condition`
    pub formula: String,
    /// Observations used after dropping incomplete rows
    pub n_obs: usize,
    /// Model degrees of freedom (design columns minus intercept)
    pub df_model: usize,
    /// Residual degrees of freedom
    pub df_resid: usize,
    /// Coefficient of determination
    pub r_squared: f64,
    /// Adjusted R²
    pub adj_r_squared: f64,
    /// Overall F statistic (`None` for an intercept-only model)
    pub f_statistic: Option<f64>,
    /// p-value of the overall F test
    pub f_p_value: Option<f64>,
    /// Gaussian log-likelihood
    pub log_likelihood: f64,
    /// Akaike information criterion
    pub aic: f64,
    /// Bayesian information criterion
    pub bic: f64,
    /// Coefficient table, intercept first
    pub coefficients: Vec<Coefficient>,
}

impl OlsSummary {
    /// Coefficient by design column name
    #[must_use]
    pub fn coefficient(&self, name: &str) -> Option<&Coefficient> {
        self.coefficients.iter().find(|c| c.name == name)
    }
}

enum TermValues {
    Categorical(Vec<Option<String>>),
    Numeric(Vec<Option<f64>>),
}

impl TermValues {
    fn is_present(&self, row: usize) -> bool {
        match self {
            Self::Categorical(values) => values[row].is_some(),
            Self::Numeric(values) => values[row].is_some(),
        }
    }
}

/// Kind a column takes in a design matrix
///
/// # Errors
/// Returns error if the column is missing
pub fn term_kind(table: &RecordBatch, column: &str) -> Result<TermKind> {
    let array = table.column_named(column)?;
    Ok(match array.data_type() {
        DataType::Utf8 | DataType::LargeUtf8 | DataType::Boolean | DataType::Dictionary(..) => {
            TermKind::Categorical
        }
        _ => TermKind::Numeric,
    })
}

/// Fit `response ~ predictors` by ordinary least squares
///
/// # Errors
/// Returns error if a column is missing, the response is not numeric, fewer
/// complete rows than design columns remain, the response has no variance,
/// or the design matrix is singular
#[allow(clippy::cast_precision_loss, clippy::too_many_lines)]
pub fn fit_ols(table: &RecordBatch, response: &str, predictors: &[&str]) -> Result<OlsSummary> {
    let formula = if predictors.is_empty() {
        format!("{response} ~ 1")
    } else {
        format!("{response} ~ {}", predictors.join(" + "))
    };

    let y_all = table.numeric_values(response)?;
    let terms: Vec<(&str, TermValues)> = predictors
        .iter()
        .map(|&name| {
            let values = match term_kind(table, name)? {
                TermKind::Categorical => TermValues::Categorical(table.text_values(name)?),
                TermKind::Numeric => TermValues::Numeric(table.numeric_values(name)?),
            };
            Ok((name, values))
        })
        .collect::<Result<_>>()?;

    let rows: Vec<usize> = (0..table.num_rows())
        .filter(|&r| y_all[r].is_some() && terms.iter().all(|(_, t)| t.is_present(r)))
        .collect();

    let mut names = vec!["Intercept".to_string()];
    let mut design_columns: Vec<Vec<f64>> = vec![vec![1.0; rows.len()]];
    for (name, values) in &terms {
        match values {
            TermValues::Numeric(values) => {
                names.push((*name).to_string());
                design_columns.push(rows.iter().filter_map(|&r| values[r]).collect());
            }
            TermValues::Categorical(values) => {
                let levels: BTreeSet<&str> =
                    rows.iter().filter_map(|&r| values[r].as_deref()).collect();
                for level in levels.iter().skip(1) {
                    names.push(format!("{name}[T.{level}]"));
                    design_columns.push(
                        rows.iter()
                            .map(|&r| {
                                if values[r].as_deref() == Some(*level) {
                                    1.0
                                } else {
                                    0.0
                                }
                            })
                            .collect(),
                    );
                }
            }
        }
    }

    let n = rows.len();
    let p = design_columns.len();
    if n <= p {
        return Err(Error::Statistics(format!(
            "{formula}: {n} complete observations for {p} parameters"
        )));
    }

    let x = DMatrix::from_fn(n, p, |i, j| design_columns[j][i]);
    let y = DVector::from_iterator(n, rows.iter().filter_map(|&r| y_all[r]));

    let xt = x.transpose();
    let xtx = &xt * &x;
    let scale: Vec<f64> = (0..p).map(|j| xtx[(j, j)]).collect();
    // a pivot that vanishes relative to its column norm means collinear columns
    let chol = Cholesky::new(xtx)
        .filter(|c| {
            let l = c.l_dirty();
            (0..p).all(|j| l[(j, j)].powi(2) > PIVOT_TOLERANCE * scale[j])
        })
        .ok_or_else(|| Error::Statistics(format!("{formula}: design matrix is singular")))?;
    let beta = chol.solve(&(&xt * &y));
    let xtx_inv = chol.inverse();

    let residuals = &y - &x * &beta;
    let sse = residuals.norm_squared();
    let y_mean = y.mean();
    let sst: f64 = y.iter().map(|v| (v - y_mean).powi(2)).sum();
    if sst <= 0.0 {
        return Err(Error::Statistics(format!(
            "{formula}: response has zero variance"
        )));
    }

    let df_model = p - 1;
    let df_resid = n - p;
    let sigma2 = sse / df_resid as f64;

    let t_dist = StudentsT::new(0.0, 1.0, df_resid as f64)
        .map_err(|e| Error::Statistics(format!("{formula}: {e}")))?;
    let t_crit = t_dist.inverse_cdf(0.975);

    let coefficients = names
        .into_iter()
        .enumerate()
        .map(|(j, name)| {
            let estimate = beta[j];
            let std_error = (sigma2 * xtx_inv[(j, j)]).sqrt();
            let t = estimate / std_error;
            Coefficient {
                name,
                estimate,
                std_error,
                t,
                p_value: 2.0 * t_dist.sf(t.abs()),
                ci_low: estimate - t_crit * std_error,
                ci_high: estimate + t_crit * std_error,
            }
        })
        .collect();

    let r_squared = 1.0 - sse / sst;
    let adj_r_squared = 1.0 - (1.0 - r_squared) * (n - 1) as f64 / df_resid as f64;

    let (f_statistic, f_p_value) = if df_model == 0 {
        (None, None)
    } else {
        let f = ((sst - sse) / df_model as f64) / sigma2;
        let dist = FisherSnedecor::new(df_model as f64, df_resid as f64)
            .map_err(|e| Error::Statistics(format!("{formula}: {e}")))?;
        (Some(f), Some(dist.sf(f)))
    };

    let nf = n as f64;
    let log_likelihood = -nf / 2.0 * ((2.0 * PI).ln() + (sse / nf).ln() + 1.0);
    let aic = -2.0 * log_likelihood + 2.0 * p as f64;
    let bic = -2.0 * log_likelihood + p as f64 * nf.ln();

    Ok(OlsSummary {
        formula,
        n_obs: n,
        df_model,
        df_resid,
        r_squared,
        adj_r_squared,
        f_statistic,
        f_p_value,
        log_likelihood,
        aic,
        bic,
        coefficients,
    })
}
