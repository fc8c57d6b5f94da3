//! Analysis results: console tables and the JSON report

use crate::stats::{AnovaTable, GroupDescribe, OlsSummary, TTestResult};
use crate::Result;
use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL_CONDENSED;
use comfy_table::{Cell, Table};
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// Everything computed for one analysed column
#[derive(Debug, Clone, Serialize)]
pub struct ColumnReport {
    /// Analysed column
    pub column: String,
    /// Per-condition descriptive statistics, in display order
    pub describe: Vec<GroupDescribe>,
    /// One-way ANOVA across conditions
    pub anova: AnovaTable,
    /// `column ~ Condition`
    pub ols: OlsSummary,
    /// `column ~ Condition + covariates`
    pub ols_covariates: OlsSummary,
    /// Box/strip plot file
    pub plot: String,
}

/// Self-reported against externally rated rapport
#[derive(Debug, Clone, Serialize)]
pub struct RapportComparison {
    /// Descriptive statistics of both measures
    pub describe: Vec<GroupDescribe>,
    /// Two-sample t-test
    pub ttest: TTestResult,
    /// Side-by-side box plot file
    pub plot: String,
}

/// Structured record of a full analysis run
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    /// Grouping column
    pub grouping: String,
    /// Display order of the groups
    pub condition_order: Vec<String>,
    /// Rows in the analysed table
    pub n_rows: usize,
    /// Per-column results
    pub columns: Vec<ColumnReport>,
    /// Rapport measure comparison
    pub rapport_comparison: RapportComparison,
}

impl AnalysisReport {
    /// Write the report as pretty-printed JSON
    ///
    /// # Errors
    /// Returns error if the file cannot be created or serialization fails
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }
}

fn new_table(header: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .apply_modifier(UTF8_ROUND_CORNERS);
    table.set_header(header.iter().map(|h| Cell::new(*h)).collect::<Vec<_>>());
    table
}

/// Fixed-precision rendering; `NaN` and missing render as `-`
#[must_use]
pub fn fmt_stat(value: f64) -> String {
    if value.is_nan() {
        "-".to_string()
    } else {
        format!("{value:.4}")
    }
}

/// p-value rendering: scientific below 1e-4
#[must_use]
pub fn fmt_p(value: f64) -> String {
    if value.is_nan() {
        "-".to_string()
    } else if value < 1e-4 {
        format!("{value:.2e}")
    } else {
        format!("{value:.4}")
    }
}

fn fmt_opt(value: Option<f64>, render: fn(f64) -> String) -> String {
    value.map_or_else(|| "-".to_string(), render)
}

/// Grouped describe table (one row per group)
#[must_use]
pub fn describe_table(groups: &[GroupDescribe]) -> Table {
    let mut table = new_table(&[
        "group", "count", "mean", "std", "min", "25%", "50%", "75%", "max",
    ]);
    for g in groups {
        let s = &g.stats;
        table.add_row(vec![
            Cell::new(&g.group),
            Cell::new(s.count),
            Cell::new(fmt_stat(s.mean)),
            Cell::new(fmt_stat(s.std)),
            Cell::new(fmt_stat(s.min)),
            Cell::new(fmt_stat(s.q25)),
            Cell::new(fmt_stat(s.q50)),
            Cell::new(fmt_stat(s.q75)),
            Cell::new(fmt_stat(s.max)),
        ]);
    }
    table
}

/// Detailed ANOVA table
#[must_use]
pub fn anova_table(anova: &AnovaTable) -> Table {
    let mut table = new_table(&["Source", "SS", "DF", "MS", "F", "p-unc", "np2"]);
    for row in [&anova.between, &anova.within] {
        table.add_row(vec![
            Cell::new(&row.source),
            Cell::new(fmt_stat(row.ss)),
            Cell::new(row.df),
            Cell::new(fmt_stat(row.ms)),
            Cell::new(fmt_opt(row.f, fmt_stat)),
            Cell::new(fmt_opt(row.p_value, fmt_p)),
            Cell::new(fmt_opt(row.np2, fmt_stat)),
        ]);
    }
    table
}

/// Regression summary: fit statistics followed by the coefficient table
#[must_use]
pub fn ols_summary_text(summary: &OlsSummary) -> String {
    let mut fit = new_table(&["Dep. formula", "No. obs", "R-squared", "Adj. R-squared", "F", "Prob (F)"]);
    fit.add_row(vec![
        Cell::new(&summary.formula),
        Cell::new(summary.n_obs),
        Cell::new(fmt_stat(summary.r_squared)),
        Cell::new(fmt_stat(summary.adj_r_squared)),
        Cell::new(fmt_opt(summary.f_statistic, fmt_stat)),
        Cell::new(fmt_opt(summary.f_p_value, fmt_p)),
    ]);

    let mut coefficients = new_table(&["", "coef", "std err", "t", "P>|t|", "[0.025", "0.975]"]);
    for c in &summary.coefficients {
        coefficients.add_row(vec![
            Cell::new(&c.name),
            Cell::new(fmt_stat(c.estimate)),
            Cell::new(fmt_stat(c.std_error)),
            Cell::new(fmt_stat(c.t)),
            Cell::new(fmt_p(c.p_value)),
            Cell::new(fmt_stat(c.ci_low)),
            Cell::new(fmt_stat(c.ci_high)),
        ]);
    }
    format!(
        "{fit}\n{coefficients}\nLog-Likelihood: {}  AIC: {}  BIC: {}",
        fmt_stat(summary.log_likelihood),
        fmt_stat(summary.aic),
        fmt_stat(summary.bic)
    )
}

/// t-test result as a one-row table
#[must_use]
pub fn ttest_table(result: &TTestResult) -> Table {
    let mut table = new_table(&["A", "B", "n(A)", "n(B)", "mean(A)", "mean(B)", "t", "dof", "p-val"]);
    table.add_row(vec![
        Cell::new(&result.label_a),
        Cell::new(&result.label_b),
        Cell::new(result.n_a),
        Cell::new(result.n_b),
        Cell::new(fmt_stat(result.mean_a)),
        Cell::new(fmt_stat(result.mean_b)),
        Cell::new(fmt_stat(result.statistic)),
        Cell::new(result.df),
        Cell::new(fmt_p(result.p_value)),
    ]);
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::{one_way_anova, ttest_ind, Describe, GroupValues};

    fn group(label: &str, values: &[f64]) -> GroupValues {
        GroupValues {
            label: label.to_string(),
            values: values.to_vec(),
        }
    }

    #[test]
    fn test_formatting() {
        assert_eq!(fmt_stat(1.0), "1.0000");
        assert_eq!(fmt_stat(f64::NAN), "-");
        assert_eq!(fmt_p(0.5), "0.5000");
        assert_eq!(fmt_p(0.000_012), "1.20e-5");
    }

    #[test]
    fn test_describe_table_rows() {
        let rendered = describe_table(&[GroupDescribe {
            group: "Fixed".to_string(),
            stats: Describe::from_values(&[1.0, 2.0, 3.0]),
        }])
        .to_string();
        assert!(rendered.contains("Fixed"));
        assert!(rendered.contains("2.0000"));
        assert!(rendered.contains("75%"));
    }

    #[test]
    fn test_anova_table_marks_within_row() {
        let anova = one_way_anova(
            "score",
            "Condition",
            &[group("a", &[1.0, 2.0, 3.0]), group("b", &[4.0, 5.0, 7.0])],
        )
        .unwrap();
        let rendered = anova_table(&anova).to_string();
        assert!(rendered.contains("Condition"));
        assert!(rendered.contains("Within"));
    }

    #[test]
    fn test_ttest_table() {
        let result = ttest_ind(&group("self", &[3.0, 4.0, 5.0]), &group("amt", &[4.0, 4.5, 5.5])).unwrap();
        let rendered = ttest_table(&result).to_string();
        assert!(rendered.contains("self"));
        assert!(rendered.contains("amt"));
    }
}
