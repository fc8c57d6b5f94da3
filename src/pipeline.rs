//! The batch pipeline: load → merge → write tables → analyze → report
//!
//! Each stage is a plain method returning owned tables, so tests can drive
//! stages individually. [`Pipeline::run`] chains them, records a
//! [`RunManifest`] and writes it even when a stage fails.

use crate::config::PipelineConfig;
use crate::manifest::{ArtifactKind, RunManifest};
use crate::merge::{build_rapport_summary, merge_full, merge_participant_and_learning};
use crate::plot::{box_strip_plot, PlotOptions};
use crate::report::{
    anova_table, describe_table, ols_summary_text, ttest_table, AnalysisReport, ColumnReport,
    RapportComparison,
};
use crate::stats::{
    describe_groups, fit_ols, group_values, one_way_anova, ttest_ind, GroupDescribe,
    GroupValues, OlsSummary,
};
use crate::storage::{load_table, write_parquet, write_workbook, Sheet};
use crate::table::TableExt;
use crate::Result;
use arrow::record_batch::RecordBatch;
use arrow::util::pretty::pretty_format_batches;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// The three source tables as loaded
#[derive(Debug, Clone)]
pub struct InputTables {
    /// Per-slice rapport ratings
    pub ratings: RecordBatch,
    /// Learning-gain measurements
    pub learning: RecordBatch,
    /// Participant records
    pub participants: RecordBatch,
}

/// Every table derived by the merge stage
#[derive(Debug, Clone)]
pub struct DerivedTables {
    /// Learning ⋈ participants, duplicate condition column dropped
    pub merged: RecordBatch,
    /// Accepted rows of `merged`
    pub usable: RecordBatch,
    /// One row per video with pivoted slices and their mean
    pub summary: RecordBatch,
    /// Usable ⋈ summary, the unit of analysis
    pub full: RecordBatch,
}

/// A target column after the describe and plot stage
struct DescribedColumn {
    column: String,
    groups: Vec<GroupValues>,
    describe: Vec<GroupDescribe>,
    plot: PathBuf,
}

/// Result of a successful run
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// Derived tables
    pub tables: DerivedTables,
    /// Analysis results
    pub report: AnalysisReport,
    /// Run manifest as written
    pub manifest: RunManifest,
}

/// Configured pipeline
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
    echo: bool,
}

impl Pipeline {
    /// Pipeline over a validated configuration, echoing tables to stdout
    ///
    /// # Errors
    /// Returns error if the configuration is inconsistent
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, echo: true })
    }

    /// Create a new pipeline builder
    #[must_use]
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    /// Active configuration
    #[must_use]
    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }

    fn echo(&self, text: impl std::fmt::Display) {
        if self.echo {
            println!("{text}");
        }
    }

    fn preview(&self, name: &str, table: &RecordBatch) -> Result<()> {
        if self.echo {
            let head = table.head(self.config.analysis.preview_rows);
            println!("{name} ({} rows)\n{}", table.num_rows(), pretty_format_batches(&[head])?);
        }
        Ok(())
    }

    /// Read the three source tables
    ///
    /// # Errors
    /// Returns error if any source is missing or unreadable
    pub fn load_inputs(&self) -> Result<InputTables> {
        let inputs = &self.config.inputs;
        let ratings = load_table(&inputs.slice_ratings)?;
        let learning = load_table(&inputs.learning)?;
        let participants = load_table(&inputs.participants)?;
        info!(
            ratings = ratings.num_rows(),
            learning = learning.num_rows(),
            participants = participants.num_rows(),
            "loaded inputs"
        );
        self.preview("Slice ratings", &ratings)?;
        Ok(InputTables {
            ratings,
            learning,
            participants,
        })
    }

    /// Join, filter and pivot the inputs into the analysis table
    ///
    /// # Errors
    /// Returns error if a required column is missing or ratings are non-numeric
    pub fn derive_tables(&self, inputs: &InputTables) -> Result<DerivedTables> {
        let columns = &self.config.columns;
        let merged =
            merge_participant_and_learning(&inputs.learning, &inputs.participants, columns)?;
        let summary = build_rapport_summary(&inputs.ratings, columns)?;
        let full = merge_full(&merged.usable, &summary, columns)?;
        self.preview("Full data", &full)?;
        Ok(DerivedTables {
            merged: merged.merged,
            usable: merged.usable,
            summary,
            full,
        })
    }

    /// Write the rapport workbook, the full-data workbook and the parquet copy
    ///
    /// # Errors
    /// Returns error if the output directory or a file cannot be written
    pub fn write_tables(&self, tables: &DerivedTables, manifest: &mut RunManifest) -> Result<()> {
        let outputs = &self.config.outputs;
        std::fs::create_dir_all(&self.config.output_dir)?;

        let rapport = self.config.output_path(&outputs.rapport_workbook);
        write_workbook(&rapport, &[Sheet::new("Sheet1", &tables.summary)])?;
        manifest.record_artifact(&rapport, ArtifactKind::Workbook);

        let full = self.config.output_path(&outputs.full_workbook);
        write_workbook(
            &full,
            &[
                Sheet::new(&outputs.all_videos_sheet, &tables.merged),
                Sheet::new(&outputs.usable_videos_sheet, &tables.full),
            ],
        )?;
        manifest.record_artifact(&full, ArtifactKind::Workbook);

        let parquet = self.config.output_path(&outputs.full_parquet);
        write_parquet(&parquet, &tables.full)?;
        manifest.record_artifact(&parquet, ArtifactKind::Parquet);

        info!(dir = %self.config.output_dir.display(), "wrote tables");
        Ok(())
    }

    /// Describe, plot, ANOVA and regress every target column, then compare
    /// the two rapport measures
    ///
    /// Runs stage by stage across columns: every column is described and
    /// plotted before any ANOVA, and every ANOVA precedes the regressions.
    ///
    /// # Errors
    /// Returns error on a missing or non-numeric column, an empty condition
    /// group, a degenerate design, or a plot that cannot be written
    pub fn analyze(&self, full: &RecordBatch, manifest: &mut RunManifest) -> Result<AnalysisReport> {
        let analysis = &self.config.analysis;
        let condition = self.config.columns.condition.as_str();

        let described = analysis
            .target_columns
            .iter()
            .map(|column| {
                let described = self.describe_column(full, column)?;
                manifest.record_artifact(&described.plot, ArtifactKind::Plot);
                Ok(described)
            })
            .collect::<Result<Vec<_>>>()?;

        let anovas = described
            .iter()
            .map(|d| {
                let anova = one_way_anova(&d.column, condition, &d.groups)?;
                self.echo(format!("{} by {condition}", d.column));
                self.echo(anova_table(&anova));
                Ok(anova)
            })
            .collect::<Result<Vec<_>>>()?;

        let simple = described
            .iter()
            .map(|d| self.regress(full, &d.column, &[condition]))
            .collect::<Result<Vec<_>>>()?;

        let mut predictors = vec![condition];
        predictors.extend(analysis.covariates.iter().map(String::as_str));
        let with_covariates = described
            .iter()
            .map(|d| self.regress(full, &d.column, &predictors))
            .collect::<Result<Vec<_>>>()?;

        let columns = described
            .into_iter()
            .zip(anovas)
            .zip(simple.into_iter().zip(with_covariates))
            .map(|((d, anova), (ols, ols_covariates))| {
                debug!(
                    column = %d.column,
                    f = anova.f_statistic(),
                    p = anova.p_value(),
                    r_squared = ols.r_squared,
                    "analysed column"
                );
                ColumnReport {
                    column: d.column,
                    describe: d.describe,
                    anova,
                    ols,
                    ols_covariates,
                    plot: d.plot.display().to_string(),
                }
            })
            .collect();

        let rapport_comparison = self.compare_rapport(full)?;
        manifest.record_artifact(Path::new(&rapport_comparison.plot), ArtifactKind::Plot);

        Ok(AnalysisReport {
            grouping: condition.to_string(),
            condition_order: analysis.condition_order.clone(),
            n_rows: full.num_rows(),
            columns,
            rapport_comparison,
        })
    }

    fn describe_column(&self, full: &RecordBatch, column: &str) -> Result<DescribedColumn> {
        let analysis = &self.config.analysis;
        let condition = self.config.columns.condition.as_str();

        let groups = group_values(full, condition, column, &analysis.condition_order)?;
        let describe = describe_groups(&groups);
        self.echo(format!("{column} by {condition}"));
        self.echo(describe_table(&describe));

        let plot = self.config.output_path(&format!("{column}.png"));
        let options = PlotOptions {
            jitter_seed: Some(analysis.jitter_seed),
            ..PlotOptions::default()
        };
        box_strip_plot(&plot, column, &groups, &options)?;

        Ok(DescribedColumn {
            column: column.to_string(),
            groups,
            describe,
            plot,
        })
    }

    fn regress(&self, full: &RecordBatch, column: &str, predictors: &[&str]) -> Result<OlsSummary> {
        let summary = fit_ols(full, column, predictors)?;
        self.echo(ols_summary_text(&summary));
        Ok(summary)
    }

    fn compare_rapport(&self, full: &RecordBatch) -> Result<RapportComparison> {
        let columns = &self.config.columns;
        let measure = |name: &str| -> Result<GroupValues> {
            Ok(GroupValues {
                label: name.to_string(),
                values: full.numeric_values(name)?.into_iter().flatten().collect(),
            })
        };
        let samples = [measure(&columns.self_report)?, measure(&columns.rating_average)?];

        let describe = describe_groups(&samples);
        self.echo(describe_table(&describe));

        let plot = self
            .config
            .output_path(&self.config.outputs.comparison_plot);
        let options = PlotOptions {
            jitter_seed: None,
            y_range: Some(self.config.analysis.comparison_y_range),
            ..PlotOptions::default()
        };
        box_strip_plot(&plot, "Rapport", &samples, &options)?;

        let ttest = ttest_ind(&samples[0], &samples[1])?;
        self.echo(ttest_table(&ttest));

        Ok(RapportComparison {
            describe,
            ttest,
            plot: plot.display().to_string(),
        })
    }

    /// Run every stage and write the report and manifest
    ///
    /// On failure the manifest is still written (status `Failed`) when the
    /// output directory is writable, and the stage error is returned.
    ///
    /// # Errors
    /// Returns the first stage error
    pub fn run(&self) -> Result<RunOutcome> {
        let mut manifest = RunManifest::start();
        info!(run_id = manifest.run_id(), "pipeline started");
        let manifest_path = self
            .config
            .output_path(&self.config.outputs.run_manifest);

        match self.run_stages(&mut manifest) {
            Ok((tables, report)) => {
                manifest.succeed();
                manifest.write_json(&manifest_path)?;
                info!(
                    run_id = manifest.run_id(),
                    artifacts = manifest.artifacts().len(),
                    "pipeline finished"
                );
                Ok(RunOutcome {
                    tables,
                    report,
                    manifest,
                })
            }
            Err(err) => {
                manifest.fail(err.to_string());
                if let Err(write_err) = manifest.write_json(&manifest_path) {
                    warn!(error = %write_err, "could not write run manifest");
                }
                Err(err)
            }
        }
    }

    fn run_stages(&self, manifest: &mut RunManifest) -> Result<(DerivedTables, AnalysisReport)> {
        let inputs = self.load_inputs()?;
        manifest.record_rows("ratings", inputs.ratings.num_rows());
        manifest.record_rows("learning", inputs.learning.num_rows());
        manifest.record_rows("participants", inputs.participants.num_rows());

        let tables = self.derive_tables(&inputs)?;
        manifest.record_rows("merged", tables.merged.num_rows());
        manifest.record_rows("usable", tables.usable.num_rows());
        manifest.record_rows("summary", tables.summary.num_rows());
        manifest.record_rows("full", tables.full.num_rows());

        self.write_tables(&tables, manifest)?;
        let report = self.analyze(&tables.full, manifest)?;

        let report_path = self
            .config
            .output_path(&self.config.outputs.analysis_report);
        report.write_json(&report_path)?;
        manifest.record_artifact(&report_path, ArtifactKind::Report);
        Ok((tables, report))
    }
}

/// Pipeline builder
#[derive(Debug, Default)]
pub struct PipelineBuilder {
    config: PipelineConfig,
    quiet: bool,
}

impl PipelineBuilder {
    /// Start from an existing configuration
    #[must_use]
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the three input tables
    #[must_use]
    pub fn inputs(
        mut self,
        slice_ratings: impl Into<PathBuf>,
        learning: impl Into<PathBuf>,
        participants: impl Into<PathBuf>,
    ) -> Self {
        self.config.inputs.slice_ratings = slice_ratings.into();
        self.config.inputs.learning = learning.into();
        self.config.inputs.participants = participants.into();
        self
    }

    /// Set the directory receiving every artifact
    #[must_use]
    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    /// Suppress console tables
    #[must_use]
    pub const fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /// Build the pipeline
    ///
    /// # Errors
    ///
    /// Returns error if the configuration is inconsistent
    pub fn build(self) -> Result<Pipeline> {
        let mut pipeline = Pipeline::new(self.config)?;
        pipeline.echo = !self.quiet;
        Ok(pipeline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn test_builder_overrides_paths() {
        let pipeline = Pipeline::builder()
            .inputs("r.csv", "l.csv", "p.csv")
            .output_dir("out")
            .quiet(true)
            .build()
            .unwrap();
        assert_eq!(pipeline.config().inputs.learning, PathBuf::from("l.csv"));
        assert_eq!(pipeline.config().output_dir, PathBuf::from("out"));
        assert!(!pipeline.echo);
    }

    #[test]
    fn test_builder_validates() {
        let mut config = PipelineConfig::default();
        config.analysis.target_columns.clear();
        let err = Pipeline::builder().config(config).build().unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));
    }

    #[test]
    fn test_missing_input_fails_and_writes_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = Pipeline::builder()
            .inputs(
                dir.path().join("ratings.csv"),
                dir.path().join("learning.csv"),
                dir.path().join("participants.csv"),
            )
            .output_dir(dir.path())
            .quiet(true)
            .build()
            .unwrap();

        let err = pipeline.run().unwrap_err();
        assert!(matches!(err, Error::StorageError(_)));

        let manifest = RunManifest::read_json(&dir.path().join("run_manifest.json")).unwrap();
        assert_eq!(manifest.status(), crate::manifest::RunStatus::Failed);
        assert!(manifest.error().unwrap().contains("ratings.csv"));
    }
}
