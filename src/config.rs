//! Pipeline configuration
//!
//! Defaults reproduce the 2019 Wizard-of-Oz study layout: file names, column
//! names, condition order and regression covariates. A `rapport-analysis.json`
//! file in the working directory overrides any subset of fields.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Config file picked up from the working directory by the binary
pub const CONFIG_FILE_NAME: &str = "rapport-analysis.json";

/// Input table locations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputPaths {
    /// Per-slice rapport ratings (one row per video slice)
    pub slice_ratings: PathBuf,
    /// Learning-gain measurements (one row per participant)
    pub learning: PathBuf,
    /// Participant demographics and self-reported rapport
    pub participants: PathBuf,
}

impl Default for InputPaths {
    fn default() -> Self {
        Self {
            slice_ratings: PathBuf::from("AllSlicesData_NiceFormat_edited.xlsx"),
            learning: PathBuf::from("Dori-RAPT_WoZ_2019_learning-gain_condition.xlsx"),
            participants: PathBuf::from("Dori-RAPT_WoZ_participant_data.xlsx"),
        }
    }
}

/// Output artifact names, relative to [`PipelineConfig::output_dir`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputNames {
    /// Workbook holding the per-video slice pivot
    pub rapport_workbook: String,
    /// Workbook holding the merged and usable tables
    pub full_workbook: String,
    /// Sheet name for the merged (all videos) table
    pub all_videos_sheet: String,
    /// Sheet name for the usable full record table
    pub usable_videos_sheet: String,
    /// Parquet copy of the full record table
    pub full_parquet: String,
    /// Self-report vs. external rating comparison plot
    pub comparison_plot: String,
    /// JSON dump of every analysis result
    pub analysis_report: String,
    /// JSON run manifest
    pub run_manifest: String,
}

impl Default for OutputNames {
    fn default() -> Self {
        Self {
            rapport_workbook: "WoZ_2019_AMTRatings.xlsx".to_string(),
            full_workbook: "WoZ_2019_FullData.xlsx".to_string(),
            all_videos_sheet: "AllVideos".to_string(),
            usable_videos_sheet: "UsableVideos".to_string(),
            full_parquet: "WoZ_2019_FullData.parquet".to_string(),
            comparison_plot: "reportedvsAMTrapport.png".to_string(),
            analysis_report: "analysis_report.json".to_string(),
            run_manifest: "run_manifest.json".to_string(),
        }
    }
}

/// Column names the pipeline relies on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnNames {
    /// Join key shared by learning, participant and summary tables
    pub participant: String,
    /// Condition label carried by the learning table, dropped after the join
    pub duplicate_condition: String,
    /// Usability flag
    pub usable: String,
    /// Value of the usability flag that marks an accepted video
    pub accept_marker: String,
    /// Video identifier in the slice rating table
    pub video: String,
    /// Rating value in the slice rating table
    pub rating: String,
    /// Experimental condition
    pub condition: String,
    /// Self-reported rapport average
    pub self_report: String,
    /// Prefix of the pivoted slice columns
    pub slice_prefix: String,
    /// Mean over the pivoted slice columns
    pub rating_average: String,
}

impl Default for ColumnNames {
    fn default() -> Self {
        Self {
            participant: "Participant".to_string(),
            duplicate_condition: "Study_Condition".to_string(),
            usable: "Usable".to_string(),
            accept_marker: "Y".to_string(),
            video: "Video".to_string(),
            rating: "Rating".to_string(),
            condition: "Condition".to_string(),
            self_report: "self_report_Rapport_Average".to_string(),
            slice_prefix: "AMT_Slice_".to_string(),
            rating_average: "AMT_Rapport_Average".to_string(),
        }
    }
}

/// Analysis settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Numeric columns analysed by condition
    pub target_columns: Vec<String>,
    /// Display order of the condition levels
    pub condition_order: Vec<String>,
    /// Extra regressors for the covariate model
    pub covariates: Vec<String>,
    /// Shared y range of the comparison plot
    pub comparison_y_range: (f64, f64),
    /// Seed of the strip plot jitter
    pub jitter_seed: u64,
    /// Rows shown in table previews
    pub preview_rows: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            target_columns: vec![
                "Learning_gain_total".to_string(),
                "Learning_gain_conc".to_string(),
                "Learning_gain_proc".to_string(),
                "AMT_Rapport_Average".to_string(),
                "self_report_Rapport_Average".to_string(),
            ],
            condition_order: vec![
                "Task-only".to_string(),
                "Fixed".to_string(),
                "Adaptive".to_string(),
            ],
            covariates: vec![
                "Student_Gender".to_string(),
                "Grade".to_string(),
                "Algebra_experience".to_string(),
            ],
            comparison_y_range: (2.0, 6.0),
            jitter_seed: 2019,
            preview_rows: 5,
        }
    }
}

/// Complete pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Input tables
    pub inputs: InputPaths,
    /// Directory receiving every artifact
    pub output_dir: PathBuf,
    /// Artifact names
    pub outputs: OutputNames,
    /// Column names
    pub columns: ColumnNames,
    /// Analysis settings
    pub analysis: AnalysisConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            inputs: InputPaths::default(),
            output_dir: PathBuf::from("."),
            outputs: OutputNames::default(),
            columns: ColumnNames::default(),
            analysis: AnalysisConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Parse a JSON config file
    ///
    /// Missing fields fall back to their defaults.
    ///
    /// # Errors
    /// Returns error if the file cannot be read, is not valid JSON, or fails
    /// [`validate`](Self::validate)
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::ConfigError(format!("Failed to read {}: {e}", path.display()))
        })?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `rapport-analysis.json` from `dir` if present, defaults otherwise
    ///
    /// # Errors
    /// Returns error if the file exists but cannot be parsed
    pub fn discover<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let candidate = dir.as_ref().join(CONFIG_FILE_NAME);
        if candidate.is_file() {
            Self::from_file(candidate)
        } else {
            Ok(Self::default())
        }
    }

    /// Check internal consistency
    ///
    /// # Errors
    /// Returns error on an empty target list, empty condition order, duplicate
    /// condition levels or an inverted comparison range
    pub fn validate(&self) -> Result<()> {
        if self.analysis.target_columns.is_empty() {
            return Err(Error::ConfigError(
                "analysis.target_columns must not be empty".to_string(),
            ));
        }
        if self.analysis.condition_order.is_empty() {
            return Err(Error::ConfigError(
                "analysis.condition_order must not be empty".to_string(),
            ));
        }
        let order = &self.analysis.condition_order;
        if order.iter().enumerate().any(|(i, level)| order[..i].contains(level)) {
            return Err(Error::ConfigError(format!(
                "analysis.condition_order has duplicate levels: {order:?}"
            )));
        }
        let (lo, hi) = self.analysis.comparison_y_range;
        if lo.is_nan() || hi.is_nan() || lo >= hi {
            return Err(Error::ConfigError(format!(
                "analysis.comparison_y_range must be increasing, got ({lo}, {hi})"
            )));
        }
        Ok(())
    }

    /// Resolve an artifact name against the output directory
    #[must_use]
    pub fn output_path(&self, name: &str) -> PathBuf {
        self.output_dir.join(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_study_layout() {
        let config = PipelineConfig::default();
        assert_eq!(config.columns.participant, "Participant");
        assert_eq!(config.columns.accept_marker, "Y");
        assert_eq!(
            config.analysis.condition_order,
            vec!["Task-only", "Fixed", "Adaptive"]
        );
        assert_eq!(config.analysis.target_columns.len(), 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let json = r#"{ "output_dir": "out", "analysis": { "preview_rows": 3 } }"#;
        let config: PipelineConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.output_dir, PathBuf::from("out"));
        assert_eq!(config.analysis.preview_rows, 3);
        assert_eq!(config.analysis.covariates.len(), 3);
        assert_eq!(config.outputs.full_workbook, "WoZ_2019_FullData.xlsx");
    }

    #[test]
    fn test_validate_rejects_inverted_range() {
        let mut config = PipelineConfig::default();
        config.analysis.comparison_y_range = (6.0, 2.0);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("comparison_y_range"));
    }

    #[test]
    fn test_validate_rejects_duplicate_levels() {
        let mut config = PipelineConfig::default();
        config.analysis.condition_order = vec!["Fixed".to_string(), "Fixed".to_string()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_discover_without_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig::discover(dir.path()).unwrap();
        assert_eq!(config, PipelineConfig::default());
    }

    #[test]
    fn test_discover_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            r#"{ "columns": { "accept_marker": "yes" } }"#,
        )
        .unwrap();
        let config = PipelineConfig::discover(dir.path()).unwrap();
        assert_eq!(config.columns.accept_marker, "yes");
    }
}
