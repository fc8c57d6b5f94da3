//! Run manifest - what a pipeline run did and what it wrote

use crate::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// Status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    /// Run is executing.
    Running,
    /// Every stage completed.
    Success,
    /// A stage returned an error.
    Failed,
}

/// Kind of file a run produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// Spreadsheet workbook
    Workbook,
    /// Parquet table
    Parquet,
    /// PNG plot
    Plot,
    /// JSON analysis report
    Report,
}

/// One file written by a run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArtifactRecord {
    path: String,
    kind: ArtifactKind,
    size_bytes: u64,
    created_at: DateTime<Utc>,
}

impl ArtifactRecord {
    /// Record a written file, reading its size from disk.
    ///
    /// A file that cannot be stat'ed is recorded with size 0.
    #[must_use]
    pub fn from_path(path: &Path, kind: ArtifactKind) -> Self {
        Self {
            path: path.display().to_string(),
            kind,
            size_bytes: std::fs::metadata(path).map_or(0, |m| m.len()),
            created_at: Utc::now(),
        }
    }

    /// Get the artifact path.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Get the artifact kind.
    #[must_use]
    pub const fn kind(&self) -> ArtifactKind {
        self.kind
    }

    /// Get the size in bytes at the time it was recorded.
    #[must_use]
    pub const fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    /// Get the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Run Manifest tracks a single pipeline execution.
///
/// Row counts are keyed by table name (`ratings`, `usable`, `full`, ...).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunManifest {
    run_id: String,
    status: RunStatus,
    started_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
    row_counts: BTreeMap<String, usize>,
    artifacts: Vec<ArtifactRecord>,
    error: Option<String>,
}

impl RunManifest {
    /// Start a new run now, in Running status.
    #[must_use]
    pub fn start() -> Self {
        let started_at = Utc::now();
        Self {
            run_id: format!("run-{}", started_at.format("%Y%m%dT%H%M%S%.3fZ")),
            status: RunStatus::Running,
            started_at,
            ended_at: None,
            row_counts: BTreeMap::new(),
            artifacts: Vec::new(),
            error: None,
        }
    }

    /// Get the run ID.
    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Get the current run status.
    #[must_use]
    pub const fn status(&self) -> RunStatus {
        self.status
    }

    /// Get the start timestamp.
    #[must_use]
    pub const fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Get the end timestamp, if the run has completed.
    #[must_use]
    pub const fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }

    /// Row count recorded for a table.
    #[must_use]
    pub fn row_count(&self, table: &str) -> Option<usize> {
        self.row_counts.get(table).copied()
    }

    /// Files written so far.
    #[must_use]
    pub fn artifacts(&self) -> &[ArtifactRecord] {
        &self.artifacts
    }

    /// Error message of a failed run.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Record the row count of a table.
    pub fn record_rows(&mut self, table: impl Into<String>, rows: usize) {
        self.row_counts.insert(table.into(), rows);
    }

    /// Record a written file.
    pub fn record_artifact(&mut self, path: &Path, kind: ArtifactKind) {
        self.artifacts.push(ArtifactRecord::from_path(path, kind));
    }

    /// Finish the run successfully.
    pub fn succeed(&mut self) {
        self.status = RunStatus::Success;
        self.ended_at = Some(Utc::now());
    }

    /// Finish the run with an error.
    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = RunStatus::Failed;
        self.error = Some(error.into());
        self.ended_at = Some(Utc::now());
    }

    /// Write the manifest as pretty-printed JSON.
    ///
    /// # Errors
    /// Returns error if the file cannot be created or serialization fails
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Read a manifest written by [`RunManifest::write_json`].
    ///
    /// # Errors
    /// Returns error if the file cannot be read or parsed
    pub fn read_json(path: &Path) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }
}
