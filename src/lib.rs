//! # rapport-analysis: tutoring study analysis pipeline
//!
//! Batch pipeline for the 2019 Wizard-of-Oz tutoring study. It loads three
//! tables (participants, learning gains, crowd-sourced thin-slice rapport
//! ratings), merges them into one record per usable participant video, and
//! runs a fixed battery of condition comparisons.
//!
//! ## Stages
//!
//! - **Load** ([`storage`]): spreadsheet, CSV or Parquet → Arrow `RecordBatch`
//! - **Merge** ([`merge`]): learning ⋈ participants, usable filter, slice
//!   pivot with per-video mean, usable ⋈ summary
//! - **Analyze** ([`stats`], [`plot`], [`report`]): grouped describe, box/strip
//!   plots, one-way ANOVA, OLS with and without covariates, self-report vs.
//!   crowd rating t-test
//! - **Record** ([`manifest`]): run status, row counts and written artifacts
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use rapport_analysis::Pipeline;
//!
//! let pipeline = Pipeline::builder()
//!     .inputs("ratings.xlsx", "learning.xlsx", "participants.xlsx")
//!     .output_dir("out")
//!     .build()?;
//! let outcome = pipeline.run()?;
//! println!("{} usable records", outcome.tables.full.num_rows());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod manifest;
pub mod merge;
pub mod pipeline;
pub mod plot;
pub mod report;
pub mod stats;
pub mod storage;
pub mod table;

pub use config::PipelineConfig;
pub use error::{Error, Result};
pub use pipeline::{Pipeline, PipelineBuilder};
