//! Per-video rapport summary (slice ratings → one row per video)
//!
//! Ratings are grouped by video in order of first appearance and pivoted into
//! `AMT_Slice_0 .. AMT_Slice_{n-1}`, where `n` is the largest slice count of
//! any video. Within a video, slices keep their order in the source table;
//! they are not re-sorted by slice index. Shorter videos leave trailing cells
//! null. `AMT_Rapport_Average` is the mean of the non-null slices only.

use crate::config::ColumnNames;
use crate::table::{group_positions, TableExt};
use crate::Result;
use arrow::array::{ArrayRef, Float64Array, RecordBatch, UInt64Array};
use arrow::compute;
use arrow::datatypes::{DataType, Field, Schema};
use std::sync::Arc;
use tracing::{info, warn};

/// Pivot slice ratings into one row per video with a mean column
///
/// The video key column is renamed to the participant identifier so the
/// summary joins directly against participant records.
///
/// # Errors
/// Returns error if the video or rating column is missing or ratings are
/// non-numeric
#[allow(clippy::cast_precision_loss)]
pub fn build_rapport_summary(ratings: &RecordBatch, columns: &ColumnNames) -> Result<RecordBatch> {
    let video_keys = ratings.text_values(&columns.video)?;
    let values = ratings.numeric_values(&columns.rating)?;
    let video_column = ratings.column_named(&columns.video)?;

    let skipped = video_keys.iter().filter(|k| k.is_none()).count();
    if skipped > 0 {
        warn!(rows = skipped, "slice ratings without a video id ignored");
    }

    let groups = group_positions(&video_keys);
    let slices: Vec<Vec<Option<f64>>> = groups
        .iter()
        .map(|(_, rows)| rows.iter().map(|&row| values[row]).collect())
        .collect();
    let width = slices.iter().map(Vec::len).max().unwrap_or(0);

    let first_rows = UInt64Array::from_iter_values(groups.iter().map(|(_, rows)| rows[0] as u64));
    let key_column = compute::take(video_column.as_ref(), &first_rows, None)?;

    let mut fields = Vec::with_capacity(width + 2);
    let mut arrays: Vec<ArrayRef> = Vec::with_capacity(width + 2);

    fields.push(Field::new(
        &columns.participant,
        video_column.data_type().clone(),
        true,
    ));
    arrays.push(key_column);

    for slot in 0..width {
        let column: Float64Array = slices
            .iter()
            .map(|video| video.get(slot).copied().flatten())
            .collect();
        fields.push(Field::new(
            format!("{}{slot}", columns.slice_prefix),
            DataType::Float64,
            true,
        ));
        arrays.push(Arc::new(column));
    }

    let averages: Float64Array = slices.iter().map(|video| mean_present(video)).collect();
    fields.push(Field::new(&columns.rating_average, DataType::Float64, true));
    arrays.push(Arc::new(averages));

    let summary = RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)?;
    info!(
        ratings = ratings.num_rows(),
        videos = summary.num_rows(),
        slice_columns = width,
        "built rapport summary"
    );
    Ok(summary)
}

/// Mean over the present values, `None` when nothing is present
#[allow(clippy::cast_precision_loss)]
fn mean_present(values: &[Option<f64>]) -> Option<f64> {
    let (sum, count) = values
        .iter()
        .flatten()
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / count as f64)
}
