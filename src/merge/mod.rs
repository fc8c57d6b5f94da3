//! Table merging (participant ⋈ learning ⋈ rapport summary)
//!
//! Joins follow inner-join semantics: a key present in only one table is
//! dropped without error. Output rows follow left-table order, and within one
//! left row the matching right rows appear in right-table order, so the result
//! is stable for identical inputs.

mod rapport;

pub use rapport::build_rapport_summary;

use crate::config::ColumnNames;
use crate::table::TableExt;
use crate::Result;
use arrow::array::{ArrayRef, RecordBatch, UInt64Array};
use arrow::compute;
use arrow::datatypes::{Field, Schema};
use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::Arc;
use tracing::{info, warn};

/// Suffix for a non-key column present in both tables (left copy)
pub const LEFT_SUFFIX: &str = "_x";
/// Suffix for a non-key column present in both tables (right copy)
pub const RIGHT_SUFFIX: &str = "_y";

/// Merged participant/learning table and its usable subset
#[derive(Debug, Clone)]
pub struct MergedTables {
    /// Every participant present in both the learning and participant tables
    pub merged: RecordBatch,
    /// Rows of `merged` whose usability flag equals the accept marker
    pub usable: RecordBatch,
}

/// Inner join of two tables on a shared key column
///
/// The key column appears once, taken from the left table. Other columns
/// present in both tables are suffixed with `_x` (left) and `_y` (right).
/// Keys compare by their text rendering; null keys never match.
///
/// # Errors
/// Returns error if either table lacks the key column
pub fn inner_join(left: &RecordBatch, right: &RecordBatch, on: &str) -> Result<RecordBatch> {
    let left_keys = left.text_values(on)?;
    let right_keys = right.text_values(on)?;
    let right_key_index = right.column_position(on)?;

    let mut lookup: FxHashMap<&str, Vec<u64>> = FxHashMap::default();
    for (row, key) in right_keys.iter().enumerate() {
        if let Some(key) = key.as_deref() {
            lookup.entry(key).or_default().push(row as u64);
        }
    }

    let mut left_rows = Vec::new();
    let mut right_rows = Vec::new();
    for (row, key) in left_keys.iter().enumerate() {
        if let Some(matches) = key.as_deref().and_then(|k| lookup.get(k)) {
            for &other in matches {
                left_rows.push(row as u64);
                right_rows.push(other);
            }
        }
    }
    let left_take = UInt64Array::from(left_rows);
    let right_take = UInt64Array::from(right_rows);

    let left_schema = left.schema();
    let right_schema = right.schema();
    let left_names: FxHashSet<&str> = left_schema.fields().iter().map(|f| f.name().as_str()).collect();
    let right_names: FxHashSet<&str> = right_schema
        .fields()
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != right_key_index)
        .map(|(_, f)| f.name().as_str())
        .collect();

    let mut fields: Vec<Field> = Vec::with_capacity(left.num_columns() + right.num_columns());
    let mut columns: Vec<ArrayRef> = Vec::with_capacity(fields.capacity());

    for (field, column) in left_schema.fields().iter().zip(left.columns()) {
        let name = if field.name() != on && right_names.contains(field.name().as_str()) {
            format!("{}{LEFT_SUFFIX}", field.name())
        } else {
            field.name().clone()
        };
        fields.push(field.as_ref().clone().with_name(name));
        columns.push(compute::take(column.as_ref(), &left_take, None)?);
    }

    for (index, (field, column)) in right_schema.fields().iter().zip(right.columns()).enumerate() {
        if index == right_key_index {
            continue;
        }
        let name = if left_names.contains(field.name().as_str()) {
            format!("{}{RIGHT_SUFFIX}", field.name())
        } else {
            field.name().clone()
        };
        fields.push(field.as_ref().clone().with_name(name));
        columns.push(compute::take(column.as_ref(), &right_take, None)?);
    }

    let joined = RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)?;
    let unmatched_left = left_keys
        .iter()
        .filter(|k| k.as_deref().map_or(true, |k| !lookup.contains_key(k)))
        .count();
    if unmatched_left > 0 {
        warn!(key = on, rows = unmatched_left, "left rows without a join partner dropped");
    }
    Ok(joined)
}

/// Join learning and participant data, then keep usable videos
///
/// Learning is the left table. The condition label carried by the learning
/// table duplicates the participant's and is dropped after the join.
///
/// # Errors
/// Returns error if the identifier, duplicate condition or usability column is
/// missing
pub fn merge_participant_and_learning(
    learning: &RecordBatch,
    participants: &RecordBatch,
    columns: &ColumnNames,
) -> Result<MergedTables> {
    let joined = inner_join(learning, participants, &columns.participant)?;
    let merged = joined.drop_column(&columns.duplicate_condition)?;
    let usable = merged.filter_equals(&columns.usable, &columns.accept_marker)?;

    info!(
        learning_rows = learning.num_rows(),
        participant_rows = participants.num_rows(),
        merged_rows = merged.num_rows(),
        usable_rows = usable.num_rows(),
        "merged participant and learning data"
    );

    Ok(MergedTables { merged, usable })
}

/// Join usable records with the per-video rapport summary
///
/// # Errors
/// Returns error if either table lacks the identifier column
pub fn merge_full(
    usable: &RecordBatch,
    summary: &RecordBatch,
    columns: &ColumnNames,
) -> Result<RecordBatch> {
    let full = inner_join(usable, summary, &columns.participant)?;
    info!(
        usable_rows = usable.num_rows(),
        videos = summary.num_rows(),
        full_rows = full.num_rows(),
        "merged usable records with rapport summary"
    );
    Ok(full)
}
