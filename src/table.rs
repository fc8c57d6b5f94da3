//! Column access helpers for record batches
//!
//! Every stage addresses columns by name. These helpers turn a missing column
//! into [`Error::ColumnNotFound`] and a non-numeric value in a numeric column
//! into [`Error::SchemaError`] at the point of use.

use crate::{Error, Result};
use arrow::array::{
    Array, ArrayRef, BooleanArray, Float32Array, Float64Array, Int16Array, Int32Array,
    Int64Array, Int8Array, LargeStringArray, RecordBatch, StringArray, UInt16Array,
    UInt32Array, UInt64Array, UInt8Array,
};
use arrow::compute;
use arrow::datatypes::DataType;
use arrow::util::display::{ArrayFormatter, FormatOptions};
use rustc_hash::FxHashMap;

/// Name-based column access on record batches
pub trait TableExt {
    /// Position of a column in the schema
    ///
    /// # Errors
    /// Returns [`Error::ColumnNotFound`] if no field has this name
    fn column_position(&self, name: &str) -> Result<usize>;

    /// Column array by name
    ///
    /// # Errors
    /// Returns [`Error::ColumnNotFound`] if no field has this name
    fn column_named(&self, name: &str) -> Result<&ArrayRef>;

    /// Column values as text (`None` for nulls)
    ///
    /// Integral floats render without a fractional part so keys read from
    /// different formats compare equal.
    ///
    /// # Errors
    /// Returns error if the column is missing or cannot be formatted
    fn text_values(&self, name: &str) -> Result<Vec<Option<String>>>;

    /// Column values as `f64` (`None` for nulls and empty strings)
    ///
    /// # Errors
    /// Returns error if the column is missing or holds non-numeric data
    fn numeric_values(&self, name: &str) -> Result<Vec<Option<f64>>>;

    /// Copy of the batch without the named column
    ///
    /// # Errors
    /// Returns error if the column is missing
    fn drop_column(&self, name: &str) -> Result<RecordBatch>;

    /// Rows whose column text equals `value`
    ///
    /// # Errors
    /// Returns error if the column is missing
    fn filter_equals(&self, name: &str, value: &str) -> Result<RecordBatch>;

    /// First `n` rows
    fn head(&self, n: usize) -> RecordBatch;
}

impl TableExt for RecordBatch {
    fn column_position(&self, name: &str) -> Result<usize> {
        let schema = self.schema();
        schema
            .fields()
            .iter()
            .position(|f| f.name() == name)
            .ok_or_else(|| Error::ColumnNotFound {
                column: name.to_string(),
                available: schema
                    .fields()
                    .iter()
                    .map(|f| f.name().as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            })
    }

    fn column_named(&self, name: &str) -> Result<&ArrayRef> {
        let index = self.column_position(name)?;
        Ok(self.column(index))
    }

    fn text_values(&self, name: &str) -> Result<Vec<Option<String>>> {
        array_text_values(self.column_named(name)?)
    }

    fn numeric_values(&self, name: &str) -> Result<Vec<Option<f64>>> {
        array_numeric_values(self.column_named(name)?).map_err(|e| match e {
            Error::SchemaError(msg) => Error::SchemaError(format!("Column {name}: {msg}")),
            other => other,
        })
    }

    fn drop_column(&self, name: &str) -> Result<RecordBatch> {
        let index = self.column_position(name)?;
        let mut batch = self.clone();
        batch.remove_column(index);
        Ok(batch)
    }

    fn filter_equals(&self, name: &str, value: &str) -> Result<RecordBatch> {
        let mask: BooleanArray = self
            .text_values(name)?
            .into_iter()
            .map(|v| Some(v.as_deref() == Some(value)))
            .collect();
        Ok(compute::filter_record_batch(self, &mask)?)
    }

    fn head(&self, n: usize) -> RecordBatch {
        self.slice(0, n.min(self.num_rows()))
    }
}

/// Text rendering of every value in an array (`None` for nulls)
///
/// # Errors
/// Returns error if Arrow has no formatter for the data type
pub fn array_text_values(array: &ArrayRef) -> Result<Vec<Option<String>>> {
    match array.data_type() {
        DataType::Float64 | DataType::Float32 => {
            let values = array_numeric_values(array)?;
            Ok(values.into_iter().map(|v| v.map(format_number)).collect())
        }
        _ => {
            let options = FormatOptions::default();
            let formatter = ArrayFormatter::try_new(array.as_ref(), &options)?;
            Ok((0..array.len())
                .map(|i| {
                    if array.is_null(i) {
                        None
                    } else {
                        Some(formatter.value(i).to_string())
                    }
                })
                .collect())
        }
    }
}

/// Numeric view of an array
///
/// Integer and float arrays convert directly; string arrays are parsed, with
/// blank strings treated as missing.
///
/// # Errors
/// Returns [`Error::SchemaError`] for unparsable strings or non-numeric types
#[allow(clippy::cast_precision_loss)]
pub fn array_numeric_values(array: &ArrayRef) -> Result<Vec<Option<f64>>> {
    macro_rules! convert {
        ($ty:ty) => {{
            let typed = array.as_any().downcast_ref::<$ty>().ok_or_else(|| {
                Error::Other(format!("Failed to downcast to {}", stringify!($ty)))
            })?;
            Ok(typed.iter().map(|v| v.map(|x| x as f64)).collect())
        }};
    }

    match array.data_type() {
        DataType::Float64 => convert!(Float64Array),
        DataType::Float32 => convert!(Float32Array),
        DataType::Int64 => convert!(Int64Array),
        DataType::Int32 => convert!(Int32Array),
        DataType::Int16 => convert!(Int16Array),
        DataType::Int8 => convert!(Int8Array),
        DataType::UInt64 => convert!(UInt64Array),
        DataType::UInt32 => convert!(UInt32Array),
        DataType::UInt16 => convert!(UInt16Array),
        DataType::UInt8 => convert!(UInt8Array),
        DataType::Utf8 => {
            let typed = array
                .as_any()
                .downcast_ref::<StringArray>()
                .ok_or_else(|| Error::Other("Failed to downcast to StringArray".to_string()))?;
            typed.iter().map(parse_numeric_text).collect()
        }
        DataType::LargeUtf8 => {
            let typed = array
                .as_any()
                .downcast_ref::<LargeStringArray>()
                .ok_or_else(|| {
                    Error::Other("Failed to downcast to LargeStringArray".to_string())
                })?;
            typed.iter().map(parse_numeric_text).collect()
        }
        DataType::Null => Ok(vec![None; array.len()]),
        dt => Err(Error::SchemaError(format!(
            "Expected numeric data, found {dt:?}"
        ))),
    }
}

fn parse_numeric_text(value: Option<&str>) -> Result<Option<f64>> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(text) => text
            .parse::<f64>()
            .map(Some)
            .map_err(|_| Error::SchemaError(format!("Non-numeric value '{text}'"))),
    }
}

/// Row positions per distinct key, in order of first appearance
///
/// Null keys are skipped.
#[must_use]
pub fn group_positions(keys: &[Option<String>]) -> Vec<(String, Vec<usize>)> {
    let mut slots: FxHashMap<&str, usize> = FxHashMap::default();
    let mut groups: Vec<(String, Vec<usize>)> = Vec::new();
    for (row, key) in keys.iter().enumerate() {
        let Some(key) = key.as_deref() else {
            continue;
        };
        let slot = *slots.entry(key).or_insert_with(|| {
            groups.push((key.to_string(), Vec::new()));
            groups.len() - 1
        });
        groups[slot].1.push(row);
    }
    groups
}

/// Render a number the way keys and labels are compared
#[allow(clippy::cast_possible_truncation)]
#[must_use]
pub fn format_number(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 9.0e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}
