//! Workbook reader (calamine → Arrow)
//!
//! Column types are inferred per column from the non-empty cells:
//! all integral numbers → `Int64`, all numbers → `Float64`, all booleans →
//! `Boolean`, anything else → `Utf8`. Empty cells become nulls.

use crate::{Error, Result};
use arrow::array::{ArrayRef, BooleanArray, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use calamine::{open_workbook_auto, Data, Reader};
use std::path::Path;
use std::sync::Arc;

static EMPTY_CELL: Data = Data::Empty;

/// Read the first worksheet of a workbook as a table
///
/// # Errors
/// Returns [`Error::StorageError`] if the workbook cannot be opened, has no
/// worksheet or no header row
pub fn read_first_sheet(path: &Path) -> Result<RecordBatch> {
    let mut workbook = open_workbook_auto(path).map_err(|e| {
        Error::StorageError(format!("Failed to open workbook {}: {e}", path.display()))
    })?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| {
            Error::StorageError(format!("Workbook {} has no worksheets", path.display()))
        })?
        .map_err(|e| {
            Error::StorageError(format!("Failed to read worksheet in {}: {e}", path.display()))
        })?;

    let mut rows = range.rows();
    let header = rows.next().ok_or_else(|| {
        Error::StorageError(format!("Worksheet in {} has no header row", path.display()))
    })?;
    let names = header_names(header);

    let body: Vec<&[Data]> = rows
        .filter(|row| row.iter().any(|cell| !matches!(cell, Data::Empty)))
        .collect();

    let mut fields = Vec::with_capacity(names.len());
    let mut columns = Vec::with_capacity(names.len());
    for (index, name) in names.iter().enumerate() {
        let cells: Vec<&Data> = body
            .iter()
            .map(|row| row.get(index).unwrap_or(&EMPTY_CELL))
            .collect();
        let (data_type, array) = build_column(&cells);
        fields.push(Field::new(name, data_type, true));
        columns.push(array);
    }

    Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)?)
}

/// Header cells as unique column names
///
/// Blank headers become `Unnamed: <index>`; repeated names get `.1`, `.2`, ...
fn header_names(header: &[Data]) -> Vec<String> {
    let mut names: Vec<String> = Vec::with_capacity(header.len());
    for (index, cell) in header.iter().enumerate() {
        let base = match cell {
            Data::Empty => format!("Unnamed: {index}"),
            other => other.to_string().trim().to_string(),
        };
        let mut name = base.clone();
        let mut suffix = 1;
        while names.contains(&name) {
            name = format!("{base}.{suffix}");
            suffix += 1;
        }
        names.push(name);
    }
    names
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CellKind {
    Integer,
    Float,
    Boolean,
    Text,
}

#[allow(clippy::cast_precision_loss)]
fn build_column(cells: &[&Data]) -> (DataType, ArrayRef) {
    let kind = cells
        .iter()
        .filter_map(|cell| cell_kind(cell))
        .reduce(|acc, next| match (acc, next) {
            (a, b) if a == b => a,
            (CellKind::Integer, CellKind::Float) | (CellKind::Float, CellKind::Integer) => {
                CellKind::Float
            }
            _ => CellKind::Text,
        })
        .unwrap_or(CellKind::Text);

    match kind {
        CellKind::Integer => {
            let values: Int64Array = cells.iter().map(|cell| integral_value(cell)).collect();
            (DataType::Int64, Arc::new(values))
        }
        CellKind::Float => {
            let values: Float64Array = cells
                .iter()
                .map(|cell| match cell {
                    Data::Int(v) => Some(*v as f64),
                    Data::Float(v) => Some(*v),
                    _ => None,
                })
                .collect();
            (DataType::Float64, Arc::new(values))
        }
        CellKind::Boolean => {
            let values: BooleanArray = cells
                .iter()
                .map(|cell| match cell {
                    Data::Bool(b) => Some(*b),
                    _ => None,
                })
                .collect();
            (DataType::Boolean, Arc::new(values))
        }
        CellKind::Text => {
            let values: StringArray = cells
                .iter()
                .map(|cell| match cell {
                    Data::Empty => None,
                    other => Some(other.to_string()),
                })
                .collect();
            (DataType::Utf8, Arc::new(values))
        }
    }
}

fn cell_kind(cell: &Data) -> Option<CellKind> {
    match cell {
        Data::Empty => None,
        Data::Int(_) => Some(CellKind::Integer),
        Data::Float(v) if v.fract() == 0.0 && v.abs() < 9.0e15 => Some(CellKind::Integer),
        Data::Float(_) => Some(CellKind::Float),
        Data::Bool(_) => Some(CellKind::Boolean),
        _ => Some(CellKind::Text),
    }
}

#[allow(clippy::cast_possible_truncation)]
fn integral_value(cell: &Data) -> Option<i64> {
    match cell {
        Data::Int(v) => Some(*v),
        Data::Float(v) => Some(*v as i64),
        _ => None,
    }
}
