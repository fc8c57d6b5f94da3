//! Table writers (Arrow → xlsx / Parquet)
//!
//! Each call creates or overwrites its file. Workbook metadata carries a fixed
//! creation date rather than the wall clock.

use crate::table::array_text_values;
use crate::{Error, Result};
use arrow::array::{Array, BooleanArray};
use arrow::datatypes::DataType;
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::file::properties::WriterProperties;
use rust_xlsxwriter::{DocProperties, ExcelDateTime, Workbook, Worksheet};
use std::fs::File;
use std::path::Path;

/// Named worksheet to write
#[derive(Debug, Clone, Copy)]
pub struct Sheet<'a> {
    /// Worksheet name
    pub name: &'a str,
    /// Table content (header row + one row per record)
    pub table: &'a RecordBatch,
}

impl<'a> Sheet<'a> {
    /// Pair a sheet name with a table
    #[must_use]
    pub const fn new(name: &'a str, table: &'a RecordBatch) -> Self {
        Self { name, table }
    }
}

/// Write one or more tables into a workbook, one worksheet each
///
/// Null cells are left empty; numeric columns are written as numbers.
///
/// # Errors
/// Returns error if a table is too wide for a worksheet or the file cannot be
/// written
pub fn write_workbook<P: AsRef<Path>>(path: P, sheets: &[Sheet<'_>]) -> Result<()> {
    if sheets.is_empty() {
        return Err(Error::InvalidInput(
            "A workbook needs at least one sheet".to_string(),
        ));
    }

    let mut workbook = Workbook::new();
    let properties =
        DocProperties::new().set_creation_datetime(&ExcelDateTime::from_ymd(2019, 1, 1)?);
    workbook.set_properties(&properties);

    for sheet in sheets {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(sheet.name)?;
        write_table(worksheet, sheet.table)?;
    }

    workbook.save(path.as_ref())?;
    Ok(())
}

fn write_table(worksheet: &mut Worksheet, table: &RecordBatch) -> Result<()> {
    let schema = table.schema();
    for (index, field) in schema.fields().iter().enumerate() {
        let col = u16::try_from(index).map_err(|_| {
            Error::InvalidInput(format!("Table has too many columns ({})", schema.fields().len()))
        })?;
        worksheet.write_string(0, col, field.name())?;

        let array = table.column(index);
        match array.data_type() {
            DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64 => {
                let values = crate::table::array_numeric_values(array)?;
                for (row, value) in values.into_iter().enumerate() {
                    if let Some(v) = value {
                        worksheet.write_number(sheet_row(row)?, col, v)?;
                    }
                }
            }
            DataType::Boolean => {
                let values = array
                    .as_any()
                    .downcast_ref::<BooleanArray>()
                    .ok_or_else(|| {
                        Error::Other("Failed to downcast to BooleanArray".to_string())
                    })?;
                for (row, value) in values.iter().enumerate() {
                    if let Some(v) = value {
                        worksheet.write_boolean(sheet_row(row)?, col, v)?;
                    }
                }
            }
            _ => {
                for (row, value) in array_text_values(array)?.into_iter().enumerate() {
                    if let Some(text) = value {
                        worksheet.write_string(sheet_row(row)?, col, text)?;
                    }
                }
            }
        }
    }
    Ok(())
}

/// Worksheet row for a table row (row 0 holds the header)
fn sheet_row(row: usize) -> Result<u32> {
    u32::try_from(row + 1)
        .map_err(|_| Error::InvalidInput(format!("Table has too many rows ({row})")))
}

/// Write a table to a Parquet file
///
/// # Errors
/// Returns error if the file cannot be created or encoded
pub fn write_parquet<P: AsRef<Path>>(path: P, table: &RecordBatch) -> Result<()> {
    let file = File::create(path.as_ref())?;
    let props = WriterProperties::builder().build();
    let mut writer = ArrowWriter::try_new(file, table.schema(), Some(props))?;
    writer.write(table)?;
    writer.close()?;
    Ok(())
}
