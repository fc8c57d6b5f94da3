//! Table storage (spreadsheet / CSV / Parquet → Arrow)
//!
//! Loading is the only stage that touches input files. Every source becomes a
//! list of Arrow record batches with all original columns and rows preserved;
//! no cleaning or renaming happens here.
//!
//! Supported formats, chosen by file extension:
//! - `.xlsx`, `.xlsm`, `.xls`, `.ods`: first worksheet, first row is the header
//! - `.csv`: header row, schema inferred from the data
//! - `.parquet`: schema taken from the file

mod spreadsheet;
mod writer;

pub use spreadsheet::read_first_sheet;
pub use writer::{write_parquet, write_workbook, Sheet};

use crate::{Error, Result};
use arrow::compute;
use arrow::record_batch::RecordBatch;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Rows per batch when reading CSV
const CSV_BATCH_ROWS: usize = 8192;

/// Input file format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    /// Excel or OpenDocument workbook
    Spreadsheet,
    /// Comma separated values
    Csv,
    /// Apache Parquet
    Parquet,
}

impl TableFormat {
    /// Detect the format from a file extension
    ///
    /// # Errors
    /// Returns error for unknown or missing extensions
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match ext.as_str() {
            "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => Ok(Self::Spreadsheet),
            "csv" => Ok(Self::Csv),
            "parquet" => Ok(Self::Parquet),
            _ => Err(Error::StorageError(format!(
                "Unsupported table format for {} (expected xlsx, xls, ods, csv or parquet)",
                path.display()
            ))),
        }
    }
}

/// In-memory table made of Arrow record batches
#[derive(Default)]
pub struct StorageEngine {
    batches: Vec<RecordBatch>,
}

impl StorageEngine {
    /// Load a table, picking the reader from the file extension
    ///
    /// # Errors
    /// Returns error if the file is missing, has an unknown extension or
    /// cannot be parsed as a table
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(Error::StorageError(format!(
                "Input table not found: {}",
                path.display()
            )));
        }
        let storage = match TableFormat::from_path(path)? {
            TableFormat::Spreadsheet => Self::load_spreadsheet(path)?,
            TableFormat::Csv => Self::load_csv(path)?,
            TableFormat::Parquet => Self::load_parquet(path)?,
        };
        debug!(
            path = %path.display(),
            rows = storage.num_rows(),
            batches = storage.batches.len(),
            "loaded table"
        );
        Ok(storage)
    }

    /// Load the first worksheet of a workbook
    ///
    /// # Errors
    /// Returns error if the workbook cannot be opened or has no header row
    pub fn load_spreadsheet<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut storage = Self::default();
        storage.push_batch(read_first_sheet(path.as_ref())?)?;
        Ok(storage)
    }

    /// Load a CSV file with a header row
    ///
    /// # Errors
    /// Returns error if file cannot be read or parsed
    pub fn load_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        use arrow::csv::reader::Format;
        use arrow::csv::ReaderBuilder;
        use std::fs::File;
        use std::io::Seek;

        let mut file = File::open(path.as_ref())
            .map_err(|e| Error::StorageError(format!("Failed to open CSV file: {e}")))?;

        let format = Format::default().with_header(true);
        let (schema, _) = format
            .infer_schema(&mut file, None)
            .map_err(|e| Error::StorageError(format!("Failed to infer CSV schema: {e}")))?;
        file.rewind()?;

        let reader = ReaderBuilder::new(Arc::new(schema))
            .with_format(format)
            .with_batch_size(CSV_BATCH_ROWS)
            .build(file)
            .map_err(|e| Error::StorageError(format!("Failed to create CSV reader: {e}")))?;

        let mut storage = Self::default();
        for batch in reader {
            let batch = batch
                .map_err(|e| Error::StorageError(format!("Failed to read CSV batch: {e}")))?;
            storage.push_batch(batch)?;
        }

        Ok(storage)
    }

    /// Load table from Parquet file
    ///
    /// # Errors
    /// Returns error if file cannot be read or parsed
    pub fn load_parquet<P: AsRef<Path>>(path: P) -> Result<Self> {
        use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
        use std::fs::File;

        let file = File::open(path.as_ref()).map_err(|e| {
            Error::StorageError(format!("Failed to open Parquet file: {e}"))
        })?;

        let builder = ParquetRecordBatchReaderBuilder::try_new(file).map_err(|e| {
            Error::StorageError(format!("Failed to parse Parquet file: {e}"))
        })?;

        let reader = builder.build().map_err(|e| {
            Error::StorageError(format!("Failed to create Parquet reader: {e}"))
        })?;

        let mut storage = Self::default();
        for batch in reader {
            let batch = batch.map_err(|e| {
                Error::StorageError(format!("Failed to read record batch: {e}"))
            })?;
            storage.push_batch(batch)?;
        }

        Ok(storage)
    }

    /// Total row count across batches
    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.batches.iter().map(RecordBatch::num_rows).sum()
    }

    /// Add a batch read from the same source; empty batches are skipped
    fn push_batch(&mut self, batch: RecordBatch) -> Result<()> {
        if batch.num_rows() == 0 && !self.batches.is_empty() {
            return Ok(());
        }
        if let Some(first) = self.batches.first() {
            let held = first.schema();
            if held.fields() != batch.schema().fields() {
                let names = |schema: &arrow::datatypes::Schema| {
                    schema
                        .fields()
                        .iter()
                        .map(|f| f.name().as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                };
                return Err(Error::StorageError(format!(
                    "Batch columns [{}] differ from table columns [{}]",
                    names(&batch.schema()),
                    names(&held)
                )));
            }
        }
        self.batches.push(batch);
        Ok(())
    }

    /// Combine all batches into a single table
    ///
    /// # Errors
    /// Returns error if the storage holds no batches
    pub fn into_table(self) -> Result<RecordBatch> {
        let mut batches = self.batches;
        match batches.len() {
            0 => Err(Error::StorageError("No data in storage".to_string())),
            1 => Ok(batches.remove(0)),
            _ => compute::concat_batches(&batches[0].schema(), &batches)
                .map_err(|e| Error::StorageError(format!("Failed to combine batches: {e}"))),
        }
    }
}

/// Load a single table from disk
///
/// # Errors
/// See [`StorageEngine::load`]
pub fn load_table<P: AsRef<Path>>(path: P) -> Result<RecordBatch> {
    StorageEngine::load(path)?.into_table()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::TableExt;
    use arrow::array::{Float64Array, Int32Array, StringArray};
    use arrow::datatypes::{DataType, Field, Schema};

    fn create_test_batch(num_rows: usize) -> RecordBatch {
        let schema = Schema::new(vec![
            Field::new("id", DataType::Int32, false),
            Field::new("value", DataType::Float64, false),
            Field::new("name", DataType::Utf8, false),
        ]);

        let rows = i32::try_from(num_rows).unwrap();
        RecordBatch::try_new(
            Arc::new(schema),
            vec![
                Arc::new(Int32Array::from_iter_values(0..rows)),
                Arc::new(Float64Array::from_iter_values((0..rows).map(f64::from))),
                Arc::new(StringArray::from_iter_values(
                    (0..num_rows).map(|i| format!("name_{i}")),
                )),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_format_detection() {
        assert_eq!(
            TableFormat::from_path(Path::new("a/b.XLSX")).unwrap(),
            TableFormat::Spreadsheet
        );
        assert_eq!(
            TableFormat::from_path(Path::new("ratings.csv")).unwrap(),
            TableFormat::Csv
        );
        assert_eq!(
            TableFormat::from_path(Path::new("full.parquet")).unwrap(),
            TableFormat::Parquet
        );
        assert!(TableFormat::from_path(Path::new("notes.txt")).is_err());
        assert!(TableFormat::from_path(Path::new("no_extension")).is_err());
    }

    #[test]
    fn test_missing_file_is_storage_error() {
        let result = StorageEngine::load("/definitely/not/here.xlsx");
        let err = result.err().unwrap();
        assert!(matches!(err, Error::StorageError(_)));
        assert!(err.to_string().contains("Input table not found"));
    }

    #[test]
    fn test_batches_with_other_columns_are_rejected() {
        let mut storage = StorageEngine::default();
        storage.push_batch(create_test_batch(10)).unwrap();

        let other = RecordBatch::try_new(
            Arc::new(Schema::new(vec![Field::new("x", DataType::Int32, false)])),
            vec![Arc::new(Int32Array::from(vec![1, 2, 3]))],
        )
        .unwrap();

        let err = storage.push_batch(other).unwrap_err();
        assert!(err.to_string().contains("differ from table columns [id, value, name]"));
        assert_eq!(storage.num_rows(), 10);
    }

    #[test]
    fn test_into_table_concatenates() {
        let mut storage = StorageEngine::default();
        storage.push_batch(create_test_batch(3)).unwrap();
        storage.push_batch(create_test_batch(0)).unwrap();
        storage.push_batch(create_test_batch(4)).unwrap();
        assert_eq!(storage.num_rows(), 7);
        assert_eq!(storage.batches.len(), 2);

        let table = storage.into_table().unwrap();
        assert_eq!(table.num_rows(), 7);
        assert_eq!(table.num_columns(), 3);
    }

    #[test]
    fn test_into_table_empty_fails() {
        let err = StorageEngine::default().into_table().unwrap_err();
        assert!(err.to_string().contains("No data in storage"));
    }

    #[test]
    fn test_csv_batches_combine_into_one_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ratings.csv");
        let mut csv = String::from("Video,Slice,Rating\n");
        for i in 0..CSV_BATCH_ROWS + 10 {
            csv.push_str(&format!("V{},{},{}\n", i % 7, i % 5, i % 6 + 1));
        }
        std::fs::write(&path, csv).unwrap();

        let storage = StorageEngine::load(&path).unwrap();
        assert_eq!(storage.batches.len(), 2);
        let table = storage.into_table().unwrap();
        assert_eq!(table.num_rows(), CSV_BATCH_ROWS + 10);
    }

    #[test]
    fn test_csv_load_preserves_rows_and_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("learning.csv");
        std::fs::write(
            &path,
            "Participant,Learning_gain_total,Study_Condition\nP1,5,Fixed\nP2,3,Adaptive\n",
        )
        .unwrap();

        let table = load_table(&path).unwrap();
        assert_eq!(table.num_rows(), 2);
        assert_eq!(table.num_columns(), 3);
        assert_eq!(
            table.numeric_values("Learning_gain_total").unwrap(),
            vec![Some(5.0), Some(3.0)]
        );
    }

    #[test]
    fn test_parquet_round_trip_through_loader() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("full.parquet");
        let batch = create_test_batch(25);
        write_parquet(&path, &batch).unwrap();

        let table = load_table(&path).unwrap();
        assert_eq!(table.num_rows(), 25);
        assert_eq!(table.schema().fields(), batch.schema().fields());
    }
}
