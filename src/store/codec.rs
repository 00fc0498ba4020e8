//! CSV and Parquet encoding of [`Table`]s through Arrow record batches

use super::layout::FileFormat;
use crate::error::{LakeError, LakeResult};
use crate::table::{Column, ColumnData, DataType, Table};
use arrow::array::{
    Array, ArrayRef, Float64Array, Int64Array, StringArray, TimestampMicrosecondArray,
};
use arrow::compute::cast;
use arrow::csv::reader::Format;
use arrow::csv::{ReaderBuilder, WriterBuilder};
use arrow::datatypes::{DataType as ArrowType, Field, Schema, TimeUnit};
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use chrono::DateTime;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use regex::Regex;
use std::fs::File;
use std::io::{Seek, Write};
use std::path::Path;
use std::sync::Arc;

const BATCH_SIZE: usize = 8192;

/// Null marker in partition CSV files; an empty field is an empty string
pub const CSV_NULL: &str = "\\N";

/// Decode a data file according to its extension
pub fn read_file(path: &Path) -> LakeResult<Table> {
    match FileFormat::from_path(path) {
        Some(FileFormat::Csv) => read_csv(path),
        Some(FileFormat::Parquet) => read_parquet(path),
        None => Err(LakeError::Codec(format!(
            "not a data file: {}",
            path.display()
        ))),
    }
}

/// Decode a partition data file with the schema its manifest recorded
pub fn decode(path: &Path, schema: &[(String, DataType)]) -> LakeResult<Table> {
    match FileFormat::from_path(path) {
        Some(FileFormat::Csv) => read_partition_csv(path, schema),
        Some(FileFormat::Parquet) => {
            let table = read_parquet(path)?;
            if table.schema() != schema {
                return Err(LakeError::Codec(format!(
                    "{} does not match its manifest schema",
                    path.display()
                )));
            }
            Ok(table)
        }
        None => Err(LakeError::Codec(format!(
            "not a data file: {}",
            path.display()
        ))),
    }
}

/// Encode a partition data file into `writer`
pub fn encode<W: Write + Send>(writer: W, format: FileFormat, table: &Table) -> LakeResult<()> {
    match format {
        FileFormat::Csv => {
            let batch = to_record_batch(table)?;
            let mut writer = WriterBuilder::new()
                .with_header(true)
                .with_null(CSV_NULL.to_string())
                .build(writer);
            writer.write(&batch)?;
            Ok(())
        }
        FileFormat::Parquet => write_parquet(writer, table),
    }
}

/// Read a headered CSV file, inferring column types over the whole file
pub fn read_csv(path: &Path) -> LakeResult<Table> {
    let mut file = File::open(path)?;
    let (schema, _) = Format::default()
        .with_header(true)
        .infer_schema(&mut file, None)?;
    file.rewind()?;

    let schema = Arc::new(schema);
    let reader = ReaderBuilder::new(schema.clone())
        .with_header(true)
        .with_batch_size(BATCH_SIZE)
        .build(file)?;

    let mut tables = Vec::new();
    for batch in reader {
        tables.push(from_record_batch(&batch?)?);
    }
    collect_batches(tables, &schema)
}

/// Read a partition CSV with a known schema; only [`CSV_NULL`] fields are null
pub fn read_partition_csv(path: &Path, schema: &[(String, DataType)]) -> LakeResult<Table> {
    let file = File::open(path)?;
    let header = header_names(path)?;
    let expected: Vec<&str> = schema.iter().map(|(name, _)| name.as_str()).collect();
    if header != expected {
        return Err(LakeError::SchemaMismatch(format!(
            "{} has columns {:?}, manifest records {:?}",
            path.display(),
            header,
            expected
        )));
    }

    let null = Regex::new(&format!("^{}$", regex::escape(CSV_NULL)))
        .map_err(|e| LakeError::Codec(format!("invalid null pattern: {}", e)))?;
    let schema = Arc::new(arrow_schema(schema));
    let reader = ReaderBuilder::new(schema.clone())
        .with_header(true)
        .with_batch_size(BATCH_SIZE)
        .with_null_regex(null)
        .build(file)?;

    let mut tables = Vec::new();
    for batch in reader {
        tables.push(from_record_batch(&batch?)?);
    }
    collect_batches(tables, &schema)
}

fn header_names(path: &Path) -> LakeResult<Vec<String>> {
    let mut file = File::open(path)?;
    let (schema, _) = Format::default()
        .with_header(true)
        .infer_schema(&mut file, Some(0))?;
    Ok(schema.fields().iter().map(|f| f.name().clone()).collect())
}

/// Write a plain headered CSV; nulls become empty fields
pub fn write_csv<W: Write>(writer: W, table: &Table) -> LakeResult<()> {
    let batch = to_record_batch(table)?;
    let mut writer = WriterBuilder::new().with_header(true).build(writer);
    writer.write(&batch)?;
    Ok(())
}

pub fn read_parquet(path: &Path) -> LakeResult<Table> {
    let file = File::open(path)?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
    let schema = builder.schema().clone();
    let reader = builder.with_batch_size(BATCH_SIZE).build()?;

    let mut tables = Vec::new();
    for batch in reader {
        tables.push(from_record_batch(&batch?)?);
    }
    collect_batches(tables, &schema)
}

pub fn write_parquet<W: Write + Send>(writer: W, table: &Table) -> LakeResult<()> {
    let batch = to_record_batch(table)?;
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();
    let mut writer = ArrowWriter::try_new(writer, batch.schema(), Some(props))?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(())
}

fn collect_batches(tables: Vec<Table>, schema: &Schema) -> LakeResult<Table> {
    if tables.is_empty() {
        let columns: Vec<(String, DataType)> = schema
            .fields()
            .iter()
            .map(|f| (f.name().clone(), table_type(f.data_type())))
            .collect();
        return Ok(Table::empty(&columns));
    }
    Table::concat(tables)
}

fn arrow_type(data_type: DataType) -> ArrowType {
    match data_type {
        DataType::Int64 => ArrowType::Int64,
        DataType::Float64 => ArrowType::Float64,
        DataType::Utf8 => ArrowType::Utf8,
        DataType::Timestamp => ArrowType::Timestamp(TimeUnit::Microsecond, None),
    }
}

fn table_type(data_type: &ArrowType) -> DataType {
    match data_type {
        ArrowType::Int8
        | ArrowType::Int16
        | ArrowType::Int32
        | ArrowType::Int64
        | ArrowType::UInt8
        | ArrowType::UInt16
        | ArrowType::UInt32
        | ArrowType::UInt64 => DataType::Int64,
        ArrowType::Float16 | ArrowType::Float32 | ArrowType::Float64 => DataType::Float64,
        ArrowType::Timestamp(_, _) | ArrowType::Date32 | ArrowType::Date64 => DataType::Timestamp,
        _ => DataType::Utf8,
    }
}

fn arrow_schema(schema: &[(String, DataType)]) -> Schema {
    Schema::new(
        schema
            .iter()
            .map(|(name, data_type)| Field::new(name.as_str(), arrow_type(*data_type), true))
            .collect::<Vec<_>>(),
    )
}

pub fn to_record_batch(table: &Table) -> LakeResult<RecordBatch> {
    let arrays: Vec<ArrayRef> = table
        .columns()
        .iter()
        .map(|c| column_to_array(&c.data))
        .collect();

    let options = RecordBatchOptions::new().with_row_count(Some(table.num_rows()));
    Ok(RecordBatch::try_new_with_options(
        Arc::new(arrow_schema(&table.schema())),
        arrays,
        &options,
    )?)
}

pub fn from_record_batch(batch: &RecordBatch) -> LakeResult<Table> {
    let schema = batch.schema();
    let columns = schema
        .fields()
        .iter()
        .zip(batch.columns())
        .map(|(field, array)| Ok(Column::new(field.name().clone(), array_to_column(array)?)))
        .collect::<LakeResult<Vec<_>>>()?;
    Table::new(columns)
}

fn column_to_array(data: &ColumnData) -> ArrayRef {
    match data {
        ColumnData::Int64(v) => Arc::new(Int64Array::from(v.clone())),
        ColumnData::Float64(v) => Arc::new(Float64Array::from(v.clone())),
        ColumnData::Utf8(v) => Arc::new(StringArray::from(v.clone())),
        ColumnData::Timestamp(v) => Arc::new(TimestampMicrosecondArray::from(
            v.iter()
                .map(|ts| ts.map(|ts| ts.and_utc().timestamp_micros()))
                .collect::<Vec<_>>(),
        )),
    }
}

fn array_to_column(array: &ArrayRef) -> LakeResult<ColumnData> {
    let target = table_type(array.data_type());
    let casted = cast(array, &arrow_type(target))?;
    let data = match target {
        DataType::Int64 => ColumnData::Int64(downcast::<Int64Array>(&casted)?.iter().collect()),
        DataType::Float64 => {
            ColumnData::Float64(downcast::<Float64Array>(&casted)?.iter().collect())
        }
        DataType::Utf8 => ColumnData::Utf8(
            downcast::<StringArray>(&casted)?
                .iter()
                .map(|v| v.map(str::to_string))
                .collect(),
        ),
        DataType::Timestamp => ColumnData::Timestamp(
            downcast::<TimestampMicrosecondArray>(&casted)?
                .iter()
                .map(|v| v.and_then(DateTime::from_timestamp_micros).map(|dt| dt.naive_utc()))
                .collect(),
        ),
    };
    Ok(data)
}

fn downcast<T: 'static>(array: &ArrayRef) -> LakeResult<&T> {
    array
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| LakeError::Codec(format!("unexpected array type {}", array.data_type())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::io::Write as _;
    use tempfile::TempDir;

    fn sample() -> Table {
        let ts = NaiveDate::from_ymd_opt(2025, 8, 23)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        Table::new(vec![
            Column::int("customer_id", vec![Some(1), Some(2), None]),
            Column::float("scaled", vec![Some(0.0), None, Some(1.0)]),
            Column::text("job_type", vec![Some("admin"), Some("student"), None]),
            Column::timestamp("event_timestamp", vec![Some(ts), Some(ts), Some(ts)]),
        ])
        .unwrap()
    }

    #[test]
    fn test_parquet_preserves_types_and_nulls() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("t.parquet");
        write_parquet(File::create(&path).unwrap(), &sample()).unwrap();

        let back = read_parquet(&path).unwrap();
        assert_eq!(back, sample());
    }

    #[test]
    fn test_csv_infers_types() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("loan.csv");
        let mut file = File::create(&path).unwrap();
        writeln!(file, "id,balance,y").unwrap();
        writeln!(file, "1,2143,no").unwrap();
        writeln!(file, "2,-29,yes").unwrap();
        drop(file);

        let table = read_csv(&path).unwrap();
        assert_eq!(table.num_rows(), 2);
        assert_eq!(table.column("id").unwrap().data_type(), DataType::Int64);
        assert_eq!(table.column("balance").unwrap().data_type(), DataType::Int64);
        assert_eq!(table.column("y").unwrap().data_type(), DataType::Utf8);
    }

    #[test]
    fn test_csv_header_only_keeps_columns() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.csv");
        std::fs::write(&path, "id,age\n").unwrap();

        let table = read_csv(&path).unwrap();
        assert_eq!(table.num_rows(), 0);
        assert_eq!(table.column_names(), vec!["id", "age"]);
    }

    #[test]
    fn test_read_file_rejects_unknown_extension() {
        let result = read_file(Path::new("/tmp/whatever.txt"));
        assert!(matches!(result, Err(LakeError::Codec(_))));
    }
}
