//! In-memory tabular data
//!
//! A [`Table`] is an ordered list of named, typed columns. Every cell is
//! nullable. Stages work on whole columns; rows are addressed by index only for
//! filtering, joining and sampling.

use crate::error::{LakeError, LakeResult};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Logical column type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Int64,
    Float64,
    Utf8,
    Timestamp,
}

impl DataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Int64 => "int64",
            DataType::Float64 => "float64",
            DataType::Utf8 => "utf8",
            DataType::Timestamp => "timestamp",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, DataType::Int64 | DataType::Float64)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single cell value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
    Timestamp(NaiveDateTime),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            Value::Timestamp(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Text(v) => f.write_str(v),
            Value::Timestamp(v) => write!(f, "{}", v.format("%Y-%m-%dT%H:%M:%S")),
        }
    }
}

/// Typed storage for one column
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Int64(Vec<Option<i64>>),
    Float64(Vec<Option<f64>>),
    Utf8(Vec<Option<String>>),
    Timestamp(Vec<Option<NaiveDateTime>>),
}

impl ColumnData {
    /// Empty column of the given type
    pub fn empty(data_type: DataType) -> Self {
        match data_type {
            DataType::Int64 => ColumnData::Int64(Vec::new()),
            DataType::Float64 => ColumnData::Float64(Vec::new()),
            DataType::Utf8 => ColumnData::Utf8(Vec::new()),
            DataType::Timestamp => ColumnData::Timestamp(Vec::new()),
        }
    }

    /// Build a column from loosely typed values, picking the narrowest type
    ///
    /// Integers and floats widen to `Float64`; any text (or a mix that is not
    /// purely numeric) turns the whole column into `Utf8`. An all-null column
    /// is `Utf8`.
    pub fn from_values(values: Vec<Value>) -> Self {
        let mut has_int = false;
        let mut has_float = false;
        let mut has_text = false;
        let mut has_timestamp = false;
        for value in &values {
            match value {
                Value::Null => {}
                Value::Int(_) => has_int = true,
                Value::Float(_) => has_float = true,
                Value::Text(_) => has_text = true,
                Value::Timestamp(_) => has_timestamp = true,
            }
        }

        if !has_text && !has_timestamp && has_int && !has_float {
            ColumnData::Int64(values.iter().map(Value::as_i64).collect())
        } else if !has_text && !has_timestamp && (has_int || has_float) {
            ColumnData::Float64(values.iter().map(Value::as_f64).collect())
        } else if has_timestamp && !has_text && !has_int && !has_float {
            ColumnData::Timestamp(
                values
                    .iter()
                    .map(|v| match v {
                        Value::Timestamp(ts) => Some(*ts),
                        _ => None,
                    })
                    .collect(),
            )
        } else {
            ColumnData::Utf8(
                values
                    .into_iter()
                    .map(|v| match v {
                        Value::Null => None,
                        Value::Text(s) => Some(s),
                        other => Some(other.to_string()),
                    })
                    .collect(),
            )
        }
    }

    pub fn data_type(&self) -> DataType {
        match self {
            ColumnData::Int64(_) => DataType::Int64,
            ColumnData::Float64(_) => DataType::Float64,
            ColumnData::Utf8(_) => DataType::Utf8,
            ColumnData::Timestamp(_) => DataType::Timestamp,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ColumnData::Int64(v) => v.len(),
            ColumnData::Float64(v) => v.len(),
            ColumnData::Utf8(v) => v.len(),
            ColumnData::Timestamp(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn null_count(&self) -> usize {
        match self {
            ColumnData::Int64(v) => v.iter().filter(|x| x.is_none()).count(),
            ColumnData::Float64(v) => v.iter().filter(|x| x.is_none()).count(),
            ColumnData::Utf8(v) => v.iter().filter(|x| x.is_none()).count(),
            ColumnData::Timestamp(v) => v.iter().filter(|x| x.is_none()).count(),
        }
    }

    /// Cell at `index`; `Value::Null` when out of range
    pub fn get(&self, index: usize) -> Value {
        match self {
            ColumnData::Int64(v) => v.get(index).copied().flatten().map_or(Value::Null, Value::Int),
            ColumnData::Float64(v) => v
                .get(index)
                .copied()
                .flatten()
                .map_or(Value::Null, Value::Float),
            ColumnData::Utf8(v) => v
                .get(index)
                .cloned()
                .flatten()
                .map_or(Value::Null, Value::Text),
            ColumnData::Timestamp(v) => v
                .get(index)
                .copied()
                .flatten()
                .map_or(Value::Null, Value::Timestamp),
        }
    }

    /// Numeric view of the column, `None` for non-numeric types
    pub fn to_f64(&self) -> Option<Vec<Option<f64>>> {
        match self {
            ColumnData::Int64(v) => Some(v.iter().map(|x| x.map(|i| i as f64)).collect()),
            ColumnData::Float64(v) => Some(v.clone()),
            _ => None,
        }
    }

    /// Keep the rows whose mask entry is `true`
    pub fn filter(&self, mask: &[bool]) -> Self {
        fn keep<T: Clone>(values: &[T], mask: &[bool]) -> Vec<T> {
            values
                .iter()
                .zip(mask)
                .filter(|(_, keep)| **keep)
                .map(|(v, _)| v.clone())
                .collect()
        }
        match self {
            ColumnData::Int64(v) => ColumnData::Int64(keep(v, mask)),
            ColumnData::Float64(v) => ColumnData::Float64(keep(v, mask)),
            ColumnData::Utf8(v) => ColumnData::Utf8(keep(v, mask)),
            ColumnData::Timestamp(v) => ColumnData::Timestamp(keep(v, mask)),
        }
    }

    /// Gather rows by index; out-of-range indices become nulls
    pub fn take(&self, indices: &[usize]) -> Self {
        fn gather<T: Clone>(values: &[Option<T>], indices: &[usize]) -> Vec<Option<T>> {
            indices
                .iter()
                .map(|&i| values.get(i).cloned().flatten())
                .collect()
        }
        match self {
            ColumnData::Int64(v) => ColumnData::Int64(gather(v, indices)),
            ColumnData::Float64(v) => ColumnData::Float64(gather(v, indices)),
            ColumnData::Utf8(v) => ColumnData::Utf8(gather(v, indices)),
            ColumnData::Timestamp(v) => ColumnData::Timestamp(gather(v, indices)),
        }
    }

    /// Append `other`, widening `Int64` + `Float64` to `Float64`
    pub fn append(self, other: ColumnData) -> LakeResult<Self> {
        match (self, other) {
            (ColumnData::Int64(mut a), ColumnData::Int64(b)) => {
                a.extend(b);
                Ok(ColumnData::Int64(a))
            }
            (ColumnData::Float64(mut a), ColumnData::Float64(b)) => {
                a.extend(b);
                Ok(ColumnData::Float64(a))
            }
            (ColumnData::Utf8(mut a), ColumnData::Utf8(b)) => {
                a.extend(b);
                Ok(ColumnData::Utf8(a))
            }
            (ColumnData::Timestamp(mut a), ColumnData::Timestamp(b)) => {
                a.extend(b);
                Ok(ColumnData::Timestamp(a))
            }
            (a @ ColumnData::Int64(_), b @ ColumnData::Float64(_))
            | (a @ ColumnData::Float64(_), b @ ColumnData::Int64(_)) => {
                let mut values = a.to_f64().unwrap_or_default();
                values.extend(b.to_f64().unwrap_or_default());
                Ok(ColumnData::Float64(values))
            }
            (a, b) => Err(LakeError::SchemaMismatch(format!(
                "cannot append {} column to {} column",
                b.data_type(),
                a.data_type()
            ))),
        }
    }
}

/// A named column
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub data: ColumnData,
}

impl Column {
    pub fn new(name: impl Into<String>, data: ColumnData) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }

    pub fn int(name: impl Into<String>, values: Vec<Option<i64>>) -> Self {
        Self::new(name, ColumnData::Int64(values))
    }

    pub fn float(name: impl Into<String>, values: Vec<Option<f64>>) -> Self {
        Self::new(name, ColumnData::Float64(values))
    }

    pub fn text<S: Into<String>>(name: impl Into<String>, values: Vec<Option<S>>) -> Self {
        Self::new(
            name,
            ColumnData::Utf8(values.into_iter().map(|v| v.map(Into::into)).collect()),
        )
    }

    pub fn timestamp(name: impl Into<String>, values: Vec<Option<NaiveDateTime>>) -> Self {
        Self::new(name, ColumnData::Timestamp(values))
    }

    pub fn data_type(&self) -> DataType {
        self.data.data_type()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Ordered collection of equally long columns with unique names
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    columns: Vec<Column>,
}

impl Table {
    /// Create a table, checking column lengths and name uniqueness
    pub fn new(columns: Vec<Column>) -> LakeResult<Self> {
        let mut seen = HashSet::new();
        for column in &columns {
            if !seen.insert(column.name.as_str()) {
                return Err(LakeError::SchemaMismatch(format!(
                    "duplicate column name: {}",
                    column.name
                )));
            }
        }
        if let Some(first) = columns.first() {
            let rows = first.len();
            if let Some(bad) = columns.iter().find(|c| c.len() != rows) {
                return Err(LakeError::SchemaMismatch(format!(
                    "column '{}' has {} rows, expected {}",
                    bad.name,
                    bad.len(),
                    rows
                )));
            }
        }
        Ok(Self { columns })
    }

    /// Zero-row table with the given schema
    pub fn empty(schema: &[(String, DataType)]) -> Self {
        Self {
            columns: schema
                .iter()
                .map(|(name, data_type)| Column::new(name.clone(), ColumnData::empty(*data_type)))
                .collect(),
        }
    }

    pub fn num_rows(&self) -> usize {
        self.columns.first().map_or(0, Column::len)
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn into_columns(self) -> Vec<Column> {
        self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn schema(&self) -> Vec<(String, DataType)> {
        self.columns
            .iter()
            .map(|c| (c.name.clone(), c.data_type()))
            .collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    pub fn column(&self, name: &str) -> LakeResult<&Column> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| LakeError::SchemaMismatch(format!("missing column: {}", name)))
    }

    /// Append a column at the end
    pub fn push_column(&mut self, column: Column) -> LakeResult<()> {
        if self.has_column(&column.name) {
            return Err(LakeError::SchemaMismatch(format!(
                "duplicate column name: {}",
                column.name
            )));
        }
        if !self.columns.is_empty() && column.len() != self.num_rows() {
            return Err(LakeError::SchemaMismatch(format!(
                "column '{}' has {} rows, expected {}",
                column.name,
                column.len(),
                self.num_rows()
            )));
        }
        self.columns.push(column);
        Ok(())
    }

    /// Replace the data of an existing column, keeping its position
    pub fn replace_column(&mut self, name: &str, data: ColumnData) -> LakeResult<()> {
        let rows = self.num_rows();
        if data.len() != rows {
            return Err(LakeError::SchemaMismatch(format!(
                "replacement for '{}' has {} rows, expected {}",
                name,
                data.len(),
                rows
            )));
        }
        let column = self
            .columns
            .iter_mut()
            .find(|c| c.name == name)
            .ok_or_else(|| LakeError::SchemaMismatch(format!("missing column: {}", name)))?;
        column.data = data;
        Ok(())
    }

    /// Drop the named columns; every name must exist
    pub fn drop_columns<S: AsRef<str>>(&mut self, names: &[S]) -> LakeResult<()> {
        for name in names {
            if !self.has_column(name.as_ref()) {
                return Err(LakeError::SchemaMismatch(format!(
                    "cannot drop missing column: {}",
                    name.as_ref()
                )));
            }
        }
        self.columns
            .retain(|c| !names.iter().any(|n| n.as_ref() == c.name));
        Ok(())
    }

    /// Positional rename of every column
    pub fn rename_all<S: AsRef<str>>(&mut self, names: &[S]) -> LakeResult<()> {
        if names.len() != self.columns.len() {
            return Err(LakeError::SchemaMismatch(format!(
                "expected {} columns, found {} ({})",
                names.len(),
                self.columns.len(),
                self.column_names().join(",")
            )));
        }
        let unique: HashSet<&str> = names.iter().map(AsRef::as_ref).collect();
        if unique.len() != names.len() {
            return Err(LakeError::SchemaMismatch(
                "rename target contains duplicate names".to_string(),
            ));
        }
        for (column, name) in self.columns.iter_mut().zip(names) {
            column.name = name.as_ref().to_string();
        }
        Ok(())
    }

    /// Keep the rows whose mask entry is `true`
    pub fn filter(&self, mask: &[bool]) -> Table {
        Table {
            columns: self
                .columns
                .iter()
                .map(|c| Column::new(c.name.clone(), c.data.filter(mask)))
                .collect(),
        }
    }

    /// Gather rows by index (repeats allowed)
    pub fn take(&self, indices: &[usize]) -> Table {
        Table {
            columns: self
                .columns
                .iter()
                .map(|c| Column::new(c.name.clone(), c.data.take(indices)))
                .collect(),
        }
    }

    /// Cells of one row in column order
    pub fn row(&self, index: usize) -> Vec<Value> {
        self.columns.iter().map(|c| c.data.get(index)).collect()
    }

    /// Row-wise concatenation; column names must match in order
    pub fn concat(tables: Vec<Table>) -> LakeResult<Table> {
        let mut iter = tables.into_iter();
        let Some(first) = iter.next() else {
            return Ok(Table::default());
        };
        let mut columns = first.columns;
        for table in iter {
            let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
            if names != table.column_names() {
                return Err(LakeError::SchemaMismatch(format!(
                    "cannot concatenate [{}] with [{}]",
                    names.join(","),
                    table.column_names().join(",")
                )));
            }
            columns = columns
                .into_iter()
                .zip(table.columns)
                .map(|(a, b)| Ok(Column::new(a.name, a.data.append(b.data)?)))
                .collect::<LakeResult<Vec<_>>>()?;
        }
        Ok(Table { columns })
    }
}
