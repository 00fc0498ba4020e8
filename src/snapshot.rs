//! Relational snapshot source
//!
//! Customer records live in an operational database; ingestion copies a full
//! snapshot of one table per run.

use crate::error::{LakeError, LakeResult};
use crate::table::{Column, ColumnData, DataType, Table, Value};
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{params_from_iter, Connection, OpenFlags};
use std::path::{Path, PathBuf};

/// Source of full-table snapshots
pub trait SnapshotSource: Send + Sync {
    /// Read every row of `table`
    fn read_snapshot(&self, table: &str) -> LakeResult<Table>;
}

/// SQLite database file holding the operational tables
#[derive(Debug, Clone)]
pub struct SqliteSnapshot {
    path: PathBuf,
}

impl SqliteSnapshot {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace `name` with the contents of `table`, creating the database if needed
    pub fn replace_table(&self, name: &str, table: &Table) -> LakeResult<usize> {
        check_identifier(name)?;
        for column in table.columns() {
            check_identifier(&column.name)?;
        }
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir)?;
            }
        }

        let mut conn = Connection::open(&self.path)?;
        let tx = conn.transaction()?;
        tx.execute(&format!("DROP TABLE IF EXISTS \"{}\"", name), [])?;

        let column_defs: Vec<String> = table
            .columns()
            .iter()
            .map(|c| format!("\"{}\" {}", c.name, sql_type(c.data_type())))
            .collect();
        tx.execute(
            &format!("CREATE TABLE \"{}\" ({})", name, column_defs.join(", ")),
            [],
        )?;

        {
            let placeholders = vec!["?"; table.num_columns()].join(", ");
            let mut stmt =
                tx.prepare(&format!("INSERT INTO \"{}\" VALUES ({})", name, placeholders))?;
            for i in 0..table.num_rows() {
                stmt.execute(params_from_iter(table.row(i).into_iter().map(to_sql_value)))?;
            }
        }
        tx.commit()?;

        tracing::info!(
            db = %self.path.display(),
            table = name,
            rows = table.num_rows(),
            "Snapshot table replaced"
        );
        Ok(table.num_rows())
    }

    fn query(&self, name: &str) -> LakeResult<Table> {
        let conn = Connection::open_with_flags(&self.path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
        let mut stmt = conn.prepare(&format!("SELECT * FROM \"{}\"", name))?;
        let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

        let mut values: Vec<Vec<Value>> = vec![Vec::new(); names.len()];
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            for (i, column) in values.iter_mut().enumerate() {
                column.push(from_sql_value(row.get_ref(i)?));
            }
        }

        let columns = names
            .into_iter()
            .zip(values)
            .map(|(name, values)| Column::new(name, ColumnData::from_values(values)))
            .collect();
        Table::new(columns)
    }
}

impl SnapshotSource for SqliteSnapshot {
    fn read_snapshot(&self, table: &str) -> LakeResult<Table> {
        check_identifier(table).map_err(|e| LakeError::SnapshotRead(e.to_string()))?;
        if !self.path.is_file() {
            return Err(LakeError::SnapshotRead(format!(
                "database not found: {}",
                self.path.display()
            )));
        }
        self.query(table).map_err(|e| {
            LakeError::SnapshotRead(format!("{} from {}: {}", table, self.path.display(), e))
        })
    }
}

fn check_identifier(name: &str) -> LakeResult<()> {
    let mut chars = name.chars();
    let valid = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(LakeError::Config(format!("not a valid identifier: {:?}", name)))
    }
}

fn sql_type(data_type: DataType) -> &'static str {
    match data_type {
        DataType::Int64 => "INTEGER",
        DataType::Float64 => "REAL",
        DataType::Utf8 | DataType::Timestamp => "TEXT",
    }
}

fn to_sql_value(value: Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Int(v) => SqlValue::Integer(v),
        Value::Float(v) => SqlValue::Real(v),
        Value::Text(v) => SqlValue::Text(v),
        ts @ Value::Timestamp(_) => SqlValue::Text(ts.to_string()),
    }
}

fn from_sql_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(v) => Value::Int(v),
        ValueRef::Real(v) => Value::Float(v),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            Value::Text(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn customers() -> Table {
        Table::new(vec![
            Column::int("customer_id", vec![Some(1), Some(2)]),
            Column::int("age", vec![Some(30), None]),
            Column::text("job", vec![Some("admin."), Some("unknown")]),
        ])
        .unwrap()
    }

    #[test]
    fn test_replace_then_read_snapshot() {
        let dir = TempDir::new().unwrap();
        let snapshot = SqliteSnapshot::new(dir.path().join("db").join("customer_data.db"));
        snapshot.replace_table("customer_info", &customers()).unwrap();

        let table = snapshot.read_snapshot("customer_info").unwrap();
        assert_eq!(table, customers());
    }

    #[test]
    fn test_replace_drops_previous_rows() {
        let dir = TempDir::new().unwrap();
        let snapshot = SqliteSnapshot::new(dir.path().join("customer_data.db"));
        snapshot.replace_table("customer_info", &customers()).unwrap();

        let smaller = Table::new(vec![Column::int("customer_id", vec![Some(9)])]).unwrap();
        snapshot.replace_table("customer_info", &smaller).unwrap();
        assert_eq!(snapshot.read_snapshot("customer_info").unwrap(), smaller);
    }

    #[test]
    fn test_missing_database_is_snapshot_error() {
        let snapshot = SqliteSnapshot::new("/nonexistent/customer_data.db");
        let result = snapshot.read_snapshot("customer_info");
        assert!(matches!(result, Err(LakeError::SnapshotRead(_))));
    }

    #[test]
    fn test_missing_table_is_snapshot_error() {
        let dir = TempDir::new().unwrap();
        let snapshot = SqliteSnapshot::new(dir.path().join("customer_data.db"));
        snapshot.replace_table("other", &customers()).unwrap();
        let result = snapshot.read_snapshot("customer_info");
        assert!(matches!(result, Err(LakeError::SnapshotRead(_))));
    }

    #[test]
    fn test_rejects_non_identifier_table_names() {
        let dir = TempDir::new().unwrap();
        let snapshot = SqliteSnapshot::new(dir.path().join("customer_data.db"));
        assert!(snapshot.replace_table("x; DROP TABLE y", &customers()).is_err());
        assert!(snapshot.read_snapshot("1abc").is_err());
    }
}
