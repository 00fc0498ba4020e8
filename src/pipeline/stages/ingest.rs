use crate::error::{LakeError, LakeResult};
use crate::pipeline::{PipelineContext, PipelineStage};
use crate::snapshot::SnapshotSource;
use crate::store::{codec, Dataset, FileFormat, Layer, PartitionStore};
use crate::table::Table;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const SOURCE: &str = "pipeline::ingest";

/// Stage that copies landed loan files and the customer snapshot into `raw`
///
/// # Context Outputs
/// - `raw_loan_rows` (number) - rows written to `raw/loan_info`
/// - `raw_customer_rows` (number) - rows written to `raw/customer_info`
pub struct IngestStage {
    store: PartitionStore,
    snapshot: Arc<dyn SnapshotSource>,
    snapshot_table: String,
}

impl IngestStage {
    pub fn new(
        store: PartitionStore,
        snapshot: Arc<dyn SnapshotSource>,
        snapshot_table: impl Into<String>,
    ) -> Self {
        Self {
            store,
            snapshot,
            snapshot_table: snapshot_table.into(),
        }
    }
}

/// CSV files directly under `dir`, sorted by name
pub fn landed_files(dir: &Path) -> LakeResult<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && FileFormat::from_path(&path) == Some(FileFormat::Csv) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

impl PipelineStage for IngestStage {
    fn execute(&self, context: &mut PipelineContext) -> LakeResult<()> {
        let key = context.arrival_key().clone();
        let landing = self.store.landing_dir();

        let files = landed_files(&landing)?;
        if files.is_empty() {
            return Err(LakeError::SourceNotFound(format!(
                "no CSV files in {}",
                landing.display()
            )));
        }
        context.logger().info(
            SOURCE,
            &format!("Reading {} landed file(s) from {}", files.len(), landing.display()),
        );
        let loans = Table::concat(
            files
                .iter()
                .map(|f| codec::read_csv(f))
                .collect::<LakeResult<Vec<_>>>()?,
        )?;
        let customers = self.snapshot.read_snapshot(&self.snapshot_table)?;

        // Both sources are read before either raw partition is written
        self.store.write(Layer::Raw, Dataset::LoanInfo, &key, &loans)?;
        self.store
            .write(Layer::Raw, Dataset::CustomerInfo, &key, &customers)?;

        context.logger().info(
            SOURCE,
            &format!(
                "Ingested {} loan row(s) and {} customer row(s) for {}",
                loans.num_rows(),
                customers.num_rows(),
                key
            ),
        );
        context.set_number("raw_loan_rows", loans.num_rows() as f64);
        context.set_number("raw_customer_rows", customers.num_rows() as f64);
        Ok(())
    }

    fn name(&self) -> &str {
        "ingest"
    }

    fn input_layer(&self) -> Option<Layer> {
        Some(Layer::Landing)
    }

    fn output_layer(&self) -> Option<Layer> {
        Some(Layer::Raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arrival::ArrivalKey;
    use crate::logger::RunLogger;
    use crate::snapshot::SqliteSnapshot;
    use crate::table::Column;
    use tempfile::TempDir;

    fn customers() -> Table {
        Table::new(vec![
            Column::int("customer_id", vec![Some(1), Some(2)]),
            Column::int("age", vec![Some(30), Some(41)]),
        ])
        .unwrap()
    }

    #[test]
    fn test_ingest_writes_both_raw_partitions() {
        let dir = TempDir::new().unwrap();
        let store = PartitionStore::new(dir.path().join("lake"));
        std::fs::create_dir_all(store.landing_dir()).unwrap();
        std::fs::write(store.landing_dir().join("a.csv"), "customer_id,balance\n1,10\n").unwrap();
        std::fs::write(store.landing_dir().join("b.csv"), "customer_id,balance\n2,20\n").unwrap();
        std::fs::write(store.landing_dir().join("notes.txt"), "ignored").unwrap();

        let snapshot = SqliteSnapshot::new(dir.path().join("db.sqlite"));
        snapshot.replace_table("customer_info", &customers()).unwrap();

        let stage = IngestStage::new(store.clone(), Arc::new(snapshot), "customer_info");
        let key = ArrivalKey::parse("20250823").unwrap();
        let mut context = PipelineContext::new(key.clone(), RunLogger::new("test"));
        stage.execute(&mut context).unwrap();

        let loans = store.read(Layer::Raw, Dataset::LoanInfo, &key).unwrap();
        assert_eq!(loans.num_rows(), 2);
        let raw_customers = store.read(Layer::Raw, Dataset::CustomerInfo, &key).unwrap();
        assert_eq!(raw_customers.num_rows(), 2);
        assert_eq!(context.get_number("raw_loan_rows").unwrap(), 2.0);
    }

    #[test]
    fn test_ingest_without_landed_files() {
        let dir = TempDir::new().unwrap();
        let store = PartitionStore::new(dir.path());
        let snapshot = SqliteSnapshot::new(dir.path().join("db.sqlite"));
        let stage = IngestStage::new(store, Arc::new(snapshot), "customer_info");

        let mut context =
            PipelineContext::new(ArrivalKey::parse("20250823").unwrap(), RunLogger::new("test"));
        assert!(matches!(
            stage.execute(&mut context),
            Err(LakeError::SourceNotFound(_))
        ));
    }

    #[test]
    fn test_ingest_missing_snapshot_table() {
        let dir = TempDir::new().unwrap();
        let store = PartitionStore::new(dir.path());
        std::fs::create_dir_all(store.landing_dir()).unwrap();
        std::fs::write(store.landing_dir().join("a.csv"), "customer_id\n1\n").unwrap();

        let snapshot = SqliteSnapshot::new(dir.path().join("db.sqlite"));
        snapshot.replace_table("other", &customers()).unwrap();
        let stage = IngestStage::new(store.clone(), Arc::new(snapshot), "customer_info");

        let key = ArrivalKey::parse("20250823").unwrap();
        let mut context = PipelineContext::new(key.clone(), RunLogger::new("test"));
        assert!(matches!(
            stage.execute(&mut context),
            Err(LakeError::SnapshotRead(_))
        ));

        // Nothing of the failed run is published
        assert!(!store.partition_path(Layer::Raw, Dataset::LoanInfo, &key).exists());
        assert!(!store.partition_path(Layer::Raw, Dataset::CustomerInfo, &key).exists());
    }
}
