//! Partitioned storage of the lake
//!
//! Every write fully replaces one partition: the new data file is staged as a
//! temporary file inside the partition directory and renamed into place, other
//! data files are removed, and the manifest is rewritten last. Reads decode
//! with the column types the manifest recorded.

pub mod checksum;
pub mod codec;
pub mod layout;
pub mod manifest;

pub use checksum::FileDigest;
pub use layout::{Dataset, FileFormat, Layer, MANIFEST_FILE, PARTITION_PREFIX};
pub use manifest::{FileEntry, PartitionManifest};

use crate::arrival::ArrivalKey;
use crate::error::{LakeError, LakeResult};
use crate::table::Table;
use std::collections::BTreeMap;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// File-system backed lake rooted at one directory
#[derive(Debug, Clone)]
pub struct PartitionStore {
    root: PathBuf,
}

impl PartitionStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn landing_dir(&self) -> PathBuf {
        layout::layer_dir(&self.root, Layer::Landing)
    }

    pub fn partition_path(&self, layer: Layer, dataset: Dataset, key: &ArrivalKey) -> PathBuf {
        layout::partition_dir(&self.root, layer, dataset, key)
    }

    /// Overwrite a partition with `table`
    pub fn write(
        &self,
        layer: Layer,
        dataset: Dataset,
        key: &ArrivalKey,
        table: &Table,
    ) -> LakeResult<PartitionManifest> {
        self.write_with_metadata(layer, dataset, key, table, BTreeMap::new())
    }

    /// Overwrite a partition and attach `metadata` to its manifest
    pub fn write_with_metadata(
        &self,
        layer: Layer,
        dataset: Dataset,
        key: &ArrivalKey,
        table: &Table,
        metadata: BTreeMap<String, serde_json::Value>,
    ) -> LakeResult<PartitionManifest> {
        if layer == Layer::Landing {
            return Err(LakeError::Storage(
                "landing holds uploaded source files, not partitions".to_string(),
            ));
        }

        let dir = self.partition_path(layer, dataset, key);
        fs::create_dir_all(&dir)?;

        let format = layer.format();
        let file_name = format!("{}.{}", dataset.as_str(), format.extension());
        let target = dir.join(&file_name);

        let tmp = tempfile::Builder::new()
            .prefix(".staging")
            .suffix(&format!(".{}", format.extension()))
            .tempfile_in(&dir)?;
        {
            let mut writer = BufWriter::new(tmp.as_file());
            codec::encode(&mut writer, format, table)?;
            writer.flush()?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(&target)?;

        for stale in data_files(&dir)? {
            if stale != target {
                fs::remove_file(&stale)?;
            }
        }

        let entry = FileEntry {
            name: file_name,
            size_bytes: fs::metadata(&target)?.len(),
            digest: FileDigest::from_file(&target)?,
        };
        let manifest = PartitionManifest::new(
            layer,
            dataset,
            key.clone(),
            &table.schema(),
            table.num_rows(),
            vec![entry],
        )
        .with_metadata(metadata);
        manifest.save(&dir.join(MANIFEST_FILE))?;

        tracing::debug!(
            layer = %layer,
            dataset = %dataset,
            arrival_key = %key,
            rows = table.num_rows(),
            "Partition written"
        );
        Ok(manifest)
    }

    /// Read every data file of a partition as one table
    pub fn read(&self, layer: Layer, dataset: Dataset, key: &ArrivalKey) -> LakeResult<Table> {
        let dir = self.partition_path(layer, dataset, key);
        let files = if dir.is_dir() {
            data_files(&dir)?
        } else {
            Vec::new()
        };
        if files.is_empty() {
            return Err(LakeError::partition_not_found(layer, dataset, key));
        }

        // Files placed by hand without a manifest fall back to type inference
        let manifest_path = dir.join(MANIFEST_FILE);
        let schema = if manifest_path.is_file() {
            Some(PartitionManifest::load(&manifest_path)?.schema())
        } else {
            None
        };
        let tables = files
            .iter()
            .map(|path| match &schema {
                Some(schema) => codec::decode(path, schema),
                None => codec::read_file(path),
            })
            .collect::<LakeResult<Vec<_>>>()?;
        Table::concat(tables)
    }

    /// Read all partitions of a dataset in arrival order
    pub fn read_many(&self, layer: Layer, dataset: Dataset) -> LakeResult<Table> {
        let keys = self.list_partitions(layer, dataset)?;
        let mut tables = Vec::with_capacity(keys.len());
        for key in &keys {
            match self.read(layer, dataset, key) {
                Ok(table) => tables.push(table),
                // A partition directory without data files holds nothing to read
                Err(LakeError::PartitionNotFound { .. }) => continue,
                Err(e) => return Err(e),
            }
        }
        if tables.is_empty() {
            return Err(LakeError::partition_not_found(layer, dataset, "*"));
        }
        Table::concat(tables)
    }

    /// Arrival keys of a dataset's partitions, ascending
    pub fn list_partitions(&self, layer: Layer, dataset: Dataset) -> LakeResult<Vec<ArrivalKey>> {
        let dir = layout::dataset_dir(&self.root, layer, dataset);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut keys = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            if let Some(key) = entry
                .file_name()
                .to_str()
                .and_then(layout::parse_partition_dir_name)
            {
                keys.push(key);
            }
        }
        keys.sort();
        Ok(keys)
    }

    pub fn manifest(
        &self,
        layer: Layer,
        dataset: Dataset,
        key: &ArrivalKey,
    ) -> LakeResult<PartitionManifest> {
        let path = self.partition_path(layer, dataset, key).join(MANIFEST_FILE);
        if !path.is_file() {
            return Err(LakeError::partition_not_found(layer, dataset, key));
        }
        PartitionManifest::load(&path)
    }

    /// Recompute file digests and compare them with the manifest
    pub fn verify(&self, layer: Layer, dataset: Dataset, key: &ArrivalKey) -> LakeResult<bool> {
        let manifest = self.manifest(layer, dataset, key)?;
        let dir = self.partition_path(layer, dataset, key);
        for entry in &manifest.files {
            let path = dir.join(&entry.name);
            if !path.is_file() || !entry.digest.verify(&path)? {
                tracing::warn!(file = %path.display(), "Partition file does not match manifest");
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Overwrite a CSV outside the partition hierarchy
    pub fn write_flat_file(&self, relative_path: impl AsRef<Path>, table: &Table) -> LakeResult<PathBuf> {
        let target = self.root.join(relative_path);
        let dir = target
            .parent()
            .ok_or_else(|| LakeError::Storage(format!("no parent for {}", target.display())))?;
        fs::create_dir_all(dir)?;

        let tmp = tempfile::Builder::new()
            .prefix(".staging")
            .suffix(".csv")
            .tempfile_in(dir)?;
        {
            let mut writer = BufWriter::new(tmp.as_file());
            codec::write_csv(&mut writer, table)?;
            writer.flush()?;
        }
        tmp.persist(&target)?;
        Ok(target)
    }
}

/// Data files of a partition directory sorted by name
fn data_files(dir: &Path) -> LakeResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && FileFormat::from_path(&path).is_some() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{Column, ColumnData, DataType};
    use tempfile::TempDir;

    fn key(raw: &str) -> ArrivalKey {
        ArrivalKey::parse(raw).unwrap()
    }

    fn loans(ids: &[i64]) -> Table {
        Table::new(vec![
            Column::int("customer_id", ids.iter().map(|i| Some(*i)).collect()),
            Column::text(
                "outcome",
                ids.iter().map(|i| Some(if i % 2 == 0 { "yes" } else { "no" })).collect(),
            ),
        ])
        .unwrap()
    }

    #[test]
    fn test_write_then_read_round_trips() {
        let dir = TempDir::new().unwrap();
        let store = PartitionStore::new(dir.path());
        let k = key("20250823");

        store.write(Layer::Raw, Dataset::LoanInfo, &k, &loans(&[1, 2, 3])).unwrap();
        let back = store.read(Layer::Raw, Dataset::LoanInfo, &k).unwrap();
        assert_eq!(back, loans(&[1, 2, 3]));

        let path = store.partition_path(Layer::Raw, Dataset::LoanInfo, &k);
        assert!(path.join("loan_info.csv").is_file());
        assert!(path.join(MANIFEST_FILE).is_file());
    }

    #[test]
    fn test_csv_partition_keeps_recorded_types() {
        let dir = TempDir::new().unwrap();
        let store = PartitionStore::new(dir.path());
        let k = key("20250823");
        let table = Table::new(vec![
            Column::text("account", vec![Some("01234"), Some("2")]),
            Column::int("pdays", vec![None, None]),
            Column::text("note", vec![Some(""), None]),
            Column::float("balance", vec![Some(1.0), Some(-0.25)]),
        ])
        .unwrap();

        store.write(Layer::Cleaned, Dataset::LoanInfo, &k, &table).unwrap();
        let back = store.read(Layer::Cleaned, Dataset::LoanInfo, &k).unwrap();
        assert_eq!(back, table);
        assert_eq!(
            back.column("note").unwrap().data,
            ColumnData::Utf8(vec![Some(String::new()), None])
        );
    }

    #[test]
    fn test_empty_partition_keeps_schema() {
        let dir = TempDir::new().unwrap();
        let store = PartitionStore::new(dir.path());
        let k = key("20250823");
        let schema = vec![
            ("customer_id".to_string(), DataType::Int64),
            ("has_credit".to_string(), DataType::Int64),
        ];
        let empty = Table::empty(&schema);

        store.write(Layer::Cleaned, Dataset::LoanInfo, &k, &empty).unwrap();
        let back = store.read(Layer::Cleaned, Dataset::LoanInfo, &k).unwrap();
        assert_eq!(back.num_rows(), 0);
        assert_eq!(back.schema(), schema);
    }

    #[test]
    fn test_read_rejects_file_not_matching_manifest() {
        let dir = TempDir::new().unwrap();
        let store = PartitionStore::new(dir.path());
        let k = key("20250823");
        store.write(Layer::Raw, Dataset::LoanInfo, &k, &loans(&[1])).unwrap();

        let file = store.partition_path(Layer::Raw, Dataset::LoanInfo, &k).join("loan_info.csv");
        fs::write(&file, "id,y\n1,no\n").unwrap();
        assert!(matches!(
            store.read(Layer::Raw, Dataset::LoanInfo, &k),
            Err(LakeError::SchemaMismatch(_))
        ));
    }

    #[test]
    fn test_overwrite_leaves_no_residual_rows() {
        let dir = TempDir::new().unwrap();
        let store = PartitionStore::new(dir.path());
        let k = key("20250823");

        store.write(Layer::Cleaned, Dataset::LoanInfo, &k, &loans(&[1, 2, 3, 4])).unwrap();
        store.write(Layer::Cleaned, Dataset::LoanInfo, &k, &loans(&[7])).unwrap();

        let back = store.read(Layer::Cleaned, Dataset::LoanInfo, &k).unwrap();
        assert_eq!(back.num_rows(), 1);
        assert_eq!(
            back.column("customer_id").unwrap().data,
            ColumnData::Int64(vec![Some(7)])
        );
    }

    #[test]
    fn test_write_removes_stray_data_files() {
        let dir = TempDir::new().unwrap();
        let store = PartitionStore::new(dir.path());
        let k = key("20250823");
        let path = store.partition_path(Layer::Raw, Dataset::LoanInfo, &k);
        fs::create_dir_all(&path).unwrap();
        fs::write(path.join("part-0001.csv"), "customer_id,outcome\n99,no\n").unwrap();

        store.write(Layer::Raw, Dataset::LoanInfo, &k, &loans(&[1])).unwrap();
        assert!(!path.join("part-0001.csv").exists());
        assert_eq!(store.read(Layer::Raw, Dataset::LoanInfo, &k).unwrap().num_rows(), 1);
    }

    #[test]
    fn test_read_concatenates_files_in_name_order() {
        let dir = TempDir::new().unwrap();
        let store = PartitionStore::new(dir.path());
        let k = key("20250823");
        let path = store.partition_path(Layer::Raw, Dataset::LoanInfo, &k);
        fs::create_dir_all(&path).unwrap();
        fs::write(path.join("b.csv"), "customer_id,outcome\n2,yes\n").unwrap();
        fs::write(path.join("a.csv"), "customer_id,outcome\n1,no\n").unwrap();

        let table = store.read(Layer::Raw, Dataset::LoanInfo, &k).unwrap();
        assert_eq!(
            table.column("customer_id").unwrap().data,
            ColumnData::Int64(vec![Some(1), Some(2)])
        );
    }

    #[test]
    fn test_read_missing_partition() {
        let dir = TempDir::new().unwrap();
        let store = PartitionStore::new(dir.path());
        let result = store.read(Layer::Cleaned, Dataset::CustomerInfo, &key("20250823"));
        assert!(matches!(result, Err(LakeError::PartitionNotFound { .. })));
    }

    #[test]
    fn test_new_key_does_not_touch_older_partition() {
        let dir = TempDir::new().unwrap();
        let store = PartitionStore::new(dir.path());
        let old = key("20250822");
        let new = key("20250823");

        store.write(Layer::Raw, Dataset::LoanInfo, &old, &loans(&[1, 2])).unwrap();
        let before = store.manifest(Layer::Raw, Dataset::LoanInfo, &old).unwrap();
        store.write(Layer::Raw, Dataset::LoanInfo, &new, &loans(&[3])).unwrap();

        let after = store.manifest(Layer::Raw, Dataset::LoanInfo, &old).unwrap();
        assert_eq!(before, after);
        assert_eq!(
            store.list_partitions(Layer::Raw, Dataset::LoanInfo).unwrap(),
            vec![old, new]
        );
    }

    #[test]
    fn test_list_partitions_ignores_foreign_dirs() {
        let dir = TempDir::new().unwrap();
        let store = PartitionStore::new(dir.path());
        let k = key("20250823_101500");
        store.write(Layer::Aggregated, Dataset::CustomerLoanInfo, &k, &loans(&[1])).unwrap();
        fs::create_dir_all(
            layout::dataset_dir(dir.path(), Layer::Aggregated, Dataset::CustomerLoanInfo)
                .join("csv_of_last_run"),
        )
        .unwrap();

        let keys = store
            .list_partitions(Layer::Aggregated, Dataset::CustomerLoanInfo)
            .unwrap();
        assert_eq!(keys, vec![k]);
    }

    #[test]
    fn test_read_many_in_arrival_order() {
        let dir = TempDir::new().unwrap();
        let store = PartitionStore::new(dir.path());
        store.write(Layer::Aggregated, Dataset::CustomerLoanInfo, &key("20250824"), &loans(&[2])).unwrap();
        store.write(Layer::Aggregated, Dataset::CustomerLoanInfo, &key("20250823"), &loans(&[1])).unwrap();

        let all = store.read_many(Layer::Aggregated, Dataset::CustomerLoanInfo).unwrap();
        assert_eq!(
            all.column("customer_id").unwrap().data,
            ColumnData::Int64(vec![Some(1), Some(2)])
        );
    }

    #[test]
    fn test_verify_detects_tampering() {
        let dir = TempDir::new().unwrap();
        let store = PartitionStore::new(dir.path());
        let k = key("20250823");
        store.write(Layer::Raw, Dataset::LoanInfo, &k, &loans(&[1, 2])).unwrap();
        assert!(store.verify(Layer::Raw, Dataset::LoanInfo, &k).unwrap());

        let file = store.partition_path(Layer::Raw, Dataset::LoanInfo, &k).join("loan_info.csv");
        fs::write(&file, "customer_id,outcome\n5,yes\n").unwrap();
        assert!(!store.verify(Layer::Raw, Dataset::LoanInfo, &k).unwrap());
    }

    #[test]
    fn test_write_with_metadata_lands_in_manifest() {
        let dir = TempDir::new().unwrap();
        let store = PartitionStore::new(dir.path());
        let k = key("20250823");
        let mut metadata = BTreeMap::new();
        metadata.insert("note".to_string(), serde_json::json!("hello"));

        store
            .write_with_metadata(Layer::Aggregated, Dataset::CustomerLoanInfo, &k, &loans(&[1]), metadata)
            .unwrap();
        let manifest = store.manifest(Layer::Aggregated, Dataset::CustomerLoanInfo, &k).unwrap();
        assert_eq!(manifest.metadata["note"], "hello");
        assert_eq!(manifest.row_count, 1);
        assert_eq!(manifest.format, FileFormat::Parquet);
    }

    #[test]
    fn test_write_flat_file_overwrites() {
        let dir = TempDir::new().unwrap();
        let store = PartitionStore::new(dir.path());
        let rel = "aggregated/csv_of_last_run/customer_loan_info.csv";
        store.write_flat_file(rel, &loans(&[1, 2, 3])).unwrap();
        let path = store.write_flat_file(rel, &loans(&[4])).unwrap();

        let back = codec::read_csv(&path).unwrap();
        assert_eq!(back.num_rows(), 1);
    }

    #[test]
    fn test_landing_is_not_a_partition_layer() {
        let dir = TempDir::new().unwrap();
        let store = PartitionStore::new(dir.path());
        let result = store.write(Layer::Landing, Dataset::LoanInfo, &key("20250823"), &loans(&[1]));
        assert!(result.is_err());
    }
}
