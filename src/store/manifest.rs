use super::checksum::FileDigest;
use super::layout::{Dataset, FileFormat, Layer};
use crate::arrival::ArrivalKey;
use crate::error::LakeResult;
use crate::table::DataType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

pub const MANIFEST_VERSION: &str = "1.0";

/// Metadata stored next to the data files of one partition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartitionManifest {
    pub version: String,
    pub layer: Layer,
    pub dataset: Dataset,
    pub arrival_key: ArrivalKey,
    pub format: FileFormat,
    pub row_count: usize,
    pub columns: Vec<ColumnInfo>,
    pub files: Vec<FileEntry>,
    pub written_by: String,
    pub written_at: DateTime<Utc>,

    /// Free-form values attached by the writing stage, e.g. scaling parameters
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: DataType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileEntry {
    pub name: String,
    pub size_bytes: u64,
    pub digest: FileDigest,
}

impl PartitionManifest {
    pub fn new(
        layer: Layer,
        dataset: Dataset,
        arrival_key: ArrivalKey,
        schema: &[(String, DataType)],
        row_count: usize,
        files: Vec<FileEntry>,
    ) -> Self {
        Self {
            version: MANIFEST_VERSION.to_string(),
            layer,
            dataset,
            arrival_key,
            format: layer.format(),
            row_count,
            columns: schema
                .iter()
                .map(|(name, data_type)| ColumnInfo {
                    name: name.clone(),
                    data_type: *data_type,
                })
                .collect(),
            files,
            written_by: writer_host(),
            written_at: Utc::now(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_metadata(mut self, metadata: BTreeMap<String, serde_json::Value>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Column names and types of the stored table
    pub fn schema(&self) -> Vec<(String, DataType)> {
        self.columns
            .iter()
            .map(|c| (c.name.clone(), c.data_type))
            .collect()
    }

    /// Save the manifest, replacing any previous one atomically
    pub fn save(&self, path: &Path) -> LakeResult<()> {
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let json = serde_json::to_vec_pretty(self)?;
        let mut tmp = tempfile::Builder::new()
            .prefix(".manifest")
            .tempfile_in(dir)?;
        tmp.write_all(&json)?;
        tmp.flush()?;
        tmp.persist(path)?;
        Ok(())
    }

    pub fn load(path: &Path) -> LakeResult<Self> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}

fn writer_host() -> String {
    hostname::get()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "unknown".to_string())
}
