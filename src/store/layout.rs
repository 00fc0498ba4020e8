use crate::arrival::ArrivalKey;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Directory prefix of every partition; consumers parse it, so it never changes
pub const PARTITION_PREFIX: &str = "file_arrival=";

/// Per-partition metadata file
pub const MANIFEST_FILE: &str = "_partition.json";

/// Stage of data maturity, each a separate root under the lake
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layer {
    Landing,
    Raw,
    Cleaned,
    Aggregated,
}

impl Layer {
    pub fn as_str(&self) -> &'static str {
        match self {
            Layer::Landing => "landing",
            Layer::Raw => "raw",
            Layer::Cleaned => "cleaned",
            Layer::Aggregated => "aggregated",
        }
    }

    /// The only layer data may flow into from this one
    pub fn next(&self) -> Option<Layer> {
        match self {
            Layer::Landing => Some(Layer::Raw),
            Layer::Raw => Some(Layer::Cleaned),
            Layer::Cleaned => Some(Layer::Aggregated),
            Layer::Aggregated => None,
        }
    }

    /// Storage format of partitions written to this layer
    pub fn format(&self) -> FileFormat {
        match self {
            Layer::Aggregated => FileFormat::Parquet,
            _ => FileFormat::Csv,
        }
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Logical tables moving through the lake
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dataset {
    CustomerInfo,
    LoanInfo,
    CustomerLoanInfo,
}

impl Dataset {
    pub fn as_str(&self) -> &'static str {
        match self {
            Dataset::CustomerInfo => "customer_info",
            Dataset::LoanInfo => "loan_info",
            Dataset::CustomerLoanInfo => "customer_loan_info",
        }
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// On-disk encoding of a data file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    Csv,
    Parquet,
}

impl FileFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            FileFormat::Csv => "csv",
            FileFormat::Parquet => "parquet",
        }
    }

    /// Format of a data file, `None` for anything that is not partition data
    pub fn from_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?;
        if name.starts_with('.') || name.starts_with('_') {
            return None;
        }
        match path.extension()?.to_str()? {
            "csv" => Some(FileFormat::Csv),
            "parquet" => Some(FileFormat::Parquet),
            _ => None,
        }
    }
}

/// Directory name of a partition
pub fn partition_dir_name(key: &ArrivalKey) -> String {
    format!("{}{}", PARTITION_PREFIX, key)
}

/// Arrival key of a partition directory name, `None` if it does not follow the convention
pub fn parse_partition_dir_name(name: &str) -> Option<ArrivalKey> {
    name.strip_prefix(PARTITION_PREFIX)
        .and_then(|raw| ArrivalKey::parse(raw).ok())
}

pub fn layer_dir(root: &Path, layer: Layer) -> PathBuf {
    root.join(layer.as_str())
}

pub fn dataset_dir(root: &Path, layer: Layer, dataset: Dataset) -> PathBuf {
    layer_dir(root, layer).join(dataset.as_str())
}

pub fn partition_dir(root: &Path, layer: Layer, dataset: Dataset, key: &ArrivalKey) -> PathBuf {
    dataset_dir(root, layer, dataset).join(partition_dir_name(key))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layers_flow_forward() {
        assert_eq!(Layer::Landing.next(), Some(Layer::Raw));
        assert_eq!(Layer::Raw.next(), Some(Layer::Cleaned));
        assert_eq!(Layer::Cleaned.next(), Some(Layer::Aggregated));
        assert_eq!(Layer::Aggregated.next(), None);
    }

    #[test]
    fn test_partition_path_layout() {
        let key = ArrivalKey::parse("20250823").unwrap();
        let path = partition_dir(Path::new("/lake"), Layer::Raw, Dataset::LoanInfo, &key);
        assert_eq!(path, PathBuf::from("/lake/raw/loan_info/file_arrival=20250823"));
    }

    #[test]
    fn test_parse_partition_dir_name() {
        let key = parse_partition_dir_name("file_arrival=20250823_101500").unwrap();
        assert_eq!(key.as_str(), "20250823_101500");
        assert!(parse_partition_dir_name("csv_of_last_run").is_none());
        assert!(parse_partition_dir_name("file_arrival=garbage").is_none());
    }

    #[test]
    fn test_file_format_ignores_hidden_and_manifest() {
        assert_eq!(
            FileFormat::from_path(Path::new("a/loan_info.csv")),
            Some(FileFormat::Csv)
        );
        assert_eq!(
            FileFormat::from_path(Path::new("a/x.parquet")),
            Some(FileFormat::Parquet)
        );
        assert_eq!(FileFormat::from_path(Path::new("a/.tmp123.csv")), None);
        assert_eq!(FileFormat::from_path(Path::new("a/_partition.json")), None);
        assert_eq!(FileFormat::from_path(Path::new("a/notes.txt")), None);
    }
}
