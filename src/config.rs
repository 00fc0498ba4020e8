//! Pipeline configuration
//!
//! Every constant the stages depend on (column names, lookup tables, bin
//! edges, split fractions) lives here so a run can be reproduced from its
//! config alone. Defaults describe the customer/loan campaign data set.

use crate::error::{LakeError, LakeResult};
use crate::feature_store::FeatureView;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Names a JSON file to load instead of the defaults
pub const CONFIG_ENV: &str = "LOANLAKE_CONFIG";
/// Overrides the lake root of whatever config was loaded
pub const ROOT_ENV: &str = "LOANLAKE_ROOT";

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LakeConfig {
    /// Root of the landing/raw/cleaned/aggregated layers
    pub lake_root: PathBuf,

    /// SQLite database holding the customer snapshot table
    pub snapshot_db: PathBuf,
    pub snapshot_table: String,

    pub validation_reports_dir: PathBuf,
    pub models_dir: PathBuf,
    pub feature_repo_dir: PathBuf,
    pub log_dir: PathBuf,

    pub cleaning: CleaningConfig,
    pub features: FeatureConfig,
    pub training: TrainingConfig,
}

impl Default for LakeConfig {
    fn default() -> Self {
        Self {
            lake_root: PathBuf::from("./LocalDataLake"),
            snapshot_db: PathBuf::from("./db/customer_data.db"),
            snapshot_table: "customer_info".to_string(),
            validation_reports_dir: PathBuf::from("./validation_reports"),
            models_dir: PathBuf::from("./models"),
            feature_repo_dir: PathBuf::from("./feature_repo"),
            log_dir: PathBuf::from("./logs"),
            cleaning: CleaningConfig::default(),
            features: FeatureConfig::default(),
            training: TrainingConfig::default(),
        }
    }
}

impl LakeConfig {
    /// Defaults with every path placed under `base`
    pub fn rooted_at(base: impl AsRef<Path>) -> Self {
        let base = base.as_ref();
        Self {
            lake_root: base.join("LocalDataLake"),
            snapshot_db: base.join("db").join("customer_data.db"),
            validation_reports_dir: base.join("validation_reports"),
            models_dir: base.join("models"),
            feature_repo_dir: base.join("feature_repo"),
            log_dir: base.join("logs"),
            ..Self::default()
        }
    }

    /// Load a JSON config; missing fields take their defaults
    pub fn load(path: &Path) -> LakeResult<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            LakeError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config: Self = serde_json::from_str(&json)
            .map_err(|e| LakeError::Config(format!("invalid {}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Resolve the config from the process environment
    pub fn from_env() -> LakeResult<Self> {
        let mut config = match std::env::var_os(CONFIG_ENV) {
            Some(path) if !path.is_empty() => Self::load(Path::new(&path))?,
            _ => Self::default(),
        };
        if let Some(root) = std::env::var_os(ROOT_ENV).filter(|v| !v.is_empty()) {
            config.lake_root = PathBuf::from(root);
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> LakeResult<()> {
        if self.snapshot_table.trim().is_empty() {
            return Err(LakeError::Config("snapshot_table is empty".to_string()));
        }
        self.cleaning.validate()?;
        self.features.validate()?;
        self.training.validate()?;
        Ok(())
    }
}

// ============================================================================
// Cleaning
// ============================================================================

/// Cleaning rules for both datasets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleaningConfig {
    /// Bumped whenever a rule or lookup table changes
    pub version: String,
    pub customer: DatasetCleaning,
    pub loan: DatasetCleaning,
}

impl Default for CleaningConfig {
    fn default() -> Self {
        Self {
            version: "1".to_string(),
            customer: DatasetCleaning::customer(),
            loan: DatasetCleaning::loan(),
        }
    }
}

impl CleaningConfig {
    pub fn validate(&self) -> LakeResult<()> {
        self.customer.validate("customer")?;
        self.loan.validate("loan")
    }
}

/// Rewrite of one exact cell value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueRewrite {
    pub column: String,
    pub from: String,
    pub to: String,
}

/// Fixed lookup from category to integer code
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelEncoding {
    pub column: String,
    pub codes: BTreeMap<String, i64>,
}

impl LabelEncoding {
    fn new(column: &str, codes: &[(&str, i64)]) -> Self {
        Self {
            column: column.to_string(),
            codes: codes.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
        }
    }
}

/// Cleaning steps of one dataset, applied in field order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetCleaning {
    /// Positional column names after normalization
    pub columns: Vec<String>,
    pub unknown_sentinel: String,
    pub unknown_filter_columns: Vec<String>,
    pub rewrites: Vec<ValueRewrite>,
    pub drop_columns: Vec<String>,
    pub outlier_columns: Vec<String>,
    pub outlier_sigmas: f64,
    pub binary_columns: Vec<String>,
    pub label_encodings: Vec<LabelEncoding>,
}

impl Default for DatasetCleaning {
    fn default() -> Self {
        Self {
            columns: Vec::new(),
            unknown_sentinel: "unknown".to_string(),
            unknown_filter_columns: Vec::new(),
            rewrites: Vec::new(),
            drop_columns: Vec::new(),
            outlier_columns: Vec::new(),
            outlier_sigmas: 3.0,
            binary_columns: Vec::new(),
            label_encodings: Vec::new(),
        }
    }
}

impl DatasetCleaning {
    pub fn customer() -> Self {
        Self {
            columns: strings(&[
                "customer_id",
                "age",
                "job_type",
                "marital_status",
                "educational_level",
            ]),
            unknown_filter_columns: strings(&["job_type", "educational_level"]),
            rewrites: vec![ValueRewrite {
                column: "job_type".to_string(),
                from: "admin.".to_string(),
                to: "admin".to_string(),
            }],
            outlier_columns: strings(&["age"]),
            label_encodings: vec![
                LabelEncoding::new(
                    "job_type",
                    &[
                        ("student", 1),
                        ("unemployed", 2),
                        ("housemaid", 3),
                        ("self-employed", 4),
                        ("blue-collar", 5),
                        ("services", 6),
                        ("admin", 7),
                        ("entrepreneur", 8),
                        ("technician", 9),
                        ("management", 10),
                        ("retired", 11),
                    ],
                ),
                LabelEncoding::new(
                    "marital_status",
                    &[("single", 1), ("married", 2), ("divorced", 3)],
                ),
                LabelEncoding::new(
                    "educational_level",
                    &[("primary", 1), ("secondary", 2), ("tertiary", 3)],
                ),
            ],
            ..Self::default()
        }
    }

    pub fn loan() -> Self {
        Self {
            columns: strings(&[
                "customer_id",
                "has_credit",
                "avg_yearly_balance",
                "has_housing_loan",
                "has_personal_loan",
                "contact_communication_type",
                "contacted_day",
                "contacted_month",
                "contacted_duration_sec",
                "total_times_contacted",
                "days_passed_from_last_campaign",
                "total_times_contacted_before_this_campaign",
                "outcome_of_previous_campaign",
                "outcome",
            ]),
            drop_columns: strings(&[
                "days_passed_from_last_campaign",
                "outcome_of_previous_campaign",
                "contact_communication_type",
                "total_times_contacted_before_this_campaign",
            ]),
            outlier_columns: strings(&[
                "avg_yearly_balance",
                "contacted_duration_sec",
                "total_times_contacted",
            ]),
            binary_columns: strings(&[
                "has_credit",
                "has_housing_loan",
                "has_personal_loan",
                "outcome",
            ]),
            ..Self::default()
        }
    }

    fn validate(&self, dataset: &str) -> LakeResult<()> {
        if self.columns.is_empty() {
            return Err(LakeError::Config(format!("{}: column list is empty", dataset)));
        }
        if !(self.outlier_sigmas.is_finite() && self.outlier_sigmas >= 0.0) {
            return Err(LakeError::Config(format!(
                "{}: outlier_sigmas must be a non-negative number",
                dataset
            )));
        }
        Ok(())
    }
}

// ============================================================================
// Feature derivation
// ============================================================================

/// Right-closed binning of one numeric column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinSpec {
    pub column: String,
    pub edges: Vec<f64>,
}

/// Row-wise sum of several columns into a new one
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SumFeature {
    pub name: String,
    pub sources: Vec<String>,
    pub drop_sources: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    pub version: String,
    pub join_key: String,
    pub customer_bins: Vec<BinSpec>,
    pub loan_bins: Vec<BinSpec>,
    pub loan_sums: Vec<SumFeature>,
    /// Loan columns min-max scaled to [0, 1]
    pub scaled_columns: Vec<String>,
    pub event_timestamp_column: String,
    /// Convenience copy of the latest joined table, relative to the lake root
    pub last_run_csv: PathBuf,
    pub feature_view: FeatureView,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            version: "1".to_string(),
            join_key: "customer_id".to_string(),
            customer_bins: vec![BinSpec {
                column: "age".to_string(),
                edges: vec![10.0, 25.0, 35.0, 45.0, 55.0, 65.0, 75.0],
            }],
            loan_bins: vec![BinSpec {
                column: "avg_yearly_balance".to_string(),
                edges: vec![
                    -7000.0, -200.0, 0.0, 200.0, 400.0, 600.0, 800.0, 1200.0, 2500.0, 5000.0,
                    10281.0,
                ],
            }],
            loan_sums: vec![SumFeature {
                name: "credit_commitment".to_string(),
                sources: strings(&["has_credit", "has_housing_loan", "has_personal_loan"]),
                drop_sources: true,
            }],
            scaled_columns: strings(&["contacted_duration_sec"]),
            event_timestamp_column: "event_timestamp".to_string(),
            last_run_csv: PathBuf::from("aggregated/csv_of_last_run/customer_loan_info.csv"),
            feature_view: FeatureView::loan_features(),
        }
    }
}

impl FeatureConfig {
    pub fn validate(&self) -> LakeResult<()> {
        for bins in self.customer_bins.iter().chain(&self.loan_bins) {
            if bins.edges.len() < 2 {
                return Err(LakeError::Config(format!(
                    "bins for {} need at least two edges",
                    bins.column
                )));
            }
            if bins.edges.windows(2).any(|w| !(w[0] < w[1])) {
                return Err(LakeError::Config(format!(
                    "bin edges for {} must be strictly ascending",
                    bins.column
                )));
            }
        }
        if self.join_key.is_empty() {
            return Err(LakeError::Config("join_key is empty".to_string()));
        }
        if self.feature_view.features.is_empty() {
            return Err(LakeError::Config(format!(
                "feature view {} has no features",
                self.feature_view.name
            )));
        }
        Ok(())
    }
}

// ============================================================================
// Training
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub label_column: String,
    /// Feature references, `<view>:<feature>`
    pub features: Vec<String>,
    pub test_fraction: f64,
    pub split_seed: u64,
    pub sample_seed: u64,
    pub knn_neighbors: usize,
    pub learning_rate: f64,
    pub epochs: usize,
    /// Infix of the saved model file name
    pub model_name: String,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            label_column: "outcome".to_string(),
            features: strings(&[
                "loan_features:age_binned",
                "loan_features:job_type_encoded",
                "loan_features:marital_status_encoded",
                "loan_features:educational_level_encoded",
                "loan_features:credit_commitment",
                "loan_features:avg_yearly_balance_binned",
            ]),
            test_fraction: 0.2,
            split_seed: 1234,
            sample_seed: 42,
            knn_neighbors: 5,
            learning_rate: 0.1,
            epochs: 500,
            model_name: "campaign_model".to_string(),
        }
    }
}

impl TrainingConfig {
    pub fn validate(&self) -> LakeResult<()> {
        if !(self.test_fraction > 0.0 && self.test_fraction < 1.0) {
            return Err(LakeError::Config(format!(
                "test_fraction must be in (0, 1), got {}",
                self.test_fraction
            )));
        }
        if self.features.is_empty() {
            return Err(LakeError::Config("no training features configured".to_string()));
        }
        if self.knn_neighbors == 0 {
            return Err(LakeError::Config("knn_neighbors must be positive".to_string()));
        }
        if !(self.learning_rate > 0.0) || self.epochs == 0 {
            return Err(LakeError::Config(
                "learning_rate and epochs must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_is_valid() {
        assert!(LakeConfig::default().validate().is_ok());
    }

    #[test]
    fn test_default_loan_schema_has_fourteen_columns() {
        assert_eq!(DatasetCleaning::loan().columns.len(), 14);
        assert_eq!(DatasetCleaning::customer().columns.len(), 5);
    }

    #[test]
    fn test_rejects_descending_edges() {
        let mut config = FeatureConfig::default();
        config.customer_bins[0].edges = vec![10.0, 5.0];
        assert!(matches!(config.validate(), Err(LakeError::Config(_))));
    }

    #[test]
    fn test_rejects_bad_test_fraction() {
        let mut config = TrainingConfig::default();
        config.test_fraction = 1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("loanlake.json");
        std::fs::write(&path, r#"{"lake_root": "/data/lake", "training": {"epochs": 50}}"#)
            .unwrap();

        let config = LakeConfig::load(&path).unwrap();
        assert_eq!(config.lake_root, PathBuf::from("/data/lake"));
        assert_eq!(config.training.epochs, 50);
        assert_eq!(config.training.split_seed, 1234);
        assert_eq!(config.snapshot_table, "customer_info");
    }

    #[test]
    fn test_load_invalid_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(LakeConfig::load(&path), Err(LakeError::Config(_))));
    }

    #[test]
    fn test_rooted_at_places_paths_under_base() {
        let config = LakeConfig::rooted_at("/tmp/run");
        assert_eq!(config.lake_root, PathBuf::from("/tmp/run/LocalDataLake"));
        assert_eq!(config.models_dir, PathBuf::from("/tmp/run/models"));
    }
}
