use super::Metrics;
use crate::arrival::ArrivalKey;
use crate::error::LakeResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Saved classifier, versioned by the arrival key it was trained on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub algorithm: String,
    pub version: ArrivalKey,
    pub trained_at: DateTime<Utc>,
    /// Feature references in column order of the training matrix
    pub features: Vec<String>,
    pub train_rows: usize,
    pub test_rows: usize,
    pub metrics: Metrics,
    pub parameters: serde_json::Value,
}

impl ModelArtifact {
    /// `<dir>/<algorithm>_<model_name>_<arrival_key>.json`
    pub fn path(dir: &Path, algorithm: &str, model_name: &str, version: &ArrivalKey) -> PathBuf {
        dir.join(format!("{}_{}_{}.json", algorithm, model_name, version))
    }

    pub fn save(&self, dir: &Path, model_name: &str) -> LakeResult<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = Self::path(dir, &self.algorithm, model_name, &self.version);
        std::fs::write(&path, serde_json::to_string_pretty(self)?)?;
        Ok(path)
    }

    pub fn load(path: &Path) -> LakeResult<Self> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_save_uses_versioned_name() {
        let dir = TempDir::new().unwrap();
        let artifact = ModelArtifact {
            algorithm: "LR".to_string(),
            version: ArrivalKey::parse("20250823").unwrap(),
            trained_at: Utc::now(),
            features: vec!["loan_features:age_binned".to_string()],
            train_rows: 8,
            test_rows: 2,
            metrics: Metrics {
                accuracy: 1.0,
                precision: 1.0,
                recall: 1.0,
                f1: 1.0,
                confusion: [[1, 0], [0, 1]],
                support: 2,
            },
            parameters: serde_json::json!({"bias": 0.5}),
        };

        let path = artifact.save(dir.path(), "campaign_model").unwrap();
        assert_eq!(path, dir.path().join("LR_campaign_model_20250823.json"));
        assert_eq!(ModelArtifact::load(&path).unwrap(), artifact);
    }
}
