//! Feature store
//!
//! Feature views describe which columns of the aggregated layer are served as
//! features for an entity. Retrieval is point-in-time correct: a historical
//! request for `(key, ts)` only ever sees rows stamped at or before `ts`.

pub mod local;

pub use local::LocalFeatureStore;

use crate::error::{LakeError, LakeResult};
use crate::table::{DataType, Table};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One served feature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureField {
    pub name: String,
    pub dtype: DataType,
    #[serde(default)]
    pub description: String,
}

impl FeatureField {
    fn new(name: &str, dtype: DataType, description: &str) -> Self {
        Self {
            name: name.to_string(),
            dtype,
            description: description.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureView {
    pub name: String,
    /// Entity key column
    pub entity: String,
    pub timestamp_field: String,
    /// Rows older than this relative to the request time are not served
    pub ttl_days: i64,
    pub features: Vec<FeatureField>,
}

impl FeatureView {
    /// Features served for campaign modelling
    pub fn loan_features() -> Self {
        Self {
            name: "loan_features".to_string(),
            entity: "customer_id".to_string(),
            timestamp_field: "event_timestamp".to_string(),
            ttl_days: 365,
            features: vec![
                FeatureField::new("age", DataType::Int64, "Customer age"),
                FeatureField::new("job_type_encoded", DataType::Int64, "Encoded job type"),
                FeatureField::new("marital_status_encoded", DataType::Int64, "Encoded marital status"),
                FeatureField::new(
                    "educational_level_encoded",
                    DataType::Int64,
                    "Encoded education level",
                ),
                FeatureField::new("age_binned", DataType::Float64, "Binned age category"),
                FeatureField::new(
                    "avg_yearly_balance",
                    DataType::Int64,
                    "Average yearly account balance",
                ),
                FeatureField::new("contacted_day", DataType::Int64, "Day of last contact"),
                FeatureField::new("contacted_month", DataType::Utf8, "Month of last contact"),
                FeatureField::new(
                    "contacted_duration_sec",
                    DataType::Float64,
                    "Scaled duration of last contact",
                ),
                FeatureField::new("total_times_contacted", DataType::Int64, "Total times contacted"),
                FeatureField::new(
                    "credit_commitment",
                    DataType::Int64,
                    "Number of credit products held",
                ),
                FeatureField::new(
                    "avg_yearly_balance_binned",
                    DataType::Float64,
                    "Binned average yearly balance",
                ),
            ],
        }
    }

    pub fn feature(&self, name: &str) -> Option<&FeatureField> {
        self.features.iter().find(|f| f.name == name)
    }
}

/// Parsed `<view>:<feature>` reference
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FeatureRef {
    pub view: String,
    pub feature: String,
}

impl FeatureRef {
    pub fn parse(reference: &str) -> LakeResult<Self> {
        match reference.split_once(':') {
            Some((view, feature)) if !view.is_empty() && !feature.is_empty() => Ok(Self {
                view: view.to_string(),
                feature: feature.to_string(),
            }),
            _ => Err(LakeError::FeatureStore(format!(
                "invalid feature reference '{}', expected <view>:<feature>",
                reference
            ))),
        }
    }
}

impl fmt::Display for FeatureRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.view, self.feature)
    }
}

/// Request row for historical retrieval
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityRow {
    pub key: i64,
    pub timestamp: NaiveDateTime,
}

/// Registry of feature views with online and point-in-time retrieval
pub trait FeatureStore: Send + Sync {
    /// Register or replace a view
    fn register(&self, view: &FeatureView) -> LakeResult<()>;

    fn list_views(&self) -> LakeResult<Vec<FeatureView>>;

    /// Latest known values per key
    fn get_online_features(&self, features: &[String], keys: &[i64]) -> LakeResult<Table>;

    /// Values as of each row's timestamp, within the view's TTL
    fn get_historical_features(
        &self,
        entity_rows: &[EntityRow],
        features: &[String],
    ) -> LakeResult<Table>;

    fn get_view(&self, name: &str) -> LakeResult<Option<FeatureView>> {
        Ok(self.list_views()?.into_iter().find(|v| v.name == name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loan_features_view() {
        let view = FeatureView::loan_features();
        assert_eq!(view.features.len(), 12);
        assert_eq!(view.ttl_days, 365);
        assert_eq!(view.feature("age_binned").unwrap().dtype, DataType::Float64);
        assert!(view.feature("outcome").is_none());
    }

    #[test]
    fn test_parse_feature_ref() {
        let r = FeatureRef::parse("loan_features:age").unwrap();
        assert_eq!(r.view, "loan_features");
        assert_eq!(r.feature, "age");
        assert_eq!(r.to_string(), "loan_features:age");
        assert!(FeatureRef::parse("age").is_err());
        assert!(FeatureRef::parse(":age").is_err());
    }
}
