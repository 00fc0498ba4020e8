use crate::arrival::ArrivalKey;
use crate::error::{LakeError, LakeResult};
use crate::logger::RunLogger;
use crate::quality::{QualityNote, QualityReport};
use crate::store::Dataset;
use crate::validation::ValidationOutcome;
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;

/// Pipeline context that holds data passed between stages
///
/// Every run is keyed by one arrival key. Besides the free-form key-value store,
/// the context carries the run logger, validation outcomes for the gate in front
/// of cleaning, and the quality report surfaced in the run summary.
///
/// # Example
/// ```
/// use loanlake::arrival::ArrivalKey;
/// use loanlake::logger::RunLogger;
/// use loanlake::pipeline::PipelineContext;
///
/// let key = ArrivalKey::parse("20250823").unwrap();
/// let mut context = PipelineContext::new(key, RunLogger::new("daily"));
/// context.set_string("status", "processing");
/// assert_eq!(context.get_string("status").unwrap(), "processing");
/// ```
#[derive(Clone)]
pub struct PipelineContext {
    arrival_key: ArrivalKey,

    logger: RunLogger,

    /// Key-value store for pipeline data
    data: HashMap<String, Value>,

    validations: HashMap<Dataset, ValidationOutcome>,

    quality: QualityReport,

    /// Metadata about the pipeline execution
    metadata: HashMap<String, String>,
}

impl PipelineContext {
    pub fn new(arrival_key: ArrivalKey, logger: RunLogger) -> Self {
        Self {
            arrival_key,
            logger,
            data: HashMap::new(),
            validations: HashMap::new(),
            quality: QualityReport::new(),
            metadata: HashMap::new(),
        }
    }

    pub fn arrival_key(&self) -> &ArrivalKey {
        &self.arrival_key
    }

    pub fn logger(&self) -> &RunLogger {
        &self.logger
    }

    /// Set a value in the context
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.data.insert(key.into(), value);
    }

    /// Get a value from the context
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Get a value from the context or return an error if not found
    pub fn get_required(&self, key: &str) -> LakeResult<&Value> {
        self.data
            .get(key)
            .ok_or_else(|| LakeError::Pipeline(format!("Required context key not found: {}", key)))
    }

    /// Set a string value
    pub fn set_string(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.data.insert(key.into(), Value::String(value.into()));
    }

    /// Get a string value
    pub fn get_string(&self, key: &str) -> LakeResult<String> {
        match self.get_required(key)? {
            Value::String(s) => Ok(s.clone()),
            _ => Err(LakeError::Pipeline(format!(
                "Context key '{}' is not a string",
                key
            ))),
        }
    }

    /// Set a path value
    pub fn set_path(&mut self, key: impl Into<String>, path: PathBuf) {
        self.data.insert(
            key.into(),
            Value::String(path.to_string_lossy().to_string()),
        );
    }

    /// Get a path value
    pub fn get_path(&self, key: &str) -> LakeResult<PathBuf> {
        Ok(PathBuf::from(self.get_string(key)?))
    }

    /// Set a number value; non-finite numbers are stored as null
    pub fn set_number(&mut self, key: impl Into<String>, value: f64) {
        let value = serde_json::Number::from_f64(value)
            .map(Value::Number)
            .unwrap_or(Value::Null);
        self.data.insert(key.into(), value);
    }

    /// Get a number value
    pub fn get_number(&self, key: &str) -> LakeResult<f64> {
        match self.get_required(key)? {
            Value::Number(n) => n.as_f64().ok_or_else(|| {
                LakeError::Pipeline(format!("Context key '{}' is not a valid number", key))
            }),
            _ => Err(LakeError::Pipeline(format!(
                "Context key '{}' is not a number",
                key
            ))),
        }
    }

    /// Check if a key exists in the context
    pub fn has(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    /// Remove a value from the context
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.data.remove(key)
    }

    /// Get all data keys
    pub fn keys(&self) -> Vec<&String> {
        self.data.keys().collect()
    }

    pub fn record_validation(&mut self, outcome: ValidationOutcome) {
        self.validations.insert(outcome.dataset, outcome);
    }

    pub fn validation(&self, dataset: Dataset) -> Option<&ValidationOutcome> {
        self.validations.get(&dataset)
    }

    /// Add quality notes from `stage` for `dataset`
    pub fn report_quality(&mut self, stage: &str, dataset: Dataset, notes: Vec<QualityNote>) {
        self.quality.extend(stage, dataset, notes);
    }

    pub fn quality(&self) -> &QualityReport {
        &self.quality
    }

    /// Set metadata
    pub fn set_metadata(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.metadata.insert(key.into(), value.into());
    }

    /// Get metadata
    pub fn get_metadata(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(|s| s.as_str())
    }

    /// Get all metadata
    pub fn metadata(&self) -> &HashMap<String, String> {
        &self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quality::QualityKind;

    fn context() -> PipelineContext {
        PipelineContext::new(ArrivalKey::parse("20250823").unwrap(), RunLogger::new("test"))
    }

    #[test]
    fn test_context_creation() {
        let context = context();
        assert_eq!(context.arrival_key().as_str(), "20250823");
        assert_eq!(context.logger().job(), "test");
        assert!(context.keys().is_empty());
        assert!(context.quality().is_empty());
    }

    #[test]
    fn test_string_and_path_operations() {
        let mut context = context();
        context.set_string("key1", "value1");
        context.set_path("report", PathBuf::from("/tmp/report.csv"));

        assert!(context.has("key1"));
        assert_eq!(context.get_string("key1").unwrap(), "value1");
        assert_eq!(context.get_path("report").unwrap(), PathBuf::from("/tmp/report.csv"));
    }

    #[test]
    fn test_number_operations() {
        let mut context = context();
        context.set_number("f1", 0.75);
        assert_eq!(context.get_number("f1").unwrap(), 0.75);

        context.set_number("nan", f64::NAN);
        assert!(context.get_number("nan").is_err());
    }

    #[test]
    fn test_missing_key_and_wrong_type() {
        let mut context = context();
        assert!(context.get_string("missing").is_err());

        context.set_string("key1", "value1");
        assert!(context.get_number("key1").is_err());
    }

    #[test]
    fn test_remove() {
        let mut context = context();
        context.set_string("key1", "value1");
        context.remove("key1");
        assert!(!context.has("key1"));
    }

    #[test]
    fn test_validation_outcomes_by_dataset() {
        let mut context = context();
        assert!(context.validation(Dataset::LoanInfo).is_none());

        context.record_validation(ValidationOutcome {
            dataset: Dataset::LoanInfo,
            rule_set: "loan_info_raw".to_string(),
            evaluated: 3,
            failures: vec![],
        });
        assert!(context.validation(Dataset::LoanInfo).unwrap().passed());
        assert!(context.validation(Dataset::CustomerInfo).is_none());
    }

    #[test]
    fn test_quality_notes_accumulate() {
        let mut context = context();
        context.report_quality(
            "clean",
            Dataset::CustomerInfo,
            vec![QualityNote::encoding_gap("label_encoding", "job_type", 3)],
        );
        assert_eq!(context.quality().count(QualityKind::EncodingGapWarning), 1);
    }

    #[test]
    fn test_metadata() {
        let mut context = context();
        context.set_metadata("pipeline_name", "daily");
        assert_eq!(context.get_metadata("pipeline_name"), Some("daily"));
        assert_eq!(context.metadata().len(), 1);
    }
}
