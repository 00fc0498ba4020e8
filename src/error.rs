use thiserror::Error;

/// Central error type for the lake pipeline
#[derive(Error, Debug)]
pub enum LakeError {
    // ============================================================================
    // Input Errors
    // ============================================================================
    #[error("Source not found: {0}")]
    SourceNotFound(String),

    #[error("Failed to read snapshot: {0}")]
    SnapshotRead(String),

    #[error("Invalid arrival key: {0}")]
    InvalidArrivalKey(String),

    // ============================================================================
    // Partition Errors
    // ============================================================================
    #[error("Partition not found: {layer}/{dataset}/file_arrival={arrival_key}")]
    PartitionNotFound {
        layer: String,
        dataset: String,
        arrival_key: String,
    },

    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("Failed to write partition: {0}")]
    Storage(String),

    #[error("Codec error: {0}")]
    Codec(String),

    // ============================================================================
    // Pipeline Errors
    // ============================================================================
    #[error("Validation failed for {dataset}: {failures} required expectation(s) failed")]
    ValidationFailed { dataset: String, failures: usize },

    #[error("Invalid layer order: {0}")]
    LayerOrder(String),

    #[error("Pipeline error: {0}")]
    Pipeline(String),

    #[error("Configuration error: {0}")]
    Config(String),

    // ============================================================================
    // Collaborator Errors
    // ============================================================================
    #[error("Feature store error: {0}")]
    FeatureStore(String),

    #[error("Model error: {0}")]
    Model(String),

    // ============================================================================
    // Generic/System Errors
    // ============================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl LakeError {
    /// Build a `PartitionNotFound` from anything printable
    pub fn partition_not_found(
        layer: impl ToString,
        dataset: impl ToString,
        arrival_key: impl ToString,
    ) -> Self {
        LakeError::PartitionNotFound {
            layer: layer.to_string(),
            dataset: dataset.to_string(),
            arrival_key: arrival_key.to_string(),
        }
    }
}

// Persisting a temp file hands back the file on failure; only the io error matters here
impl From<tempfile::PersistError> for LakeError {
    fn from(err: tempfile::PersistError) -> Self {
        LakeError::Storage(format!("Failed to publish file: {}", err.error))
    }
}

// Helper type alias for Results
pub type LakeResult<T> = Result<T, LakeError>;
