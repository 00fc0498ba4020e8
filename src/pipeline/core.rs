use crate::error::LakeResult;
use crate::quality::QualityReport;
use crate::store::Layer;
use std::time::Duration;

use super::context::PipelineContext;

/// A single stage in a pipeline
///
/// Each stage reads one lake layer and writes the next one. Stages are executed
/// sequentially by the pipeline executor and share state through the context.
///
/// # Example
/// ```
/// use loanlake::error::LakeResult;
/// use loanlake::pipeline::{PipelineContext, PipelineStage};
/// use loanlake::store::Layer;
///
/// struct Promote;
///
/// impl PipelineStage for Promote {
///     fn execute(&self, context: &mut PipelineContext) -> LakeResult<()> {
///         context.set_string("promoted", context.arrival_key().to_string());
///         Ok(())
///     }
///
///     fn name(&self) -> &str {
///         "promote"
///     }
///
///     fn input_layer(&self) -> Option<Layer> {
///         Some(Layer::Raw)
///     }
///
///     fn output_layer(&self) -> Option<Layer> {
///         Some(Layer::Cleaned)
///     }
/// }
/// ```
pub trait PipelineStage: Send + Sync {
    /// Execute this stage
    ///
    /// If the stage fails, it should return an error which will stop the pipeline.
    fn execute(&self, context: &mut PipelineContext) -> LakeResult<()>;

    /// Get stage name for logging and progress tracking
    fn name(&self) -> &str;

    /// Layer this stage reads from
    fn input_layer(&self) -> Option<Layer> {
        None
    }

    /// Layer this stage writes to
    ///
    /// When both layers are declared, the output must be the successor of the
    /// input or the executor rejects the stage before running it.
    fn output_layer(&self) -> Option<Layer> {
        None
    }

    /// Check if this stage should be skipped based on context
    fn should_skip(&self, _context: &PipelineContext) -> bool {
        false
    }

    /// Called before execute() - useful for precondition checks
    fn pre_execute(&self, _context: &PipelineContext) -> LakeResult<()> {
        Ok(())
    }

    /// Called after execute()
    fn post_execute(&self, _context: &PipelineContext) -> LakeResult<()> {
        Ok(())
    }
}

/// Result of a pipeline stage execution
#[derive(Debug, Clone)]
pub struct StageResult {
    /// Stage name
    pub stage_name: String,

    /// Whether the stage succeeded
    pub success: bool,

    /// Error message if failed
    pub error: Option<String>,

    /// Duration of execution
    pub duration: Duration,

    /// Whether the stage was skipped
    pub skipped: bool,
}

impl StageResult {
    /// Create a successful stage result
    pub fn success(stage_name: impl Into<String>, duration: Duration) -> Self {
        Self {
            stage_name: stage_name.into(),
            success: true,
            error: None,
            duration,
            skipped: false,
        }
    }

    /// Create a failed stage result
    pub fn failure(
        stage_name: impl Into<String>,
        error: impl Into<String>,
        duration: Duration,
    ) -> Self {
        Self {
            stage_name: stage_name.into(),
            success: false,
            error: Some(error.into()),
            duration,
            skipped: false,
        }
    }

    /// Create a skipped stage result
    pub fn skipped(stage_name: impl Into<String>) -> Self {
        Self {
            stage_name: stage_name.into(),
            success: true,
            error: None,
            duration: Duration::from_secs(0),
            skipped: true,
        }
    }
}

/// Result of a complete pipeline execution
#[derive(Debug, Clone)]
pub struct PipelineResult {
    /// Pipeline name
    pub pipeline_name: String,

    /// Whether the pipeline succeeded
    pub success: bool,

    /// Results from each stage
    pub stage_results: Vec<StageResult>,

    /// Total duration
    pub total_duration: Duration,

    /// Error message if failed
    pub error: Option<String>,

    /// Data-quality events collected by the stages that ran
    pub quality: QualityReport,
}

impl PipelineResult {
    /// Create a successful pipeline result
    pub fn success(
        pipeline_name: impl Into<String>,
        stage_results: Vec<StageResult>,
        total_duration: Duration,
    ) -> Self {
        Self {
            pipeline_name: pipeline_name.into(),
            success: true,
            stage_results,
            total_duration,
            error: None,
            quality: QualityReport::new(),
        }
    }

    /// Create a failed pipeline result
    pub fn failure(
        pipeline_name: impl Into<String>,
        stage_results: Vec<StageResult>,
        error: impl Into<String>,
        total_duration: Duration,
    ) -> Self {
        Self {
            pipeline_name: pipeline_name.into(),
            success: false,
            stage_results,
            total_duration,
            error: Some(error.into()),
            quality: QualityReport::new(),
        }
    }

    pub fn with_quality(mut self, quality: QualityReport) -> Self {
        self.quality = quality;
        self
    }

    /// Get the number of stages that were executed (not skipped)
    pub fn executed_stages(&self) -> usize {
        self.stage_results.iter().filter(|r| !r.skipped).count()
    }

    /// Get the number of stages that were skipped
    pub fn skipped_stages(&self) -> usize {
        self.stage_results.iter().filter(|r| r.skipped).count()
    }

    /// Get the stage that failed (if any)
    pub fn failed_stage(&self) -> Option<&StageResult> {
        self.stage_results.iter().find(|r| !r.success)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quality::{QualityKind, QualityNote};
    use crate::store::Dataset;

    #[test]
    fn test_stage_result_success() {
        let result = StageResult::success("ingest", Duration::from_secs(1));
        assert!(result.success);
        assert!(result.error.is_none());
        assert!(!result.skipped);
        assert_eq!(result.stage_name, "ingest");
    }

    #[test]
    fn test_stage_result_failure() {
        let result = StageResult::failure("clean", "Validation failed", Duration::from_secs(1));
        assert!(!result.success);
        assert_eq!(result.error, Some("Validation failed".to_string()));
        assert!(!result.skipped);
    }

    #[test]
    fn test_stage_result_skipped() {
        let result = StageResult::skipped("train");
        assert!(result.success);
        assert!(result.skipped);
        assert_eq!(result.duration, Duration::from_secs(0));
    }

    #[test]
    fn test_pipeline_result_counts() {
        let stage_results = vec![
            StageResult::success("ingest", Duration::from_secs(1)),
            StageResult::skipped("validate"),
            StageResult::success("clean", Duration::from_secs(2)),
        ];
        let result = PipelineResult::success("daily", stage_results, Duration::from_secs(3));

        assert!(result.success);
        assert_eq!(result.executed_stages(), 2);
        assert_eq!(result.skipped_stages(), 1);
        assert!(result.failed_stage().is_none());
        assert!(result.quality.is_empty());
    }

    #[test]
    fn test_pipeline_result_failure() {
        let stage_results = vec![
            StageResult::success("ingest", Duration::from_secs(1)),
            StageResult::failure("validate", "Failed", Duration::from_secs(1)),
        ];
        let result = PipelineResult::failure(
            "daily",
            stage_results,
            "Pipeline failed at validate",
            Duration::from_secs(2),
        );

        assert!(!result.success);
        assert_eq!(result.failed_stage().unwrap().stage_name, "validate");
    }

    #[test]
    fn test_pipeline_result_carries_quality() {
        let mut quality = QualityReport::new();
        quality.extend(
            "clean",
            Dataset::CustomerInfo,
            vec![QualityNote::rows_removed("outlier_3std", Some("age"), 2)],
        );
        let result = PipelineResult::success("daily", vec![], Duration::from_secs(0))
            .with_quality(quality);
        assert_eq!(result.quality.rows_affected(QualityKind::DataQualityWarning), 2);
    }
}
