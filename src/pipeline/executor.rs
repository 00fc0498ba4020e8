use super::context::PipelineContext;
use super::core::{PipelineResult, PipelineStage, StageResult};
use crate::error::{LakeError, LakeResult};
use std::time::Instant;

const SOURCE: &str = "pipeline";

/// Pipeline executor that runs stages sequentially
///
/// # Example
/// ```ignore
/// let pipeline = Pipeline::builder("daily")
///     .add_stage(IngestStage::new(store, snapshot, "customer_info"))
///     .add_stage(ValidateStage::new(store, reports_dir))
///     .build();
///
/// let mut context = PipelineContext::new(key, RunLogger::new("daily"));
/// let result = pipeline.execute(&mut context)?;
/// ```
pub struct Pipeline {
    name: String,
    stages: Vec<Box<dyn PipelineStage>>,
}

/// Reject a stage whose declared output layer does not follow its input layer
pub fn check_layer_order(stage: &dyn PipelineStage) -> LakeResult<()> {
    if let (Some(input), Some(output)) = (stage.input_layer(), stage.output_layer()) {
        if input.next() != Some(output) {
            return Err(LakeError::LayerOrder(format!(
                "stage '{}' reads {} but writes {}",
                stage.name(),
                input,
                output
            )));
        }
    }
    Ok(())
}

impl Pipeline {
    /// Create a new pipeline builder
    pub fn builder(name: impl Into<String>) -> PipelineBuilder {
        PipelineBuilder::new(name)
    }

    /// Get the pipeline name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the number of stages
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Execute the pipeline
    ///
    /// Stages are executed sequentially. If a stage fails, the pipeline stops and
    /// the returned result names the failed stage. Stages can be skipped based on
    /// their `should_skip()` method.
    pub fn execute(&self, context: &mut PipelineContext) -> LakeResult<PipelineResult> {
        let result = self.execute_stages(context);
        Ok(result.with_quality(context.quality().clone()))
    }

    fn fail(
        &self,
        context: &PipelineContext,
        mut stage_results: Vec<StageResult>,
        stage_name: &str,
        error_msg: String,
        stage_start: Instant,
        pipeline_start: Instant,
    ) -> PipelineResult {
        context.logger().error(
            SOURCE,
            &format!(
                "Stage '{}' failed: {} (arrival key: {})",
                stage_name,
                error_msg,
                context.arrival_key()
            ),
        );
        stage_results.push(StageResult::failure(
            stage_name,
            error_msg.clone(),
            stage_start.elapsed(),
        ));
        PipelineResult::failure(&self.name, stage_results, error_msg, pipeline_start.elapsed())
    }

    fn execute_stages(&self, context: &mut PipelineContext) -> PipelineResult {
        context.logger().info(
            SOURCE,
            &format!(
                "Starting pipeline '{}' with {} stages (arrival key: {})",
                self.name,
                self.stages.len(),
                context.arrival_key()
            ),
        );

        let pipeline_start = Instant::now();
        let mut stage_results = Vec::new();

        context.set_metadata("pipeline_name", &self.name);

        for (index, stage) in self.stages.iter().enumerate() {
            let stage_name = stage.name();

            if stage.should_skip(context) {
                context.logger().info(
                    SOURCE,
                    &format!(
                        "Skipping stage {}/{}: {}",
                        index + 1,
                        self.stages.len(),
                        stage_name
                    ),
                );
                stage_results.push(StageResult::skipped(stage_name));
                continue;
            }

            let stage_start = Instant::now();

            if let Err(e) = check_layer_order(stage.as_ref()) {
                return self.fail(
                    context,
                    stage_results,
                    stage_name,
                    e.to_string(),
                    stage_start,
                    pipeline_start,
                );
            }

            context.logger().info(
                SOURCE,
                &format!(
                    "Executing stage {}/{}: {}",
                    index + 1,
                    self.stages.len(),
                    stage_name
                ),
            );

            if let Err(e) = stage.pre_execute(context) {
                return self.fail(
                    context,
                    stage_results,
                    stage_name,
                    format!("Pre-execute failed: {}", e),
                    stage_start,
                    pipeline_start,
                );
            }

            if let Err(e) = stage.execute(context) {
                return self.fail(
                    context,
                    stage_results,
                    stage_name,
                    e.to_string(),
                    stage_start,
                    pipeline_start,
                );
            }

            if let Err(e) = stage.post_execute(context) {
                return self.fail(
                    context,
                    stage_results,
                    stage_name,
                    format!("Post-execute failed: {}", e),
                    stage_start,
                    pipeline_start,
                );
            }

            let duration = stage_start.elapsed();
            context.logger().info(
                SOURCE,
                &format!(
                    "Stage '{}' completed successfully in {:.2}s",
                    stage_name,
                    duration.as_secs_f64()
                ),
            );
            stage_results.push(StageResult::success(stage_name, duration));
        }

        let total_duration = pipeline_start.elapsed();
        context.logger().info(
            SOURCE,
            &format!(
                "Pipeline '{}' completed successfully in {:.2}s (arrival key: {})",
                self.name,
                total_duration.as_secs_f64(),
                context.arrival_key()
            ),
        );

        PipelineResult::success(&self.name, stage_results, total_duration)
    }
}

/// Builder for constructing pipelines
pub struct PipelineBuilder {
    name: String,
    stages: Vec<Box<dyn PipelineStage>>,
}

impl PipelineBuilder {
    /// Create a new pipeline builder
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stages: Vec::new(),
        }
    }

    /// Add a stage to the pipeline
    pub fn add_stage<S: PipelineStage + 'static>(mut self, stage: S) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    /// Add a boxed stage to the pipeline
    pub fn add_boxed_stage(mut self, stage: Box<dyn PipelineStage>) -> Self {
        self.stages.push(stage);
        self
    }

    /// Build the pipeline
    pub fn build(self) -> Pipeline {
        Pipeline {
            name: self.name,
            stages: self.stages,
        }
    }
}
