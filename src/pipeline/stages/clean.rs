use crate::config::CleaningConfig;
use crate::error::{LakeError, LakeResult};
use crate::pipeline::{PipelineContext, PipelineStage};
use crate::store::{Dataset, Layer, PartitionStore};
use crate::transform::clean_dataset;
use std::collections::BTreeMap;

const SOURCE: &str = "pipeline::clean";

/// Refuse to clean unless both raw datasets passed every required expectation
///
/// A missing outcome counts as a failure: cleaning never runs on unvalidated data.
pub fn check_validation_gate(context: &PipelineContext) -> LakeResult<()> {
    for dataset in [Dataset::CustomerInfo, Dataset::LoanInfo] {
        let failures = match context.validation(dataset) {
            Some(outcome) => outcome.required_failures(),
            None => {
                return Err(LakeError::ValidationFailed {
                    dataset: format!("{} (not validated)", dataset),
                    failures: 0,
                })
            }
        };
        if failures > 0 {
            return Err(LakeError::ValidationFailed {
                dataset: dataset.to_string(),
                failures,
            });
        }
    }
    Ok(())
}

/// Stage that cleans both raw datasets into `cleaned`
pub struct CleanStage {
    store: PartitionStore,
    config: CleaningConfig,
}

impl CleanStage {
    pub fn new(store: PartitionStore, config: CleaningConfig) -> Self {
        Self { store, config }
    }
}

impl PipelineStage for CleanStage {
    fn execute(&self, context: &mut PipelineContext) -> LakeResult<()> {
        let key = context.arrival_key().clone();

        // Clean both datasets before writing, so a failure publishes neither
        let mut outputs = Vec::with_capacity(2);
        for (dataset, rules) in [
            (Dataset::CustomerInfo, &self.config.customer),
            (Dataset::LoanInfo, &self.config.loan),
        ] {
            let raw = self.store.read(Layer::Raw, dataset, &key)?;
            let (cleaned, notes) = clean_dataset(&raw, rules)?;
            outputs.push((dataset, raw.num_rows(), cleaned, notes));
        }

        for (dataset, raw_rows, cleaned, notes) in outputs {
            let mut metadata = BTreeMap::new();
            metadata.insert(
                "cleaning_version".to_string(),
                serde_json::Value::String(self.config.version.clone()),
            );
            self.store
                .write_with_metadata(Layer::Cleaned, dataset, &key, &cleaned, metadata)?;

            context.logger().info(
                SOURCE,
                &format!(
                    "{}: {} raw row(s), {} cleaned row(s)",
                    dataset,
                    raw_rows,
                    cleaned.num_rows()
                ),
            );
            context.report_quality(self.name(), dataset, notes);
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "clean"
    }

    fn input_layer(&self) -> Option<Layer> {
        Some(Layer::Raw)
    }

    fn output_layer(&self) -> Option<Layer> {
        Some(Layer::Cleaned)
    }

    fn pre_execute(&self, context: &PipelineContext) -> LakeResult<()> {
        check_validation_gate(context)
    }
}
