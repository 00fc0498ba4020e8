use crate::error::{LakeError, LakeResult};
use crate::pipeline::{PipelineContext, PipelineStage};
use crate::store::{Dataset, Layer, PartitionStore};
use crate::validation::{report, rules, Validator};
use std::path::PathBuf;
use std::sync::Arc;

const SOURCE: &str = "pipeline::validate";

/// Stage that checks both raw datasets against their data contracts
///
/// Writes one CSV report per dataset and records the outcomes in the context
/// for the gate in front of cleaning. Failed expectations never fail this stage.
///
/// # Context Outputs
/// - `validation_report_<dataset>` (path) - report written for each dataset
pub struct ValidateStage {
    store: PartitionStore,
    validator: Arc<dyn Validator>,
    reports_dir: PathBuf,
}

impl ValidateStage {
    pub fn new(
        store: PartitionStore,
        validator: Arc<dyn Validator>,
        reports_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            store,
            validator,
            reports_dir: reports_dir.into(),
        }
    }
}

impl PipelineStage for ValidateStage {
    fn execute(&self, context: &mut PipelineContext) -> LakeResult<()> {
        let key = context.arrival_key().clone();

        for dataset in [Dataset::LoanInfo, Dataset::CustomerInfo] {
            let table = self.store.read(Layer::Raw, dataset, &key)?;
            let rule_set = rules::rules_for(dataset).ok_or_else(|| {
                LakeError::Pipeline(format!("no validation rules for {}", dataset))
            })?;

            let outcome = self.validator.validate(&table, &rule_set)?;
            let path = report::write_report(&self.reports_dir, &key, &outcome)?;

            let summary = format!(
                "{}: {} of {} expectation(s) failed ({} required, {} warning), report at {}",
                dataset,
                outcome.failures.len(),
                outcome.evaluated,
                outcome.required_failures(),
                outcome.warning_failures(),
                path.display()
            );
            if outcome.passed() {
                context.logger().info(SOURCE, &summary);
            } else {
                context.logger().warn(SOURCE, &summary);
            }

            context.set_path(format!("validation_report_{}", dataset), path);
            context.record_validation(outcome);
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "validate"
    }

    fn input_layer(&self) -> Option<Layer> {
        Some(Layer::Raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arrival::ArrivalKey;
    use crate::logger::RunLogger;
    use crate::table::{Column, Table};
    use crate::validation::RuleEngine;
    use tempfile::TempDir;

    #[test]
    fn test_validate_records_outcomes_and_reports() {
        let dir = TempDir::new().unwrap();
        let store = PartitionStore::new(dir.path().join("lake"));
        let key = ArrivalKey::parse("20250823").unwrap();

        // Wrong schema on purpose: both datasets fail their required column check
        let table = Table::new(vec![Column::int("id", vec![Some(1)])]).unwrap();
        store.write(Layer::Raw, Dataset::LoanInfo, &key, &table).unwrap();
        store.write(Layer::Raw, Dataset::CustomerInfo, &key, &table).unwrap();

        let stage = ValidateStage::new(store, Arc::new(RuleEngine), dir.path().join("reports"));
        let mut context = PipelineContext::new(key.clone(), RunLogger::new("test"));
        stage.execute(&mut context).unwrap();

        for dataset in [Dataset::LoanInfo, Dataset::CustomerInfo] {
            let outcome = context.validation(dataset).unwrap();
            assert!(outcome.required_failures() > 0);
            let path = context
                .get_path(&format!("validation_report_{}", dataset))
                .unwrap();
            assert!(path.is_file());
        }
    }

    #[test]
    fn test_validate_requires_raw_partitions() {
        let dir = TempDir::new().unwrap();
        let stage = ValidateStage::new(
            PartitionStore::new(dir.path()),
            Arc::new(RuleEngine),
            dir.path().join("reports"),
        );
        let mut context =
            PipelineContext::new(ArrivalKey::parse("20250823").unwrap(), RunLogger::new("test"));
        assert!(matches!(
            stage.execute(&mut context),
            Err(LakeError::PartitionNotFound { .. })
        ));
    }
}
