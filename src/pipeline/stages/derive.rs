use crate::arrival::ArrivalKey;
use crate::config::FeatureConfig;
use crate::error::LakeResult;
use crate::pipeline::{PipelineContext, PipelineStage};
use crate::store::{Dataset, Layer, PartitionStore};
use crate::transform::{derive_features, ScalingParams};
use std::collections::BTreeMap;

const SOURCE: &str = "pipeline::derive";

/// Manifest metadata key holding the min-max parameters of a partition
pub const SCALING_METADATA_KEY: &str = "scaling";

/// Manifest metadata key holding the digests of the cleaned files the scaling was fitted on
pub const SCALING_INPUTS_METADATA_KEY: &str = "scaling_inputs";

/// Stage that joins the cleaned datasets into model-ready features
///
/// # Context Outputs
/// - `aggregated_rows` (number)
/// - `last_run_csv` (path) - convenience copy of this run's output
pub struct DeriveStage {
    store: PartitionStore,
    config: FeatureConfig,
}

impl DeriveStage {
    pub fn new(store: PartitionStore, config: FeatureConfig) -> Self {
        Self { store, config }
    }
}

/// File digests of the cleaned partitions one derivation reads, per dataset
pub fn input_digests(store: &PartitionStore, key: &ArrivalKey) -> LakeResult<serde_json::Value> {
    let mut digests = BTreeMap::new();
    for dataset in [Dataset::CustomerInfo, Dataset::LoanInfo] {
        let manifest = store.manifest(Layer::Cleaned, dataset, key)?;
        let values: Vec<String> = manifest
            .files
            .iter()
            .map(|f| f.digest.value.clone())
            .collect();
        digests.insert(dataset.to_string(), values);
    }
    Ok(serde_json::to_value(digests)?)
}

/// Scaling parameters recorded for the same arrival key over identical inputs
///
/// Parameters fitted on different cleaned files are not returned.
pub fn recorded_scaling(
    store: &PartitionStore,
    key: &ArrivalKey,
    inputs: &serde_json::Value,
) -> LakeResult<Option<ScalingParams>> {
    let path = store
        .partition_path(Layer::Aggregated, Dataset::CustomerLoanInfo, key)
        .join(crate::store::MANIFEST_FILE);
    if !path.is_file() {
        return Ok(None);
    }
    let manifest = store.manifest(Layer::Aggregated, Dataset::CustomerLoanInfo, key)?;
    if manifest.metadata.get(SCALING_INPUTS_METADATA_KEY) != Some(inputs) {
        return Ok(None);
    }
    match manifest.metadata.get(SCALING_METADATA_KEY) {
        Some(value) => Ok(Some(serde_json::from_value(value.clone())?)),
        None => Ok(None),
    }
}

impl PipelineStage for DeriveStage {
    fn execute(&self, context: &mut PipelineContext) -> LakeResult<()> {
        let key = context.arrival_key().clone();
        let customers = self.store.read(Layer::Cleaned, Dataset::CustomerInfo, &key)?;
        let loans = self.store.read(Layer::Cleaned, Dataset::LoanInfo, &key)?;

        let inputs = input_digests(&self.store, &key)?;
        let reuse = recorded_scaling(&self.store, &key, &inputs)?;
        if reuse.is_some() {
            context
                .logger()
                .info(SOURCE, &format!("Reusing scaling parameters recorded for {}", key));
        } else {
            context
                .logger()
                .debug(SOURCE, &format!("Fitting scaling parameters for {}", key));
        }

        let derived = derive_features(&customers, &loans, &self.config, &key, reuse.as_ref())?;
        context.report_quality(self.name(), Dataset::CustomerLoanInfo, derived.notes);

        let mut metadata = BTreeMap::new();
        metadata.insert(
            SCALING_METADATA_KEY.to_string(),
            serde_json::to_value(&derived.scaling)?,
        );
        metadata.insert(SCALING_INPUTS_METADATA_KEY.to_string(), inputs);
        metadata.insert(
            "feature_version".to_string(),
            serde_json::Value::String(self.config.version.clone()),
        );
        self.store.write_with_metadata(
            Layer::Aggregated,
            Dataset::CustomerLoanInfo,
            &key,
            &derived.table,
            metadata,
        )?;
        let last_run = self
            .store
            .write_flat_file(&self.config.last_run_csv, &derived.table)?;

        context.logger().info(
            SOURCE,
            &format!(
                "Derived {} row(s) from {} customer and {} loan row(s)",
                derived.table.num_rows(),
                customers.num_rows(),
                loans.num_rows()
            ),
        );
        context.set_number("aggregated_rows", derived.table.num_rows() as f64);
        context.set_path("last_run_csv", last_run);
        Ok(())
    }

    fn name(&self) -> &str {
        "derive"
    }

    fn input_layer(&self) -> Option<Layer> {
        Some(Layer::Cleaned)
    }

    fn output_layer(&self) -> Option<Layer> {
        Some(Layer::Aggregated)
    }
}
