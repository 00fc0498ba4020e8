use crate::error::LakeResult;
use crate::feature_store::{EntityRow, FeatureStore, FeatureView};
use crate::pipeline::{PipelineContext, PipelineStage};
use crate::store::{Dataset, Layer, PartitionStore};
use crate::table::Table;
use std::collections::HashSet;
use std::sync::Arc;

const SOURCE: &str = "pipeline::register";

/// Stage that registers the feature view and checks retrieval against this run
///
/// # Context Outputs
/// - `feature_view` (string) - name of the registered view
pub struct RegisterFeaturesStage {
    store: PartitionStore,
    feature_store: Arc<dyn FeatureStore>,
    view: FeatureView,
    sample_size: usize,
}

impl RegisterFeaturesStage {
    pub fn new(store: PartitionStore, feature_store: Arc<dyn FeatureStore>, view: FeatureView) -> Self {
        Self {
            store,
            feature_store,
            view,
            sample_size: 5,
        }
    }

    pub fn with_sample_size(mut self, sample_size: usize) -> Self {
        self.sample_size = sample_size;
        self
    }
}

/// First `limit` distinct non-null values of an integer column, in row order
pub fn distinct_keys(table: &Table, column: &str, limit: usize) -> LakeResult<Vec<i64>> {
    let data = &table.column(column)?.data;
    let mut seen = HashSet::new();
    let mut keys = Vec::new();
    for i in 0..data.len() {
        if keys.len() >= limit {
            break;
        }
        if let Some(key) = data.get(i).as_i64() {
            if seen.insert(key) {
                keys.push(key);
            }
        }
    }
    Ok(keys)
}

fn filled_cells(table: &Table) -> usize {
    table
        .columns()
        .iter()
        .map(|c| c.data.len() - c.data.null_count())
        .sum()
}

impl PipelineStage for RegisterFeaturesStage {
    fn execute(&self, context: &mut PipelineContext) -> LakeResult<()> {
        let key = context.arrival_key().clone();
        self.feature_store.register(&self.view)?;
        context.logger().info(
            SOURCE,
            &format!(
                "Registered feature view '{}' with {} feature(s)",
                self.view.name,
                self.view.features.len()
            ),
        );

        let partition = self
            .store
            .read(Layer::Aggregated, Dataset::CustomerLoanInfo, &key)?;
        let keys = distinct_keys(&partition, &self.view.entity, self.sample_size)?;
        let refs: Vec<String> = self
            .view
            .features
            .iter()
            .map(|f| format!("{}:{}", self.view.name, f.name))
            .collect();

        if !keys.is_empty() {
            let online = self.feature_store.get_online_features(&refs, &keys)?;
            let rows: Vec<EntityRow> = keys
                .iter()
                .map(|k| EntityRow {
                    key: *k,
                    timestamp: key.timestamp(),
                })
                .collect();
            let historical = self.feature_store.get_historical_features(&rows, &refs)?;
            context.logger().info(
                SOURCE,
                &format!(
                    "Sample retrieval for {} key(s): {} online and {} historical value(s) filled",
                    keys.len(),
                    filled_cells(&online),
                    filled_cells(&historical)
                ),
            );
        }

        context.set_string("feature_view", self.view.name.clone());
        Ok(())
    }

    fn name(&self) -> &str {
        "register-features"
    }

    fn input_layer(&self) -> Option<Layer> {
        Some(Layer::Aggregated)
    }
}
