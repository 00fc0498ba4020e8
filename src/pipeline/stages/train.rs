use crate::config::TrainingConfig;
use crate::error::{LakeError, LakeResult};
use crate::feature_store::{EntityRow, FeatureRef, FeatureStore};
use crate::model::{
    best_by_f1, evaluate_candidates, sampling, Classifier, KNearestNeighbors, LogisticRegression,
    ModelArtifact,
};
use crate::pipeline::{PipelineContext, PipelineStage};
use crate::quality::QualityNote;
use crate::store::{Dataset, Layer, PartitionStore};
use crate::table::Table;
use chrono::Utc;
use ndarray::{Array1, Array2};
use std::path::PathBuf;
use std::sync::Arc;

const SOURCE: &str = "pipeline::train";

/// Minimum examples of each class needed to train and evaluate
const MIN_PER_CLASS: usize = 2;

/// Stage that trains the campaign classifiers and saves the best one
///
/// # Context Outputs
/// - `model_path` (path) - saved artifact
/// - `model_algorithm` (string)
/// - `model_f1` (number) - F1 of the saved model on the test split
pub struct TrainStage {
    store: PartitionStore,
    feature_store: Arc<dyn FeatureStore>,
    config: TrainingConfig,
    entity_column: String,
    timestamp_column: String,
    models_dir: PathBuf,
}

impl TrainStage {
    pub fn new(
        store: PartitionStore,
        feature_store: Arc<dyn FeatureStore>,
        config: TrainingConfig,
        entity_column: impl Into<String>,
        timestamp_column: impl Into<String>,
        models_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            store,
            feature_store,
            config,
            entity_column: entity_column.into(),
            timestamp_column: timestamp_column.into(),
            models_dir: models_dir.into(),
        }
    }

    fn candidates(&self) -> Vec<Box<dyn Classifier>> {
        vec![
            Box::new(LogisticRegression::new(
                self.config.learning_rate,
                self.config.epochs,
            )),
            Box::new(KNearestNeighbors::new(self.config.knn_neighbors)),
        ]
    }
}

/// Labelled entity rows of the partition; rows missing a key, timestamp or label are skipped
fn labelled_rows(
    table: &Table,
    entity: &str,
    timestamp: &str,
    label: &str,
) -> LakeResult<(Vec<EntityRow>, Vec<u8>)> {
    let keys = &table.column(entity)?.data;
    let times = &table.column(timestamp)?.data;
    let labels = &table.column(label)?.data;

    let mut rows = Vec::new();
    let mut y = Vec::new();
    for i in 0..table.num_rows() {
        let (Some(key), Some(ts), Some(value)) = (
            keys.get(i).as_i64(),
            times.get(i).as_timestamp(),
            labels.get(i).as_f64(),
        ) else {
            continue;
        };
        let class = match value {
            v if v == 0.0 => 0,
            v if v == 1.0 => 1,
            other => {
                return Err(LakeError::Model(format!(
                    "label column '{}' holds {}, expected 0 or 1",
                    label, other
                )))
            }
        };
        rows.push(EntityRow { key, timestamp: ts });
        y.push(class);
    }
    Ok((rows, y))
}

/// Dense feature rows; rows with any null feature are dropped
fn feature_matrix(
    features: &Table,
    names: &[String],
    labels: &[u8],
) -> LakeResult<(Vec<Vec<f64>>, Vec<u8>)> {
    let columns = names
        .iter()
        .map(|name| {
            features.column(name)?.data.to_f64().ok_or_else(|| {
                LakeError::Model(format!("feature '{}' is not numeric", name))
            })
        })
        .collect::<LakeResult<Vec<_>>>()?;

    let mut rows = Vec::new();
    let mut y = Vec::new();
    for (i, label) in labels.iter().enumerate() {
        let row: Option<Vec<f64>> = columns.iter().map(|c| c.get(i).copied().flatten()).collect();
        if let Some(row) = row {
            rows.push(row);
            y.push(*label);
        }
    }
    Ok((rows, y))
}

fn select(
    rows: &[Vec<f64>],
    labels: &[u8],
    indices: &[usize],
    width: usize,
) -> LakeResult<(Array2<f64>, Array1<u8>)> {
    let flat: Vec<f64> = indices.iter().flat_map(|i| rows[*i].iter().copied()).collect();
    let x = Array2::from_shape_vec((indices.len(), width), flat)
        .map_err(|e| LakeError::Model(format!("failed to build feature matrix: {}", e)))?;
    let y = Array1::from(indices.iter().map(|i| labels[*i]).collect::<Vec<_>>());
    Ok((x, y))
}

impl PipelineStage for TrainStage {
    fn execute(&self, context: &mut PipelineContext) -> LakeResult<()> {
        let key = context.arrival_key().clone();
        let table = self
            .store
            .read(Layer::Aggregated, Dataset::CustomerLoanInfo, &key)?;

        let (entity_rows, labels) = labelled_rows(
            &table,
            &self.entity_column,
            &self.timestamp_column,
            &self.config.label_column,
        )?;
        sampling::require_both_classes(&labels, MIN_PER_CLASS)?;

        let picked = sampling::balance_classes(&labels, self.config.sample_seed);
        let sampled_rows: Vec<EntityRow> = picked.iter().map(|i| entity_rows[*i]).collect();
        let sampled_labels: Vec<u8> = picked.iter().map(|i| labels[*i]).collect();
        context.logger().info(
            SOURCE,
            &format!(
                "Balanced {} labelled row(s) down to {}",
                labels.len(),
                sampled_rows.len()
            ),
        );

        let names = self
            .config
            .features
            .iter()
            .map(|r| FeatureRef::parse(r).map(|r| r.feature))
            .collect::<LakeResult<Vec<_>>>()?;
        let features = self
            .feature_store
            .get_historical_features(&sampled_rows, &self.config.features)?;
        let (rows, y) = feature_matrix(&features, &names, &sampled_labels)?;
        context.report_quality(
            self.name(),
            Dataset::CustomerLoanInfo,
            vec![QualityNote::rows_removed(
                "null_feature",
                None,
                sampled_labels.len() - y.len(),
            )],
        );
        sampling::require_both_classes(&y, MIN_PER_CLASS)?;

        let (train_idx, test_idx) =
            sampling::stratified_split(&y, self.config.test_fraction, self.config.split_seed);
        let (train_x, train_y) = select(&rows, &y, &train_idx, names.len())?;
        let (test_x, test_y) = select(&rows, &y, &test_idx, names.len())?;

        let mut candidates = self.candidates();
        let results = evaluate_candidates(&mut candidates, &train_x, &train_y, &test_x, &test_y)?;
        let best = best_by_f1(&results)
            .ok_or_else(|| LakeError::Model("no classifier was evaluated".to_string()))?;

        let artifact = ModelArtifact {
            algorithm: best.name.to_string(),
            version: key.clone(),
            trained_at: Utc::now(),
            features: self.config.features.clone(),
            train_rows: train_idx.len(),
            test_rows: test_idx.len(),
            metrics: best.metrics.clone(),
            parameters: best.parameters.clone(),
        };
        let path = artifact.save(&self.models_dir, &self.config.model_name)?;

        context.logger().info(
            SOURCE,
            &format!(
                "Saved {} (f1 {:.3}, accuracy {:.3}) to {}",
                best.name,
                best.metrics.f1,
                best.metrics.accuracy,
                path.display()
            ),
        );
        context.set_path("model_path", path);
        context.set_string("model_algorithm", best.name);
        context.set_number("model_f1", best.metrics.f1);
        Ok(())
    }

    fn name(&self) -> &str {
        "train"
    }

    fn input_layer(&self) -> Option<Layer> {
        Some(Layer::Aggregated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Column;

    #[test]
    fn test_feature_matrix_drops_null_rows() {
        let features = Table::new(vec![
            Column::int("customer_id", vec![Some(1), Some(2), Some(3)]),
            Column::float("a", vec![Some(0.5), None, Some(1.5)]),
            Column::int("b", vec![Some(1), Some(2), Some(3)]),
        ])
        .unwrap();
        let names = vec!["a".to_string(), "b".to_string()];
        let (rows, y) = feature_matrix(&features, &names, &[1, 0, 0]).unwrap();

        assert_eq!(rows, vec![vec![0.5, 1.0], vec![1.5, 3.0]]);
        assert_eq!(y, vec![1, 0]);
    }

    #[test]
    fn test_feature_matrix_rejects_text() {
        let features = Table::new(vec![Column::text("a", vec![Some("x")])]).unwrap();
        assert!(feature_matrix(&features, &["a".to_string()], &[1]).is_err());
    }

    #[test]
    fn test_labelled_rows_skip_missing_values() {
        let ts = chrono::NaiveDate::from_ymd_opt(2025, 8, 23)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let table = Table::new(vec![
            Column::int("customer_id", vec![Some(1), Some(2), None]),
            Column::timestamp("event_timestamp", vec![Some(ts), Some(ts), Some(ts)]),
            Column::int("outcome", vec![Some(1), None, Some(0)]),
        ])
        .unwrap();
        let (rows, y) =
            labelled_rows(&table, "customer_id", "event_timestamp", "outcome").unwrap();
        assert_eq!(rows, vec![EntityRow { key: 1, timestamp: ts }]);
        assert_eq!(y, vec![1]);
    }

    #[test]
    fn test_select_builds_matrix() {
        let rows = vec![vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]];
        let (x, y) = select(&rows, &[0, 1, 1], &[2, 0], 2).unwrap();
        assert_eq!(x, ndarray::array![[5.0, 6.0], [1.0, 2.0]]);
        assert_eq!(y, ndarray::array![1u8, 0]);
    }
}
