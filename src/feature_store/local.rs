use super::{EntityRow, FeatureRef, FeatureStore, FeatureView};
use crate::error::{LakeError, LakeResult};
use crate::store::{Dataset, Layer, PartitionStore};
use crate::table::{Column, Table, Value};
use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::path::{Path, PathBuf};

const REGISTRY_FILE: &str = "registry.json";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Registry {
    views: BTreeMap<String, RegisteredView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RegisteredView {
    view: FeatureView,
    registered_at: DateTime<Utc>,
}

/// Feature store over the aggregated layer with a JSON registry
#[derive(Debug, Clone)]
pub struct LocalFeatureStore {
    repo_dir: PathBuf,
    lake: PartitionStore,
}

/// Offline rows of one view indexed by entity key
struct OfflineIndex {
    table: Table,
    /// Row indices per key, ascending by event timestamp
    rows: HashMap<i64, Vec<(NaiveDateTime, usize)>>,
}

impl LocalFeatureStore {
    pub fn new(repo_dir: impl Into<PathBuf>, lake: PartitionStore) -> Self {
        Self {
            repo_dir: repo_dir.into(),
            lake,
        }
    }

    pub fn registry_path(&self) -> PathBuf {
        self.repo_dir.join(REGISTRY_FILE)
    }

    fn load_registry(&self) -> LakeResult<Registry> {
        let path = self.registry_path();
        if !path.is_file() {
            return Ok(Registry::default());
        }
        let json = std::fs::read_to_string(&path)?;
        serde_json::from_str(&json)
            .map_err(|e| LakeError::FeatureStore(format!("corrupt registry {}: {}", path.display(), e)))
    }

    fn save_registry(&self, registry: &Registry) -> LakeResult<()> {
        std::fs::create_dir_all(&self.repo_dir)?;
        let mut tmp = tempfile::Builder::new()
            .prefix(".registry")
            .tempfile_in(&self.repo_dir)?;
        tmp.write_all(&serde_json::to_vec_pretty(registry)?)?;
        tmp.flush()?;
        tmp.persist(self.registry_path())?;
        Ok(())
    }

    /// Resolve references against the registry; all must name one view
    fn resolve(&self, features: &[String]) -> LakeResult<(FeatureView, Vec<String>)> {
        let refs = features
            .iter()
            .map(|f| FeatureRef::parse(f))
            .collect::<LakeResult<Vec<_>>>()?;
        let first = refs
            .first()
            .ok_or_else(|| LakeError::FeatureStore("no features requested".to_string()))?;

        let registry = self.load_registry()?;
        let view = registry
            .views
            .get(&first.view)
            .map(|r| r.view.clone())
            .ok_or_else(|| LakeError::FeatureStore(format!("unknown feature view '{}'", first.view)))?;

        let mut names = Vec::with_capacity(refs.len());
        for r in &refs {
            if r.view != view.name {
                return Err(LakeError::FeatureStore(format!(
                    "features from several views requested ({} and {})",
                    view.name, r.view
                )));
            }
            if view.feature(&r.feature).is_none() {
                return Err(LakeError::FeatureStore(format!("unknown feature '{}'", r)));
            }
            names.push(r.feature.clone());
        }
        Ok((view, names))
    }

    fn offline_index(&self, view: &FeatureView, names: &[String]) -> LakeResult<OfflineIndex> {
        let table = match self.lake.read_many(Layer::Aggregated, Dataset::CustomerLoanInfo) {
            Ok(table) => table,
            Err(LakeError::PartitionNotFound { .. }) => {
                return Err(LakeError::FeatureStore(
                    "offline source has no partitions".to_string(),
                ))
            }
            Err(e) => return Err(e),
        };
        for name in names {
            if !table.has_column(name) {
                return Err(LakeError::FeatureStore(format!(
                    "offline source has no column '{}'",
                    name
                )));
            }
        }

        let keys = &table.column(&view.entity)?.data;
        let timestamps = &table.column(&view.timestamp_field)?.data;
        let mut rows: HashMap<i64, Vec<(NaiveDateTime, usize)>> = HashMap::new();
        for i in 0..table.num_rows() {
            let (Some(key), Value::Timestamp(ts)) = (keys.get(i).as_i64(), timestamps.get(i)) else {
                continue;
            };
            rows.entry(key).or_default().push((ts, i));
        }
        // Stable sort keeps later partitions last among equal timestamps
        for entries in rows.values_mut() {
            entries.sort_by_key(|(ts, _)| *ts);
        }
        Ok(OfflineIndex { table, rows })
    }

    fn assemble(
        index: &OfflineIndex,
        view: &FeatureView,
        names: &[String],
        keys: Vec<Option<i64>>,
        timestamps: Vec<Option<NaiveDateTime>>,
        picks: &[usize],
    ) -> LakeResult<Table> {
        let mut columns = vec![
            Column::int(view.entity.clone(), keys),
            Column::timestamp(view.timestamp_field.clone(), timestamps),
        ];
        for name in names {
            let data = index.table.column(name)?.data.take(picks);
            columns.push(Column::new(name.clone(), data));
        }
        Table::new(columns)
    }
}

/// Index that `take` maps to null
const NO_ROW: usize = usize::MAX;

impl FeatureStore for LocalFeatureStore {
    fn register(&self, view: &FeatureView) -> LakeResult<()> {
        if view.features.is_empty() {
            return Err(LakeError::FeatureStore(format!(
                "feature view '{}' has no features",
                view.name
            )));
        }
        let mut registry = self.load_registry()?;
        registry.views.insert(
            view.name.clone(),
            RegisteredView {
                view: view.clone(),
                registered_at: Utc::now(),
            },
        );
        self.save_registry(&registry)?;
        tracing::info!(view = %view.name, features = view.features.len(), "Feature view registered");
        Ok(())
    }

    fn list_views(&self) -> LakeResult<Vec<FeatureView>> {
        Ok(self
            .load_registry()?
            .views
            .into_values()
            .map(|r| r.view)
            .collect())
    }

    fn get_online_features(&self, features: &[String], keys: &[i64]) -> LakeResult<Table> {
        let (view, names) = self.resolve(features)?;
        let index = self.offline_index(&view, &names)?;

        let mut picks = Vec::with_capacity(keys.len());
        let mut stamps = Vec::with_capacity(keys.len());
        for key in keys {
            match index.rows.get(key).and_then(|entries| entries.last()) {
                Some((ts, row)) => {
                    picks.push(*row);
                    stamps.push(Some(*ts));
                }
                None => {
                    picks.push(NO_ROW);
                    stamps.push(None);
                }
            }
        }

        let keys = keys.iter().map(|k| Some(*k)).collect();
        Self::assemble(&index, &view, &names, keys, stamps, &picks)
    }

    fn get_historical_features(
        &self,
        entity_rows: &[EntityRow],
        features: &[String],
    ) -> LakeResult<Table> {
        let (view, names) = self.resolve(features)?;
        let index = self.offline_index(&view, &names)?;
        let ttl = Duration::days(view.ttl_days);

        let picks: Vec<usize> = entity_rows
            .iter()
            .map(|request| {
                index
                    .rows
                    .get(&request.key)
                    .and_then(|entries| {
                        entries
                            .iter()
                            .rev()
                            .find(|(ts, _)| *ts <= request.timestamp && *ts >= request.timestamp - ttl)
                    })
                    .map_or(NO_ROW, |(_, row)| *row)
            })
            .collect();

        let keys = entity_rows.iter().map(|r| Some(r.key)).collect();
        let stamps = entity_rows.iter().map(|r| Some(r.timestamp)).collect();
        Self::assemble(&index, &view, &names, keys, stamps, &picks)
    }
}

impl LocalFeatureStore {
    pub fn repo_dir(&self) -> &Path {
        &self.repo_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arrival::ArrivalKey;
    use crate::table::ColumnData;
    use tempfile::TempDir;

    fn day(raw: &str) -> ArrivalKey {
        ArrivalKey::parse(raw).unwrap()
    }

    fn partition(key: &ArrivalKey, ids: &[i64], ages: &[i64]) -> Table {
        let n = ids.len();
        Table::new(vec![
            Column::int("customer_id", ids.iter().map(|v| Some(*v)).collect()),
            Column::int("age", ages.iter().map(|v| Some(*v)).collect()),
            Column::float("age_binned", vec![Some(30.0); n]),
            Column::timestamp("event_timestamp", vec![Some(key.timestamp()); n]),
        ])
        .unwrap()
    }

    fn store_with_history(dir: &Path) -> LocalFeatureStore {
        let lake = PartitionStore::new(dir.join("lake"));
        for (raw, ids, ages) in [("20240101", vec![1, 2], vec![30, 40]), ("20250823", vec![1], vec![31])] {
            let key = day(raw);
            lake.write(Layer::Aggregated, Dataset::CustomerLoanInfo, &key, &partition(&key, &ids, &ages))
                .unwrap();
        }
        let store = LocalFeatureStore::new(dir.join("repo"), lake);
        store.register(&FeatureView::loan_features()).unwrap();
        store
    }

    fn refs() -> Vec<String> {
        vec!["loan_features:age".to_string(), "loan_features:age_binned".to_string()]
    }

    #[test]
    fn test_register_is_persisted() {
        let dir = TempDir::new().unwrap();
        let store = store_with_history(dir.path());
        let reopened = LocalFeatureStore::new(dir.path().join("repo"), PartitionStore::new(dir.path().join("lake")));
        let view = reopened.get_view("loan_features").unwrap().unwrap();
        assert_eq!(view, FeatureView::loan_features());
        assert!(store.registry_path().is_file());
    }

    #[test]
    fn test_online_returns_latest_row() {
        let dir = TempDir::new().unwrap();
        let store = store_with_history(dir.path());
        let online = store.get_online_features(&refs(), &[1, 2, 3]).unwrap();

        assert_eq!(online.column_names(), vec!["customer_id", "event_timestamp", "age", "age_binned"]);
        assert_eq!(
            online.column("age").unwrap().data,
            ColumnData::Int64(vec![Some(31), Some(40), None])
        );
    }

    #[test]
    fn test_historical_is_point_in_time() {
        let dir = TempDir::new().unwrap();
        let store = store_with_history(dir.path());
        let rows = [
            EntityRow { key: 1, timestamp: day("20240601").timestamp() },
            EntityRow { key: 1, timestamp: day("20250823").timestamp() },
            EntityRow { key: 1, timestamp: day("20231231").timestamp() },
        ];
        let hist = store.get_historical_features(&rows, &refs()).unwrap();
        assert_eq!(
            hist.column("age").unwrap().data,
            ColumnData::Int64(vec![Some(30), Some(31), None])
        );
        assert_eq!(hist.row(0)[1], Value::Timestamp(day("20240601").timestamp()));
    }

    #[test]
    fn test_historical_respects_ttl() {
        let dir = TempDir::new().unwrap();
        let store = store_with_history(dir.path());
        // Customer 2 was last seen 2024-01-01, more than 365 days before the request
        let rows = [EntityRow { key: 2, timestamp: day("20250823").timestamp() }];
        let hist = store.get_historical_features(&rows, &refs()).unwrap();
        assert_eq!(hist.column("age").unwrap().data, ColumnData::Int64(vec![None]));
    }

    #[test]
    fn test_unknown_feature_or_view() {
        let dir = TempDir::new().unwrap();
        let store = store_with_history(dir.path());
        let unknown_feature = store.get_online_features(&["loan_features:salary".to_string()], &[1]);
        assert!(matches!(unknown_feature, Err(LakeError::FeatureStore(_))));
        let unknown_view = store.get_online_features(&["other:age".to_string()], &[1]);
        assert!(matches!(unknown_view, Err(LakeError::FeatureStore(_))));
    }

    #[test]
    fn test_offline_column_missing() {
        let dir = TempDir::new().unwrap();
        let store = store_with_history(dir.path());
        let result = store.get_online_features(&["loan_features:credit_commitment".to_string()], &[1]);
        assert!(matches!(result, Err(LakeError::FeatureStore(_))));
    }
}
