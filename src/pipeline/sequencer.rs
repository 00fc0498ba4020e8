use super::stages::{
    CleanStage, DeriveStage, IngestStage, RegisterFeaturesStage, TrainStage, ValidateStage,
};
use super::{Pipeline, PipelineContext, PipelineResult, PipelineStage};
use crate::arrival::ArrivalKey;
use crate::config::LakeConfig;
use crate::error::{LakeError, LakeResult};
use crate::feature_store::{FeatureStore, LocalFeatureStore};
use crate::logger::RunLogger;
use crate::snapshot::{SnapshotSource, SqliteSnapshot};
use crate::store::PartitionStore;
use crate::validation::{RuleEngine, Validator};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Stages of the daily run, declared in their only legal order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StageId {
    Ingest,
    Validate,
    Clean,
    Derive,
    RegisterFeatures,
    Train,
}

impl StageId {
    pub const ALL: [StageId; 6] = [
        StageId::Ingest,
        StageId::Validate,
        StageId::Clean,
        StageId::Derive,
        StageId::RegisterFeatures,
        StageId::Train,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StageId::Ingest => "ingest",
            StageId::Validate => "validate",
            StageId::Clean => "clean",
            StageId::Derive => "derive",
            StageId::RegisterFeatures => "register-features",
            StageId::Train => "train",
        }
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StageId {
    type Err = LakeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StageId::ALL
            .into_iter()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| LakeError::Pipeline(format!("unknown stage '{}'", s)))
    }
}

/// Builds and runs pipelines over one lake
///
/// Whatever stage list is requested, stages always run in [`StageId::ALL`]
/// order and each at most once.
pub struct Sequencer {
    config: LakeConfig,
    store: PartitionStore,
    snapshot: Arc<dyn SnapshotSource>,
    validator: Arc<dyn Validator>,
    feature_store: Arc<dyn FeatureStore>,
}

impl Sequencer {
    pub fn new(
        config: LakeConfig,
        snapshot: Arc<dyn SnapshotSource>,
        validator: Arc<dyn Validator>,
        feature_store: Arc<dyn FeatureStore>,
    ) -> Self {
        let store = PartitionStore::new(&config.lake_root);
        Self {
            config,
            store,
            snapshot,
            validator,
            feature_store,
        }
    }

    /// SQLite snapshot, in-process rule engine and file-backed feature store
    pub fn local(config: LakeConfig) -> Self {
        let store = PartitionStore::new(&config.lake_root);
        let snapshot = Arc::new(SqliteSnapshot::new(&config.snapshot_db));
        let feature_store = Arc::new(LocalFeatureStore::new(&config.feature_repo_dir, store));
        Self::new(config, snapshot, Arc::new(RuleEngine), feature_store)
    }

    pub fn config(&self) -> &LakeConfig {
        &self.config
    }

    pub fn store(&self) -> &PartitionStore {
        &self.store
    }

    fn stage(&self, id: StageId) -> Box<dyn PipelineStage> {
        let store = self.store.clone();
        match id {
            StageId::Ingest => Box::new(IngestStage::new(
                store,
                Arc::clone(&self.snapshot),
                self.config.snapshot_table.clone(),
            )),
            StageId::Validate => Box::new(ValidateStage::new(
                store,
                Arc::clone(&self.validator),
                self.config.validation_reports_dir.clone(),
            )),
            StageId::Clean => Box::new(CleanStage::new(store, self.config.cleaning.clone())),
            StageId::Derive => Box::new(DeriveStage::new(store, self.config.features.clone())),
            StageId::RegisterFeatures => Box::new(RegisterFeaturesStage::new(
                store,
                Arc::clone(&self.feature_store),
                self.config.features.feature_view.clone(),
            )),
            StageId::Train => Box::new(TrainStage::new(
                store,
                Arc::clone(&self.feature_store),
                self.config.training.clone(),
                self.config.features.join_key.clone(),
                self.config.features.event_timestamp_column.clone(),
                self.config.models_dir.clone(),
            )),
        }
    }

    /// Pipeline of the requested stages in canonical order
    pub fn pipeline(&self, name: &str, stages: &[StageId]) -> Pipeline {
        let mut ids = stages.to_vec();
        ids.sort();
        ids.dedup();
        ids.into_iter()
            .fold(Pipeline::builder(name), |builder, id| {
                builder.add_boxed_stage(self.stage(id))
            })
            .build()
    }

    /// Run the requested stages against an existing context
    pub fn run_in(
        &self,
        name: &str,
        stages: &[StageId],
        context: &mut PipelineContext,
    ) -> LakeResult<PipelineResult> {
        self.pipeline(name, stages).execute(context)
    }

    pub fn run(
        &self,
        name: &str,
        stages: &[StageId],
        key: ArrivalKey,
        logger: RunLogger,
    ) -> LakeResult<PipelineResult> {
        let mut context = PipelineContext::new(key, logger);
        self.run_in(name, stages, &mut context)
    }

    /// The full daily sequence
    pub fn run_all(&self, key: ArrivalKey, logger: RunLogger) -> LakeResult<PipelineResult> {
        self.run("daily", &StageId::ALL, key, logger)
    }
}
