//! Lake stages of the daily run
//!
//! In run order:
//! 1. IngestStage - landing files and the customer snapshot into `raw`
//! 2. ValidateStage - data contracts of the raw datasets
//! 3. CleanStage - gated on validation, `raw` into `cleaned`
//! 4. DeriveStage - joined features into `aggregated`
//! 5. RegisterFeaturesStage - feature view registration
//! 6. TrainStage - campaign classifier

pub mod clean;
pub mod derive;
pub mod ingest;
pub mod register;
pub mod train;
pub mod validate;

// Re-export stages
pub use clean::CleanStage;
pub use derive::DeriveStage;
pub use ingest::IngestStage;
pub use register::RegisterFeaturesStage;
pub use train::TrainStage;
pub use validate::ValidateStage;
