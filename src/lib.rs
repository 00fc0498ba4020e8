//! Partitioned data lake for customer and loan records
//!
//! Records land as files, move through `raw`, `cleaned` and `aggregated`
//! partitions keyed by one arrival key per run, and end as features for a
//! campaign-outcome classifier.

pub mod arrival;
pub mod config;
pub mod error;
pub mod feature_store;
pub mod landing;
pub mod logger;
pub mod model;
pub mod pipeline;
pub mod quality;
pub mod snapshot;
pub mod store;
pub mod table;
pub mod transform;
pub mod validation;

pub use arrival::ArrivalKey;
pub use error::{LakeError, LakeResult};
