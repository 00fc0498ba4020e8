//! Stage runner for the lake
//!
//! A pipeline executes stages sequentially against one shared context keyed by
//! a single arrival key. Each stage reads from the layer the previous stage
//! wrote; the executor stops at the first failure and returns per-stage results
//! together with the run's quality report.
//!
//! # Example
//! ```ignore
//! use loanlake::arrival::ArrivalKey;
//! use loanlake::config::LakeConfig;
//! use loanlake::logger::RunLogger;
//! use loanlake::pipeline::Sequencer;
//!
//! let sequencer = Sequencer::local(LakeConfig::from_env()?);
//! let result = sequencer.run_all(ArrivalKey::today(), RunLogger::new("daily"))?;
//! assert!(result.success);
//! ```

pub mod context;
pub mod core;
pub mod executor;
pub mod sequencer;
pub mod stages;

// Re-export main types
pub use context::PipelineContext;
pub use core::{PipelineResult, PipelineStage, StageResult};
pub use executor::{check_layer_order, Pipeline, PipelineBuilder};
pub use sequencer::{Sequencer, StageId};
