//! Pure table transformations used by the cleaning and derivation stages

pub mod cleaning;
pub mod features;

pub use cleaning::{clean_dataset, Cleaned};
pub use features::{derive_features, Derived, MinMax, ScalingParams};
