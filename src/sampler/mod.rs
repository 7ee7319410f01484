//! The do-sampler pipeline: disrupt → make effective → propagate.
//!
//! `DoSampler` is the three-stage contract every sampling strategy
//! implements; `WeightingSampler` is the inverse-propensity-weighting
//! realization. New strategies plug in by implementing the trait; the
//! session orchestration never changes.

mod core;
mod intervention;
mod weighting;

pub use self::core::*;
pub use intervention::*;
pub use weighting::*;
