//! intervene - Simulation-based causal inference via do-sampling.
//!
//! ## Architecture
//!
//! Given observational data, an identified estimand, and an intervention,
//! intervene produces datasets that approximate draws from the
//! interventional distribution P(Y | do(D = d)):
//!
//! - **Propensity layer**: fits a model of treatment assignment from common
//!   causes (`PropensityEstimator` / `LogisticEstimator`)
//! - **Sampler**: the three-stage do-sampler pipeline of disrupt,
//!   make-effective, and propagate-and-sample (`DoSampler`,
//!   `WeightingSampler`)
//! - **Session**: stateful/stateless orchestration with explicit reset
//!   (`SamplingSession`)
//! - **Pipeline**: batch draw runner with JSONL input/output (`DrawRunner`)
//!
//! ## Concurrency
//!
//! A session is sequential and single-threaded. For variance estimation,
//! run many independent sessions in parallel; they share no state.

pub mod models;
pub mod pipeline;
pub mod propensity;
pub mod sampler;
pub mod session;

// Re-exports for convenience
pub use models::{
    ColumnType, Config, Dataset, DrawStats, Identification, InterveneError, Result, Stage, Value,
    VariableRole,
};
pub use pipeline::{DrawRecord, DrawRunner};
pub use propensity::{LogisticEstimator, PropensityEstimator, PropensityModel};
pub use sampler::{DoSampler, InterventionSpec, WeightSummary, WeightingSampler, WorkingFrame};
pub use session::SamplingSession;
