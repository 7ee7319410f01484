//! Core data models for intervene.

mod config;
mod dataset;
mod error;

pub use config::*;
pub use dataset::*;
pub use error::*;
