//! Pipeline module - batch interventional draw runner.

mod draws;

pub use draws::*;
