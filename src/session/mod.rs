//! Session orchestration: stateful/stateless execution of a do-sampler.

mod session;

pub use session::*;
