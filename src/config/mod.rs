//! Build-time feature flags and runtime solver options.
//!
//! - [`features`]: the fixed set of build capabilities as bitflags, plus storage constants.
//! - [`options`]: `SolverOptions`, the explicit configuration passed into solver construction.

pub mod features;
pub mod options;

pub use features::{BuildFeatures, CACHE_LINE, DATA_ALIGNMENT};
pub use options::{SolverOptions, init_thread_pool};
