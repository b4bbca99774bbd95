//! elai: elastic linear algebra over distributed index spaces.
//!
//! The crate pairs a small sparse linear algebra core with a topology layer that
//! knows which rank owns which unknown:
//!
//! - [`core`] and [`matrix`]: `Vector`, lazy vector expressions, the CSR `Matrix`
//!   with equilibration, and Matrix Market I/O.
//! - [`topology`]: elements, `Space` (an ordered set of unknowns with ghost pairs),
//!   `Family` (adjacency) and orderings.
//! - [`parallel`]: the `Comm` abstraction with serial, threaded and MPI backends,
//!   ghost `Coherence`, all-reduce `SumSync` and the rank-pair `Portal`.
//! - [`domain`]: `LinearFunction` and `LinearOperator` over spaces, the
//!   `Subjugator` that partitions them, and `Entire*` assembly of the global system.
//! - [`preconditioner`] and [`solver`]: incomplete factorizations and Krylov
//!   methods that work unchanged on one rank or many.
//! - [`context`] and [`config`]: option-driven construction of a solve.

pub mod config;
pub mod context;
pub mod core;
pub mod domain;
pub mod error;
pub mod matrix;
pub mod parallel;
pub mod preconditioner;
pub mod solver;
pub mod topology;
pub mod utils;

pub use config::{BuildFeatures, SolverOptions};
pub use context::{KspContext, PcContext, PcKind, SolverKind};
pub use core::{Scalar, Vector};
pub use domain::{EntireFunction, EntireOperator, LinearFunction, LinearOperator, Subjugator};
pub use error::{ElaiError, Result};
pub use matrix::Matrix;
pub use parallel::{Coherence, Coherent, Comm, SerialComm, SumSync, ThreadComm};
pub use preconditioner::Preconditioner;
pub use solver::{DirectSolver, LinearSolver};
pub use topology::{Family, Space};
pub use utils::{BreakdownPolicy, SolveStats};
