//! Convergence bookkeeping shared by the Krylov solvers.

pub mod convergence;

pub use convergence::{BreakdownPolicy, Convergence, SolveStats};
