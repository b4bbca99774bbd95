//! Element-indexed functions and operators, and their partitioning.

mod entire;
mod linear_function;
mod linear_operator;
mod subjugator;

pub use entire::{EntireFunction, EntireOperator};
pub use linear_function::LinearFunction;
pub use linear_operator::LinearOperator;
pub use subjugator::Subjugator;
