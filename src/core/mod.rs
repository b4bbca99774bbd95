//! Scalars, dense vectors and the lazy expression layer.

pub mod expression;
pub(crate) mod kernels;
pub mod traits;
pub mod vector;

pub use expression::{Expr, Minus, Plus, Product, Scaled};
pub use traits::{Scalar, dot};
pub use vector::Vector;
