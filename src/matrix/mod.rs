//! Sparse matrix type and Matrix-Market stream I/O.

pub mod market;
pub mod sparse;

pub use market::{read_matrix, read_vector, write_matrix, write_vector};
pub use sparse::Matrix;
