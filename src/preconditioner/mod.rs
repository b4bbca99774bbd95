//! Preconditioners for the Krylov solvers.
//!
//! A preconditioner splits M ≈ A as M = L U and is applied in two half-steps,
//! `forward` (x ← L⁻¹ x) and `backward` (x ← U⁻¹ x), both in place. The inverse
//! half-steps multiply by the factors again. Every implementation borrows the
//! matrix it was built from and never modifies it.

use crate::core::traits::Scalar;
use crate::core::vector::Vector;

/// A split preconditioner M = L U.
pub trait Preconditioner<T: Scalar> {
    /// x ← L⁻¹ x
    fn forward(&self, x: &mut Vector<T>);
    /// x ← U⁻¹ x
    fn backward(&self, x: &mut Vector<T>);
    /// x ← L x
    fn forward_inv(&self, x: &mut Vector<T>);
    /// x ← U x
    fn backward_inv(&self, x: &mut Vector<T>);

    /// x ← M⁻¹ x
    fn apply(&self, x: &mut Vector<T>) {
        self.forward(x);
        self.backward(x);
    }

    /// x ← M x
    fn apply_inv(&self, x: &mut Vector<T>) {
        self.backward_inv(x);
        self.forward_inv(x);
    }

    /// Bytes held beyond the borrowed matrix.
    fn mem(&self) -> usize {
        0
    }
}

pub mod fillin;
pub mod ic;
pub mod ilu;
pub mod jacobi;
pub mod sor;

pub use fillin::{FillRule, Fillin};
pub use ic::Ic;
pub use ilu::Ilu;
pub use jacobi::JacobiConditioner;
pub use sor::SorConditioner;

/// Storage slot of every row's diagonal, `None` where it is not stored.
pub(crate) fn diagonal_slots(ind: &[usize], col: &[usize], m: usize) -> Vec<Option<usize>> {
    (0..m)
        .map(|i| (ind[i]..ind[i + 1]).find(|&k| col[k] == i))
        .collect()
}
