//! Direct solvers behind a factor/solve seam.
//!
//! A direct backend borrows the matrix, factors it once and then solves any
//! number of right-hand sides. [`DenseLu`] is the built-in backend: a faer LU
//! with partial pivoting on the dense copy of A, suited to the small coarse or
//! per-rank systems a domain decomposition leaves behind.

use faer::linalg::solvers::{PartialPivLu, SolveCore};
use faer::{Conj, MatMut};

use crate::core::traits::Scalar;
use crate::core::vector::Vector;
use crate::matrix::Matrix;

pub trait DirectSolver<T: Scalar> {
    /// Factor the borrowed matrix. `false` when it is not square or the factors
    /// are singular.
    fn factor(&mut self) -> bool;
    /// x ← A⁻¹ b with the last factorization; `false` before a successful
    /// [`factor`](Self::factor) or when the result is not finite.
    fn solve(&self, b: &Vector<T>, x: &mut Vector<T>) -> bool;
    /// Bytes held by the factors.
    fn mem(&self) -> usize;
}

pub struct DenseLu<'a> {
    a: &'a Matrix<f64>,
    factor: Option<PartialPivLu<f64>>,
    mem: usize,
}

impl<'a> DenseLu<'a> {
    pub fn new(a: &'a Matrix<f64>) -> Self {
        Self { a, factor: None, mem: 0 }
    }

    pub fn is_factored(&self) -> bool {
        self.factor.is_some()
    }

    fn solve_slice(factor: &PartialPivLu<f64>, x: &mut [f64]) -> bool {
        let n = x.len();
        factor.solve_in_place_with_conj(Conj::No, MatMut::from_column_major_slice_mut(x, n, 1));
        x.iter().all(|v| v.is_finite())
    }
}

impl DirectSolver<f64> for DenseLu<'_> {
    fn factor(&mut self) -> bool {
        self.factor = None;
        self.mem = 0;
        let n = self.a.m();
        if n != self.a.n() {
            log::warn!("direct LU needs a square matrix, got {}x{}", n, self.a.n());
            return false;
        }
        let factor = PartialPivLu::new(self.a.to_dense().as_ref());
        // a zero pivot shows up as a non-finite solve
        let mut probe = vec![1.0; n];
        if !Self::solve_slice(&factor, &mut probe) {
            log::debug!("direct LU of order {}: singular", n);
            return false;
        }
        self.mem = n * n * std::mem::size_of::<f64>() + 2 * n * std::mem::size_of::<usize>();
        self.factor = Some(factor);
        log::debug!("direct LU of order {}: {} bytes", n, self.mem);
        true
    }

    fn solve(&self, b: &Vector<f64>, x: &mut Vector<f64>) -> bool {
        let Some(factor) = &self.factor else {
            return false;
        };
        assert_eq!(b.m(), self.a.m());
        assert_eq!(x.m(), self.a.n());
        x.copy_from(b);
        Self::solve_slice(factor, x.val_mut())
    }

    fn mem(&self) -> usize {
        self.mem
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::testing::{assert_expected, convection, ones, poisson};
    use approx::assert_abs_diff_eq;

    #[test]
    fn solves_tridiagonal() {
        let a = poisson(5);
        let mut lu = DenseLu::new(&a);
        assert!(lu.factor());
        assert!(lu.mem() > 0);
        let mut x = Vector::new(5);
        assert!(lu.solve(&ones(5), &mut x));
        assert_expected(&x);
    }

    #[test]
    fn factors_are_reused_across_right_hand_sides() {
        let a = convection(10);
        let mut lu = DenseLu::new(&a);
        assert!(lu.factor());
        for k in 0..3 {
            let b = Vector::from_slice(&(0..10).map(|i| (i + k) as f64).collect::<Vec<_>>());
            let mut x = Vector::new(10);
            assert!(lu.solve(&b, &mut x));
            let r = Vector::from_expr(&b - &a * &x);
            assert_abs_diff_eq!(r.norm(), 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn solve_needs_a_factorization() {
        let a = poisson(4);
        let lu = DenseLu::new(&a);
        let mut x = Vector::new(4);
        assert!(!lu.is_factored());
        assert!(!lu.solve(&ones(4), &mut x));
    }

    #[test]
    fn singular_and_rectangular_matrices_are_rejected() {
        let singular = Matrix::from_triplets(3, 3, &[(0, 0, 1.0), (0, 1, 2.0), (1, 0, 2.0), (1, 1, 4.0), (2, 2, 1.0)]);
        let mut lu = DenseLu::new(&singular);
        assert!(!lu.factor());
        assert_eq!(lu.mem(), 0);

        let wide = Matrix::from_triplets(2, 3, &[(0, 0, 1.0), (1, 1, 1.0), (1, 2, 1.0)]);
        assert!(!DenseLu::new(&wide).factor());
    }
}
