//! Successive over-relaxation; ω = 1 is Gauss-Seidel.
//!
//! The preconditioned variant follows each sweep with the correction
//! x ← x + M⁻¹ (b - A x).

use std::ops::ControlFlow;

use num_traits::{One, Zero};

use crate::core::traits::Scalar;
use crate::core::vector::Vector;
use crate::matrix::Matrix;
use crate::parallel::Coherent;
use crate::preconditioner::Preconditioner;
use crate::solver::{Ksp, LinearSolver};

pub struct Sor<'a, T: Scalar> {
    ksp: Ksp<'a, T>,
    accel: T::Real,
    r: Vector<T>,
}

impl<'a, T: Scalar> Sor<'a, T> {
    pub fn new(
        a: &'a Matrix<T>,
        b: &'a Vector<T>,
        pc: Option<&'a dyn Preconditioner<T>>,
        coherent: Option<&'a dyn Coherent<T>>,
    ) -> Self {
        Self { ksp: Ksp::new(a, b, pc, coherent), accel: T::Real::one(), r: Vector::new(a.m()) }
    }

    pub fn accel(&self) -> T::Real {
        self.accel
    }

    /// Takes ω only when 0 < ω < 2 and returns the previous value; any other ω is
    /// handed back unchanged.
    pub fn set_accel(&mut self, omega: T::Real) -> T::Real {
        let two = T::Real::one() + T::Real::one();
        if omega > T::Real::zero() && omega < two {
            std::mem::replace(&mut self.accel, omega)
        } else {
            omega
        }
    }

    /// One forward sweep in place. A row without a stored diagonal is taken as 1.
    fn sweep(&self, x: &mut Vector<T>) {
        let a = self.ksp.a();
        let b = self.ksp.b();
        let omega = T::from_real(self.accel);
        for i in 0..a.m() {
            let mut acc = b[i];
            let mut diag = T::one();
            for k in a.row(i) {
                let j = a.col()[k];
                if j == i {
                    diag = a.val()[k];
                } else {
                    acc -= a.val()[k] * x[j];
                }
            }
            let xi = x[i];
            x[i] = xi + omega * (acc / diag - xi);
        }
        self.ksp.sync(x);
    }

    fn iterate(&mut self, x: &mut Vector<T>, precondition: bool) -> bool {
        let res0 = match self.ksp.start(x, &mut self.r) {
            ControlFlow::Break(ok) => return ok,
            ControlFlow::Continue(res0) => res0,
        };
        let mut res = res0;
        for i in 0..self.ksp.iter_max() {
            if let Some(ok) = self.ksp.check(i, res, res0, x) {
                return ok;
            }
            self.sweep(x);
            res = self.ksp.residual_of(x, &mut self.r);
            if precondition {
                self.ksp.precondition(&mut self.r);
                x.axpy(T::one(), &self.r);
                res = self.ksp.residual_of(x, &mut self.r);
            }
        }
        let n = self.ksp.iter_max();
        self.ksp.exhausted(n, res)
    }
}

impl<'a, T: Scalar> LinearSolver<'a, T> for Sor<'a, T> {
    fn name(&self) -> &'static str {
        "sor"
    }

    fn ksp(&self) -> &Ksp<'a, T> {
        &self.ksp
    }

    fn ksp_mut(&mut self) -> &mut Ksp<'a, T> {
        &mut self.ksp
    }

    fn solve_plain(&mut self, x: &mut Vector<T>) -> bool {
        self.iterate(x, false)
    }

    fn solve_preconditioned(&mut self, x: &mut Vector<T>) -> bool {
        self.iterate(x, true)
    }

    fn workspace_mem(&self) -> usize {
        self.r.mem() + std::mem::size_of::<T::Real>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preconditioner::JacobiConditioner;
    use crate::solver::testing::{assert_expected, convection, ones, poisson};
    use approx::assert_abs_diff_eq;

    #[test]
    fn accel_accepts_open_interval_only() {
        let a = poisson(5);
        let b = ones(5);
        let mut s = Sor::new(&a, &b, None, None);
        assert_eq!(s.accel(), 1.0);
        assert_eq!(s.set_accel(1.5), 1.0);
        assert_eq!(s.accel(), 1.5);
        assert_eq!(s.set_accel(2.0), 2.0);
        assert_eq!(s.set_accel(0.0), 0.0);
        assert_eq!(s.accel(), 1.5);
    }

    #[test]
    fn over_relaxation_speeds_up_gauss_seidel() {
        let a = poisson(5);
        let b = ones(5);
        let mut s = Sor::new(&a, &b, None, None);
        s.ksp_mut().set_iter_max(1000);
        let mut x = Vector::new(5);
        assert!(s.solve(&mut x));
        assert_expected(&x);
        let gs = s.stats().iterations;

        s.set_accel(1.3);
        let mut x = Vector::new(5);
        assert!(s.solve(&mut x));
        assert_expected(&x);
        assert!(s.stats().iterations < gs);
    }

    #[test]
    fn preconditioned_sweep() {
        let a = convection(10);
        let b = ones(10);
        let jc = JacobiConditioner::new(&a);
        let mut s = Sor::new(&a, &b, Some(&jc), None);
        s.ksp_mut().set_iter_max(200);
        let mut x = Vector::new(10);
        assert!(s.solve(&mut x));
        let ax = Vector::from_expr(&a * &x);
        for v in ax.iter() {
            assert_abs_diff_eq!(*v, 1.0, epsilon = 1e-9);
        }
    }
}
