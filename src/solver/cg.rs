//! Conjugate Gradient for Hermitian positive definite systems.

use std::ops::ControlFlow;

use num_traits::{One, Zero};

use crate::core::traits::Scalar;
use crate::core::vector::Vector;
use crate::matrix::Matrix;
use crate::parallel::Coherent;
use crate::preconditioner::Preconditioner;
use crate::solver::{Ksp, LinearSolver};

pub struct Cg<'a, T: Scalar> {
    ksp: Ksp<'a, T>,
    p: Vector<T>,
    q: Vector<T>,
    r: Vector<T>,
    z: Vector<T>,
}

impl<'a, T: Scalar> Cg<'a, T> {
    pub fn new(
        a: &'a Matrix<T>,
        b: &'a Vector<T>,
        pc: Option<&'a dyn Preconditioner<T>>,
        coherent: Option<&'a dyn Coherent<T>>,
    ) -> Self {
        let m = a.m();
        Self {
            ksp: Ksp::new(a, b, pc, coherent),
            p: Vector::new(m),
            q: Vector::new(m),
            r: Vector::new(m),
            z: Vector::new(m),
        }
    }

    fn iterate(&mut self, x: &mut Vector<T>, precondition: bool) -> bool {
        let res0 = match self.ksp.start(x, &mut self.r) {
            ControlFlow::Break(ok) => return ok,
            ControlFlow::Continue(res0) => res0,
        };
        let mut res = res0;
        let mut rho0 = T::one();
        self.p.fill(T::zero());

        for i in 0..self.ksp.iter_max() {
            if let Some(ok) = self.ksp.check(i, res, res0, x) {
                return ok;
            }
            self.z.copy_from(&self.r);
            if precondition {
                self.ksp.precondition(&mut self.z);
            }
            let rho = self.ksp.prod(&self.z, &self.r);
            let beta = rho / rho0;
            rho0 = rho;
            self.p.xpay(&self.z, beta);

            self.ksp.apply(&self.p, &mut self.q);
            let pq = self.ksp.prod(&self.q, &self.p);
            let alpha = rho / pq;
            x.axpy(alpha, &self.p);
            self.r.axpy(-alpha, &self.q);
            res = self.ksp.fix_norm(&self.r);
        }
        let n = self.ksp.iter_max();
        self.ksp.exhausted(n, res)
    }
}

impl<'a, T: Scalar> LinearSolver<'a, T> for Cg<'a, T> {
    fn name(&self) -> &'static str {
        "cg"
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
        self.p.mem() + self.q.mem() + self.r.mem() + self.z.mem()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preconditioner::{Ic, JacobiConditioner};
    use crate::solver::testing::{assert_expected, ones, poisson};

    #[test]
    fn solves_tridiagonal() {
        let a = poisson(5);
        let b = ones(5);
        let mut cg = Cg::new(&a, &b, None, None);
        assert_eq!(cg.ksp().iter_max(), 2);
        cg.ksp_mut().set_iter_max(20);
        let mut x = Vector::new(5);
        assert!(cg.solve(&mut x));
        assert_expected(&x);
        assert!(cg.ksp().iterations() <= 6);
    }

    #[test]
    fn default_cap_stops_early() {
        let a = poisson(5);
        let b = ones(5);
        let mut cg = Cg::new(&a, &b, None, None);
        let mut x = Vector::new(5);
        assert!(!cg.solve(&mut x));
        assert_eq!(cg.stats().iterations, 2);
        assert!(!cg.stats().converged);
    }

    #[test]
    fn preconditioned_matches() {
        let a = poisson(5);
        let b = ones(5);
        let mut ic = Ic::new(&a, 0);
        ic.factor();
        let mut cg = Cg::new(&a, &b, Some(&ic), None);
        cg.ksp_mut().set_iter_max(20);
        let mut x = Vector::new(5);
        assert!(cg.solve(&mut x));
        assert_expected(&x);
        assert!(cg.ksp().iterations() <= 1);

        let jac = JacobiConditioner::new(&a);
        let mut cg = Cg::new(&a, &b, Some(&jac), None);
        cg.ksp_mut().set_iter_max(20);
        let mut x = Vector::new(5);
        assert!(cg.solve(&mut x));
        assert_expected(&x);
    }

    #[test]
    fn trivial_rhs_returns_rhs() {
        let a = poisson(3);
        let b = Vector::new(3);
        let mut cg = Cg::new(&a, &b, None, None);
        let mut x = Vector::from_slice(&[1.0, 2.0, 3.0]);
        assert!(cg.solve(&mut x));
        assert_eq!(x.val(), &[0.0, 0.0, 0.0]);
    }
}
