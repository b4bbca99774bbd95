//! BiCGSTAB (van der Vorst) with a guarded denominator.

use std::ops::ControlFlow;

use crate::core::traits::Scalar;
use crate::core::vector::Vector;
use crate::matrix::Matrix;
use crate::parallel::Coherent;
use crate::preconditioner::Preconditioner;
use crate::solver::{Ksp, LinearSolver};
use crate::utils::convergence::BreakdownPolicy;

/// Default breakdown threshold.
pub const BRK_THRES: f64 = 1e-16;

pub struct BiCgStab<'a, T: Scalar> {
    ksp: Ksp<'a, T>,
    bthres: T::Real,
    policy: BreakdownPolicy,
    r: Vector<T>,
    r1: Vector<T>,
    r2: Vector<T>,
    rs0: Vector<T>,
    p: Vector<T>,
    p1: Vector<T>,
    ap: Vector<T>,
    s: Vector<T>,
    s1: Vector<T>,
    s2: Vector<T>,
}

impl<'a, T: Scalar> BiCgStab<'a, T> {
    pub fn new(
        a: &'a Matrix<T>,
        b: &'a Vector<T>,
        pc: Option<&'a dyn Preconditioner<T>>,
        coherent: Option<&'a dyn Coherent<T>>,
    ) -> Self {
        let m = a.m();
        let mut ksp = Ksp::new(a, b, pc, coherent);
        ksp.set_iter_max(m);
        Self {
            ksp,
            bthres: T::Real::from_f64(BRK_THRES),
            policy: BreakdownPolicy::default(),
            r: Vector::new(m),
            r1: Vector::new(m),
            r2: Vector::new(m),
            rs0: Vector::new(m),
            p: Vector::new(m),
            p1: Vector::new(m),
            ap: Vector::new(m),
            s: Vector::new(m),
            s1: Vector::new(m),
            s2: Vector::new(m),
        }
    }

    pub fn brk_thres(&self) -> T::Real {
        self.bthres
    }

    /// Returns the previous threshold.
    pub fn set_brk_thres(&mut self, t: T::Real) -> T::Real {
        std::mem::replace(&mut self.bthres, t)
    }

    pub fn policy(&self) -> BreakdownPolicy {
        self.policy
    }

    pub fn set_policy(&mut self, policy: BreakdownPolicy) -> BreakdownPolicy {
        std::mem::replace(&mut self.policy, policy)
    }

    /// Denominator `d` after the breakdown policy; `None` aborts the solve.
    fn guard(&self, d: T, res0: T::Real) -> Option<T> {
        self.policy.guard(d, d.modulus(), res0, self.bthres, || self.ksp.prod(&self.rs0, &self.rs0))
    }

    /// ω = (s, t) / (t, t). A vanishing t means the half step already solved the
    /// system, so ω = 0 keeps r = s.
    fn stabilizer(&self, s: &Vector<T>, t: &Vector<T>) -> T {
        let tt = self.ksp.prod(t, t);
        if tt == T::zero() { T::zero() } else { self.ksp.prod(s, t) / tt }
    }
}

impl<'a, T: Scalar> LinearSolver<'a, T> for BiCgStab<'a, T> {
    fn name(&self) -> &'static str {
        "bicgstab"
    }

    fn ksp(&self) -> &Ksp<'a, T> {
        &self.ksp
    }

    fn ksp_mut(&mut self) -> &mut Ksp<'a, T> {
        &mut self.ksp
    }

    fn solve_plain(&mut self, x: &mut Vector<T>) -> bool {
        let res0 = match self.ksp.start(x, &mut self.r) {
            ControlFlow::Break(ok) => return ok,
            ControlFlow::Continue(res0) => res0,
        };
        let mut res = res0;
        self.rs0.copy_from(&self.r);
        self.p.copy_from(&self.r);

        for i in 0..self.ksp.iter_max() {
            if let Some(ok) = self.ksp.check(i, res, res0, x) {
                return ok;
            }
            self.ksp.apply(&self.p, &mut self.ap);

            let num = self.ksp.prod(&self.r, &self.rs0);
            let den = self.ksp.prod(&self.ap, &self.rs0);
            let Some(den) = self.guard(den, res0) else { return self.ksp.exhausted(i, res) };
            let alpha = num / den;
            self.s.copy_from(&self.r);
            self.s.axpy(-alpha, &self.ap);

            self.ksp.apply(&self.s, &mut self.s1);
            let omega = self.stabilizer(&self.s, &self.s1);
            x.axpy(alpha, &self.p);
            x.axpy(omega, &self.s);

            self.r1.copy_from(&self.s);
            self.r1.axpy(-omega, &self.s1);

            let num = self.ksp.prod(&self.r1, &self.rs0);
            let den = self.ksp.prod(&self.r, &self.rs0);
            let beta = alpha / omega * num / den;
            self.p.axpy(-omega, &self.ap);
            self.p.xpay(&self.r1, beta);

            std::mem::swap(&mut self.r, &mut self.r1);
            res = self.ksp.fix_norm(&self.r);
        }
        let n = self.ksp.iter_max();
        self.ksp.exhausted(n, res)
    }

    fn solve_preconditioned(&mut self, x: &mut Vector<T>) -> bool {
        let res0 = match self.ksp.start(x, &mut self.r) {
            ControlFlow::Break(ok) => return ok,
            ControlFlow::Continue(res0) => res0,
        };
        let mut res = res0;
        self.rs0.copy_from(&self.r);
        self.ksp.precondition(&mut self.rs0);
        self.r1.copy_from(&self.rs0);
        self.p.copy_from(&self.rs0);

        for i in 0..self.ksp.iter_max() {
            if let Some(ok) = self.ksp.check(i, res, res0, x) {
                return ok;
            }
            self.ksp.apply(&self.p, &mut self.ap);
            self.p1.copy_from(&self.ap);
            self.ksp.precondition(&mut self.p1);

            let num = self.ksp.prod(&self.r1, &self.rs0);
            let den = self.ksp.prod(&self.p1, &self.rs0);
            let Some(den) = self.guard(den, res0) else { return self.ksp.exhausted(i, res) };
            let alpha = num / den;
            self.s.copy_from(&self.r);
            self.s.axpy(-alpha, &self.ap);
            self.s1.copy_from(&self.r1);
            self.s1.axpy(-alpha, &self.p1);

            self.ksp.apply(&self.s1, &mut self.s2);
            let omega = self.stabilizer(&self.s, &self.s2);
            x.axpy(alpha, &self.p);
            x.axpy(omega, &self.s1);

            self.r.copy_from(&self.s);
            self.r.axpy(-omega, &self.s2);
            self.r2.copy_from(&self.r);
            self.ksp.precondition(&mut self.r2);

            let num = self.ksp.prod(&self.r2, &self.rs0);
            let den = self.ksp.prod(&self.r1, &self.rs0);
            let Some(den) = self.guard(den, res0) else { return self.ksp.exhausted(i, res) };
            let beta = alpha / omega * num / den;
            self.p.axpy(-omega, &self.p1);
            self.p.xpay(&self.r2, beta);
            std::mem::swap(&mut self.r1, &mut self.r2);

            res = self.ksp.fix_norm(&self.r);
        }
        let n = self.ksp.iter_max();
        self.ksp.exhausted(n, res)
    }

    fn workspace_mem(&self) -> usize {
        [&self.r, &self.r1, &self.r2, &self.rs0, &self.p, &self.p1, &self.ap, &self.s, &self.s1, &self.s2]
            .iter()
            .map(|v| v.mem())
            .sum::<usize>()
            + std::mem::size_of::<T::Real>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preconditioner::{Ilu, SorConditioner};
    use crate::solver::testing::{assert_expected, convection, ones, poisson};
    use approx::assert_abs_diff_eq;

    #[test]
    fn solves_tridiagonal() {
        let a = poisson(5);
        let b = ones(5);
        let mut s = BiCgStab::new(&a, &b, None, None);
        assert_eq!(s.ksp().iter_max(), 5);
        assert_eq!(s.brk_thres(), 1e-16);
        let mut x = Vector::new(5);
        assert!(s.solve(&mut x));
        assert_expected(&x);
    }

    #[test]
    fn preconditioned_unsymmetric() {
        let a = convection(12);
        let b = ones(12);
        let mut ilu = Ilu::new(&a, 0, 0.0, false);
        ilu.factor();
        let mut s = BiCgStab::new(&a, &b, Some(&ilu), None);
        let mut x = Vector::new(12);
        assert!(s.solve(&mut x));
        let ax = Vector::from_expr(&a * &x);
        for v in ax.iter() {
            assert_abs_diff_eq!(*v, 1.0, epsilon = 1e-9);
        }

        let sor = SorConditioner::new(&a, 1.0);
        let mut s = BiCgStab::new(&a, &b, Some(&sor), None);
        s.ksp_mut().set_iter_max(100);
        let mut y = Vector::new(12);
        assert!(s.solve(&mut y));
        for (u, v) in x.iter().zip(y.iter()) {
            assert_abs_diff_eq!(*u, *v, epsilon = 1e-9);
        }
    }

    #[test]
    fn abort_policy_reports_failure() {
        // b orthogonal to A b makes the first denominator vanish
        let a = Matrix::from_triplets(2, 2, &[(0, 1, 1.0), (1, 0, -1.0)]);
        let b = Vector::from_slice(&[1.0, 0.0]);
        let mut s = BiCgStab::new(&a, &b, None, None);
        assert_eq!(s.set_policy(BreakdownPolicy::Abort), BreakdownPolicy::Substitute);
        let mut x = Vector::new(2);
        assert!(!s.solve(&mut x));
    }

    #[test]
    fn exact_preconditioner_stops_after_half_step() {
        let a = poisson(5);
        let b = ones(5);
        let mut ilu = Ilu::new(&a, 0, 0.0, false);
        ilu.factor();
        let mut s = BiCgStab::new(&a, &b, Some(&ilu), None);
        let mut x = Vector::new(5);
        assert!(s.solve(&mut x));
        assert_expected(&x);
        assert!(s.ksp().iterations() <= 1);
    }
}
