//! BiCGSafe (Fujino): a product-type BiCG whose two stabilizing parameters ζ and η
//! minimize the residual over span{A r, y} at each step.

use std::ops::ControlFlow;

use crate::core::traits::Scalar;
use crate::core::vector::Vector;
use crate::matrix::Matrix;
use crate::parallel::Coherent;
use crate::preconditioner::Preconditioner;
use crate::solver::bicgstab::BRK_THRES;
use crate::solver::{Ksp, LinearSolver};
use crate::utils::convergence::BreakdownPolicy;

pub struct BiCgSafe<'a, T: Scalar> {
    ksp: Ksp<'a, T>,
    bthres: T::Real,
    policy: BreakdownPolicy,
    r: Vector<T>,
    r1: Vector<T>,
    rs0: Vector<T>,
    v: Vector<T>,
    u: Vector<T>,
    au: Vector<T>,
    p: Vector<T>,
    ap: Vector<T>,
    z: Vector<T>,
    y: Vector<T>,
    w: Vector<T>,
}

/// Scalars carried between iterations.
#[derive(Clone, Copy)]
struct Params<T> {
    alpha: T,
    beta: T,
    zeta: T,
    eta: T,
}

impl<'a, T: Scalar> BiCgSafe<'a, T> {
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
            rs0: Vector::new(m),
            v: Vector::new(m),
            u: Vector::new(m),
            au: Vector::new(m),
            p: Vector::new(m),
            ap: Vector::new(m),
            z: Vector::new(m),
            y: Vector::new(m),
            w: Vector::new(m),
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

    fn guard(&self, d: T, res0: T::Real) -> Option<T> {
        self.policy.guard(d, d.modulus(), res0, self.bthres, || self.ksp.prod(&self.rs0, &self.rs0))
    }

    /// ζ and η from the 2x2 normal equations of min |r - ζ v - η y|.
    fn stabilizers(&self) -> (T, T) {
        let yy = self.ksp.prod(&self.y, &self.y);
        let vv = self.ksp.prod(&self.v, &self.v);
        let vy = self.ksp.prod(&self.y, &self.v);
        let yr = self.ksp.prod(&self.r, &self.y);
        let vr = self.ksp.prod(&self.r, &self.v);
        let det = yy * vv - vy * vy.conj();
        ((yy * vr - vy * yr) / det, (vv * yr - vy.conj() * vr) / det)
    }

    /// Setup shared by both variants once r = b - A x and `self.r1` (r or M⁻¹r) are
    /// in place.
    fn prime(&mut self) -> Params<T> {
        self.rs0.copy_from(&self.r);
        self.p.copy_from(&self.r1);
        self.ksp.apply(&self.r1, &mut self.v);
        self.ap.copy_from(&self.v);
        let alpha = self.ksp.prod(&self.r, &self.rs0) / self.ksp.prod(&self.ap, &self.rs0);
        let zeta = self.ksp.prod(&self.r, &self.v) / self.ksp.prod(&self.v, &self.v);
        self.u.copy_from(&self.r);
        self.y.copy_from(&self.r);
        self.z.fill(T::zero());
        Params { alpha, beta: T::zero(), zeta, eta: T::zero() }
    }

    fn iterate(&mut self, x: &mut Vector<T>, precondition: bool) -> bool {
        let res0 = match self.ksp.start(x, &mut self.r) {
            ControlFlow::Break(ok) => return ok,
            ControlFlow::Continue(res0) => res0,
        };
        let mut res = res0;
        self.r1.copy_from(&self.r);
        if precondition {
            self.ksp.precondition(&mut self.r1);
        }
        let mut k = self.prime();

        for i in 0..self.ksp.iter_max() {
            if let Some(ok) = self.ksp.check(i, res, res0, x) {
                return ok;
            }
            // w = ζ Ap + η y
            self.w.copy_from(&self.y);
            self.w.scal(k.eta);
            self.w.axpy(k.zeta, &self.ap);
            if precondition {
                self.ksp.precondition(&mut self.w);
            }
            self.u.xpay(&self.w, k.eta * k.beta);
            self.ksp.apply(&self.u, &mut self.au);

            // z = ζ r1 + η z - α u ; y = ζ v + η y - α Au
            self.z.scal(k.eta);
            self.z.axpy(k.zeta, &self.r1);
            self.z.axpy(-k.alpha, &self.u);
            self.y.scal(k.eta);
            self.y.axpy(k.zeta, &self.v);
            self.y.axpy(-k.alpha, &self.au);
            x.axpy(k.alpha, &self.p);
            x.axpy(T::one(), &self.z);

            self.r1.copy_from(&self.r);
            self.r1.axpy(-k.alpha, &self.ap);
            self.r1.axpy(-T::one(), &self.y);

            let num = self.ksp.prod(&self.r1, &self.rs0);
            let den = self.ksp.prod(&self.r, &self.rs0);
            let Some(den) = self.guard(den, res0) else { return self.ksp.exhausted(i, res) };
            k.beta = k.alpha / k.zeta * (num / den);
            self.r.copy_from(&self.r1);
            if precondition {
                self.ksp.precondition(&mut self.r1);
            }

            // p = r1 + β (p - u) ; Ap = v + β (Ap - Au)
            self.p.axpy(-T::one(), &self.u);
            self.p.xpay(&self.r1, k.beta);
            self.ksp.apply(&self.r1, &mut self.v);
            self.ap.axpy(-T::one(), &self.au);
            self.ap.xpay(&self.v, k.beta);

            let num = self.ksp.prod(&self.r, &self.rs0);
            let den = self.ksp.prod(&self.ap, &self.rs0);
            let Some(den) = self.guard(den, res0) else { return self.ksp.exhausted(i, res) };
            k.alpha = num / den;
            (k.zeta, k.eta) = self.stabilizers();
            res = self.ksp.fix_norm(&self.r);
        }
        let n = self.ksp.iter_max();
        self.ksp.exhausted(n, res)
    }
}

impl<'a, T: Scalar> LinearSolver<'a, T> for BiCgSafe<'a, T> {
    fn name(&self) -> &'static str {
        "bicgsafe"
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
        [&self.r, &self.r1, &self.rs0, &self.v, &self.u, &self.au, &self.p, &self.ap, &self.z, &self.y, &self.w]
            .iter()
            .map(|v| v.mem())
            .sum::<usize>()
            + std::mem::size_of::<T::Real>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preconditioner::{Ilu, JacobiConditioner};
    use crate::solver::testing::{assert_expected, convection, ones, poisson};
    use approx::assert_abs_diff_eq;
    use num_complex::Complex64;

    #[test]
    fn solves_tridiagonal() {
        let a = poisson(5);
        let b = ones(5);
        let mut s = BiCgSafe::new(&a, &b, None, None);
        let mut x = Vector::new(5);
        assert!(s.solve(&mut x));
        assert_expected(&x);
        assert!(s.stats().converged);
        assert!(s.mem() > 11 * 5 * std::mem::size_of::<f64>());
    }

    #[test]
    fn preconditioned_unsymmetric() {
        let a = convection(16);
        let b = ones(16);
        let mut ilu = Ilu::new(&a, 1, 0.0, false);
        ilu.factor();
        for pc in [&ilu as &dyn Preconditioner<f64>, &JacobiConditioner::new(&a)] {
            let mut s = BiCgSafe::new(&a, &b, Some(pc), None);
            s.ksp_mut().set_iter_max(100);
            let mut x = Vector::new(16);
            assert!(s.solve(&mut x));
            let ax = Vector::from_expr(&a * &x);
            for v in ax.iter() {
                assert_abs_diff_eq!(*v, 1.0, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn complex_system() {
        let i = Complex64::new(0.0, 1.0);
        let d = Complex64::new(4.0, 1.0);
        let a = Matrix::from_triplets(
            3,
            3,
            &[(0, 0, d), (0, 1, i), (1, 0, -i), (1, 1, d), (1, 2, i), (2, 1, Complex64::new(1.0, 0.0)), (2, 2, d)],
        );
        let b = Vector::from_slice(&[Complex64::new(1.0, 0.0), Complex64::new(0.0, 2.0), Complex64::new(-1.0, 1.0)]);
        let mut s = BiCgSafe::new(&a, &b, None, None);
        s.ksp_mut().set_iter_max(30);
        let mut x = Vector::new(3);
        assert!(s.solve(&mut x));
        let ax = Vector::from_expr(&a * &x);
        for (u, v) in ax.iter().zip(b.iter()) {
            assert_abs_diff_eq!(u.re, v.re, epsilon = 1e-9);
            assert_abs_diff_eq!(u.im, v.im, epsilon = 1e-9);
        }
    }
}
