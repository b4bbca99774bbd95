//! Restarted GMRES(m) with right preconditioning.
//!
//! The upper Hessenberg matrix of a cycle is stored row-packed: row 0 and row 1
//! hold `restart` entries each, row `i >= 2` holds the `restart - i + 1` entries
//! from column `i - 1` on. Givens rotations keep it upper triangular as columns are
//! added, so the modulus of the rotated right-hand side's last entry is the residual
//! norm of the current iterate without forming it.

use std::ops::ControlFlow;

use num_traits::{Float, One, Zero};

use crate::core::traits::Scalar;
use crate::core::vector::Vector;
use crate::matrix::Matrix;
use crate::parallel::Coherent;
use crate::preconditioner::Preconditioner;
use crate::solver::{Ksp, LinearSolver};

pub const DEFAULT_RESTART: usize = 50;

pub struct Gmres<'a, T: Scalar> {
    ksp: Ksp<'a, T>,
    restart: usize,
    v: Vec<Vector<T>>,
    h: Vec<T>,
    c: Vec<T>,
    s: Vec<T>,
    e: Vec<T>,
    y: Vec<T>,
    r: Vector<T>,
    z: Vector<T>,
}

/// Length of the packed Hessenberg buffer for a given restart length.
fn packed_len(restart: usize) -> usize {
    let m = restart + 1;
    m * m - m - (m.saturating_sub(2) * (m - 1)) / 2
}

/// Position of h(i, j), `i <= j + 1`, in the packed buffer.
fn packed_idx(restart: usize, i: usize, j: usize) -> usize {
    debug_assert!(i <= j + 1 && j < restart);
    if i > 1 {
        let suf = i - 1;
        i * restart - suf * (suf - 1) / 2 + (j - suf)
    } else {
        i * restart + j
    }
}

impl<'a, T: Scalar> Gmres<'a, T> {
    pub fn new(
        a: &'a Matrix<T>,
        b: &'a Vector<T>,
        pc: Option<&'a dyn Preconditioner<T>>,
        coherent: Option<&'a dyn Coherent<T>>,
    ) -> Self {
        let m = a.m();
        let mut g = Self {
            ksp: Ksp::new(a, b, pc, coherent),
            restart: DEFAULT_RESTART,
            v: Vec::new(),
            h: Vec::new(),
            c: Vec::new(),
            s: Vec::new(),
            e: Vec::new(),
            y: Vec::new(),
            r: Vector::new(m),
            z: Vector::new(m),
        };
        g.setup();
        g
    }

    fn setup(&mut self) {
        let (m, k) = (self.ksp.m(), self.restart);
        self.v = (0..=k).map(|_| Vector::new(m)).collect();
        self.h = vec![T::zero(); packed_len(k)];
        self.c = vec![T::zero(); k];
        self.s = vec![T::zero(); k];
        self.e = vec![T::zero(); k + 1];
        self.y = vec![T::zero(); k];
    }

    pub fn restart(&self) -> usize {
        self.restart
    }

    /// Changes the cycle length and reallocates the workspace; returns the old one.
    pub fn set_restart(&mut self, restart: usize) -> usize {
        assert!(restart > 0, "restart length must be positive");
        let old = std::mem::replace(&mut self.restart, restart);
        if old != restart {
            self.setup();
        }
        old
    }

    fn idx(&self, i: usize, j: usize) -> usize {
        packed_idx(self.restart, i, j)
    }

    fn h(&self, i: usize, j: usize) -> T {
        self.h[self.idx(i, j)]
    }

    fn h_mut(&mut self, i: usize, j: usize) -> &mut T {
        let k = self.idx(i, j);
        &mut self.h[k]
    }

    /// Solve the leading `(k+1)x(k+1)` triangle of h for `y` against `e`.
    fn back_subst(&mut self, k: usize) {
        for i in (0..=k).rev() {
            let mut yi = self.e[i];
            for j in i + 1..=k {
                yi -= self.h(i, j) * self.y[j];
            }
            self.y[i] = yi / self.h(i, i);
        }
    }

    /// Orthonormalize A M⁻¹ v_m against v_0..v_m into v_{m+1}, filling column m of h.
    fn arnoldi(&mut self, m: usize, precondition: bool) {
        self.z.copy_from(&self.v[m]);
        if precondition {
            self.ksp.precondition(&mut self.z);
        }
        let restart = self.restart;
        let (basis, next) = self.v.split_at_mut(m + 1);
        let w = &mut next[0];
        self.ksp.apply(&self.z, w);
        for (i, vi) in basis.iter().enumerate() {
            self.h[packed_idx(restart, i, m)] = self.ksp.prod(w, vi);
        }
        for (i, vi) in basis.iter().enumerate() {
            w.axpy(-self.h[packed_idx(restart, i, m)], vi);
        }
        let norm = self.ksp.sync_norm(w);
        if !self.ksp.is_trivial(norm) {
            w.scal(T::from_real(T::Real::one() / norm));
        }
        *self.h_mut(m + 1, m) = T::from_real(norm);
    }

    /// Apply the previous rotations to column m, then build and apply the rotation
    /// that zeroes h(m+1, m). Returns the residual estimate |e_{m+1}|.
    fn rotate(&mut self, m: usize) -> T::Real {
        for i in 0..m {
            let (a, b) = (self.h(i, m), self.h(i + 1, m));
            *self.h_mut(i + 1, m) = self.s[i] * a + self.c[i] * b;
            *self.h_mut(i, m) = self.c[i] * a - self.s[i].conj() * b;
        }
        let (a, b) = (self.h(m, m), self.h(m + 1, m));
        let den = (a.modulus().powi(2) + b.modulus().powi(2)).sqrt();
        let (c, s) = if a.modulus().is_zero() {
            (T::zero(), T::one())
        } else {
            let c = T::from_real(a.modulus() / den);
            (c, -(b / a) * c)
        };
        self.c[m] = c;
        self.s[m] = s;
        *self.h_mut(m, m) = c * a - s.conj() * b;
        *self.h_mut(m + 1, m) = T::zero();

        let (em, en) = (self.e[m], self.e[m + 1]);
        self.e[m] = c * em - s.conj() * en;
        self.e[m + 1] = s * em + c * en;
        self.e[m + 1].modulus()
    }

    /// x ← x + M⁻¹ V y over the first k+1 basis vectors.
    fn update(&mut self, x: &mut Vector<T>, k: usize, precondition: bool) {
        self.back_subst(k);
        self.z.fill(T::zero());
        for (yi, vi) in self.y.iter().zip(&self.v).take(k + 1) {
            self.z.axpy(*yi, vi);
        }
        if precondition {
            self.ksp.precondition(&mut self.z);
        }
        x.axpy(T::one(), &self.z);
    }

    fn iterate(&mut self, x: &mut Vector<T>, precondition: bool) -> bool {
        let res0 = match self.ksp.start(x, &mut self.r) {
            ControlFlow::Break(ok) => return ok,
            ControlFlow::Continue(res0) => res0,
        };
        let mut res = res0;
        for cycle in 0..self.ksp.iter_max() {
            self.v[0].copy_from(&self.r);
            self.v[0].scal(T::from_real(T::Real::one() / res));
            self.e.iter_mut().for_each(|e| *e = T::zero());
            self.e[0] = T::from_real(res);

            let mut k = self.restart - 1;
            let mut outcome = None;
            for m in 0..self.restart {
                self.arnoldi(m, precondition);
                let est = self.rotate(m);
                outcome = self.ksp.check_residual(cycle, est, res0);
                if outcome.is_some() {
                    k = m;
                    break;
                }
            }
            match outcome {
                Some(false) => return false,
                Some(true) => {
                    self.update(x, k, precondition);
                    return true;
                }
                None => self.update(x, k, precondition),
            }
            res = self.ksp.residual_of(x, &mut self.r);
            log::trace!("gmres restart {} with |r| = {:e}", cycle + 1, res);
        }
        let n = self.ksp.iter_max();
        self.ksp.exhausted(n, res)
    }
}

impl<'a, T: Scalar> LinearSolver<'a, T> for Gmres<'a, T> {
    fn name(&self) -> &'static str {
        "gmres"
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
        let scalars = self.h.len() + self.c.len() + self.s.len() + self.e.len() + self.y.len();
        self.v.iter().map(|v| v.mem()).sum::<usize>()
            + self.r.mem()
            + self.z.mem()
            + scalars * std::mem::size_of::<T>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preconditioner::Ilu;
    use crate::solver::testing::{assert_expected, convection, ones, poisson};
    use approx::assert_abs_diff_eq;
    use num_complex::Complex64;

    #[test]
    fn packed_hessenberg_is_dense() {
        let b = ones(8);
        let a = poisson(8);
        let mut g = Gmres::new(&a, &b, None, None);
        g.set_restart(6);
        assert_eq!(g.h.len(), packed_len(6));
        let mut seen = Vec::new();
        for i in 0usize..=6 {
            for j in i.saturating_sub(1)..6 {
                seen.push(g.idx(i, j));
            }
        }
        seen.sort_unstable();
        assert_eq!(seen, (0..packed_len(6)).collect::<Vec<_>>());
    }

    #[test]
    fn solves_tridiagonal() {
        let a = poisson(5);
        let b = ones(5);
        let mut g = Gmres::new(&a, &b, None, None);
        assert_eq!(g.restart(), 50);
        let mut x = Vector::new(5);
        assert!(g.solve(&mut x));
        assert_expected(&x);
        assert_eq!(g.stats().iterations, 0);
    }

    #[test]
    fn short_restart_still_converges() {
        let a = convection(20);
        let b = ones(20);
        let mut g = Gmres::new(&a, &b, None, None);
        assert_eq!(g.set_restart(3), 50);
        g.ksp_mut().set_iter_max(200);
        let mut x = Vector::new(20);
        assert!(g.solve(&mut x));
        assert!(g.stats().iterations > 0);
        let ax = Vector::from_expr(&a * &x);
        for v in ax.iter() {
            assert_abs_diff_eq!(*v, 1.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn exact_preconditioner_needs_one_step() {
        let a = convection(10);
        let b = ones(10);
        let mut ilu = Ilu::new(&a, 0, 0.0, false);
        ilu.factor();
        let mut g = Gmres::new(&a, &b, Some(&ilu), None);
        let mut x = Vector::new(10);
        assert!(g.solve(&mut x));
        let ax = Vector::from_expr(&a * &x);
        for v in ax.iter() {
            assert_abs_diff_eq!(*v, 1.0, epsilon = 1e-10);
        }
    }

    #[test]
    fn complex_rotations_keep_phase() {
        let i = Complex64::new(0.0, 1.0);
        let a = Matrix::from_triplets(
            3,
            3,
            &[(0, 0, 2.0 * i), (0, 1, Complex64::new(1.0, 0.0)), (1, 1, Complex64::new(-3.0, 1.0)), (2, 0, i), (2, 2, Complex64::new(1.0, 2.0))],
        );
        let b = Vector::from_slice(&[Complex64::new(1.0, -1.0), i, Complex64::new(2.0, 0.0)]);
        let mut g = Gmres::new(&a, &b, None, None);
        let mut x = Vector::new(3);
        assert!(g.solve(&mut x));
        let ax = Vector::from_expr(&a * &x);
        for (u, v) in ax.iter().zip(b.iter()) {
            assert_abs_diff_eq!(u.re, v.re, epsilon = 1e-9);
            assert_abs_diff_eq!(u.im, v.im, epsilon = 1e-9);
        }
    }
}
