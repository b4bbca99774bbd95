//! Point Jacobi iteration, x ← x + D⁻¹ (b - A x).
//!
//! With a preconditioner the update becomes the Richardson step
//! x ← x + M⁻¹ (b - A x).

use std::ops::ControlFlow;

use crate::core::traits::Scalar;
use crate::core::vector::Vector;
use crate::matrix::Matrix;
use crate::parallel::Coherent;
use crate::preconditioner::Preconditioner;
use crate::solver::{Ksp, LinearSolver};

pub struct Jacobi<'a, T: Scalar> {
    ksp: Ksp<'a, T>,
    inv_diag: Vec<T>,
    r: Vector<T>,
}

impl<'a, T: Scalar> Jacobi<'a, T> {
    pub fn new(
        a: &'a Matrix<T>,
        b: &'a Vector<T>,
        pc: Option<&'a dyn Preconditioner<T>>,
        coherent: Option<&'a dyn Coherent<T>>,
    ) -> Self {
        let inv_diag = (0..a.m()).map(|i| T::one() / a.get(i, i)).collect();
        Self { ksp: Ksp::new(a, b, pc, coherent), inv_diag, r: Vector::new(a.m()) }
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
            if precondition {
                self.ksp.precondition(&mut self.r);
            } else {
                for (r, d) in self.r.val_mut().iter_mut().zip(&self.inv_diag) {
                    *r *= *d;
                }
                self.ksp.sync(&mut self.r);
            }
            x.axpy(T::one(), &self.r);
            res = self.ksp.residual_of(x, &mut self.r);
        }
        let n = self.ksp.iter_max();
        self.ksp.exhausted(n, res)
    }
}

impl<'a, T: Scalar> LinearSolver<'a, T> for Jacobi<'a, T> {
    fn name(&self) -> &'static str {
        "jacobi"
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
        self.r.mem() + self.inv_diag.len() * std::mem::size_of::<T>()
    }
}
