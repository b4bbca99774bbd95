//! Driver that turns [`SolverOptions`] into a solve.
//!
//! `KspContext` owns nothing but the options and an optional ghost exchange. Each
//! call builds the requested preconditioner over A, constructs the Krylov method
//! with the thresholds, cap and method-specific parameters from the options, and
//! runs it. With `scaled` set, A is equilibrated in place for the duration of the
//! solve and restored before returning; b is scaled in a private copy and the
//! initial guess and solution are mapped through the column scaling.

use std::time::Duration;

use crate::config::SolverOptions;
use crate::context::{PcContext, SolverKind};
use crate::core::traits::Scalar;
use crate::core::vector::Vector;
use crate::matrix::Matrix;
use crate::parallel::Coherent;
use crate::solver::{BiCgSafe, BiCgStab, Cg, Gmres, Jacobi, LinearSolver, Sor};
use crate::utils::convergence::SolveStats;

pub struct KspContext<'c, T: Scalar> {
    opts: SolverOptions,
    coherent: Option<&'c dyn Coherent<T>>,
}

impl<'c, T: Scalar> KspContext<'c, T> {
    pub fn new(opts: SolverOptions) -> Self {
        Self { opts, coherent: None }
    }

    /// Attach the ghost exchange of a distributed operator.
    pub fn with_coherent(mut self, coherent: &'c dyn Coherent<T>) -> Self {
        self.coherent = Some(coherent);
        self
    }

    pub fn options(&self) -> &SolverOptions {
        &self.opts
    }

    pub fn options_mut(&mut self) -> &mut SolverOptions {
        &mut self.opts
    }

    /// Solve A x = b starting from `x`. A is only modified while scaling is active
    /// and is restored before returning.
    pub fn solve(&self, a: &mut Matrix<T>, b: &Vector<T>, x: &mut Vector<T>) -> SolveStats<T::Real> {
        if !self.opts.scaled {
            return self.solve_unscaled(a, b, x);
        }
        a.normalize(T::Real::from_f64(self.opts.scale_thres), self.coherent);
        log::debug!(
            "scaled system: ratio {:e} (row {:e}, col {:e})",
            a.scale_ratio(),
            a.scale_row_norm(),
            a.scale_col_norm()
        );
        let mut bs = b.clone();
        bs.scale(a.scale_row());
        x.unscale(a.scale_col());
        let stats = self.solve_unscaled(a, &bs, x);
        x.scale(a.scale_col());
        a.unnormalize();
        stats
    }

    /// Solve without equilibration.
    pub fn solve_unscaled(&self, a: &Matrix<T>, b: &Vector<T>, x: &mut Vector<T>) -> SolveStats<T::Real> {
        let (pc, setup) = PcContext::build(a, &self.opts);
        let pc = pc.as_dyn();
        let stats = match self.opts.method {
            SolverKind::Cg => self.drive(Cg::new(a, b, pc, self.coherent), x),
            SolverKind::BiCgStab => self.drive(BiCgStab::new(a, b, pc, self.coherent), x),
            SolverKind::BiCgSafe => self.drive(BiCgSafe::new(a, b, pc, self.coherent), x),
            SolverKind::Gmres => {
                let mut g = Gmres::new(a, b, pc, self.coherent);
                g.set_restart(self.opts.restart);
                self.drive(g, x)
            }
            SolverKind::Jacobi => self.drive(Jacobi::new(a, b, pc, self.coherent), x),
            SolverKind::Sor => {
                let mut s = Sor::new(a, b, pc, self.coherent);
                let omega = T::Real::from_f64(self.opts.omega);
                if s.set_accel(omega) == omega && self.opts.omega != 1.0 {
                    log::warn!("sor: relaxation {} outside (0, 2), keeping 1", self.opts.omega);
                }
                self.drive(s, x)
            }
        };
        log::debug!(
            "{} + {}: setup {:?}, solve {:?}",
            self.opts.method,
            self.opts.pc,
            setup,
            stats.elapsed
        );
        stats
    }

    fn drive<'a, S: LinearSolver<'a, T>>(&self, mut solver: S, x: &mut Vector<T>) -> SolveStats<T::Real> {
        let ksp = solver.ksp_mut();
        ksp.set_rel_thres(T::Real::from_f64(self.opts.rel_thres));
        ksp.set_abs_thres(T::Real::from_f64(self.opts.abs_thres));
        if let Some(n) = self.opts.iter_max {
            ksp.set_iter_max(n);
        }
        solver.solve(x);
        solver.stats()
    }
}

/// Time spent in the iteration proper, preconditioner applications excluded.
pub fn iteration_time<R>(stats: &SolveStats<R>) -> Duration {
    stats.elapsed.saturating_sub(stats.prec_elapsed)
}
