//! Krylov solvers.
//!
//! Every method shares a [`Ksp`]: borrowed references to A, b, an optional
//! preconditioner and an optional [`Coherent`] ghost exchange, plus thresholds, the
//! iteration cap and timing. A method implements an unpreconditioned and a
//! preconditioned iteration; [`LinearSolver::solve`] picks one by whether a
//! preconditioner is present.
//!
//! Distributed runs pass a [`Coherent`]: ghost slots are refreshed after every
//! matrix-vector product and preconditioner application, inner products are
//! corrected for ghost contributions, and the convergence decision is agreed on by
//! all ranks before any of them stops.

use std::ops::ControlFlow;
use std::time::{Duration, Instant};

use num_traits::{Float, One, Zero};

use crate::core::traits::Scalar;
use crate::core::vector::Vector;
use crate::matrix::Matrix;
use crate::parallel::Coherent;
use crate::preconditioner::Preconditioner;
use crate::utils::convergence::{Convergence, SolveStats};

pub mod bicgsafe;
pub mod bicgstab;
pub mod cg;
pub mod direct;
pub mod gmres;
pub mod jacobi;
pub mod sor;

pub use bicgsafe::BiCgSafe;
pub use bicgstab::BiCgStab;
pub use cg::Cg;
pub use direct::{DenseLu, DirectSolver};
pub use gmres::Gmres;
pub use jacobi::Jacobi;
pub use sor::Sor;

/// State shared by all Krylov methods.
pub struct Ksp<'a, T: Scalar> {
    a: &'a Matrix<T>,
    b: &'a Vector<T>,
    pc: Option<&'a dyn Preconditioner<T>>,
    coherent: Option<&'a dyn Coherent<T>>,
    res: Vector<T>,
    iter_max: usize,
    conv: Convergence<T::Real>,
    elapsed: Duration,
    prec_elapsed: Duration,
    iterations: usize,
    residual: T::Real,
    converged: bool,
}

impl<'a, T: Scalar> Ksp<'a, T> {
    pub fn new(
        a: &'a Matrix<T>,
        b: &'a Vector<T>,
        pc: Option<&'a dyn Preconditioner<T>>,
        coherent: Option<&'a dyn Coherent<T>>,
    ) -> Self {
        assert_eq!(a.m(), b.m(), "right-hand side must match the matrix rows");
        Self {
            a,
            b,
            pc,
            coherent,
            res: Vector::new(a.m()),
            iter_max: a.m() / 2,
            conv: Convergence::default(),
            elapsed: Duration::ZERO,
            prec_elapsed: Duration::ZERO,
            iterations: 0,
            residual: T::Real::zero(),
            converged: false,
        }
    }

    pub fn a(&self) -> &'a Matrix<T> {
        self.a
    }

    pub fn b(&self) -> &'a Vector<T> {
        self.b
    }

    pub fn m(&self) -> usize {
        self.a.m()
    }

    pub fn preconditioner(&self) -> Option<&'a dyn Preconditioner<T>> {
        self.pc
    }

    pub fn iter_max(&self) -> usize {
        self.iter_max
    }

    /// Returns the previous cap.
    pub fn set_iter_max(&mut self, n: usize) -> usize {
        std::mem::replace(&mut self.iter_max, n)
    }

    pub fn abs_thres(&self) -> T::Real {
        self.conv.abs_thres
    }

    /// Returns the previous threshold.
    pub fn set_abs_thres(&mut self, t: T::Real) -> T::Real {
        std::mem::replace(&mut self.conv.abs_thres, t)
    }

    pub fn rel_thres(&self) -> T::Real {
        self.conv.rel_thres
    }

    /// Returns the previous threshold.
    pub fn set_rel_thres(&mut self, t: T::Real) -> T::Real {
        std::mem::replace(&mut self.conv.rel_thres, t)
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn prec_elapsed(&self) -> Duration {
        self.prec_elapsed
    }

    /// Iterations taken by the last solve (restarts for GMRES).
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Last residual norm seen by the last solve.
    pub fn residual(&self) -> T::Real {
        self.residual
    }

    pub fn stats(&self) -> SolveStats<T::Real> {
        SolveStats {
            iterations: self.iterations,
            final_residual: self.residual,
            converged: self.converged,
            elapsed: self.elapsed,
            prec_elapsed: self.prec_elapsed,
        }
    }

    pub fn mem(&self) -> usize {
        self.res.mem() + std::mem::size_of::<Self>()
    }

    /// Refresh ghost slots of `v`.
    pub fn sync(&self, v: &mut Vector<T>) {
        if let Some(c) = self.coherent {
            c.sync(v.val_mut());
        }
    }

    /// Global inner product x·y.
    pub fn prod(&self, x: &Vector<T>, y: &Vector<T>) -> T {
        let acc = x.dot(y);
        match self.coherent {
            Some(c) => c.fix(acc, x.val(), y.val()),
            None => acc,
        }
    }

    pub fn fix_norm(&self, x: &Vector<T>) -> T::Real {
        self.prod(x, x).re().sqrt()
    }

    pub fn sync_norm(&self, x: &mut Vector<T>) -> T::Real {
        self.sync(x);
        self.fix_norm(x)
    }

    /// Logical AND across ranks.
    pub fn is_ok(&self, flag: bool) -> bool {
        match self.coherent {
            Some(c) => c.all_true(flag),
            None => flag,
        }
    }

    pub fn is_trivial(&self, v: T::Real) -> bool {
        Convergence::is_trivial(v)
    }

    /// r ← b - A x, synchronized; returns its norm.
    pub fn residual_of(&self, x: &Vector<T>, r: &mut Vector<T>) -> T::Real {
        self.a.mul_vec(x, r);
        r.xpay(self.b, -T::one());
        self.sync_norm(r)
    }

    /// v ← A u, synchronized.
    pub fn apply(&self, u: &Vector<T>, v: &mut Vector<T>) {
        self.a.mul_vec(u, v);
        self.sync(v);
    }

    /// v ← M⁻¹ v, synchronized and timed.
    pub fn precondition(&mut self, v: &mut Vector<T>) {
        if let Some(pc) = self.pc {
            let t = Instant::now();
            pc.apply(v);
            self.sync(v);
            self.prec_elapsed += t.elapsed();
        }
    }

    /// Shared stopping test at the head of each iteration; `None` means keep going.
    /// A NaN residual fails; otherwise all ranks must agree on convergence.
    pub fn check(&mut self, iteration: usize, res: T::Real, res0: T::Real, x: &Vector<T>) -> Option<bool> {
        let xx = self.prod(x, x).re();
        self.decide(iteration, res, res0, xx)
    }

    /// [`check`](Self::check) on the residual alone, for methods whose iterate is
    /// not formed until the end of a cycle.
    pub fn check_residual(&mut self, iteration: usize, res: T::Real, res0: T::Real) -> Option<bool> {
        self.decide(iteration, res, res0, T::Real::zero())
    }

    fn decide(&mut self, iteration: usize, res: T::Real, res0: T::Real, xx: T::Real) -> Option<bool> {
        self.iterations = iteration;
        self.residual = res;
        if res.is_nan() {
            log::warn!("residual became NaN after {} iterations", iteration);
            return Some(false);
        }
        log::trace!("iter {:>5}  |x|^2 = {:e}  |Ax-b| = {:e}  rel = {:e}", iteration, xx, res, res / res0);
        if self.is_ok(self.conv.check(res, res0, xx)) { Some(true) } else { None }
    }

    /// Record an exhausted iteration budget.
    pub fn exhausted(&mut self, iterations: usize, res: T::Real) -> bool {
        self.iterations = iterations;
        self.residual = res;
        false
    }

    /// Work done before the first iteration: r ← b - A x. Breaks with success when b
    /// is trivial (x ← b) or the initial residual is; otherwise yields that residual.
    pub fn start(&mut self, x: &mut Vector<T>, r: &mut Vector<T>) -> ControlFlow<bool, T::Real> {
        self.iterations = 0;
        if self.is_trivial(self.fix_norm(self.b)) {
            x.copy_from(self.b);
            self.residual = T::Real::zero();
            return ControlFlow::Break(true);
        }
        let res0 = self.residual_of(x, r);
        self.residual = res0;
        if self.is_trivial(res0) {
            return ControlFlow::Break(true);
        }
        ControlFlow::Continue(res0)
    }
}

/// A Krylov method built on a [`Ksp`].
pub trait LinearSolver<'a, T: Scalar> {
    fn name(&self) -> &'static str;
    fn ksp(&self) -> &Ksp<'a, T>;
    fn ksp_mut(&mut self) -> &mut Ksp<'a, T>;
    /// Iteration without preconditioning.
    fn solve_plain(&mut self, x: &mut Vector<T>) -> bool;
    /// Iteration with the preconditioner of the [`Ksp`].
    fn solve_preconditioned(&mut self, x: &mut Vector<T>) -> bool;
    /// Bytes of method-specific workspace.
    fn workspace_mem(&self) -> usize {
        0
    }

    /// Solve A x = b starting from `x`. Returns whether the iteration converged.
    fn solve(&mut self, x: &mut Vector<T>) -> bool {
        assert_eq!(x.m(), self.ksp().m(), "solution vector must match the matrix rows");
        {
            let ksp = self.ksp_mut();
            ksp.elapsed = Duration::ZERO;
            ksp.prec_elapsed = Duration::ZERO;
        }
        let t = Instant::now();
        let ok = if self.ksp().pc.is_some() { self.solve_preconditioned(x) } else { self.solve_plain(x) };
        let name = self.name();
        let ksp = self.ksp_mut();
        ksp.elapsed = t.elapsed();
        ksp.converged = ok;
        log::debug!(
            "{}: {} after {} iterations, residual {:e}, {:?} ({:?} preconditioning)",
            name,
            if ok { "converged" } else { "not converged" },
            ksp.iterations,
            ksp.residual,
            ksp.elapsed,
            ksp.prec_elapsed
        );
        ok
    }

    fn mem(&self) -> usize {
        self.ksp().mem() + self.workspace_mem()
    }

    fn stats(&self) -> SolveStats<T::Real> {
        self.ksp().stats()
    }
}
