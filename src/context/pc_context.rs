//! Owned preconditioner built from [`PcKind`] and [`SolverOptions`].

use std::time::{Duration, Instant};

use crate::config::SolverOptions;
use crate::context::PcKind;
use crate::core::traits::Scalar;
use crate::matrix::Matrix;
use crate::preconditioner::{Ic, Ilu, JacobiConditioner, Preconditioner, SorConditioner};

pub enum PcContext<'a, T: Scalar> {
    None,
    Jacobi(JacobiConditioner<'a, T>),
    Sor(SorConditioner<'a, T>),
    Ic(Ic<'a, T>),
    Ilu(Ilu<'a, T>),
}

impl<'a, T: Scalar> PcContext<'a, T> {
    /// Build and factor the preconditioner `opts.pc` for `a`. Returns it with the
    /// time spent in setup.
    pub fn build(a: &'a Matrix<T>, opts: &SolverOptions) -> (Self, Duration) {
        let t = Instant::now();
        let pc = match opts.pc {
            PcKind::None => PcContext::None,
            PcKind::Jacobi => PcContext::Jacobi(JacobiConditioner::new(a)),
            PcKind::Sor => PcContext::Sor(SorConditioner::new(a, T::Real::from_f64(opts.omega))),
            PcKind::Ic => {
                let mut ic = Ic::new(a, opts.fill_level);
                ic.factor();
                PcContext::Ic(ic)
            }
            PcKind::Ilu => {
                let mut ilu = Ilu::new(a, opts.fill_level, T::Real::from_f64(opts.drop_thres), false);
                ilu.factor();
                PcContext::Ilu(ilu)
            }
        };
        let elapsed = t.elapsed();
        log::debug!("{} preconditioner ready in {:?}, {} bytes", opts.pc, elapsed, pc.mem());
        (pc, elapsed)
    }

    pub fn kind(&self) -> PcKind {
        match self {
            PcContext::None => PcKind::None,
            PcContext::Jacobi(_) => PcKind::Jacobi,
            PcContext::Sor(_) => PcKind::Sor,
            PcContext::Ic(_) => PcKind::Ic,
            PcContext::Ilu(_) => PcKind::Ilu,
        }
    }

    pub fn as_dyn(&self) -> Option<&dyn Preconditioner<T>> {
        match self {
            PcContext::None => None,
            PcContext::Jacobi(p) => Some(p),
            PcContext::Sor(p) => Some(p),
            PcContext::Ic(p) => Some(p),
            PcContext::Ilu(p) => Some(p),
        }
    }

    pub fn mem(&self) -> usize {
        self.as_dyn().map_or(0, |p| p.mem())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::vector::Vector;
    use crate::preconditioner::testing::poisson;
    use approx::assert_abs_diff_eq;

    #[test]
    fn builds_every_kind() {
        let a = poisson(6);
        for kind in PcKind::ALL {
            let opts = SolverOptions::default().with_pc(kind);
            let (pc, _) = PcContext::build(&a, &opts);
            assert_eq!(pc.kind(), kind);
            assert_eq!(pc.as_dyn().is_none(), kind == PcKind::None);
        }
    }

    #[test]
    fn factored_ic_inverts_tridiagonal() {
        let a = poisson(6);
        let (pc, _) = PcContext::build(&a, &SolverOptions::default().with_pc(PcKind::Ic));
        let mut x = Vector::from_slice(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let b = Vector::from_expr(&a * &x);
        x.copy_from(&b);
        pc.as_dyn().unwrap().apply(&mut x);
        for (i, v) in x.iter().enumerate() {
            assert_abs_diff_eq!(*v, (i + 1) as f64, epsilon = 1e-12);
        }
    }
}
