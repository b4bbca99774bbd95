//! Convergence tracking & tolerance checks for iterative solvers.

use std::time::Duration;

use num_traits::Float;

/// Values at or below this modulus count as zero.
pub const TRIVIAL: f64 = 1e-50;

/// Stopping thresholds.
#[derive(Clone, Copy, Debug)]
pub struct Convergence<R> {
    pub abs_thres: R,
    pub rel_thres: R,
}

impl<R: Float> Default for Convergence<R> {
    fn default() -> Self {
        Self {
            abs_thres: R::from(1e-30).unwrap_or_else(R::min_positive_value),
            rel_thres: R::from(1e-12).unwrap_or_else(R::epsilon),
        }
    }
}

impl<R: Float> Convergence<R> {
    pub fn is_trivial(v: R) -> bool {
        v.abs() <= R::from(TRIVIAL).unwrap_or_else(R::zero)
    }

    /// Converged when `res` is small relative to `res0`, small in absolute terms, or
    /// small relative to `xx = x·x` when that is not trivial.
    pub fn check(&self, res: R, res0: R, xx: R) -> bool {
        (res / res0).abs() <= self.rel_thres
            || res.abs() <= self.abs_thres
            || (!Self::is_trivial(xx) && (res / xx).abs() <= self.rel_thres)
    }
}

#[derive(Clone, Debug)]
pub struct SolveStats<R> {
    pub iterations: usize,
    pub final_residual: R,
    pub converged: bool,
    pub elapsed: Duration,
    pub prec_elapsed: Duration,
}

impl<R: Float> Default for SolveStats<R> {
    fn default() -> Self {
        Self {
            iterations: 0,
            final_residual: R::zero(),
            converged: false,
            elapsed: Duration::ZERO,
            prec_elapsed: Duration::ZERO,
        }
    }
}

/// What BiCGSTAB-type methods do when a denominator `d` satisfies
/// `sqrt(|d|) / res0 <= brk_thres`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BreakdownPolicy {
    /// Replace the denominator with `rs0·rs0`.
    #[default]
    Substitute,
    /// Keep the denominator and let the NaN guard catch a blow-up.
    Ignore,
    /// Stop the solve and report failure.
    Abort,
}

impl BreakdownPolicy {
    /// The denominator to divide by, or `None` when the solve must stop.
    pub fn guard<T, R: Float>(self, d: T, modulus: R, res0: R, thres: R, fallback: impl FnOnce() -> T) -> Option<T> {
        if modulus.sqrt() / res0 > thres {
            return Some(d);
        }
        match self {
            BreakdownPolicy::Substitute => {
                log::debug!("breakdown ({:?}): substituting denominator", modulus.to_f64());
                Some(fallback())
            }
            BreakdownPolicy::Ignore => Some(d),
            BreakdownPolicy::Abort => {
                log::warn!("breakdown: |d| = {:?}, stopping", modulus.to_f64());
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn any_criterion_converges() {
        let c = Convergence::<f64>::default();
        assert!(c.check(1e-13, 1.0, 0.0));
        assert!(c.check(1e-31, 1e-20, 0.0));
        assert!(c.check(1e-9, 1.0, 1e4));
        assert!(!c.check(1e-9, 1.0, 0.0));
    }

    #[test]
    fn breakdown_substitutes_by_default() {
        let p = BreakdownPolicy::default();
        assert_eq!(p.guard(1e-40, 1e-40, 1.0, 1e-16, || 7.0), Some(7.0));
        assert_eq!(p.guard(0.5, 0.5, 1.0, 1e-16, || 7.0), Some(0.5));
        assert_eq!(BreakdownPolicy::Abort.guard(0.0, 0.0, 1.0, 1e-16, || 7.0), None);
        assert_eq!(BreakdownPolicy::Ignore.guard(0.0, 0.0, 1.0, 1e-16, || 7.0), Some(0.0));
    }
}
