//! Element-wise kernels shared by `Vector` and `Matrix`.
//!
//! Every loop body writes a disjoint output slot, so with the `rayon` feature long
//! slices are split across the global pool. Reductions stay serial to keep sums
//! reproducible between runs.

use crate::core::traits::Scalar;

/// Below this length the serial loop wins.
#[cfg(feature = "rayon")]
pub(crate) const PAR_THRESHOLD: usize = 1 << 13;

/// y[i] = f(y[i], x[i]) for all i.
pub(crate) fn zip_apply<T, F>(y: &mut [T], x: &[T], f: F)
where
    T: Scalar,
    F: Fn(T, T) -> T + Sync + Send,
{
    assert_eq!(y.len(), x.len());
    #[cfg(feature = "rayon")]
    if y.len() >= PAR_THRESHOLD {
        use rayon::prelude::*;
        y.par_iter_mut().zip(x.par_iter()).for_each(|(a, &b)| *a = f(*a, b));
        return;
    }
    y.iter_mut().zip(x).for_each(|(a, &b)| *a = f(*a, b));
}

/// y[i] = f(i) for all i.
pub(crate) fn fill_with<T, F>(y: &mut [T], f: F)
where
    T: Scalar,
    F: Fn(usize) -> T + Sync + Send,
{
    #[cfg(feature = "rayon")]
    if y.len() >= PAR_THRESHOLD {
        use rayon::prelude::*;
        y.par_iter_mut().enumerate().for_each(|(i, a)| *a = f(i));
        return;
    }
    y.iter_mut().enumerate().for_each(|(i, a)| *a = f(i));
}

/// y = A x for a CSR pattern.
pub(crate) fn csr_mul<T: Scalar>(ind: &[usize], col: &[usize], val: &[T], x: &[T], y: &mut [T]) {
    fill_with(y, |i| {
        let mut acc = T::zero();
        for k in ind[i]..ind[i + 1] {
            acc += val[k] * x[col[k]];
        }
        acc
    });
}
