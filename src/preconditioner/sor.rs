//! Symmetric SOR preconditioner.
//!
//! With A = L + D + U and 0 < ω < 2,
//!
//! ```text
//! M = (D/ω + L) · ω/(2 - ω) · D⁻¹ · (D/ω + U)
//!     ---------   ---------------------------
//!        L'                   U'
//! ```
//!
//! Both sweeps walk the stored entries of A; no fill is created.

use crate::core::traits::Scalar;
use crate::core::vector::Vector;
use crate::matrix::Matrix;
use crate::preconditioner::{Preconditioner, diagonal_slots};
use num_traits::{One, Zero};

/// Relaxation factor substituted for ω outside (0, 2).
pub const DEFAULT_ACCEL: f64 = 1.03;

pub struct SorConditioner<'a, T: Scalar> {
    a: &'a Matrix<T>,
    diag: Vec<usize>,
    omega: T,
    iomega: T,
}

impl<'a, T: Scalar> SorConditioner<'a, T> {
    /// Every row of `a` must store its diagonal.
    pub fn new(a: &'a Matrix<T>, omega: T::Real) -> Self {
        let diag = diagonal_slots(a.ind(), a.col(), a.m())
            .into_iter()
            .enumerate()
            .map(|(i, k)| k.unwrap_or_else(|| panic!("row {} has no stored diagonal", i)))
            .collect();
        let two = T::Real::from_f64(2.0);
        let omega = if omega <= T::Real::zero() || two <= omega {
            log::warn!("SOR acceleration {:e} outside (0, 2), using {}", omega, DEFAULT_ACCEL);
            T::from_f64(DEFAULT_ACCEL)
        } else {
            T::from_real(omega)
        };
        Self { a, diag, omega, iomega: T::one() / omega }
    }

    pub fn accel(&self) -> T {
        self.omega
    }

    fn d(&self, i: usize) -> T {
        self.a.val()[self.diag[i]]
    }
}

impl<T: Scalar> Preconditioner<T> for SorConditioner<'_, T> {
    fn forward(&self, x: &mut Vector<T>) {
        let (col, val) = (self.a.col(), self.a.val());
        for i in 0..self.a.m() {
            for k in self.a.row(i) {
                let j = col[k];
                if i < j {
                    break;
                } else if i == j {
                    x[i] /= val[k] * self.iomega;
                } else {
                    let xj = x[j];
                    x[i] -= xj * val[k];
                }
            }
        }
    }

    fn backward(&self, x: &mut Vector<T>) {
        let (col, val) = (self.a.col(), self.a.val());
        let w = T::from_f64(2.0) - self.omega;
        for i in (0..self.a.m()).rev() {
            let d = self.d(i);
            for k in self.a.row(i).filter(|&k| col[k] > i) {
                let xj = x[col[k]];
                x[i] -= xj * self.omega * val[k] / (w * d);
            }
            x[i] *= w;
        }
    }

    fn forward_inv(&self, x: &mut Vector<T>) {
        let (col, val) = (self.a.col(), self.a.val());
        let tmp = x.clone();
        for i in 0..self.a.m() {
            let mut acc = T::zero();
            for k in self.a.row(i) {
                let j = col[k];
                if i < j {
                    break;
                } else if i == j {
                    acc += tmp[j] * val[k] * self.iomega;
                } else {
                    acc += tmp[j] * val[k];
                }
            }
            x[i] = acc;
        }
    }

    fn backward_inv(&self, x: &mut Vector<T>) {
        let (col, val) = (self.a.col(), self.a.val());
        let w = T::from_f64(2.0) - self.omega;
        let tmp = x.clone();
        for i in 0..self.a.m() {
            let d = self.d(i);
            let mut acc = tmp[i] / w;
            for k in self.a.row(i).filter(|&k| col[k] > i) {
                acc += tmp[col[k]] * self.omega * val[k] / (w * d);
            }
            x[i] = acc;
        }
    }

    fn mem(&self) -> usize {
        self.diag.len() * std::mem::size_of::<usize>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preconditioner::testing::poisson;
    use approx::assert_abs_diff_eq;

    #[test]
    fn invalid_accel_is_clamped() {
        let a = poisson(3);
        assert_eq!(SorConditioner::new(&a, 2.5).accel(), 1.03);
        assert_eq!(SorConditioner::new(&a, -1.0).accel(), 1.03);
        assert_eq!(SorConditioner::new(&a, 1.5).accel(), 1.5);
    }

    #[test]
    fn inverse_sweeps_undo_sweeps() {
        let a = poisson(6);
        let pc = SorConditioner::new(&a, 1.2);
        let b = Vector::from_slice(&[1.0, -2.0, 0.5, 3.0, 0.0, 1.0]);
        let mut x = b.clone();
        pc.apply(&mut x);
        pc.apply_inv(&mut x);
        for (u, v) in x.iter().zip(b.iter()) {
            assert_abs_diff_eq!(*u, *v, epsilon = 1e-12);
        }
    }

    #[test]
    fn gauss_seidel_forward_is_lower_solve() {
        // with ω = 1, L' = D + L
        let a = poisson(3);
        let pc = SorConditioner::new(&a, 1.0);
        let mut x = Vector::from_slice(&[2.0, 0.0, 0.0]);
        pc.forward(&mut x);
        assert_abs_diff_eq!(x[0], 1.0, epsilon = 1e-15);
        assert_abs_diff_eq!(x[1], 0.5, epsilon = 1e-15);
        assert_abs_diff_eq!(x[2], 0.25, epsilon = 1e-15);
    }
}
