//! Incomplete Cholesky-type factorization, M = L D Lᵀ on a level-k pattern.
//!
//! The factors live in one [`Fillin`] pattern: the strictly lower part holds the
//! unit lower factor, the diagonal holds D, the strictly upper part holds D⁻¹U.

use num_traits::Zero;

use crate::core::traits::Scalar;
use crate::core::vector::Vector;
use crate::matrix::Matrix;
use crate::preconditioner::{FillRule, Fillin, Preconditioner, diagonal_slots};

pub struct Ic<'a, T: Scalar> {
    a: &'a Matrix<T>,
    prec: Fillin<T>,
    diag: Vec<usize>,
}

impl<'a, T: Scalar> Ic<'a, T> {
    /// Symbolic phase only; call [`factor`](Self::factor) before applying.
    pub fn new(a: &'a Matrix<T>, level: usize) -> Self {
        let prec = Fillin::new(a, level, T::Real::zero(), FillRule::for_matrix(a, false));
        let diag = diagonal_slots(prec.xadj(), prec.adjy(), prec.m())
            .into_iter()
            .enumerate()
            .map(|(i, k)| k.unwrap_or_else(|| panic!("row {} has no stored diagonal", i)))
            .collect();
        Self { a, prec, diag }
    }

    pub fn factor(&mut self) -> &mut Self {
        self.prec.setup(self.a);
        let diag = &self.diag;
        let (xadj, adjy, coef) = self.prec.split_mut();
        for i in 0..self.a.m() {
            for off in xadj[i]..xadj[i + 1] {
                let j = adjy[off];
                if i == j {
                    continue;
                }
                if i < j {
                    let d = coef[diag[i]];
                    coef[off] /= d;
                    continue;
                }
                let (mut o1, mut o2) = (off + 1, xadj[j]);
                while o1 < xadj[i + 1] && o2 < xadj[j + 1] {
                    let (j1, j2) = (adjy[o1], adjy[o2]);
                    if j1 < j2 {
                        o1 += 1;
                    } else if j2 < j1 {
                        o2 += 1;
                    } else {
                        let l = coef[off] * coef[o2];
                        coef[o1] -= l;
                        o1 += 1;
                        o2 += 1;
                    }
                }
                let d = coef[diag[j]];
                coef[off] /= d;
            }
        }
        self
    }

    pub fn fillin(&self) -> &Fillin<T> {
        &self.prec
    }
}

impl<T: Scalar> Preconditioner<T> for Ic<'_, T> {
    fn forward(&self, x: &mut Vector<T>) {
        let (xadj, adjy, coef) = (self.prec.xadj(), self.prec.adjy(), self.prec.coef());
        for i in 0..self.prec.m() {
            for k in xadj[i]..xadj[i + 1] {
                let j = adjy[k];
                if i <= j {
                    break;
                }
                let xj = x[j];
                x[i] -= coef[k] * xj;
            }
        }
    }

    fn backward(&self, x: &mut Vector<T>) {
        let (xadj, adjy, coef) = (self.prec.xadj(), self.prec.adjy(), self.prec.coef());
        for i in (0..self.prec.m()).rev() {
            let d = coef[self.diag[i]];
            for k in (xadj[i]..xadj[i + 1]).filter(|&k| adjy[k] > i) {
                let xj = x[adjy[k]];
                x[i] -= d * coef[k] * xj;
            }
            x[i] /= d;
        }
    }

    fn forward_inv(&self, x: &mut Vector<T>) {
        let (xadj, adjy, coef) = (self.prec.xadj(), self.prec.adjy(), self.prec.coef());
        let tmp = x.clone();
        for i in 0..self.prec.m() {
            for k in xadj[i]..xadj[i + 1] {
                let j = adjy[k];
                if i <= j {
                    break;
                }
                x[i] += coef[k] * tmp[j];
            }
        }
    }

    fn backward_inv(&self, x: &mut Vector<T>) {
        let (xadj, adjy, coef) = (self.prec.xadj(), self.prec.adjy(), self.prec.coef());
        let tmp = x.clone();
        for i in 0..self.prec.m() {
            let mut acc = tmp[i];
            for k in (xadj[i]..xadj[i + 1]).filter(|&k| adjy[k] > i) {
                acc += coef[k] * tmp[adjy[k]];
            }
            x[i] = coef[self.diag[i]] * acc;
        }
    }

    fn mem(&self) -> usize {
        self.prec.mem() + self.diag.len() * std::mem::size_of::<usize>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preconditioner::testing::poisson;
    use approx::assert_abs_diff_eq;

    #[test]
    fn exact_on_tridiagonal() {
        // no fill is lost on a tridiagonal matrix, so M = A
        let a = poisson(5);
        let mut ic = Ic::new(&a, 0);
        ic.factor();
        let b = Vector::from_slice(&[1.0; 5]);
        let mut x = b.clone();
        ic.apply(&mut x);
        for (v, w) in x.iter().zip([2.5, 4.0, 4.5, 4.0, 2.5]) {
            assert_abs_diff_eq!(*v, w, epsilon = 1e-12);
        }
        ic.apply_inv(&mut x);
        for (v, w) in x.iter().zip(b.iter()) {
            assert_abs_diff_eq!(*v, *w, epsilon = 1e-12);
        }
    }

    #[test]
    fn pivots_follow_cholesky() {
        let a = poisson(3);
        let mut ic = Ic::new(&a, 0);
        ic.factor();
        let f = ic.fillin();
        let d: Vec<f64> = (0..3).map(|i| f.coef()[ic.diag[i]]).collect();
        assert_abs_diff_eq!(d[0], 2.0, epsilon = 1e-15);
        assert_abs_diff_eq!(d[1], 1.5, epsilon = 1e-15);
        assert_abs_diff_eq!(d[2], 4.0 / 3.0, epsilon = 1e-15);
    }
}
