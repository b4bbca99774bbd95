//! Incomplete LU factorization on a level-k pattern with drop threshold.
//!
//! The strictly lower part of the [`Fillin`] pattern holds the unit lower factor,
//! the rest holds U. Coefficients whose modulus does not exceed the threshold are
//! skipped when the factors are applied.

use crate::core::traits::Scalar;
use num_traits::Zero;
use crate::core::vector::Vector;
use crate::matrix::Matrix;
use crate::preconditioner::{FillRule, Fillin, Preconditioner, diagonal_slots};

pub struct Ilu<'a, T: Scalar> {
    a: &'a Matrix<T>,
    prec: Fillin<T>,
    thr: T::Real,
}

impl<'a, T: Scalar> Ilu<'a, T> {
    /// Symbolic phase only; call [`factor`](Self::factor) before applying.
    pub fn new(a: &'a Matrix<T>, level: usize, thres: T::Real, sum_rule: bool) -> Self {
        let prec = Fillin::new(a, level, thres, FillRule::for_matrix(a, sum_rule));
        Self { a, prec, thr: thres }
    }

    /// Numeric factorization without dropping.
    pub fn factor(&mut self) -> &mut Self {
        self.eliminate(None)
    }

    /// Numeric factorization dropping factors of modulus at most `thres`. A positive
    /// `thres` also becomes the application threshold.
    pub fn factor_with(&mut self, thres: T::Real) -> &mut Self {
        if T::Real::zero() < thres {
            self.thr = thres;
        }
        self.eliminate(Some(thres))
    }

    pub fn thres(&self) -> T::Real {
        self.thr
    }

    pub fn fillin(&self) -> &Fillin<T> {
        &self.prec
    }

    fn eliminate(&mut self, drop: Option<T::Real>) -> &mut Self {
        self.prec.setup(self.a);
        let m = self.prec.m();
        let diag = diagonal_slots(self.prec.xadj(), self.prec.adjy(), m);
        let small = |c: T| drop.is_some_and(|t| c.modulus() <= t);
        let (xadj, adjy, coef) = self.prec.split_mut();
        for i in 1..m {
            for off in xadj[i]..xadj[i + 1] {
                let j = adjy[off];
                let Some(dj) = diag[j].filter(|_| j < i) else { break };
                let d = coef[dj];
                coef[off] /= d;
                if small(coef[off]) {
                    coef[off] = T::zero();
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
                        if small(coef[o2]) {
                            coef[o2] = T::zero();
                        } else {
                            let l = coef[off] * coef[o2];
                            coef[o1] -= l;
                        }
                        o1 += 1;
                        o2 += 1;
                    }
                }
            }
        }
        self
    }

    fn kept(&self, c: T) -> bool {
        self.thr < c.modulus()
    }
}

impl<T: Scalar> Preconditioner<T> for Ilu<'_, T> {
    fn forward(&self, x: &mut Vector<T>) {
        let (xadj, adjy, coef) = (self.prec.xadj(), self.prec.adjy(), self.prec.coef());
        for i in 0..self.prec.m() {
            for k in (xadj[i]..xadj[i + 1]).filter(|&k| self.kept(coef[k])) {
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
            let mut d = T::one();
            for k in (xadj[i]..xadj[i + 1]).filter(|&k| self.kept(coef[k])) {
                let j = adjy[k];
                if j == i {
                    d = coef[k];
                } else if i < j {
                    let xj = x[j];
                    x[i] -= coef[k] * xj;
                }
            }
            x[i] /= d;
        }
    }

    fn forward_inv(&self, x: &mut Vector<T>) {
        let (xadj, adjy, coef) = (self.prec.xadj(), self.prec.adjy(), self.prec.coef());
        let tmp = x.clone();
        for i in 0..self.prec.m() {
            for k in (xadj[i]..xadj[i + 1]).filter(|&k| self.kept(coef[k])) {
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
            let mut acc = T::zero();
            for k in (xadj[i]..xadj[i + 1]).filter(|&k| adjy[k] >= i && self.kept(coef[k])) {
                acc += coef[k] * tmp[adjy[k]];
            }
            x[i] = acc;
        }
    }

    fn mem(&self) -> usize {
        self.prec.mem()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preconditioner::testing::poisson;
    use approx::assert_abs_diff_eq;

    fn unsymmetric() -> Matrix<f64> {
        Matrix::from_triplets(
            4,
            4,
            &[
                (0, 0, 4.0),
                (0, 1, -1.0),
                (1, 0, -2.0),
                (1, 1, 4.0),
                (1, 3, -1.0),
                (2, 1, -1.0),
                (2, 2, 4.0),
                (3, 0, -1.0),
                (3, 2, -2.0),
                (3, 3, 4.0),
            ],
        )
    }

    #[test]
    fn exact_on_tridiagonal() {
        let a = poisson(5);
        let mut ilu = Ilu::new(&a, 0, 0.0, false);
        ilu.factor();
        let mut x = Vector::from_slice(&[1.0; 5]);
        ilu.apply(&mut x);
        for (v, w) in x.iter().zip([2.5, 4.0, 4.5, 4.0, 2.5]) {
            assert_abs_diff_eq!(*v, w, epsilon = 1e-12);
        }
    }

    #[test]
    fn full_fill_reproduces_matrix() {
        // level 3 on a 4x4 matrix fills the whole profile, so L U = A exactly
        let a = unsymmetric();
        let mut ilu = Ilu::new(&a, 3, 0.0, true);
        ilu.factor();
        let b = Vector::from_slice(&[1.0, 2.0, -1.0, 0.5]);
        let mut x = b.clone();
        ilu.apply_inv(&mut x);
        let ab = Vector::from_expr(&a * &b);
        for (v, w) in x.iter().zip(ab.iter()) {
            assert_abs_diff_eq!(*v, *w, epsilon = 1e-12);
        }
    }

    #[test]
    fn drop_threshold_is_kept() {
        let a = unsymmetric();
        let mut ilu = Ilu::new(&a, 1, 0.0, false);
        ilu.factor_with(1e-3);
        assert_eq!(ilu.thres(), 1e-3);
        ilu.factor_with(-1.0);
        assert_eq!(ilu.thres(), 1e-3);
        assert!(ilu.mem() > 0);
    }
}
