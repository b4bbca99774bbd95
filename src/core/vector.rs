//! Dense vector with cache-line aligned, padded storage.

use aligned_vec::{AVec, ConstAlign};
use num_traits::Float;
use std::fmt;
use std::ops::{Index, IndexMut};

use crate::config::CACHE_LINE;
use crate::core::expression::Expr;
use crate::core::kernels;
use crate::core::traits::{self, Scalar};

pub(crate) type Aligned<T> = AVec<T, ConstAlign<CACHE_LINE>>;

/// Allocate `m` zeroed slots padded up to a whole cache line.
pub(crate) fn padded<T: Copy + Default>(m: usize) -> Aligned<T> {
    let padding = (CACHE_LINE / std::mem::size_of::<T>()).max(1);
    let dmy = (padding - m % padding) % padding;
    AVec::from_iter(CACHE_LINE, (0..m + dmy).map(|_| T::default()))
}

/// Dense 1-D array of length `m`.
#[derive(Clone)]
pub struct Vector<T: Scalar> {
    m: usize,
    f: Aligned<T>,
}

impl<T: Scalar> Default for Vector<T> {
    fn default() -> Self {
        Self::new(0)
    }
}

impl<T: Scalar> Vector<T> {
    /// Zero vector of length `m`.
    pub fn new(m: usize) -> Self {
        Self { m, f: padded(m) }
    }

    pub fn from_slice(f: &[T]) -> Self {
        let mut v = Self::new(f.len());
        v.val_mut().copy_from_slice(f);
        v
    }

    /// Evaluate an expression into a fresh vector.
    pub fn from_expr<E: Expr<T>>(expr: E) -> Self {
        let mut v = Self::new(expr.m());
        v.assign(expr);
        v
    }

    /// Reallocate to length `m`, zero-filled.
    pub fn setup(&mut self, m: usize) {
        self.m = m;
        self.f = padded(m);
    }

    /// Logical length.
    pub fn m(&self) -> usize {
        self.m
    }

    pub fn val(&self) -> &[T] {
        &self.f[..self.m]
    }

    pub fn val_mut(&mut self) -> &mut [T] {
        &mut self.f[..self.m]
    }

    /// Bytes held, padding included.
    pub fn mem(&self) -> usize {
        std::mem::size_of::<T>() * self.f.len()
    }

    pub fn fill(&mut self, c: T) -> &mut Self {
        kernels::fill_with(self.val_mut(), |_| c);
        self
    }

    /// Evaluate `expr` slot by slot into `self` in one pass.
    pub fn assign<E: Expr<T>>(&mut self, expr: E) -> &mut Self {
        assert_eq!(self.m, expr.m(), "expression length mismatch");
        kernels::fill_with(self.val_mut(), |i| expr.at(i));
        self
    }

    pub fn copy_from(&mut self, src: &Vector<T>) -> &mut Self {
        assert_eq!(self.m, src.m);
        self.val_mut().copy_from_slice(src.val());
        self
    }

    /// self += alpha * x
    pub fn axpy(&mut self, alpha: T, x: &Vector<T>) -> &mut Self {
        kernels::zip_apply(self.val_mut(), x.val(), move |y, x| y + alpha * x);
        self
    }

    /// self = x + beta * self
    pub fn xpay(&mut self, x: &Vector<T>, beta: T) -> &mut Self {
        kernels::zip_apply(self.val_mut(), x.val(), move |y, x| x + beta * y);
        self
    }

    pub fn scal(&mut self, alpha: T) -> &mut Self {
        self.val_mut().iter_mut().for_each(|v| *v *= alpha);
        self
    }

    /// Hermitian inner product Σ self[i]·conj(rhs[i]).
    pub fn dot(&self, rhs: &Vector<T>) -> T {
        traits::dot(self.val(), rhs.val())
    }

    /// Euclidean norm of the local storage.
    pub fn norm(&self) -> T::Real {
        self.dot(self).re().sqrt()
    }

    /// self'[i] = self[perm[i]]
    pub fn reorder(&mut self, perm: &[usize]) -> &mut Self {
        assert_eq!(perm.len(), self.m);
        let tmp = self.clone();
        for (i, &p) in perm.iter().enumerate() {
            self.f[i] = tmp.f[p];
        }
        self
    }

    pub fn scale(&mut self, s: &Vector<T>) -> &mut Self {
        kernels::zip_apply(self.val_mut(), s.val(), |v, s| v * s);
        self
    }

    pub fn unscale(&mut self, s: &Vector<T>) -> &mut Self {
        kernels::zip_apply(self.val_mut(), s.val(), |v, s| v / s);
        self
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.val().iter()
    }
}

impl<T: Scalar> Index<usize> for Vector<T> {
    type Output = T;
    #[inline]
    fn index(&self, i: usize) -> &T {
        debug_assert!(i < self.m);
        &self.f[i]
    }
}

impl<T: Scalar> IndexMut<usize> for Vector<T> {
    #[inline]
    fn index_mut(&mut self, i: usize) -> &mut T {
        debug_assert!(i < self.m);
        &mut self.f[i]
    }
}

impl<T: Scalar> PartialEq for Vector<T> {
    fn eq(&self, other: &Self) -> bool {
        self.val() == other.val()
    }
}

impl<T: Scalar> fmt::Debug for Vector<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.val()).finish()
    }
}

impl<T: Scalar> From<Vec<T>> for Vector<T> {
    fn from(v: Vec<T>) -> Self {
        Self::from_slice(&v)
    }
}

impl<T: Scalar> AsRef<[T]> for Vector<T> {
    fn as_ref(&self) -> &[T] {
        self.val()
    }
}

impl<T: Scalar> AsMut<[T]> for Vector<T> {
    fn as_mut(&mut self) -> &mut [T] {
        self.val_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn storage_is_padded_but_length_is_logical() {
        let v = Vector::<f64>::new(5);
        assert_eq!(v.m(), 5);
        assert_eq!(v.val().len(), 5);
        assert_eq!(v.mem() % CACHE_LINE, 0);
        assert_eq!(v.val().as_ptr() as usize % CACHE_LINE, 0);
    }

    #[test]
    fn reorder_and_scale() {
        let mut v = Vector::from_slice(&[1.0, 2.0, 3.0]);
        v.reorder(&[2, 0, 1]);
        assert_eq!(v.val(), &[3.0, 1.0, 2.0]);
        let s = Vector::from_slice(&[2.0, 4.0, 0.5]);
        v.scale(&s);
        assert_eq!(v.val(), &[6.0, 4.0, 1.0]);
        v.unscale(&s);
        assert_eq!(v.val(), &[3.0, 1.0, 2.0]);
    }

    #[test]
    fn axpy_xpay() {
        let mut y = Vector::from_slice(&[1.0, 1.0]);
        let x = Vector::from_slice(&[2.0, -1.0]);
        y.axpy(0.5, &x);
        assert_eq!(y.val(), &[2.0, 0.5]);
        y.xpay(&x, 2.0);
        assert_eq!(y.val(), &[6.0, 0.0]);
        assert_abs_diff_eq!(x.norm(), 5.0f64.sqrt());
    }
}
