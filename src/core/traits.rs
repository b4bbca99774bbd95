//! Core scalar trait for elai.
//!
//! Vectors, matrices, preconditioners and Krylov methods are generic over [`Scalar`],
//! implemented for `f32`, `f64`, `Complex<f32>` and `Complex<f64>`. Inner products
//! conjugate the right operand, so complex systems see the Hermitian product.

use num_complex::Complex;
use num_traits::{Float, NumAssign};
use std::fmt;
use std::ops::Neg;

use crate::parallel::Datum;

/// Field element stored in vectors and matrices.
pub trait Scalar:
    NumAssign + Neg<Output = Self> + Copy + Default + PartialEq + fmt::Debug + fmt::Display + Datum + Send + Sync
{
    /// Real counterpart used for norms and thresholds.
    type Real: Float + Scalar<Real = Self::Real> + fmt::LowerExp;

    /// Complex conjugate (identity for reals).
    fn conj(self) -> Self;
    /// Absolute value (modulus for complex).
    fn modulus(self) -> Self::Real;
    /// Real part.
    fn re(self) -> Self::Real;
    /// Imaginary part (zero for reals).
    fn im(self) -> Self::Real;
    fn from_real(r: Self::Real) -> Self;
    fn from_f64(v: f64) -> Self;
    /// Build from real and imaginary parts; reals drop `im`.
    fn from_parts(re: f64, im: f64) -> Self;
    /// True for complex scalar types.
    fn is_complex() -> bool;
    /// Principal square root.
    fn root(self) -> Self;
    /// True if any component is NaN.
    fn has_nan(self) -> bool;
}

macro_rules! real_scalar {
    ($t:ty) => {
        impl Scalar for $t {
            type Real = $t;
            #[inline]
            fn conj(self) -> Self { self }
            #[inline]
            fn modulus(self) -> $t { self.abs() }
            #[inline]
            fn re(self) -> $t { self }
            #[inline]
            fn im(self) -> $t { 0.0 }
            #[inline]
            fn from_real(r: $t) -> Self { r }
            #[inline]
            fn from_f64(v: f64) -> Self { v as $t }
            #[inline]
            fn from_parts(re: f64, _im: f64) -> Self { re as $t }
            fn is_complex() -> bool { false }
            #[inline]
            fn root(self) -> Self { self.sqrt() }
            #[inline]
            fn has_nan(self) -> bool { self.is_nan() }
        }
    };
}

macro_rules! complex_scalar {
    ($t:ty) => {
        impl Scalar for Complex<$t> {
            type Real = $t;
            #[inline]
            fn conj(self) -> Self { Complex::new(self.re, -self.im) }
            #[inline]
            fn modulus(self) -> $t { self.norm() }
            #[inline]
            fn re(self) -> $t { self.re }
            #[inline]
            fn im(self) -> $t { self.im }
            #[inline]
            fn from_real(r: $t) -> Self { Complex::new(r, 0.0) }
            #[inline]
            fn from_f64(v: f64) -> Self { Complex::new(v as $t, 0.0) }
            #[inline]
            fn from_parts(re: f64, im: f64) -> Self { Complex::new(re as $t, im as $t) }
            fn is_complex() -> bool { true }
            #[inline]
            fn root(self) -> Self { self.sqrt() }
            #[inline]
            fn has_nan(self) -> bool { self.re.is_nan() || self.im.is_nan() }
        }
    };
}

real_scalar!(f32);
real_scalar!(f64);
complex_scalar!(f32);
complex_scalar!(f64);

/// Hermitian inner product of two slices: Σ lhs[i]·conj(rhs[i]).
pub fn dot<T: Scalar>(lhs: &[T], rhs: &[T]) -> T {
    assert_eq!(lhs.len(), rhs.len());
    lhs.iter()
        .zip(rhs)
        .fold(T::zero(), |acc, (&a, &b)| acc + a * b.conj())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn complex_dot_conjugates_rhs() {
        let x = [Complex::new(1.0, 2.0), Complex::new(0.0, 1.0)];
        let d = dot(&x, &x);
        assert_abs_diff_eq!(d.re, 6.0);
        assert_abs_diff_eq!(d.im, 0.0);
    }

    #[test]
    fn real_dot_is_plain_sum() {
        let x = [1.0f64, 2.0, 3.0];
        let y = [4.0f64, -1.0, 0.5];
        assert_abs_diff_eq!(dot(&x, &y), 3.5);
        assert_abs_diff_eq!(Scalar::modulus(-2.5f64), 2.5);
    }
}
