//! Lazy arithmetic on vectors.
//!
//! `&x + &y`, `&x - &y`, `&x * c`, `c * &x` and `&A * &x` build small expression nodes
//! that borrow their operands. Nothing is computed until [`Vector::assign`] or
//! [`Vector::from_expr`] walks the target once, evaluating the whole right-hand side per
//! slot with no temporaries. Operands are borrowed immutably, so a target can never
//! alias an operand; in-place updates go through `axpy`/`xpay`, which read slot `i`
//! before writing it.

use std::marker::PhantomData;
use std::ops::{Add, Mul, Sub};

use num_complex::Complex;

use crate::core::traits::Scalar;
use crate::core::vector::Vector;
use crate::matrix::Matrix;

/// A length-`m` value computable slot by slot.
pub trait Expr<T: Scalar>: Sync {
    fn m(&self) -> usize;
    fn at(&self, i: usize) -> T;
}

impl<T: Scalar> Expr<T> for &Vector<T> {
    #[inline]
    fn m(&self) -> usize {
        Vector::m(self)
    }
    #[inline]
    fn at(&self, i: usize) -> T {
        self[i]
    }
}

/// lhs + rhs
#[derive(Clone, Copy)]
pub struct Plus<L, R, T> {
    lhs: L,
    rhs: R,
    _scalar: PhantomData<T>,
}

/// lhs - rhs
#[derive(Clone, Copy)]
pub struct Minus<L, R, T> {
    lhs: L,
    rhs: R,
    _scalar: PhantomData<T>,
}

/// expr * c
#[derive(Clone, Copy)]
pub struct Scaled<E, T> {
    expr: E,
    c: T,
}

/// A x
#[derive(Clone, Copy)]
pub struct Product<'a, T: Scalar> {
    a: &'a Matrix<T>,
    x: &'a Vector<T>,
}

impl<T: Scalar, L: Expr<T>, R: Expr<T>> Expr<T> for Plus<L, R, T> {
    fn m(&self) -> usize {
        assert_eq!(self.lhs.m(), self.rhs.m());
        self.lhs.m()
    }
    #[inline]
    fn at(&self, i: usize) -> T {
        self.lhs.at(i) + self.rhs.at(i)
    }
}

impl<T: Scalar, L: Expr<T>, R: Expr<T>> Expr<T> for Minus<L, R, T> {
    fn m(&self) -> usize {
        assert_eq!(self.lhs.m(), self.rhs.m());
        self.lhs.m()
    }
    #[inline]
    fn at(&self, i: usize) -> T {
        self.lhs.at(i) - self.rhs.at(i)
    }
}

impl<T: Scalar, E: Expr<T>> Expr<T> for Scaled<E, T> {
    fn m(&self) -> usize {
        self.expr.m()
    }
    #[inline]
    fn at(&self, i: usize) -> T {
        self.expr.at(i) * self.c
    }
}

impl<T: Scalar> Expr<T> for Product<'_, T> {
    fn m(&self) -> usize {
        assert_eq!(self.a.n(), self.x.m());
        self.a.m()
    }
    #[inline]
    fn at(&self, i: usize) -> T {
        self.a.row_dot(i, self.x.val())
    }
}

// Operator plumbing: every node (and &Vector) accepts +, - with any expression and * with a scalar.
macro_rules! expr_ops {
    ([$($g:tt)*] $t:ty) => {
        impl<$($g)*, Rhs: Expr<T>> Add<Rhs> for $t {
            type Output = Plus<Self, Rhs, T>;
            fn add(self, rhs: Rhs) -> Self::Output {
                Plus { lhs: self, rhs, _scalar: PhantomData }
            }
        }
        impl<$($g)*, Rhs: Expr<T>> Sub<Rhs> for $t {
            type Output = Minus<Self, Rhs, T>;
            fn sub(self, rhs: Rhs) -> Self::Output {
                Minus { lhs: self, rhs, _scalar: PhantomData }
            }
        }
        impl<$($g)*> Mul<T> for $t {
            type Output = Scaled<Self, T>;
            fn mul(self, c: T) -> Self::Output {
                Scaled { expr: self, c }
            }
        }
    };
}

expr_ops!(['a, T: Scalar] &'a Vector<T>);
expr_ops!([T: Scalar, L: Expr<T>, R: Expr<T>] Plus<L, R, T>);
expr_ops!([T: Scalar, L: Expr<T>, R: Expr<T>] Minus<L, R, T>);
expr_ops!([T: Scalar, E: Expr<T>] Scaled<E, T>);
expr_ops!(['a, T: Scalar] Product<'a, T>);

impl<'a, T: Scalar> Mul<&'a Vector<T>> for &'a Matrix<T> {
    type Output = Product<'a, T>;
    fn mul(self, x: &'a Vector<T>) -> Self::Output {
        Product { a: self, x }
    }
}

macro_rules! scalar_lhs {
    ($($s:ty),*) => {$(
        impl<'a> Mul<&'a Vector<$s>> for $s {
            type Output = Scaled<&'a Vector<$s>, $s>;
            fn mul(self, x: &'a Vector<$s>) -> Self::Output {
                Scaled { expr: x, c: self }
            }
        }
    )*};
}

scalar_lhs!(f32, f64, Complex<f32>, Complex<f64>);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fused_axpy_expression() {
        let x = Vector::from_slice(&[1.0, 2.0, 3.0]);
        let y = Vector::from_slice(&[1.0, 1.0, 1.0]);
        let z = Vector::from_expr(&x - &y * 2.0 + 0.5 * &x);
        assert_eq!(z.val(), &[-0.5, 1.0, 2.5]);
    }

    #[test]
    fn matrix_vector_expression() {
        // [[2,-1],[-1,2]]
        let a = Matrix::new(2, 2, &[0, 2, 4], &[0, 1, 0, 1], Some(&[2.0, -1.0, -1.0, 2.0]));
        let x = Vector::from_slice(&[1.0, 1.0]);
        let b = Vector::from_slice(&[3.0, 3.0]);
        let mut r = Vector::new(2);
        r.assign(&b - &a * &x);
        assert_eq!(r.val(), &[2.0, 2.0]);
    }

    fn combine<T: Scalar>(x: &Vector<T>, y: &Vector<T>, z: &Vector<T>, a: T) -> Vector<T> {
        Vector::from_expr(x - y * a + z - x * a * a)
    }

    #[test]
    fn chained_nodes_are_generic() {
        let x = Vector::from_slice(&[1.0, 2.0]);
        let y = Vector::from_slice(&[3.0, 4.0]);
        let z = Vector::from_slice(&[0.5, 0.5]);
        // x - 2y + z - 4x
        assert_eq!(combine(&x, &y, &z, 2.0).val(), &[-8.5, -13.5]);

        let i = Complex::new(0.0, 1.0);
        let u = Vector::from_slice(&[Complex::new(1.0, 0.0)]);
        let w = combine(&u, &u, &u, i);
        // 1 - i + 1 - i·i·1 = 3 - i
        assert_eq!(w.val(), &[Complex::new(3.0, -1.0)]);
    }
}
