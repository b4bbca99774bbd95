//! Diagonal preconditioner: A = L + D + U, M = D.

use crate::core::traits::Scalar;
use crate::core::vector::Vector;
use crate::matrix::Matrix;
use crate::preconditioner::Preconditioner;

/// M = D. `forward` is the identity; `backward` divides by the diagonal.
pub struct JacobiConditioner<'a, T: Scalar> {
    a: &'a Matrix<T>,
}

impl<'a, T: Scalar> JacobiConditioner<'a, T> {
    pub fn new(a: &'a Matrix<T>) -> Self {
        Self { a }
    }
}

impl<T: Scalar> Preconditioner<T> for JacobiConditioner<'_, T> {
    fn forward(&self, _x: &mut Vector<T>) {}

    fn backward(&self, x: &mut Vector<T>) {
        for i in 0..x.m() {
            x[i] /= self.a.get(i, i);
        }
    }

    fn forward_inv(&self, _x: &mut Vector<T>) {}

    fn backward_inv(&self, x: &mut Vector<T>) {
        for i in 0..x.m() {
            x[i] *= self.a.get(i, i);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preconditioner::testing::poisson;
    use approx::assert_abs_diff_eq;

    #[test]
    fn divides_by_diagonal() {
        let a = poisson(4);
        let pc = JacobiConditioner::new(&a);
        let mut x = Vector::from_slice(&[2.0, 4.0, 6.0, 8.0]);
        pc.apply(&mut x);
        assert_eq!(x.val(), &[1.0, 2.0, 3.0, 4.0]);
        pc.apply_inv(&mut x);
        for (v, w) in x.iter().zip([2.0, 4.0, 6.0, 8.0]) {
            assert_abs_diff_eq!(*v, w, epsilon = 1e-14);
        }
    }
}
