//! Index space and adjacency of a plain matrix.

use crate::core::traits::Scalar;
use crate::matrix::Matrix;

use super::element::{Element, Neighbour};
use super::family::Family;
use super::space::Space;

/// One element per row (id = row, color 0) and one neighbour per row holding its
/// column pattern.
pub fn generate<E, N, T>(a: &Matrix<T>) -> (Space<E>, Family<E, N>)
where
    E: Element,
    N: Neighbour<E>,
    T: Scalar,
{
    let mut base = Space::new();
    let mut topo = Family::new();
    for i in 0..a.m() {
        base.join(E::from_id(i as u64));
    }
    for i in 0..a.m() {
        let mut u = N::from_element(E::from_id(i as u64));
        for &j in &a.col()[a.row(i)] {
            u.join(E::from_id(j as u64));
        }
        topo.join(u);
    }
    (base, topo)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::{PackedElement as P, SetNeighbour};

    #[test]
    fn rows_become_elements() {
        let a = Matrix::<f64>::from_triplets(3, 3, &[(0, 0, 2.0), (0, 2, 1.0), (2, 1, 1.0)]);
        let (s, tau) = generate::<P, SetNeighbour<P>, f64>(&a);
        assert_eq!(s.size(), 3);
        assert_eq!(s.index(&P::new(2, 0)), 2);
        let u = tau.find(&P::new(0, 0)).expect("row 0");
        assert!(u.contains(&P::new(2, 0)));
        // the generator is always a member
        assert_eq!(tau.find(&P::new(1, 0)).map(|u| u.len()), Some(1));
        assert_eq!(tau.find(&P::new(2, 0)).map(|u| u.len()), Some(2));
    }
}
