//! CSR adjacency of a space under the k-level neighbourhood relation.

use super::element::{Element, Neighbour};
use super::family::Family;
use super::space::Space;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Clique {
    n: usize,
    xadj: Vec<usize>,
    adjy: Vec<usize>,
}

impl Clique {
    /// Row `index(x)` lists the local indices of `tau.neighbourhood(x, level)` that lie in `s`.
    pub fn new<E: Element, N: Neighbour<E>>(s: &Space<E>, tau: &Family<E, N>, level: usize) -> Self {
        let n = s.size();
        let mut rows: Vec<Vec<usize>> = vec![Vec::new(); n];
        for (x, i) in s.iter() {
            rows[i] = tau.neighbourhood(x, level).elements().filter_map(|y| s.get_index(y)).collect();
        }
        let mut xadj = Vec::with_capacity(n + 1);
        let mut adjy = Vec::new();
        xadj.push(0);
        for row in rows {
            adjy.extend(row);
            xadj.push(adjy.len());
        }
        Self { n, xadj, adjy }
    }

    pub fn n(&self) -> usize {
        self.n
    }

    pub fn nnz(&self) -> usize {
        self.adjy.len()
    }

    pub fn xadj(&self) -> &[usize] {
        &self.xadj
    }

    pub fn adjy(&self) -> &[usize] {
        &self.adjy
    }

    pub fn row(&self, i: usize) -> &[usize] {
        &self.adjy[self.xadj[i]..self.xadj[i + 1]]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::Matrix;
    use crate::topology::{PackedElement, SetNeighbour, generate};

    #[test]
    fn levels_widen_rows() {
        let a = Matrix::<f64>::from_triplets(
            4,
            4,
            &[(0, 0, 1.0), (0, 1, 1.0), (1, 0, 1.0), (1, 1, 1.0), (1, 2, 1.0), (2, 1, 1.0), (2, 2, 1.0), (2, 3, 1.0), (3, 2, 1.0), (3, 3, 1.0)],
        );
        let (s, tau) = generate::<PackedElement, SetNeighbour<PackedElement>, f64>(&a);
        let c0 = Clique::new(&s, &tau, 0);
        assert_eq!(c0.nnz(), a.nnz());
        assert_eq!(c0.row(1), &[0, 1, 2]);
        let c2 = Clique::new(&s, &tau, 2);
        assert_eq!(c2.row(0), &[0, 1, 2]);
        assert_eq!(c2.xadj().len(), 5);
    }
}
