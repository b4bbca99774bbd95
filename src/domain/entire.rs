//! Assembly of distributed pieces into one function or operator.
//!
//! Each piece contributes the values it governs. Ghost elements coalesce with their
//! owners when the domains are united, so the assembled object has one slot per vertex.

use std::collections::BTreeMap;

use crate::core::traits::Scalar;
use crate::core::vector::Vector;
use crate::topology::{Element, Family, Neighbour, Space};

use super::linear_function::LinearFunction;
use super::linear_operator::{LinearOperator, assemble};

pub struct EntireFunction<'a, E: Element, T: Scalar> {
    handles: Vec<&'a LinearFunction<E, T>>,
}

impl<'a, E: Element, T: Scalar> Default for EntireFunction<'a, E, T> {
    fn default() -> Self {
        Self { handles: Vec::new() }
    }
}

impl<'a, E: Element, T: Scalar> EntireFunction<'a, E, T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn join(&mut self, f: &'a LinearFunction<E, T>) -> &mut Self {
        self.handles.push(f);
        self
    }

    pub fn purge(&mut self) {
        self.handles.clear();
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn assemble(&self) -> LinearFunction<E, T> {
        let mut domain = Space::new();
        for f in &self.handles {
            domain |= f.dom();
        }
        let mut v = Vector::new(domain.size());
        for f in &self.handles {
            for (e, i) in f.dom().iter() {
                if f.dom().governs(e) {
                    v[domain.index(e)] = f.vector()[i];
                }
            }
        }
        log::debug!("assembled function from {} pieces, dim {}", self.handles.len(), domain.size());
        LinearFunction::from_vector(domain, v)
    }
}

pub struct EntireOperator<'a, E: Element, N: Neighbour<E>, T: Scalar> {
    operators: Vec<&'a LinearOperator<E, N, T>>,
}

impl<'a, E: Element, N: Neighbour<E>, T: Scalar> Default for EntireOperator<'a, E, N, T> {
    fn default() -> Self {
        Self { operators: Vec::new() }
    }
}

impl<'a, E: Element, N: Neighbour<E>, T: Scalar> EntireOperator<'a, E, N, T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn join(&mut self, a: &'a LinearOperator<E, N, T>) -> &mut Self {
        self.operators.push(a);
        self
    }

    pub fn purge(&mut self) {
        self.operators.clear();
    }

    pub fn len(&self) -> usize {
        self.operators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operators.is_empty()
    }

    /// Operator over the united ranges and domains. Ghost rows are renamed to their
    /// owners in each piece's family first; `symmetric` lets the rename visit only
    /// the ghost's own neighbours.
    pub fn assemble(&self, symmetric: bool) -> LinearOperator<E, N, T> {
        let mut domain = Space::new();
        let mut range = Space::new();
        let mut graph = Family::new();
        // ghost name -> owner name, over every piece's domain
        let mut owner: BTreeMap<E, E> = BTreeMap::new();

        for op in &self.operators {
            let mut topo = op.topo().clone();
            for (x, y) in op.ran().ghosts() {
                topo.flip(x, y, symmetric);
            }
            for (x, y) in op.dom().ghosts() {
                owner.entry(x.clone()).or_insert_with(|| y.clone());
            }
            domain |= op.dom();
            range |= op.ran();
            graph |= &topo;
        }

        let column = |d: &E| -> Option<usize> {
            domain.resolve(d).or_else(|| owner.get(d).and_then(|y| domain.get_index(y)))
        };

        let mut rows = (0..range.size()).map(|_| BTreeMap::new()).collect::<Vec<_>>();
        for (e, i) in range.iter() {
            for d in graph.neighbourhood(e, 0).elements() {
                if let Some(j) = column(d) {
                    rows[i].insert(j, T::zero());
                }
            }
        }
        let mut a = assemble(domain.size(), rows);

        for op in &self.operators {
            let (ran, dom) = (op.ran(), op.dom());
            for (x, big_i) in ran.iter() {
                if !ran.governs(x) {
                    continue;
                }
                let i = range.index(x);
                for y in op.topo().neighbourhood(x, 0).elements() {
                    let Some(big_j) = dom.get_index(y) else { continue };
                    if let Some(j) = column(y) {
                        a.set(i, j, op.action().get(big_i, big_j));
                    }
                }
            }
        }
        log::debug!(
            "assembled operator from {} pieces, {}x{} with {} nonzeros",
            self.operators.len(),
            range.size(),
            domain.size(),
            a.nnz()
        );
        LinearOperator::from_parts(range, domain, graph, a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::{PackedElement as P, SetNeighbour};

    type Op = LinearOperator<P, SetNeighbour<P>, f64>;

    fn neighbours(x: P, adj: &[P]) -> SetNeighbour<P> {
        let mut u = SetNeighbour::from_element(x);
        for &p in adj {
            u.join(p);
        }
        u
    }

    /// Rows `lo..lo+2` of the 1-D Laplacian on 4 points, owned by color `c`.
    fn half(c: u32) -> Op {
        let (own, ghost, far) = if c == 0 {
            ([P::new(0, 0), P::new(1, 0)], P::new(2, 0), P::new(2, 1))
        } else {
            ([P::new(2, 1), P::new(3, 1)], P::new(1, 1), P::new(1, 0))
        };
        let mut dom = Space::new();
        dom.join(own[0]).join(own[1]).join_ghost(ghost, far);
        let mut ran = Space::new();
        ran.join(own[0]).join(own[1]);
        let mut tau = Family::new();
        if c == 0 {
            tau.join(neighbours(own[0], &[own[1]]));
            tau.join(neighbours(own[1], &[own[0], ghost]));
        } else {
            tau.join(neighbours(own[0], &[ghost, own[1]]));
            tau.join(neighbours(own[1], &[own[0]]));
        }
        let mut a = Op::new(ran, dom, tau);
        for (x, _) in a.ran().clone().iter() {
            a.set(x, x, 2.0);
        }
        let pairs = if c == 0 {
            [(own[0], own[1]), (own[1], own[0]), (own[1], ghost)]
        } else {
            [(own[0], ghost), (own[0], own[1]), (own[1], own[0])]
        };
        for (x, y) in pairs {
            assert!(a.set(&x, &y, -1.0));
        }
        a
    }

    #[test]
    fn function_takes_governed_values() {
        let mut d0 = Space::new();
        d0.join(P::new(0, 0)).join_ghost(P::new(1, 0), P::new(1, 1));
        let mut d1 = Space::new();
        d1.join(P::new(1, 1));
        let f0 = LinearFunction::with_values(d0, &[1.0, -7.0]);
        let f1 = LinearFunction::with_values(d1, &[2.0]);
        let mut whole = EntireFunction::new();
        whole.join(&f0).join(&f1);
        let g = whole.assemble();
        assert_eq!(g.dim(), 2);
        assert_eq!(g.get(&P::new(0, 0)), 1.0);
        assert_eq!(g.get(&P::new(1, 1)), 2.0);
        whole.purge();
        assert!(whole.is_empty());
    }

    #[test]
    fn operator_halves_rebuild_laplacian() {
        let (a0, a1) = (half(0), half(1));
        let mut whole = EntireOperator::new();
        whole.join(&a0).join(&a1);
        let a = whole.assemble(true);
        assert_eq!((a.dim(), a.codim()), (4, 4));
        assert_eq!(a.action().nnz(), 10);
        let order = [P::new(0, 0), P::new(1, 0), P::new(2, 1), P::new(3, 1)];
        for (i, x) in order.iter().enumerate() {
            for (j, y) in order.iter().enumerate() {
                let want = match i.abs_diff(j) {
                    0 => 2.0,
                    1 => -1.0,
                    _ => 0.0,
                };
                assert_eq!(a.get(x, y), want, "entry ({}, {})", i, j);
            }
        }
    }
}
