//! Ordering service.
//!
//! An [`Ordering`] turns the adjacency of a space into a [`Permutation`]. The built-in
//! orderings are [`ReverseCuthillMcKee`] (bandwidth reduction) and [`Identity`];
//! nested-dissection partitioners plug in through the same trait.

use std::collections::VecDeque;

use crate::error::{ElaiError, Result};

use super::clique::Clique;
use super::element::{Element, Neighbour};
use super::family::Family;
use super::space::Space;

pub trait Ordering {
    fn reorder<E: Element, N: Neighbour<E>>(&self, s: &Space<E>, tau: &Family<E, N>) -> Result<Permutation>;
}

/// `perm[i]` is the new position of the element at index `i`; `iperm` is its inverse.
///
/// To permute a matrix or vector consistently with [`reordered`](Self::reordered), pass
/// `iperm()` to `Matrix::reorder` / `Vector::reorder`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Permutation {
    perm: Vec<usize>,
    iperm: Vec<usize>,
}

impl Permutation {
    pub fn new(perm: Vec<usize>) -> Result<Self> {
        let n = perm.len();
        let mut iperm = vec![usize::MAX; n];
        for (i, &p) in perm.iter().enumerate() {
            if p >= n || iperm[p] != usize::MAX {
                return Err(ElaiError::Ordering(format!("position {} of {} is not a permutation entry", p, n)));
            }
            iperm[p] = i;
        }
        Ok(Self { perm, iperm })
    }

    /// From the visiting order: `order[k]` is the old index placed at position `k`.
    pub fn from_order(order: Vec<usize>) -> Result<Self> {
        let p = Self::new(order)?;
        Ok(Self { perm: p.iperm, iperm: p.perm })
    }

    pub fn identity(n: usize) -> Self {
        Self { perm: (0..n).collect(), iperm: (0..n).collect() }
    }

    pub fn len(&self) -> usize {
        self.perm.len()
    }

    pub fn is_empty(&self) -> bool {
        self.perm.is_empty()
    }

    pub fn perm(&self) -> &[usize] {
        &self.perm
    }

    pub fn iperm(&self) -> &[usize] {
        &self.iperm
    }

    pub fn reordered<E: Element>(&self, s: &Space<E>) -> Space<E> {
        s.reindexed(&self.perm)
    }

    pub fn inversed<E: Element>(&self, s: &Space<E>) -> Space<E> {
        s.reindexed(&self.iperm)
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Identity;

impl Ordering for Identity {
    fn reorder<E: Element, N: Neighbour<E>>(&self, s: &Space<E>, _tau: &Family<E, N>) -> Result<Permutation> {
        Ok(Permutation::identity(s.size()))
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ReverseCuthillMcKee;

impl Ordering for ReverseCuthillMcKee {
    fn reorder<E: Element, N: Neighbour<E>>(&self, s: &Space<E>, tau: &Family<E, N>) -> Result<Permutation> {
        let g = Clique::new(s, tau, 0);
        let n = g.n();
        let degree: Vec<usize> = (0..n).map(|i| g.row(i).iter().filter(|&&j| j != i).count()).collect();
        let mut seen = vec![false; n];
        let mut order = Vec::with_capacity(n);
        let mut queue = VecDeque::new();

        while order.len() < n {
            // next component starts at its lowest-degree vertex
            let start = match (0..n).filter(|&i| !seen[i]).min_by_key(|&i| degree[i]) {
                Some(i) => i,
                None => break,
            };
            seen[start] = true;
            queue.push_back(start);
            while let Some(i) = queue.pop_front() {
                order.push(i);
                let mut next: Vec<usize> = g.row(i).iter().copied().filter(|&j| !seen[j]).collect();
                next.sort_by_key(|&j| (degree[j], j));
                for j in next {
                    seen[j] = true;
                    queue.push_back(j);
                }
            }
        }
        order.reverse();
        log::debug!("rcm ordering of {} vertices, {} edges", n, g.nnz());
        Permutation::from_order(order)
    }
}
