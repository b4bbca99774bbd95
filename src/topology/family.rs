//! Adjacency relation over elements.
//!
//! A [`Family`] maps each generating element to its [`Neighbour`] set. It describes
//! the sparsity of an operator: the row of element `x` has a column for every member
//! of `x`'s neighbour.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::{BitOr, BitOrAssign};

use crate::error::Result;
use crate::parallel::{Comm, Marshal, Portal};

use super::element::{Element, Neighbour};
use super::space::Space;

#[derive(Clone, Debug)]
pub struct Family<E: Element, N: Neighbour<E>> {
    tau: BTreeMap<E, N>,
}

impl<E: Element, N: Neighbour<E>> Default for Family<E, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Element, N: Neighbour<E>> Family<E, N> {
    pub fn new() -> Self {
        Self { tau: BTreeMap::new() }
    }

    /// Every element of `s` adjacent only to itself.
    pub fn from_space(s: &Space<E>) -> Self {
        let tau = s.elements().map(|e| (e.clone(), N::from_element(e.clone()))).collect();
        Self { tau }
    }

    pub fn from_neighbour(u: N) -> Self {
        let mut tau = BTreeMap::new();
        tau.insert(u.element().clone(), u);
        Self { tau }
    }

    pub fn len(&self) -> usize {
        self.tau.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tau.is_empty()
    }

    /// Add `u`, or merge it into the neighbour already generated by the same element.
    pub fn join(&mut self, u: N) -> &mut Self {
        match self.tau.get_mut(u.element()) {
            Some(v) => v.unite(&u),
            None => {
                self.tau.insert(u.element().clone(), u);
            }
        }
        self
    }

    pub fn find(&self, x: &E) -> Option<&N> {
        self.tau.get(x)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&E, &N)> + '_ {
        self.tau.iter()
    }

    /// Points reachable from `x` in up to `k` hops (`0` and `1` both give the direct
    /// neighbours). Empty when `x` generates nothing.
    pub fn neighbourhood(&self, x: &E, k: usize) -> Space<E> {
        let mut sub = Space::new();
        let mut passed = BTreeSet::new();
        let mut hops = k as isize;
        let mut cur = self.tau.get_key_value(x);

        while let Some((chk, neigh)) = cur {
            for p in neigh.iter() {
                if !sub.contains(p) {
                    sub.join(p.clone());
                }
            }
            passed.insert(chk.clone());
            hops -= 1;
            if hops <= 0 {
                break;
            }
            let next = sub.elements().find(|e| !passed.contains(*e)).cloned();
            cur = next.and_then(|e| self.tau.get_key_value(&e));
        }
        sub
    }

    /// Elements of `s` that appear in some neighbour, joined in `s` order.
    pub fn contained(&self, s: &Space<E>) -> Space<E> {
        let mut sub = Space::new();
        for e in s.elements() {
            if self.tau.values().any(|u| u.contains(e)) {
                sub.join(e.clone());
            }
        }
        sub
    }

    /// Rename `x` to `y`: the entry generated by `x` moves to `y`, and references to
    /// `x` inside neighbours are replaced. Symmetric mode only visits the former
    /// members of `x`'s neighbour; otherwise every entry is scanned.
    pub fn flip(&mut self, x: &E, y: &E, symmetric: bool) -> &mut Self {
        let mut members = Vec::new();
        if let Some(src) = self.tau.remove(x) {
            let mut moved = N::from_element(y.clone());
            for p in src.iter().filter(|p| *p != x) {
                moved.join(p.clone());
                members.push(p.clone());
            }
            self.tau.insert(y.clone(), moved);
        }

        let rename = |u: &mut N| {
            if u.erase(x) {
                u.join(y.clone());
            }
        };
        if symmetric {
            for p in &members {
                if let Some(u) = self.tau.get_mut(p) {
                    rename(u);
                }
            }
        } else {
            self.tau.values_mut().for_each(rename);
        }
        self
    }

    /// Entries generated by elements of `s`.
    pub fn localize(&self, s: &Space<E>) -> Self {
        let tau = s
            .elements()
            .filter_map(|e| self.tau.get(e).map(|u| (e.clone(), u.clone())))
            .collect();
        Self { tau }
    }

    /// Entries generated by elements of `s`, keeping only members in `t`.
    pub fn localize_with(&self, s: &Space<E>, t: &Space<E>) -> Self {
        let mut tau = BTreeMap::new();
        for e in s.elements() {
            if let Some(u0) = self.tau.get(e) {
                let mut u = N::from_element(e.clone());
                for p in u0.iter().filter(|p| t.contains(p)) {
                    u.join(p.clone());
                }
                tau.insert(e.clone(), u);
            }
        }
        Self { tau }
    }
}

impl<E: Element, N: Neighbour<E>> BitOr<&Family<E, N>> for &Family<E, N> {
    type Output = Family<E, N>;

    fn bitor(self, rhs: &Family<E, N>) -> Family<E, N> {
        let mut out = self.clone();
        out |= rhs;
        out
    }
}

impl<E: Element, N: Neighbour<E>> BitOrAssign<&Family<E, N>> for Family<E, N> {
    fn bitor_assign(&mut self, rhs: &Family<E, N>) {
        for u in rhs.tau.values() {
            self.join(u.clone());
        }
    }
}

impl<E: Element, N: Neighbour<E>> Marshal for Family<E, N> {
    fn marshal<C: Comm>(&self, portal: &Portal<'_, C>) {
        let mut base = Vec::with_capacity(self.tau.len());
        let mut cnt = Vec::with_capacity(self.tau.len());
        let mut adj = Vec::new();
        for (x, u) in &self.tau {
            base.push(x.id());
            let before = adj.len();
            adj.extend(u.iter().filter(|y| *y != x).map(Element::id));
            cnt.push((adj.len() - before) as u64);
        }
        portal.send_counts(&[self.tau.len(), adj.len()]);
        portal.send(&base);
        portal.send(&cnt);
        portal.send(&adj);
    }

    fn unmarshal<C: Comm>(portal: &Portal<'_, C>) -> Result<Self> {
        let head = portal.recv_counts(2, "family header")?;
        let (m, nnz) = (head[0], head[1]);
        let base = portal.recv_exact::<u64>(m, "family generators")?;
        let cnt = portal.recv_exact::<u64>(m, "family counts")?;
        let adj = portal.recv_exact::<u64>(nnz, "family members")?;
        let mut tau = Self::new();
        let mut off = 0;
        for (&x, &c) in base.iter().zip(&cnt) {
            let c = c as usize;
            let members = adj.get(off..off + c).ok_or_else(|| {
                crate::error::ElaiError::Marshal(format!("family member counts exceed {}", nnz))
            })?;
            let mut u = N::from_element(E::from_id(x));
            for &y in members {
                u.join(E::from_id(y));
            }
            tau.join(u);
            off += c;
        }
        Ok(tau)
    }
}
