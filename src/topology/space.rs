//! Ordered index set with ghost correspondences.
//!
//! A [`Space`] maps each element to a dense local index and records, for ghost
//! elements, the correspondence between the local ("internal") name and the owner's
//! ("external") name. An element is *governed* when it is contained and not a ghost.
//!
//! The set operators walk both operands in element order and re-index the result in
//! that order. Ghosts are coalesced with the matching governed element of the other
//! operand, and two ghosts with the same external name are treated as one element.

use std::collections::BTreeMap;
use std::ops::{BitAnd, BitAndAssign, BitOr, BitOrAssign, Div, DivAssign};

use crate::error::Result;
use crate::parallel::{Coherence, CoherenceSetup, Comm, Marshal, Portal};

use super::element::Element;

#[derive(Clone, Debug)]
pub struct Space<E: Element> {
    xi: BTreeMap<E, usize>,
    i2e: BTreeMap<E, E>,
    e2i: BTreeMap<E, E>,
}

impl<E: Element> Default for Space<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Walk {
    Union,
    Intersection,
    Difference,
}

impl<E: Element> Space<E> {
    pub fn new() -> Self {
        Self { xi: BTreeMap::new(), i2e: BTreeMap::new(), e2i: BTreeMap::new() }
    }

    pub fn size(&self) -> usize {
        self.xi.len()
    }

    pub fn is_empty(&self) -> bool {
        self.xi.is_empty()
    }

    /// Number of ghost correspondences.
    pub fn marginal_size(&self) -> usize {
        debug_assert_eq!(self.i2e.len(), self.e2i.len());
        self.i2e.len()
    }

    /// Append `x` with the next index. Joining an element twice is a contract violation.
    pub fn join(&mut self, x: E) -> &mut Self {
        let i = self.xi.len();
        let fresh = self.xi.insert(x, i).is_none();
        assert!(fresh, "element joined twice");
        self
    }

    /// Append ghost `x` standing for the owner's `y`.
    pub fn join_ghost(&mut self, x: E, y: E) -> &mut Self {
        self.join(x.clone());
        self.link(x, y)
    }

    /// Record that the contained `x` stands for the owner's `y`.
    pub fn link(&mut self, x: E, y: E) -> &mut Self {
        assert!(self.xi.contains_key(&x), "linking an element outside the space");
        self.i2e.entry(x.clone()).or_insert_with(|| y.clone());
        self.e2i.entry(y).or_insert(x);
        self
    }

    pub fn contains(&self, x: &E) -> bool {
        self.xi.contains_key(x)
    }

    /// Contained and not a ghost.
    pub fn governs(&self, x: &E) -> bool {
        self.contains(x) && !self.internal_contains(x)
    }

    /// `x` is the local name of a ghost.
    pub fn internal_contains(&self, x: &E) -> bool {
        self.i2e.contains_key(x)
    }

    /// `y` is the owner's name of a ghost.
    pub fn external_contains(&self, y: &E) -> bool {
        self.e2i.contains_key(y)
    }

    pub fn index(&self, x: &E) -> usize {
        match self.xi.get(x) {
            Some(&i) => i,
            None => panic!("{:?} is not in the space", x),
        }
    }

    pub fn get_index(&self, x: &E) -> Option<usize> {
        self.xi.get(x).copied()
    }

    /// Local index of the ghost standing for the owner's `y`.
    pub fn external_index(&self, y: &E) -> usize {
        self.index(self.internal_element(y))
    }

    pub fn external_element(&self, x: &E) -> &E {
        match self.i2e.get(x) {
            Some(y) => y,
            None => panic!("{:?} is not a ghost", x),
        }
    }

    pub fn internal_element(&self, y: &E) -> &E {
        match self.e2i.get(y) {
            Some(x) => x,
            None => panic!("{:?} has no ghost", y),
        }
    }

    /// Index of `x` if governed, else of the ghost standing for `x`.
    pub fn resolve(&self, x: &E) -> Option<usize> {
        if self.governs(x) {
            Some(self.index(x))
        } else if self.external_contains(x) {
            Some(self.external_index(x))
        } else {
            None
        }
    }

    /// (element, index) in element order.
    pub fn iter(&self) -> impl Iterator<Item = (&E, usize)> + '_ {
        self.xi.iter().map(|(e, &i)| (e, i))
    }

    pub fn elements(&self) -> impl Iterator<Item = &E> + '_ {
        self.xi.keys()
    }

    /// (internal, external) ghost pairs in internal order.
    pub fn ghosts(&self) -> impl Iterator<Item = (&E, &E)> + '_ {
        self.i2e.iter()
    }

    /// (external, internal) ghost pairs in external order.
    pub fn externals(&self) -> impl Iterator<Item = (&E, &E)> + '_ {
        self.e2i.iter()
    }

    /// Same elements and ghosts, element at index `i` moved to `map[i]`.
    pub(crate) fn reindexed(&self, map: &[usize]) -> Self {
        assert_eq!(map.len(), self.size());
        let xi = self.xi.iter().map(|(e, &i)| (e.clone(), map[i])).collect();
        Self { xi, i2e: self.i2e.clone(), e2i: self.e2i.clone() }
    }

    fn put(&mut self, x: &E, ext: Option<&E>) {
        let next = self.xi.len();
        self.xi.entry(x.clone()).or_insert(next);
        if let Some(y) = ext {
            self.i2e.entry(x.clone()).or_insert_with(|| y.clone());
            self.e2i.entry(y.clone()).or_insert_with(|| x.clone());
        }
    }

    fn put_from(&mut self, src: &Self, x: &E) {
        self.put(x, src.i2e.get(x));
    }

    /// A ghost of `self` whose owner name `other` already knows.
    fn covered_by(&self, x: &E, other: &Self) -> bool {
        match self.i2e.get(x) {
            Some(xx) => other.contains(xx) || other.external_contains(xx),
            None => false,
        }
    }

    fn walk(&self, rhs: &Self, how: Walk) -> Self {
        let xs: Vec<&E> = self.xi.keys().collect();
        let ys: Vec<&E> = rhs.xi.keys().collect();
        let (mut l, mut r) = (0, 0);
        let mut out = Self::new();

        while l < xs.len() && r < ys.len() {
            let (x, y) = (xs[l], ys[r]);
            let ex = self.i2e.get(x);
            let ey = rhs.i2e.get(y);

            if ex.is_some_and(|xx| rhs.governs(xx)) {
                l += 1;
                continue;
            }
            if ey.is_some_and(|yy| self.governs(yy)) {
                r += 1;
                continue;
            }
            if let (Some(xx), Some(yy)) = (ex, ey) {
                if xx == yy {
                    if how != Walk::Difference {
                        out.put(x, Some(xx));
                    }
                    l += 1;
                    r += 1;
                    continue;
                }
            }
            match x.cmp(y) {
                std::cmp::Ordering::Less => {
                    if how != Walk::Intersection {
                        out.put_from(self, x);
                    }
                    l += 1;
                }
                std::cmp::Ordering::Greater => {
                    if how == Walk::Union {
                        out.put_from(rhs, y);
                    }
                    r += 1;
                }
                std::cmp::Ordering::Equal => {
                    if how != Walk::Difference {
                        out.put_from(self, x);
                    }
                    l += 1;
                    r += 1;
                }
            }
        }
        if how != Walk::Intersection {
            for x in &xs[l..] {
                if !self.covered_by(x, rhs) {
                    out.put_from(self, x);
                }
            }
        }
        if how == Walk::Union {
            for y in &ys[r..] {
                if !rhs.covered_by(y, self) {
                    out.put_from(rhs, y);
                }
            }
        }
        debug_assert_eq!(out.i2e.len(), out.e2i.len());
        out
    }
}

impl<E: Element> PartialEq for Space<E> {
    fn eq(&self, rhs: &Self) -> bool {
        let mut l = self.xi.keys();
        let mut r = rhs.xi.keys();
        loop {
            match (l.next(), r.next()) {
                (None, None) => return true,
                (Some(x), Some(y)) => {
                    let ghosts_match = match (self.i2e.get(x), rhs.i2e.get(y)) {
                        (Some(xx), Some(yy)) => xx == yy,
                        _ => false,
                    };
                    if !ghosts_match && x != y {
                        return false;
                    }
                }
                _ => return false,
            }
        }
    }
}

macro_rules! space_op {
    ($tr:ident, $f:ident, $atr:ident, $af:ident, $walk:expr) => {
        impl<E: Element> $tr<&Space<E>> for &Space<E> {
            type Output = Space<E>;

            fn $f(self, rhs: &Space<E>) -> Space<E> {
                self.walk(rhs, $walk)
            }
        }

        impl<E: Element> $atr<&Space<E>> for Space<E> {
            fn $af(&mut self, rhs: &Space<E>) {
                *self = self.walk(rhs, $walk);
            }
        }
    };
}

space_op!(BitOr, bitor, BitOrAssign, bitor_assign, Walk::Union);
space_op!(BitAnd, bitand, BitAndAssign, bitand_assign, Walk::Intersection);
space_op!(Div, div, DivAssign, div_assign, Walk::Difference);

impl<E: Element> Marshal for Space<E> {
    fn marshal<C: Comm>(&self, portal: &Portal<'_, C>) {
        portal.send_counts(&[self.size(), self.marginal_size()]);
        let ids: Vec<u64> = self.xi.keys().map(Element::id).collect();
        let ind: Vec<u64> = self.xi.values().map(|&i| i as u64).collect();
        portal.send(&ids);
        portal.send(&ind);
        let iid: Vec<u64> = self.i2e.keys().map(Element::id).collect();
        let eid: Vec<u64> = self.i2e.values().map(Element::id).collect();
        portal.send(&iid);
        portal.send(&eid);
    }

    fn unmarshal<C: Comm>(portal: &Portal<'_, C>) -> Result<Self> {
        let counts = portal.recv_counts(2, "space header")?;
        let (m, n) = (counts[0], counts[1]);
        let ids = portal.recv_exact::<u64>(m, "space ids")?;
        let ind = portal.recv_exact::<u64>(m, "space indices")?;
        let iid = portal.recv_exact::<u64>(n, "ghost ids")?;
        let eid = portal.recv_exact::<u64>(n, "ghost owners")?;
        let mut s = Self::new();
        for (&id, &i) in ids.iter().zip(&ind) {
            s.xi.insert(E::from_id(id), i as usize);
        }
        for (&x, &y) in iid.iter().zip(&eid) {
            s.link(E::from_id(x), E::from_id(y));
        }
        Ok(s)
    }
}

/// Ghost slots read from their owners; owned slots written to the ranks that ghost them.
/// The owner rank of a ghost is the color of its external name.
impl<E: Element> CoherenceSetup for Space<E> {
    fn coherence_setup<C: Comm>(&self, coherence: &mut Coherence<'_, C>) {
        let comm = coherence.comm();
        let size = comm.size();
        let me = coherence.myself();
        let mut row = vec![0u64; size];
        for (_, y) in self.ghosts() {
            let c = y.color() as usize;
            assert!(c < size, "ghost owner {} outside communicator of size {}", c, size);
            row[c] += 1;
        }
        let mnn = comm.all_gather(&row);

        let asks: Vec<(usize, Vec<u64>)> = (0..size)
            .filter(|&p| mnn[me * size + p] > 0)
            .map(|p| (p, self.ghosts().filter(|(_, y)| y.color() as usize == p).map(|(_, y)| y.id()).collect()))
            .collect();
        let owed: Vec<(usize, usize)> = (0..size)
            .filter(|&p| mnn[p * size + me] > 0)
            .map(|p| (p, mnn[p * size + me] as usize))
            .collect();
        let wanted = comm.exchange(&owed, &asks);

        for (p, ids) in &asks {
            let idx: Vec<usize> = ids.iter().map(|&id| self.external_index(&E::from_id(id))).collect();
            for &i in &idx {
                coherence.exclude(i);
            }
            coherence.read(*p, idx);
        }
        for ((p, _), ids) in owed.iter().zip(wanted) {
            coherence.write(*p, ids.iter().map(|&id| self.index(&E::from_id(id))).collect());
        }
    }
}
