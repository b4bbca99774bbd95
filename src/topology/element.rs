//! Vertices of the index space and their adjacency sets.

use std::collections::BTreeSet;
use std::collections::btree_set;
use std::fmt::Debug;

/// A totally ordered, uniquely identified vertex carrying an owner color.
///
/// The order decides local index assignment in a [`Space`](super::Space); the 64-bit id
/// is what crosses rank boundaries.
pub trait Element: Ord + Clone + Debug + Send {
    fn from_id(id: u64) -> Self;
    fn id(&self) -> u64;
    fn color(&self) -> u32;
    /// Same vertex under another owner color.
    fn recolor(&self, color: u32) -> Self;
}

/// Element with the index in the low 32 bits of its id and the color in the high ones.
///
/// Field order makes the derived ordering compare color first, then index.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PackedElement {
    c: u32,
    i: u32,
}

impl PackedElement {
    pub fn new(i: u32, c: u32) -> Self {
        Self { c, i }
    }

    pub fn index(&self) -> u32 {
        self.i
    }
}

impl Element for PackedElement {
    fn from_id(id: u64) -> Self {
        Self { c: (id >> 32) as u32, i: (id & 0xffff_ffff) as u32 }
    }

    fn id(&self) -> u64 {
        ((self.c as u64) << 32) | self.i as u64
    }

    fn color(&self) -> u32 {
        self.c
    }

    fn recolor(&self, color: u32) -> Self {
        Self { c: color, i: self.i }
    }
}

/// Adjacency set of one generating element, which is itself a member.
pub trait Neighbour<E: Element>: Clone + Debug + Send {
    type Iter<'a>: Iterator<Item = &'a E>
    where
        Self: 'a,
        E: 'a;

    fn from_element(x: E) -> Self;
    /// The generating element.
    fn element(&self) -> &E;
    fn join(&mut self, y: E) -> &mut Self;
    fn erase(&mut self, y: &E) -> bool;
    fn contains(&self, y: &E) -> bool;
    /// Members in ascending order.
    fn iter(&self) -> Self::Iter<'_>;
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Join every member of `other`.
    fn unite(&mut self, other: &Self) {
        for y in other.iter() {
            self.join(y.clone());
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SetNeighbour<E: Element> {
    x: E,
    adj: BTreeSet<E>,
}

impl<E: Element> Neighbour<E> for SetNeighbour<E> {
    type Iter<'a>
        = btree_set::Iter<'a, E>
    where
        E: 'a;

    fn from_element(x: E) -> Self {
        let mut adj = BTreeSet::new();
        adj.insert(x.clone());
        Self { x, adj }
    }

    fn element(&self) -> &E {
        &self.x
    }

    fn join(&mut self, y: E) -> &mut Self {
        self.adj.insert(y);
        self
    }

    fn erase(&mut self, y: &E) -> bool {
        self.adj.remove(y)
    }

    fn contains(&self, y: &E) -> bool {
        self.adj.contains(y)
    }

    fn iter(&self) -> Self::Iter<'_> {
        self.adj.iter()
    }

    fn len(&self) -> usize {
        self.adj.len()
    }
}
