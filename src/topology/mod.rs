//! Abstract index space and adjacency model.
//!
//! Distributed problems are described over [`Element`]s rather than raw integers. A
//! [`Space`] assigns local indices and tracks ghosts, a [`Family`] holds the adjacency
//! (sparsity) relation, and [`Clique`] / [`Ordering`] turn both into plain CSR graphs
//! and permutations.

pub mod clique;
pub mod element;
pub mod family;
pub mod generator;
pub mod ordering;
pub mod space;

pub use clique::Clique;
pub use element::{Element, Neighbour, PackedElement, SetNeighbour};
pub use family::Family;
pub use generator::generate;
pub use ordering::{Identity, Ordering, Permutation, ReverseCuthillMcKee};
pub use space::Space;
