//! Communication substrate.
//!
//! [`Comm`] is the message-passing surface the distributed objects are written
//! against: rank/size, point-to-point transfers with tags, and the few collectives the
//! solvers need. Three backends implement it:
//!
//! - [`SerialComm`]: a single rank; collectives are identities.
//! - [`ThreadComm`]: N ranks inside one process, one thread each, over channels.
//! - [`MpiComm`]: an MPI communicator (feature `mpi`).
//!
//! On top of a `Comm` sit the per-object helpers: [`Coherence`] (ghost exchange and
//! dot-product fix-up), [`SumSync`] (whole-buffer sum) and [`Portal`] (rank-pair
//! marshalling of spaces, families, functions and operators).

use std::any::Any;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::ops::Add;

use num_complex::Complex;

/// Message tag.
pub type Tag = i32;

/// Plain data that can cross a rank boundary.
#[cfg(feature = "mpi")]
pub trait Datum: Copy + Default + Send + 'static + mpi::datatype::Equivalence {}
#[cfg(not(feature = "mpi"))]
pub trait Datum: Copy + Default + Send + 'static {}

macro_rules! datum {
    ($($t:ty),*) => { $(impl Datum for $t {})* };
}

datum!(f32, f64, Complex<f32>, Complex<f64>, u64, i64, u32, i32);

pub trait Comm {
    fn rank(&self) -> usize;
    fn size(&self) -> usize;
    fn barrier(&self);

    /// Blocking send of `data` to `dest`.
    fn send<T: Datum>(&self, dest: usize, tag: Tag, data: &[T]);
    /// Blocking receive of one message from `src` with `tag`.
    fn recv<T: Datum>(&self, src: usize, tag: Tag) -> Vec<T>;

    /// Element-wise sum over all ranks, in place.
    fn all_reduce_sum<T: Datum + Add<Output = T>>(&self, buf: &mut [T]);
    /// Element-wise maximum over all ranks, in place.
    fn all_reduce_max<T: Datum + PartialOrd>(&self, buf: &mut [T]);
    /// Concatenation of every rank's `local` (equal lengths) in rank order.
    fn all_gather<T: Datum>(&self, local: &[T]) -> Vec<T>;
    /// Overwrite `buf` on every rank with the root's copy.
    fn broadcast<T: Datum>(&self, buf: &mut [T], root: usize);

    /// One ghost-exchange round. `reads` lists (peer, count) to receive, `writes`
    /// lists (peer, payload) to send. Receives use this rank as tag and sends use
    /// the destination rank, so a pair exchanging both ways cannot confuse messages.
    fn exchange<T: Datum>(&self, reads: &[(usize, usize)], writes: &[(usize, Vec<T>)]) -> Vec<Vec<T>> {
        for (peer, data) in writes {
            self.send(*peer, *peer as Tag, data);
        }
        reads
            .iter()
            .map(|&(peer, n)| {
                let v = self.recv::<T>(peer, self.rank() as Tag);
                assert_eq!(v.len(), n, "ghost message from rank {} has wrong length", peer);
                v
            })
            .collect()
    }
}

/// A boxed message waiting to be matched.
pub(crate) struct Packet {
    pub(crate) src: usize,
    pub(crate) tag: Tag,
    pub(crate) payload: Box<dyn Any + Send>,
}

impl Packet {
    pub(crate) fn new<T: Datum>(src: usize, tag: Tag, data: &[T]) -> Self {
        Self { src, tag, payload: Box::new(data.to_vec()) }
    }

    pub(crate) fn open<T: Datum>(self) -> Vec<T> {
        match self.payload.downcast::<Vec<T>>() {
            Ok(v) => *v,
            Err(_) => panic!(
                "message from rank {} with tag {} carries a different element type",
                self.src, self.tag
            ),
        }
    }
}

/// Single-rank communicator. Messages to self are looped back.
#[derive(Default)]
pub struct SerialComm {
    loopback: RefCell<VecDeque<Packet>>,
}

impl SerialComm {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Comm for SerialComm {
    fn rank(&self) -> usize { 0 }
    fn size(&self) -> usize { 1 }
    fn barrier(&self) {}

    fn send<T: Datum>(&self, dest: usize, tag: Tag, data: &[T]) {
        assert_eq!(dest, 0, "serial communicator has only rank 0");
        self.loopback.borrow_mut().push_back(Packet::new(0, tag, data));
    }

    fn recv<T: Datum>(&self, src: usize, tag: Tag) -> Vec<T> {
        assert_eq!(src, 0, "serial communicator has only rank 0");
        let mut q = self.loopback.borrow_mut();
        match q.iter().position(|p| p.tag == tag) {
            Some(at) => q.remove(at).map(Packet::open).unwrap_or_default(),
            None => panic!("receive with tag {} would block forever on a single rank", tag),
        }
    }

    fn all_reduce_sum<T: Datum + Add<Output = T>>(&self, _buf: &mut [T]) {}
    fn all_reduce_max<T: Datum + PartialOrd>(&self, _buf: &mut [T]) {}
    fn all_gather<T: Datum>(&self, local: &[T]) -> Vec<T> { local.to_vec() }
    fn broadcast<T: Datum>(&self, _buf: &mut [T], _root: usize) {}
}

pub mod coherence;
pub mod portal;
pub mod sync;
pub mod thread_comm;

#[cfg(feature = "mpi")]
pub mod mpi_comm;
#[cfg(feature = "mpi")]
pub use mpi_comm::MpiComm;

pub use coherence::{Coherence, CoherenceSetup, Coherent};
pub use portal::{Marshal, Portal, Reinforce};
pub use sync::{SumSync, SyncSetup};
pub use thread_comm::ThreadComm;
