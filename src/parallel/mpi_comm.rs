//! MPI-based communication module.
//!
//! This module provides an implementation of the `Comm` trait on top of an MPI
//! communicator (rsmpi). Ghost exchange posts every receive as an immediate request
//! before issuing the blocking sends, then waits on all receives, so ranks that are
//! simultaneously senders and receivers cannot deadlock pairwise.
//!
//! # References
//! - [MPI Standard](https://www.mpi-forum.org/)
//!
//! # Example
//! ```no_run
//! # #[cfg(feature = "mpi")] {
//! use elai::parallel::{Comm, MpiComm};
//! let comm = MpiComm::new().unwrap();
//! println!("Rank: {} / {}", comm.rank(), comm.size());
//! comm.barrier();
//! # }
//! ```

use std::ops::Add;

use mpi::collective::SystemOperation;
use mpi::environment::Universe;
use mpi::topology::SimpleCommunicator;
use mpi::traits::*;

use super::{Comm, Datum, Tag};
use crate::error::{ElaiError, Result};

/// MPI communicator wrapper for distributed parallelism.
///
/// Holds the MPI environment (finalized on drop), the world communicator, the rank of
/// the current process and the total number of processes.
pub struct MpiComm {
    /// Keeps MPI initialized for the lifetime of the communicator.
    _universe: Option<Universe>,
    /// The communicator all operations run on.
    pub world: SimpleCommunicator,
    /// The rank (ID) of this process within the communicator.
    pub rank: usize,
    /// The total number of processes in the communicator.
    pub size: usize,
}

impl MpiComm {
    /// Initializes MPI and wraps the world communicator.
    pub fn new() -> Result<Self> {
        let universe =
            mpi::initialize().ok_or_else(|| ElaiError::Comm("MPI is already initialized".into()))?;
        let world = universe.world();
        let rank = world.rank() as usize;
        let size = world.size() as usize;
        Ok(MpiComm { _universe: Some(universe), world, rank, size })
    }

    /// Wrap an existing communicator (e.g. a region split of the world).
    pub fn from_communicator(world: SimpleCommunicator) -> Self {
        let rank = world.rank() as usize;
        let size = world.size() as usize;
        MpiComm { _universe: None, world, rank, size }
    }
}

impl Comm for MpiComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn barrier(&self) {
        self.world.barrier();
    }

    fn send<T: Datum>(&self, dest: usize, tag: Tag, data: &[T]) {
        self.world.process_at_rank(dest as i32).send_with_tag(data, tag);
    }

    fn recv<T: Datum>(&self, src: usize, tag: Tag) -> Vec<T> {
        let (v, _status) = self.world.process_at_rank(src as i32).receive_vec_with_tag::<T>(tag);
        v
    }

    fn all_reduce_sum<T: Datum + Add<Output = T>>(&self, buf: &mut [T]) {
        let local = buf.to_vec();
        self.world.all_reduce_into(&local[..], buf, SystemOperation::sum());
    }

    fn all_reduce_max<T: Datum + PartialOrd>(&self, buf: &mut [T]) {
        let local = buf.to_vec();
        self.world.all_reduce_into(&local[..], buf, SystemOperation::max());
    }

    fn all_gather<T: Datum>(&self, local: &[T]) -> Vec<T> {
        let mut out = vec![T::default(); local.len() * self.size];
        self.world.all_gather_into(local, &mut out[..]);
        out
    }

    fn broadcast<T: Datum>(&self, buf: &mut [T], root: usize) {
        self.world.process_at_rank(root as i32).broadcast_into(buf);
    }

    fn exchange<T: Datum>(&self, reads: &[(usize, usize)], writes: &[(usize, Vec<T>)]) -> Vec<Vec<T>> {
        let mut bufs: Vec<Vec<T>> = reads.iter().map(|&(_, n)| vec![T::default(); n]).collect();
        mpi::request::scope(|scope| {
            let requests: Vec<_> = reads
                .iter()
                .zip(bufs.iter_mut())
                .map(|(&(peer, _), buf)| {
                    self.world
                        .process_at_rank(peer as i32)
                        .immediate_receive_into_with_tag(scope, &mut buf[..], self.rank as Tag)
                })
                .collect();
            for (peer, data) in writes {
                self.world.process_at_rank(*peer as i32).send_with_tag(&data[..], *peer as Tag);
            }
            for req in requests {
                req.wait();
            }
        });
        bufs
    }
}
