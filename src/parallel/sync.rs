//! Whole-buffer reduction for replicated objects.

use std::ops::Add;

use super::{Comm, Datum};

/// Registration contract: how long the summed buffer of an object is.
pub trait SyncSetup {
    fn sync_setup(&self) -> usize;
}

/// Sums a fixed-length buffer element-wise over all ranks.
///
/// Used for objects every rank holds in full but fills only partially, such as a
/// vector assembled from per-rank contributions.
pub struct SumSync<'c, C: Comm> {
    comm: &'c C,
    len: usize,
}

impl<'c, C: Comm> SumSync<'c, C> {
    pub fn new<O: SyncSetup + ?Sized>(obj: &O, comm: &'c C) -> Self {
        Self { comm, len: obj.sync_setup() }
    }

    pub fn with_len(comm: &'c C, len: usize) -> Self {
        Self { comm, len }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Replace the first `len` slots of `buf` with their global sum.
    pub fn call<T: Datum + Add<Output = T>>(&self, buf: &mut [T]) {
        self.comm.all_reduce_sum(&mut buf[..self.len]);
    }
}
