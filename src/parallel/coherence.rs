//! Ghost coherence.
//!
//! A distributed object stores, next to the slots it owns, copies ("ghosts") of slots
//! owned by other ranks. A [`Coherence`] records, per peer, which local indices are
//! read from that peer and which are written to it, plus the list of ghost indices.
//! It is built once from the object's [`CoherenceSetup`] and then
//!
//! - refreshes every ghost from its owner ([`Coherent::sync`]), and
//! - turns a local inner product over owned + ghost slots into the global one by
//!   removing the ghost terms and summing over ranks ([`Coherent::fix`]).
//!
//! Solvers only see the object-safe [`Coherent`] trait, so they do not depend on the
//! communicator type.

use crate::core::traits::Scalar;

use super::{Comm, Datum};

/// What a solver needs from the distributed layer.
pub trait Coherent<T: Scalar> {
    /// Overwrite every ghost slot of `buf` with the owner's value.
    fn sync(&self, buf: &mut [T]);
    /// Global Σ lhs·conj(rhs) from a local sum `acc` that counted ghosts too.
    fn fix(&self, acc: T, lhs: &[T], rhs: &[T]) -> T;
    /// Logical AND of `ok` across ranks.
    fn all_true(&self, ok: bool) -> bool;
    /// Maximum of `v` across ranks.
    fn max_real(&self, v: T::Real) -> T::Real;
}

/// Registration contract of a distributed object.
pub trait CoherenceSetup {
    fn coherence_setup<C: Comm>(&self, coherence: &mut Coherence<'_, C>);
}

/// Per-object read/write slot lists over one communicator.
pub struct Coherence<'c, C: Comm> {
    comm: &'c C,
    myself: usize,
    reads: Vec<(usize, Vec<usize>)>,
    writes: Vec<(usize, Vec<usize>)>,
    excluded: Vec<usize>,
}

impl<'c, C: Comm> Coherence<'c, C> {
    /// Empty descriptor; fill with [`read`](Self::read), [`write`](Self::write), [`exclude`](Self::exclude).
    pub fn empty(comm: &'c C) -> Self {
        Self { comm, myself: comm.rank(), reads: Vec::new(), writes: Vec::new(), excluded: Vec::new() }
    }

    /// Descriptor registered by `obj`.
    pub fn new<O: CoherenceSetup + ?Sized>(obj: &O, comm: &'c C) -> Self {
        let mut c = Self::empty(comm);
        obj.coherence_setup(&mut c);
        log::debug!(
            "rank {}: coherence with {} read slots, {} write slots, {} ghosts",
            c.myself,
            c.reads.len(),
            c.writes.len(),
            c.excluded.len()
        );
        c
    }

    pub fn myself(&self) -> usize {
        self.myself
    }

    pub fn comm(&self) -> &'c C {
        self.comm
    }

    /// Receive `indices` from `pair` on every round.
    pub fn read(&mut self, pair: usize, indices: Vec<usize>) {
        self.reads.push((pair, indices));
    }

    /// Send `indices` to `pair` on every round.
    pub fn write(&mut self, pair: usize, indices: Vec<usize>) {
        self.writes.push((pair, indices));
    }

    /// Mark a ghost slot, left out of fixed inner products.
    pub fn exclude(&mut self, i: usize) {
        self.excluded.push(i);
    }

    pub fn reads(&self) -> &[(usize, Vec<usize>)] {
        &self.reads
    }

    pub fn writes(&self) -> &[(usize, Vec<usize>)] {
        &self.writes
    }

    pub fn excluded(&self) -> &[usize] {
        &self.excluded
    }

    /// One exchange round on `buf`.
    pub fn call<T: Datum>(&self, buf: &mut [T]) {
        let counts: Vec<(usize, usize)> = self.reads.iter().map(|(p, idx)| (*p, idx.len())).collect();
        let payloads: Vec<(usize, Vec<T>)> = self
            .writes
            .iter()
            .map(|(p, idx)| (*p, idx.iter().map(|&i| buf[i]).collect()))
            .collect();
        let got = self.comm.exchange(&counts, &payloads);
        for ((_, idx), values) in self.reads.iter().zip(got) {
            for (&i, v) in idx.iter().zip(values) {
                buf[i] = v;
            }
        }
    }
}

impl<T: Scalar, C: Comm> Coherent<T> for Coherence<'_, C> {
    fn sync(&self, buf: &mut [T]) {
        self.call(buf);
    }

    fn fix(&self, acc: T, lhs: &[T], rhs: &[T]) -> T {
        let mut v = [self.excluded.iter().fold(acc, |a, &i| a - lhs[i] * rhs[i].conj())];
        self.comm.all_reduce_sum(&mut v);
        v[0]
    }

    fn all_true(&self, ok: bool) -> bool {
        let mut bad = [if ok { 0i32 } else { 1 }];
        self.comm.all_reduce_sum(&mut bad);
        bad[0] == 0
    }

    fn max_real(&self, v: T::Real) -> T::Real {
        let mut b = [v];
        self.comm.all_reduce_max(&mut b);
        b[0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parallel::ThreadComm;

    #[test]
    fn ghosts_take_owner_values() {
        // rank r owns slot 0 and keeps a ghost of its left neighbour in slot 1
        let out = ThreadComm::run(3, |c| {
            let r = c.rank();
            let mut coh = Coherence::empty(&c);
            coh.read((r + 2) % 3, vec![1]);
            coh.write((r + 1) % 3, vec![0]);
            coh.exclude(1);
            let mut buf = [10.0 * r as f64, -1.0];
            Coherent::<f64>::sync(&coh, &mut buf);
            let dot = buf[0] * buf[0] + buf[1] * buf[1];
            let global = coh.fix(dot, &buf, &buf);
            (buf, global)
        });
        for (r, (buf, global)) in out.into_iter().enumerate() {
            assert_eq!(buf[1], 10.0 * ((r + 2) % 3) as f64);
            assert_eq!(global, 0.0 + 100.0 + 400.0);
        }
    }

    #[test]
    fn convergence_vote_needs_every_rank() {
        let out = ThreadComm::run(2, |c| {
            let coh = Coherence::empty(&c);
            let split = Coherent::<f64>::all_true(&coh, c.rank() == 0);
            let both = Coherent::<f64>::all_true(&coh, true);
            (split, both)
        });
        assert!(out.iter().all(|&(split, both)| !split && both));
    }
}
