//! In-process multi-rank communicator.
//!
//! `ThreadComm::universe(n)` returns `n` connected endpoints, one per rank, meant to be
//! moved into one thread each (see [`ThreadComm::run`]). Point-to-point messages travel
//! over unbounded channels, so sends never block; receives match on (source, tag) and
//! park non-matching arrivals until asked for. Messages between one pair with the same
//! tag are delivered in send order.
//!
//! Collectives are built from point-to-point rounds on reserved negative tags and
//! combine contributions in rank order, so every rank computes bit-identical results.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::ops::Add;
use std::sync::mpsc::{Receiver, Sender, channel};
use std::sync::{Arc, Barrier};

use super::{Comm, Datum, Packet, Tag};

const TAG_REDUCE: Tag = -1;
const TAG_GATHER: Tag = -2;
const TAG_BCAST: Tag = -3;

pub struct ThreadComm {
    rank: usize,
    size: usize,
    outbox: Vec<Sender<Packet>>,
    inbox: Receiver<Packet>,
    pending: RefCell<VecDeque<Packet>>,
    barrier: Arc<Barrier>,
}

impl ThreadComm {
    /// `n` connected ranks.
    pub fn universe(n: usize) -> Vec<ThreadComm> {
        assert!(n > 0);
        let (senders, receivers): (Vec<_>, Vec<_>) = (0..n).map(|_| channel::<Packet>()).unzip();
        let barrier = Arc::new(Barrier::new(n));
        receivers
            .into_iter()
            .enumerate()
            .map(|(rank, inbox)| ThreadComm {
                rank,
                size: n,
                outbox: senders.clone(),
                inbox,
                pending: RefCell::new(VecDeque::new()),
                barrier: Arc::clone(&barrier),
            })
            .collect()
    }

    /// Run `f` on `n` ranks, one scoped thread each; results come back in rank order.
    pub fn run<F, R>(n: usize, f: F) -> Vec<R>
    where
        F: Fn(ThreadComm) -> R + Sync,
        R: Send,
    {
        let comms = Self::universe(n);
        let f = &f;
        std::thread::scope(|s| {
            let handles: Vec<_> = comms.into_iter().map(|c| s.spawn(move || f(c))).collect();
            handles
                .into_iter()
                .map(|h| match h.join() {
                    Ok(r) => r,
                    Err(e) => std::panic::resume_unwind(e),
                })
                .collect()
        })
    }

    fn take(&self, src: usize, tag: Tag) -> Packet {
        {
            let mut q = self.pending.borrow_mut();
            if let Some(at) = q.iter().position(|p| p.src == src && p.tag == tag) {
                if let Some(p) = q.remove(at) {
                    return p;
                }
            }
        }
        loop {
            let p = match self.inbox.recv() {
                Ok(p) => p,
                Err(_) => panic!("rank {}: every peer endpoint was dropped", self.rank),
            };
            if p.src == src && p.tag == tag {
                return p;
            }
            self.pending.borrow_mut().push_back(p);
        }
    }

    /// Every rank's `local`, indexed by rank.
    fn collect_all<T: Datum>(&self, local: &[T], tag: Tag) -> Vec<Vec<T>> {
        for peer in (0..self.size).filter(|&p| p != self.rank) {
            self.send(peer, tag, local);
        }
        (0..self.size)
            .map(|r| if r == self.rank { local.to_vec() } else { self.take(r, tag).open() })
            .collect()
    }
}

impl Comm for ThreadComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn barrier(&self) {
        self.barrier.wait();
    }

    fn send<T: Datum>(&self, dest: usize, tag: Tag, data: &[T]) {
        if self.outbox[dest].send(Packet::new(self.rank, tag, data)).is_err() {
            panic!("rank {}: rank {} has already shut down", self.rank, dest);
        }
    }

    fn recv<T: Datum>(&self, src: usize, tag: Tag) -> Vec<T> {
        self.take(src, tag).open()
    }

    fn all_reduce_sum<T: Datum + Add<Output = T>>(&self, buf: &mut [T]) {
        let parts = self.collect_all(buf, TAG_REDUCE);
        for (i, b) in buf.iter_mut().enumerate() {
            let mut acc = parts[0][i];
            for part in &parts[1..] {
                acc = acc + part[i];
            }
            *b = acc;
        }
    }

    fn all_reduce_max<T: Datum + PartialOrd>(&self, buf: &mut [T]) {
        let parts = self.collect_all(buf, TAG_REDUCE);
        for (i, b) in buf.iter_mut().enumerate() {
            *b = parts.iter().map(|p| p[i]).fold(parts[0][i], |a, v| if v > a { v } else { a });
        }
    }

    fn all_gather<T: Datum>(&self, local: &[T]) -> Vec<T> {
        self.collect_all(local, TAG_GATHER).concat()
    }

    fn broadcast<T: Datum>(&self, buf: &mut [T], root: usize) {
        if self.rank == root {
            for peer in (0..self.size).filter(|&p| p != root) {
                self.send(peer, TAG_BCAST, buf);
            }
        } else {
            let v: Vec<T> = self.recv(root, TAG_BCAST);
            buf.copy_from_slice(&v);
        }
    }
}
