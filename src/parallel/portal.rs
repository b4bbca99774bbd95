//! Rank-pair marshalling channel.
//!
//! A [`Portal`] connects this rank with one `pair` rank. Everything sent through it
//! is tagged with the sender's rank and received with the pair's rank as tag, so two
//! portals of a rank never interleave. Whole objects travel as a fixed sequence of
//! messages: counts first (as `u64`), then ids and indices, then ghost pairs, then
//! values. The layout of each object lives with its [`Marshal`] impl.

use crate::core::traits::Scalar;
use crate::domain::{LinearFunction, LinearOperator};
use crate::error::{ElaiError, Result};
use crate::topology::{Element, Family, Neighbour, Space};

use super::{Comm, Datum, Tag};

/// Objects that can cross a [`Portal`] whole.
pub trait Marshal: Sized {
    fn marshal<C: Comm>(&self, portal: &Portal<'_, C>);
    fn unmarshal<C: Comm>(portal: &Portal<'_, C>) -> Result<Self>;
}

/// Objects whose values can be refreshed without resending their structure.
pub trait Reinforce {
    fn reinforce<C: Comm>(&self, portal: &Portal<'_, C>);
    fn refresh<C: Comm>(&mut self, portal: &Portal<'_, C>) -> Result<()>;
}

pub struct Portal<'c, C: Comm> {
    comm: &'c C,
    pair: usize,
    myself: usize,
}

impl<'c, C: Comm> Portal<'c, C> {
    pub fn new(pair: usize, comm: &'c C) -> Self {
        assert!(pair < comm.size(), "portal pair {} outside communicator of size {}", pair, comm.size());
        Self { comm, pair, myself: comm.rank() }
    }

    pub fn pair(&self) -> usize {
        self.pair
    }

    pub fn myself(&self) -> usize {
        self.myself
    }

    pub fn send<T: Datum>(&self, data: &[T]) {
        self.comm.send(self.pair, self.myself as Tag, data);
    }

    pub fn recv<T: Datum>(&self) -> Vec<T> {
        self.comm.recv(self.pair, self.pair as Tag)
    }

    /// Receive a message that must hold exactly `n` items.
    pub fn recv_exact<T: Datum>(&self, n: usize, what: &str) -> Result<Vec<T>> {
        let v = self.recv::<T>();
        if v.len() != n {
            return Err(ElaiError::Marshal(format!(
                "{} from rank {}: expected {} items, got {}",
                what,
                self.pair,
                n,
                v.len()
            )));
        }
        Ok(v)
    }

    pub fn send_counts(&self, counts: &[usize]) {
        let c: Vec<u64> = counts.iter().map(|&n| n as u64).collect();
        self.send(&c);
    }

    pub fn recv_counts(&self, n: usize, what: &str) -> Result<Vec<usize>> {
        Ok(self.recv_exact::<u64>(n, what)?.into_iter().map(|c| c as usize).collect())
    }

    /// Send a whole object.
    pub fn ship<O: Marshal>(&self, obj: &O) {
        obj.marshal(self);
    }

    /// Receive a whole object.
    pub fn land<O: Marshal>(&self) -> Result<O> {
        O::unmarshal(self)
    }

    /// Send only the values of an object the pair already holds.
    pub fn reinforce<O: Reinforce>(&self, obj: &O) {
        obj.reinforce(self);
    }

    /// Overwrite the values of `obj` with the pair's copy.
    pub fn refresh<O: Reinforce>(&self, obj: &mut O) -> Result<()> {
        obj.refresh(self)
    }

    pub fn send_space<E: Element>(&self, s: &Space<E>) {
        self.ship(s);
    }

    pub fn recv_space<E: Element>(&self) -> Result<Space<E>> {
        self.land()
    }

    pub fn send_family<E: Element, N: Neighbour<E>>(&self, tau: &Family<E, N>) {
        self.ship(tau);
    }

    pub fn recv_family<E: Element, N: Neighbour<E>>(&self) -> Result<Family<E, N>> {
        self.land()
    }

    pub fn send_function<E: Element, T: Scalar>(&self, f: &LinearFunction<E, T>) {
        self.ship(f);
    }

    pub fn recv_function<E: Element, T: Scalar>(&self) -> Result<LinearFunction<E, T>> {
        self.land()
    }

    pub fn send_operator<E: Element, N: Neighbour<E>, T: Scalar>(&self, a: &LinearOperator<E, N, T>) {
        self.ship(a);
    }

    pub fn recv_operator<E: Element, N: Neighbour<E>, T: Scalar>(&self) -> Result<LinearOperator<E, N, T>> {
        self.land()
    }

    pub fn reinforce_function<E: Element, T: Scalar>(&self, f: &LinearFunction<E, T>) {
        self.reinforce(f);
    }

    pub fn reinforce_operator<E: Element, N: Neighbour<E>, T: Scalar>(&self, a: &LinearOperator<E, N, T>) {
        self.reinforce(a);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parallel::ThreadComm;
    use crate::topology::{PackedElement, SetNeighbour};

    type Elem = PackedElement;

    #[test]
    fn space_and_family_cross_intact() {
        let out = ThreadComm::run(2, |c| {
            let portal = Portal::new(1 - c.rank(), &c);
            if c.rank() == 0 {
                let mut s = Space::new();
                s.join(Elem::new(0, 0));
                s.join(Elem::new(1, 0));
                s.join_ghost(Elem::new(2, 0), Elem::new(2, 1));
                let mut tau = Family::<Elem, SetNeighbour<Elem>>::from_space(&s);
                let mut u = SetNeighbour::from_element(Elem::new(0, 0));
                u.join(Elem::new(1, 0));
                tau.join(u);
                portal.send_space(&s);
                portal.send_family(&tau);
                None
            } else {
                let s = portal.recv_space::<Elem>().ok()?;
                let tau = portal.recv_family::<Elem, SetNeighbour<Elem>>().ok()?;
                Some((s, tau))
            }
        });
        let (s, tau) = out[1].clone().expect("rank 1 received");
        assert_eq!(s.size(), 3);
        assert_eq!(s.marginal_size(), 1);
        assert_eq!(s.external_element(&Elem::new(2, 0)), &Elem::new(2, 1));
        assert!(tau.neighbourhood(&Elem::new(0, 0), 0).contains(&Elem::new(1, 0)));
    }

    #[test]
    fn short_message_is_reported() {
        let out = ThreadComm::run(2, |c| {
            let portal = Portal::new(1 - c.rank(), &c);
            if c.rank() == 0 {
                portal.send(&[1u64, 2]);
                true
            } else {
                portal.recv_exact::<u64>(3, "counts").is_err()
            }
        });
        assert!(out[1]);
    }
}
