//! Vectors indexed by element.

use crate::core::traits::Scalar;
use crate::core::vector::Vector;
use crate::error::Result;
use crate::parallel::{Coherence, CoherenceSetup, Comm, Marshal, Portal, Reinforce, SumSync, SyncSetup};
use crate::topology::{Element, Family, Neighbour, Space};

use super::subjugator::Subjugator;

/// A [`Vector`] over the elements of a [`Space`]: `f.get(x)` reads slot `dom().index(x)`.
#[derive(Clone, Debug)]
pub struct LinearFunction<E: Element, T: Scalar> {
    x: Space<E>,
    f: Vector<T>,
}

impl<E: Element, T: Scalar> LinearFunction<E, T> {
    /// Zero function over `x`.
    pub fn new(x: Space<E>) -> Self {
        let f = Vector::new(x.size());
        Self { x, f }
    }

    pub fn with_values(x: Space<E>, v: &[T]) -> Self {
        assert_eq!(v.len(), x.size(), "one value per element");
        Self { f: Vector::from_slice(v), x }
    }

    pub fn from_vector(x: Space<E>, f: Vector<T>) -> Self {
        assert_eq!(f.m(), x.size(), "one value per element");
        Self { x, f }
    }

    pub fn dim(&self) -> usize {
        self.x.size()
    }

    pub fn codim(&self) -> usize {
        1
    }

    pub fn dom(&self) -> &Space<E> {
        &self.x
    }

    pub fn ran(&self) -> &Vector<T> {
        &self.f
    }

    pub fn vector(&self) -> &Vector<T> {
        &self.f
    }

    pub fn vector_mut(&mut self) -> &mut Vector<T> {
        &mut self.f
    }

    pub fn get(&self, x: &E) -> T {
        self.f[self.x.index(x)]
    }

    pub fn entry_mut(&mut self, x: &E) -> &mut T {
        let i = self.x.index(x);
        &mut self.f[i]
    }

    pub fn clear(&mut self, v: T) -> &mut Self {
        self.f.fill(v);
        self
    }

    /// Set every element of `s` to `v`.
    pub fn clear_on(&mut self, v: T, s: &Space<E>) -> &mut Self {
        for e in s.elements() {
            let i = self.x.index(e);
            self.f[i] = v;
        }
        self
    }

    /// Restriction to the elements of `s`, in this function's element order.
    pub fn localize(&self, s: &Space<E>) -> Self {
        let mut sub = Space::new();
        for e in self.x.elements().filter(|e| s.contains(e)) {
            sub.join(e.clone());
        }
        self.restrict(sub)
    }

    /// Restriction to the elements appearing in `tau`.
    pub fn localize_by<N: Neighbour<E>>(&self, tau: &Family<E, N>) -> Self {
        self.restrict(tau.contained(&self.x))
    }

    fn restrict(&self, sub: Space<E>) -> Self {
        let mut f = Vector::new(sub.size());
        for (e, i) in sub.iter() {
            f[i] = self.get(e);
        }
        Self { x: sub, f }
    }

    /// Copy values of `f` into the slots of this function that govern them or ghost them.
    pub fn reflect_in(&mut self, f: &Self) -> &mut Self {
        for (x, i) in f.x.iter() {
            if let Some(j) = self.x.resolve(x) {
                self.f[j] = f.f[i];
            }
        }
        self
    }

    /// [`reflect_in`](Self::reflect_in) with `f`'s elements renamed to their assigned color.
    pub fn reflect_in_colored<N: Neighbour<E>>(&mut self, f: &Self, subj: &Subjugator<'_, E, N>) -> &mut Self {
        for (x, i) in f.x.iter() {
            let Some(c) = subj.try_color(x) else { continue };
            if let Some(j) = self.x.resolve(&x.recolor(c)) {
                self.f[j] = f.f[i];
            }
        }
        self
    }

    /// Pull values for every element that `f` governs.
    pub fn reflect(&mut self, f: &Self) -> &mut Self {
        for (x, j) in self.x.iter() {
            if f.x.governs(x) {
                self.f[j] = f.get(x);
            }
        }
        self
    }

    /// [`reflect`](Self::reflect) with this function's elements renamed to their assigned color.
    pub fn reflect_colored<N: Neighbour<E>>(&mut self, f: &Self, subj: &Subjugator<'_, E, N>) -> &mut Self {
        for (x, j) in self.x.iter() {
            let Some(c) = subj.try_color(x) else { continue };
            let y = x.recolor(c);
            if f.x.governs(&y) {
                self.f[j] = f.get(&y);
            }
        }
        self
    }

    /// Function over the union of both domains; `f` wins where both define a value.
    pub fn extend(&self, f: &Self) -> Self {
        let s = &self.x | &f.x;
        let mut v = Vector::new(s.size());
        for (e, i) in s.iter() {
            v[i] = if f.x.contains(e) { f.get(e) } else { self.get(e) };
        }
        Self { x: s, f: v }
    }

    /// Ghost exchange descriptor for this function's slots.
    pub fn coherence<'c, C: Comm>(&self, comm: &'c C) -> Coherence<'c, C> {
        Coherence::new(self, comm)
    }

    /// Whole-vector sum across ranks.
    pub fn sum_sync<'c, C: Comm>(&self, comm: &'c C) -> SumSync<'c, C> {
        SumSync::new(self, comm)
    }
}

impl<E: Element, T: Scalar> CoherenceSetup for LinearFunction<E, T> {
    fn coherence_setup<C: Comm>(&self, coherence: &mut Coherence<'_, C>) {
        self.x.coherence_setup(coherence);
    }
}

impl<E: Element, T: Scalar> SyncSetup for LinearFunction<E, T> {
    fn sync_setup(&self) -> usize {
        self.f.m()
    }
}

impl<E: Element, T: Scalar> Marshal for LinearFunction<E, T> {
    fn marshal<C: Comm>(&self, portal: &Portal<'_, C>) {
        portal.ship(&self.x);
        portal.send(self.f.val());
    }

    fn unmarshal<C: Comm>(portal: &Portal<'_, C>) -> Result<Self> {
        let x: Space<E> = portal.land()?;
        let v = portal.recv_exact::<T>(x.size(), "function values")?;
        Ok(Self { f: Vector::from(v), x })
    }
}

impl<E: Element, T: Scalar> Reinforce for LinearFunction<E, T> {
    fn reinforce<C: Comm>(&self, portal: &Portal<'_, C>) {
        portal.send(self.f.val());
    }

    fn refresh<C: Comm>(&mut self, portal: &Portal<'_, C>) -> Result<()> {
        let v = portal.recv_exact::<T>(self.f.m(), "function values")?;
        self.f.val_mut().copy_from_slice(&v);
        Ok(())
    }
}
