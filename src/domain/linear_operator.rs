//! Sparse operators between element-indexed functions.
//!
//! A [`LinearOperator`] maps functions over its domain space `x` to functions over its
//! range space `f`. Row `f.index(e)` of the underlying [`Matrix`] holds a column
//! `x.index(d)` for every member `d` of `topo().neighbourhood(e, 0)`.

use std::collections::BTreeMap;

use crate::core::traits::Scalar;
use crate::core::vector::Vector;
use crate::error::Result;
use crate::matrix::Matrix;
use crate::parallel::{Coherence, CoherenceSetup, Comm, Marshal, Portal, Reinforce};
use crate::topology::{Element, Family, Neighbour, Space};

use super::linear_function::LinearFunction;
use super::subjugator::Subjugator;

#[derive(Clone, Debug)]
pub struct LinearOperator<E: Element, N: Neighbour<E>, T: Scalar> {
    f: Space<E>,
    x: Space<E>,
    tau: Family<E, N>,
    a: Matrix<T>,
}

/// CSR matrix from per-row (column, value) lists; columns are sorted and merged.
pub(crate) fn assemble<T: Scalar>(n: usize, rows: Vec<BTreeMap<usize, T>>) -> Matrix<T> {
    let mut ind = Vec::with_capacity(rows.len() + 1);
    let mut col = Vec::new();
    let mut val = Vec::new();
    ind.push(0);
    for row in &rows {
        for (&j, &v) in row {
            col.push(j);
            val.push(v);
        }
        ind.push(col.len());
    }
    Matrix::new(rows.len(), n, &ind, &col, Some(&val))
}

impl<E: Element, N: Neighbour<E>, T: Scalar> LinearOperator<E, N, T> {
    /// Zero operator from `x` to `f` with the sparsity of `tau`.
    pub fn new(f: Space<E>, x: Space<E>, tau: Family<E, N>) -> Self {
        let rows = f
            .iter()
            .map(|(e, _)| {
                tau.neighbourhood(e, 0)
                    .elements()
                    .filter_map(|d| x.get_index(d))
                    .map(|j| (j, T::zero()))
                    .collect::<BTreeMap<_, _>>()
            })
            .collect::<Vec<_>>();
        let rows = Self::in_index_order(&f, rows);
        let a = assemble(x.size(), rows);
        Self { f, x, tau, a }
    }

    /// Square operator on `s`.
    pub fn square(s: Space<E>, tau: Family<E, N>) -> Self {
        Self::new(s.clone(), s, tau)
    }

    pub fn from_parts(f: Space<E>, x: Space<E>, tau: Family<E, N>, a: Matrix<T>) -> Self {
        assert_eq!(a.m(), f.size(), "matrix rows must match the range");
        assert_eq!(a.n(), x.size(), "matrix columns must match the domain");
        Self { f, x, tau, a }
    }

    /// Rows collected in element order, rearranged by local index.
    fn in_index_order<R: Default>(f: &Space<E>, rows: Vec<R>) -> Vec<R> {
        let mut out: Vec<R> = (0..f.size()).map(|_| R::default()).collect();
        for ((_, i), r) in f.iter().zip(rows) {
            out[i] = r;
        }
        out
    }

    pub fn dim(&self) -> usize {
        self.f.size()
    }

    pub fn codim(&self) -> usize {
        self.x.size()
    }

    pub fn dom(&self) -> &Space<E> {
        &self.x
    }

    pub fn ran(&self) -> &Space<E> {
        &self.f
    }

    pub fn topo(&self) -> &Family<E, N> {
        &self.tau
    }

    pub fn action(&self) -> &Matrix<T> {
        &self.a
    }

    pub fn action_mut(&mut self) -> &mut Matrix<T> {
        &mut self.a
    }

    /// Coefficient of row `f`, column `x`; zero when not stored.
    pub fn get(&self, f: &E, x: &E) -> T {
        self.a.get(self.f.index(f), self.x.index(x))
    }

    pub fn diag(&self, f: &E) -> T {
        self.get(f, f)
    }

    pub fn entry_mut(&mut self, f: &E, x: &E) -> Option<&mut T> {
        let (i, j) = (self.f.index(f), self.x.index(x));
        self.a.entry_mut(i, j)
    }

    /// Store `v` at (f, x); false when the pattern has no such entry.
    pub fn set(&mut self, f: &E, x: &E, v: T) -> bool {
        let (i, j) = (self.f.index(f), self.x.index(x));
        self.a.set(i, j, v)
    }

    /// Column indices and values of row `f`.
    pub fn row(&self, f: &E) -> (&[usize], &[T]) {
        let r = self.a.row(self.f.index(f));
        (&self.a.col()[r.clone()], &self.a.val()[r])
    }

    pub fn clear(&mut self, c: T) -> &mut Self {
        self.a.fill(c);
        self
    }

    /// Set the stored entries of rows in `s` to `c`.
    pub fn clear_rows(&mut self, c: T, s: &Space<E>) -> &mut Self {
        for e in s.elements() {
            let r = self.a.row(self.f.index(e));
            self.a.val_mut()[r].fill(c);
        }
        self
    }

    /// Set the stored entries of rows in `s` and columns in `t` to `c`.
    pub fn clear_block(&mut self, c: T, s: &Space<E>, t: &Space<E>) -> &mut Self {
        for e in s.elements() {
            let i = self.f.index(e);
            for d in t.elements() {
                let j = self.x.index(d);
                self.a.set(i, j, c);
            }
        }
        self
    }

    /// Rows restricted to `s`; columns stay in the full domain.
    pub fn localize(&self, s: &Space<E>) -> Self {
        let mut sub = Space::new();
        for e in self.f.elements().filter(|e| s.contains(e)) {
            sub.join(e.clone());
        }
        let theta = self.tau.localize(&sub);
        let rows = sub
            .iter()
            .map(|(e, _)| {
                let big_i = self.f.index(e);
                theta
                    .neighbourhood(e, 0)
                    .elements()
                    .filter_map(|d| self.x.get_index(d))
                    .map(|big_j| (big_j, self.a.get(big_i, big_j)))
                    .collect::<BTreeMap<_, _>>()
            })
            .collect::<Vec<_>>();
        let rows = Self::in_index_order(&sub, rows);
        let a = assemble(self.x.size(), rows);
        Self { f: sub, x: self.x.clone(), tau: theta, a }
    }

    /// Rows restricted to `s`, columns restricted to `t` and renumbered.
    pub fn localize_with(&self, s: &Space<E>, t: &Space<E>) -> Self {
        let mut rs = Space::new();
        for e in self.f.elements().filter(|e| s.contains(e)) {
            rs.join(e.clone());
        }
        let mut cs = Space::new();
        for e in self.x.elements().filter(|e| t.contains(e)) {
            cs.join(e.clone());
        }
        let theta = self.tau.localize(&rs);
        let rows = rs
            .iter()
            .map(|(e, _)| {
                let big_i = self.f.index(e);
                (&theta.neighbourhood(e, 0) & &cs)
                    .elements()
                    .map(|d| (cs.index(d), self.a.get(big_i, self.x.index(d))))
                    .collect::<BTreeMap<_, _>>()
            })
            .collect::<Vec<_>>();
        let rows = Self::in_index_order(&rs, rows);
        let a = assemble(cs.size(), rows);
        Self { f: rs, x: cs, tau: theta, a }
    }

    /// Copy coefficients of `b` into the entries whose row and column this operator
    /// governs or ghosts.
    pub fn reflect_in(&mut self, b: &Self) -> &mut Self {
        self.reflect_in_by(b, |e: &E| Some(e.clone()))
    }

    pub fn reflect_in_colored<M: Neighbour<E>>(&mut self, b: &Self, subj: &Subjugator<'_, E, M>) -> &mut Self {
        self.reflect_in_by(b, |e: &E| subj.try_color(e).map(|c| e.recolor(c)))
    }

    fn reflect_in_by(&mut self, b: &Self, rename: impl Fn(&E) -> Option<E>) -> &mut Self {
        for (d, i) in b.f.iter() {
            let Some(big_i) = rename(d).and_then(|y| self.f.resolve(&y)) else { continue };
            for e in b.tau.neighbourhood(d, 0).elements() {
                let Some(j) = b.x.get_index(e) else { continue };
                if let Some(big_j) = rename(e).and_then(|y| self.x.resolve(&y)) {
                    self.a.set(big_i, big_j, b.a.get(i, j));
                }
            }
        }
        self
    }

    /// Pull coefficients for every row and column that `b` governs.
    pub fn reflect(&mut self, b: &Self) -> &mut Self {
        self.reflect_by(b, |e: &E| Some(e.clone()))
    }

    pub fn reflect_colored<M: Neighbour<E>>(&mut self, b: &Self, subj: &Subjugator<'_, E, M>) -> &mut Self {
        self.reflect_by(b, |e: &E| subj.try_color(e).map(|c| e.recolor(c)))
    }

    fn reflect_by(&mut self, b: &Self, rename: impl Fn(&E) -> Option<E>) -> &mut Self {
        let rows: Vec<(E, usize)> = self.f.iter().map(|(e, i)| (e.clone(), i)).collect();
        for (d, big_i) in rows {
            let Some(i) = rename(&d).filter(|y| b.f.governs(y)).map(|y| b.f.index(&y)) else { continue };
            for e in self.tau.neighbourhood(&d, 0).elements() {
                let Some(big_j) = self.x.get_index(e) else { continue };
                if let Some(j) = rename(e).filter(|y| b.x.governs(y)).map(|y| b.x.index(&y)) {
                    self.a.set(big_i, big_j, b.a.get(i, j));
                }
            }
        }
        self
    }

    /// Operator over the union of both ranges and domains. Ghost rows of `b` that this
    /// operator also ghosts are renamed to their owner before the patterns are merged.
    pub fn extend(&self, b: &Self) -> Self {
        let s = &self.f | &b.f;
        let t = &self.x | &b.x;
        let mut tau = b.tau.clone();
        for (x, y) in b.f.ghosts() {
            if self.f.internal_contains(y) {
                tau.flip(x, y, false);
            }
        }
        let tau = &self.tau | &tau;

        let lookup = |sp: &Space<E>, e: &E| -> Option<usize> {
            if sp.external_contains(e) { Some(sp.external_index(e)) } else { sp.get_index(e) }
        };
        let rows = s
            .iter()
            .map(|(e, _)| {
                tau.neighbourhood(e, 0)
                    .elements()
                    .filter_map(|d| {
                        let j = t.get_index(d)?;
                        let v = match (self.f.get_index(e), self.x.get_index(d)) {
                            (Some(big_i), Some(big_j)) => self.a.get(big_i, big_j),
                            _ => match (lookup(&b.f, e), lookup(&b.x, d)) {
                                (Some(i), Some(k)) => b.a.get(i, k),
                                _ => T::zero(),
                            },
                        };
                        Some((j, v))
                    })
                    .collect::<BTreeMap<_, _>>()
            })
            .collect::<Vec<_>>();
        let rows = Self::in_index_order(&s, rows);
        let a = assemble(t.size(), rows);
        Self { f: s, x: t, tau, a }
    }

    /// `A f` as a function over the range.
    pub fn apply(&self, g: &LinearFunction<E, T>) -> LinearFunction<E, T> {
        assert_eq!(g.dim(), self.codim(), "function domain must match the operator domain");
        LinearFunction::from_vector(self.f.clone(), Vector::from_expr(&self.a * g.vector()))
    }

    /// Ghost exchange descriptor for functions over the domain.
    pub fn coherence<'c, C: Comm>(&self, comm: &'c C) -> Coherence<'c, C> {
        Coherence::new(self, comm)
    }
}

impl<E: Element, N: Neighbour<E>, T: Scalar> CoherenceSetup for LinearOperator<E, N, T> {
    fn coherence_setup<C: Comm>(&self, coherence: &mut Coherence<'_, C>) {
        self.x.coherence_setup(coherence);
    }
}

impl<E: Element, N: Neighbour<E>, T: Scalar> Marshal for LinearOperator<E, N, T> {
    fn marshal<C: Comm>(&self, portal: &Portal<'_, C>) {
        portal.ship(&self.f);
        portal.ship(&self.x);
        portal.ship(&self.tau);
        portal.send(self.a.val());
    }

    fn unmarshal<C: Comm>(portal: &Portal<'_, C>) -> Result<Self> {
        let f: Space<E> = portal.land()?;
        let x: Space<E> = portal.land()?;
        let tau: Family<E, N> = portal.land()?;
        let mut op = Self::new(f, x, tau);
        op.refresh(portal)?;
        Ok(op)
    }
}

impl<E: Element, N: Neighbour<E>, T: Scalar> Reinforce for LinearOperator<E, N, T> {
    fn reinforce<C: Comm>(&self, portal: &Portal<'_, C>) {
        portal.send(self.a.val());
    }

    fn refresh<C: Comm>(&mut self, portal: &Portal<'_, C>) -> Result<()> {
        let v = portal.recv_exact::<T>(self.a.nnz(), "operator values")?;
        self.a.val_mut().copy_from_slice(&v);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parallel::ThreadComm;
    use crate::topology::{PackedElement as P, SetNeighbour, generate};

    type Op = LinearOperator<P, SetNeighbour<P>, f64>;

    fn poisson(n: usize) -> Op {
        let mut t = Vec::new();
        for i in 0..n {
            t.push((i, i, 2.0));
            if i > 0 {
                t.push((i, i - 1, -1.0));
            }
            if i + 1 < n {
                t.push((i, i + 1, -1.0));
            }
        }
        let m = Matrix::from_triplets(n, n, &t);
        let (s, tau) = generate::<P, SetNeighbour<P>, f64>(&m);
        Op::from_parts(s.clone(), s, tau, m)
    }

    #[test]
    fn structure_follows_family() {
        let a = poisson(4);
        let b = Op::square(a.dom().clone(), a.topo().clone());
        assert_eq!(b.action().nnz(), a.action().nnz());
        assert_eq!(b.action().col(), a.action().col());
        assert_eq!(a.get(&P::new(1, 0), &P::new(2, 0)), -1.0);
        assert_eq!(a.get(&P::new(0, 0), &P::new(3, 0)), 0.0);
        assert_eq!(a.diag(&P::new(3, 0)), 2.0);
        let (cols, vals) = a.row(&P::new(1, 0));
        assert_eq!(cols, &[0, 1, 2]);
        assert_eq!(vals, &[-1.0, 2.0, -1.0]);
    }

    #[test]
    fn apply_is_matrix_product() {
        let a = poisson(3);
        let g = LinearFunction::with_values(a.dom().clone(), &[1.0, 2.0, 3.0]);
        let y = a.apply(&g);
        assert_eq!(y.vector().val(), &[0.0, 0.0, 4.0]);
    }

    #[test]
    fn localize_keeps_coefficients() {
        let a = poisson(5);
        let mut s = Space::new();
        s.join(P::new(1, 0)).join(P::new(2, 0));
        let rows = a.localize(&s);
        assert_eq!((rows.dim(), rows.codim()), (2, 5));
        assert_eq!(rows.get(&P::new(2, 0), &P::new(3, 0)), -1.0);
        let block = a.localize_with(&s, &s);
        assert_eq!((block.dim(), block.codim()), (2, 2));
        assert_eq!(block.action().nnz(), 4);
        assert_eq!(block.get(&P::new(1, 0), &P::new(2, 0)), -1.0);
    }

    #[test]
    fn clear_and_reflect() {
        let a = poisson(3);
        let mut b = Op::square(a.dom().clone(), a.topo().clone());
        b.reflect(&a);
        assert_eq!(b.action().val(), a.action().val());
        let mut c = Op::square(a.dom().clone(), a.topo().clone());
        c.reflect_in(&a);
        assert_eq!(c.action().val(), a.action().val());
        let mut row = Space::new();
        row.join(P::new(0, 0));
        c.clear_rows(0.0, &row);
        assert_eq!(c.diag(&P::new(0, 0)), 0.0);
        assert_eq!(c.diag(&P::new(1, 0)), 2.0);
    }

    #[test]
    fn extend_merges_disjoint_blocks() {
        let a = poisson(4);
        let mut lo = Space::new();
        lo.join(P::new(0, 0)).join(P::new(1, 0));
        let mut hi = Space::new();
        hi.join(P::new(2, 0)).join(P::new(3, 0));
        let top = a.localize_with(&lo, &lo);
        let bottom = a.localize_with(&hi, &hi);
        let e = top.extend(&bottom);
        assert_eq!((e.dim(), e.codim()), (4, 4));
        assert_eq!(e.get(&P::new(3, 0), &P::new(3, 0)), 2.0);
        assert_eq!(e.get(&P::new(0, 0), &P::new(1, 0)), -1.0);
        // the coupling between the blocks was cut by localize_with
        assert_eq!(e.get(&P::new(1, 0), &P::new(2, 0)), 0.0);
    }

    #[test]
    fn operator_crosses_portal() {
        let out = ThreadComm::run(2, |c| {
            let portal = Portal::new(1 - c.rank(), &c);
            if c.rank() == 0 {
                let a = poisson(3);
                portal.send_operator(&a);
                let mut a2 = a.clone();
                a2.action_mut().fill(1.0);
                portal.reinforce_operator(&a2);
                None
            } else {
                let mut b: Op = portal.recv_operator().ok()?;
                let first = b.action().val().to_vec();
                portal.refresh(&mut b).ok()?;
                Some((first, b.action().val().to_vec()))
            }
        });
        let (first, second) = out[1].clone().expect("received");
        assert_eq!(first, poisson(3).action().val().to_vec());
        assert!(second.iter().all(|&v| v == 1.0));
    }
}
