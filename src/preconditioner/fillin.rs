//! Symbolic fill-in for level-k incomplete factorizations.
//!
//! Every stored entry of A starts at level 0 (off-diagonals below the drop threshold
//! are left out). Row `i` then grows by elimination: for each accepted lower entry
//! (i, j) of level `l1` and each entry (j, c) with `c > j` of level `l2`, the entry
//! (i, c) is accepted at level `l1 + l2 + 1` ([`FillRule::SUM`]) or
//! `max(l1, l2) + 1`, as long as both parents are below the requested level.
//! Entries created while a row is scanned are scanned too. The symmetric variant
//! only fills up to the diagonal and mirrors each new entry into row `c`.

use std::collections::BTreeMap;

use bitflags::bitflags;
use num_traits::Zero;

use crate::core::traits::Scalar;
use crate::matrix::Matrix;

bitflags! {
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct FillRule: u32 {
        /// Mirror fill across the diagonal (structurally symmetric A).
        const SYMMETRIC = 0b01;
        /// Level of a fill entry is the sum of its parents' levels, not the max.
        const SUM       = 0b10;
    }
}

impl FillRule {
    /// Rule for `a`: symmetric when its pattern is, plus `SUM` on request.
    pub fn for_matrix<T: Scalar>(a: &Matrix<T>, sum: bool) -> Self {
        let mut rule = FillRule::empty();
        rule.set(FillRule::SYMMETRIC, a.is_symmetric(false));
        rule.set(FillRule::SUM, sum);
        rule
    }

    fn level(self, l1: usize, l2: usize) -> usize {
        if self.contains(FillRule::SUM) { l1 + l2 + 1 } else { l1.max(l2) + 1 }
    }
}

/// CSR pattern of the incomplete factors with its coefficient slots.
#[derive(Clone, Debug)]
pub struct Fillin<T: Scalar> {
    m: usize,
    n: usize,
    xadj: Vec<usize>,
    adjy: Vec<usize>,
    coef: Vec<T>,
}

impl<T: Scalar> Fillin<T> {
    pub fn new(a: &Matrix<T>, level: usize, thres: T::Real, rule: FillRule) -> Self {
        let (ind, col, val) = (a.ind(), a.col(), a.val());
        let m = a.m();
        let mut adjs: Vec<BTreeMap<usize, usize>> = (0..m)
            .map(|i| {
                (ind[i]..ind[i + 1])
                    .filter(|&k| col[k] == i || thres <= val[k].modulus())
                    .map(|k| (col[k], 0))
                    .collect()
            })
            .collect();

        let symmetric = rule.contains(FillRule::SYMMETRIC);
        for i in 0..m {
            let mut cursor = None;
            loop {
                let next = match cursor {
                    None => adjs[i].iter().next(),
                    Some(c) => adjs[i].range(c + 1..).next(),
                };
                let Some((&j, &l1)) = next else { break };
                cursor = Some(j);
                if i <= j {
                    break;
                }
                if level <= l1 {
                    continue;
                }
                let grown: Vec<(usize, usize)> = adjs[j]
                    .iter()
                    .filter(|&(&c, _)| c > j && (!symmetric || c <= i))
                    .filter(|&(_, &l2)| l2 < level)
                    .map(|(&c, &l2)| (c, rule.level(l1, l2)))
                    .collect();
                for (c, l) in grown {
                    adjs[i].entry(c).or_insert(l);
                    if symmetric {
                        adjs[c].entry(i).or_insert(l);
                    }
                }
            }
        }

        let mut xadj = Vec::with_capacity(m + 1);
        xadj.push(0);
        let mut adjy = Vec::new();
        for adj in &adjs {
            adjy.extend(adj.keys().copied());
            xadj.push(adjy.len());
        }
        log::debug!("fill-in level {} ({:?}): n = {}, nz = {}, nf = {}", level, rule, m, a.nnz(), adjy.len());
        let coef = vec![T::zero(); adjy.len()];
        Self { m, n: a.n(), xadj, adjy, coef }
    }

    pub fn m(&self) -> usize {
        self.m
    }

    pub fn n(&self) -> usize {
        self.n
    }

    pub fn nnz(&self) -> usize {
        self.adjy.len()
    }

    pub fn xadj(&self) -> &[usize] {
        &self.xadj
    }

    pub fn adjy(&self) -> &[usize] {
        &self.adjy
    }

    pub fn coef(&self) -> &[T] {
        &self.coef
    }

    pub fn coef_mut(&mut self) -> &mut [T] {
        &mut self.coef
    }

    /// Pattern together with writable coefficients, for in-place factorization.
    pub(crate) fn split_mut(&mut self) -> (&[usize], &[usize], &mut [T]) {
        (&self.xadj, &self.adjy, &mut self.coef)
    }

    /// Zero the slots and copy in the coefficients of `a` present in the pattern.
    pub fn setup(&mut self, a: &Matrix<T>) {
        assert_eq!(a.m(), self.m, "fill-in pattern and matrix disagree in rows");
        self.coef.iter_mut().for_each(|c| *c = T::zero());
        let (col, val) = (a.col(), a.val());
        for i in 0..self.m {
            let (mut k0, mut k1) = (a.ind()[i], self.xadj[i]);
            let (e0, e1) = (a.ind()[i + 1], self.xadj[i + 1]);
            while k0 < e0 && k1 < e1 {
                let (j0, j1) = (col[k0], self.adjy[k1]);
                if j0 < j1 {
                    k0 += 1;
                } else if j1 < j0 {
                    k1 += 1;
                } else {
                    self.coef[k1] = val[k0];
                    k0 += 1;
                    k1 += 1;
                }
            }
        }
    }

    pub fn mem(&self) -> usize {
        (self.xadj.len() + self.adjy.len()) * std::mem::size_of::<usize>()
            + self.coef.len() * std::mem::size_of::<T>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preconditioner::testing::poisson;

    /// Arrow matrix: dense first row and column, so eliminating row 0 fills everything.
    fn arrow(n: usize) -> Matrix<f64> {
        let mut t = vec![(0, 0, n as f64)];
        for i in 1..n {
            t.push((0, i, 1.0));
            t.push((i, 0, 1.0));
            t.push((i, i, n as f64));
        }
        Matrix::from_triplets(n, n, &t)
    }

    #[test]
    fn level_zero_keeps_pattern() {
        let a = poisson(5);
        let f = Fillin::new(&a, 0, 0.0, FillRule::for_matrix(&a, false));
        assert_eq!(f.xadj(), a.ind());
        assert_eq!(f.adjy(), a.col());
    }

    #[test]
    fn tridiagonal_has_no_fill() {
        let a = poisson(6);
        for rule in [FillRule::SYMMETRIC, FillRule::SYMMETRIC | FillRule::SUM, FillRule::empty(), FillRule::SUM] {
            let f = Fillin::new(&a, 3, 0.0, rule);
            assert_eq!(f.nnz(), a.nnz(), "{:?}", rule);
        }
    }

    #[test]
    fn arrow_fills_in() {
        let a = arrow(4);
        let sym = Fillin::new(&a, 1, 0.0, FillRule::SYMMETRIC);
        assert_eq!(sym.nnz(), 16);
        let general = Fillin::new(&a, 1, 0.0, FillRule::empty());
        assert_eq!(general.nnz(), 16);
        assert_eq!(&general.adjy()[general.xadj()[1]..general.xadj()[2]], &[0, 1, 2, 3]);
        let none = Fillin::new(&a, 0, 0.0, FillRule::empty());
        assert_eq!(none.nnz(), a.nnz());
    }

    #[test]
    fn setup_copies_values() {
        let a = arrow(3);
        let mut f = Fillin::new(&a, 1, 0.0, FillRule::SYMMETRIC);
        f.setup(&a);
        assert_eq!(f.nnz(), 9);
        assert_eq!(f.coef(), &[3.0, 1.0, 1.0, 1.0, 3.0, 0.0, 1.0, 0.0, 3.0]);
    }
}
