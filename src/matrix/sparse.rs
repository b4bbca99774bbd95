//! Compressed-row sparse matrix.
//!
//! Row `i` owns the half-open range `ind[i]..ind[i + 1]` of `col`/`val`. Columns within
//! a row are kept ascending; fill-in and the incomplete factorizations walk rows as
//! sorted sets and rely on it. Storage is cache-line aligned and padded like
//! [`Vector`]; `m()`, `n()` and `nnz()` report logical sizes.
//!
//! Besides the product this type carries the structural transforms (transpose,
//! row permutation, symmetric reordering) and diagonal equilibration with its exact
//! inverse, so a scaled solve can restore the caller's coefficients afterwards.

use crate::core::kernels;
use crate::core::traits::Scalar;
use crate::core::vector::{Aligned, Vector, padded};
use crate::parallel::Coherent;
use num_traits::{Float, One, Zero};

#[derive(Clone)]
pub struct Matrix<T: Scalar> {
    m: usize,
    n: usize,
    ind: Aligned<usize>,
    col: Aligned<usize>,
    val: Aligned<T>,
    scal_r: Vector<T>,
    scal_c: Vector<T>,
}

impl<T: Scalar> Default for Matrix<T> {
    fn default() -> Self {
        Self::new(0, 0, &[0], &[], None)
    }
}

impl<T: Scalar> Matrix<T> {
    /// Build from raw CSR arrays. `ind` has `m + 1` offsets; `val` defaults to zeros.
    pub fn new(m: usize, n: usize, ind: &[usize], col: &[usize], val: Option<&[T]>) -> Self {
        assert_eq!(ind.len(), m + 1, "row offsets must have m + 1 entries");
        let nnz = ind[m];
        assert_eq!(col.len(), nnz);
        debug_assert!(col.iter().all(|&j| j < n));
        let mut a = Self {
            m,
            n,
            ind: padded(m + 1),
            col: padded(nnz),
            val: padded(nnz),
            scal_r: Vector::new(m),
            scal_c: Vector::new(n),
        };
        a.ind[..=m].copy_from_slice(ind);
        a.col[..nnz].copy_from_slice(col);
        if let Some(v) = val {
            assert_eq!(v.len(), nnz);
            a.val[..nnz].copy_from_slice(v);
        }
        a.scal_r.fill(T::one());
        a.scal_c.fill(T::one());
        a
    }

    /// Build from (row, col, value) triplets; duplicates are summed.
    pub fn from_triplets(m: usize, n: usize, entries: &[(usize, usize, T)]) -> Self {
        let mut rows: Vec<Vec<(usize, T)>> = vec![Vec::new(); m];
        for &(i, j, v) in entries {
            assert!(i < m && j < n, "entry ({}, {}) outside {}x{}", i, j, m, n);
            rows[i].push((j, v));
        }
        let mut ind = Vec::with_capacity(m + 1);
        let mut col = Vec::with_capacity(entries.len());
        let mut val = Vec::with_capacity(entries.len());
        ind.push(0);
        for row in rows.iter_mut() {
            row.sort_by_key(|&(j, _)| j);
            for &(j, v) in row.iter() {
                if col.len() > *ind.last().unwrap_or(&0) && col.last() == Some(&j) {
                    if let Some(last) = val.last_mut() {
                        *last += v;
                    }
                    continue;
                }
                col.push(j);
                val.push(v);
            }
            ind.push(col.len());
        }
        Self::new(m, n, &ind, &col, Some(&val))
    }

    /// Replace the structure, dropping previous values.
    pub fn setup(&mut self, m: usize, n: usize, ind: &[usize], col: &[usize], val: Option<&[T]>) -> &mut Self {
        *self = Self::new(m, n, ind, col, val);
        self
    }

    pub fn m(&self) -> usize {
        self.m
    }

    pub fn n(&self) -> usize {
        self.n
    }

    pub fn nnz(&self) -> usize {
        self.ind[self.m]
    }

    /// Row offsets, `m + 1` entries.
    pub fn ind(&self) -> &[usize] {
        &self.ind[..=self.m]
    }

    pub fn col(&self) -> &[usize] {
        &self.col[..self.nnz()]
    }

    pub fn val(&self) -> &[T] {
        &self.val[..self.nnz()]
    }

    pub fn val_mut(&mut self) -> &mut [T] {
        let nnz = self.nnz();
        &mut self.val[..nnz]
    }

    /// Storage range of row `i`.
    #[inline]
    pub fn row(&self, i: usize) -> std::ops::Range<usize> {
        self.ind[i]..self.ind[i + 1]
    }

    /// Σ_k val[k]·x[col[k]] over row `i`.
    #[inline]
    pub fn row_dot(&self, i: usize, x: &[T]) -> T {
        let mut acc = T::zero();
        for k in self.row(i) {
            acc += self.val[k] * x[self.col[k]];
        }
        acc
    }

    /// Storage slot of (i, j), if structurally present.
    pub fn find(&self, i: usize, j: usize) -> Option<usize> {
        assert!(i < self.m && j < self.n, "({}, {}) outside {}x{}", i, j, self.m, self.n);
        let r = self.row(i);
        self.col[r.clone()].binary_search(&j).ok().map(|k| r.start + k)
    }

    /// Coefficient (i, j); zero when the entry is not stored.
    pub fn get(&self, i: usize, j: usize) -> T {
        self.find(i, j).map_or(T::zero(), |k| self.val[k])
    }

    pub fn entry_mut(&mut self, i: usize, j: usize) -> Option<&mut T> {
        match self.find(i, j) {
            Some(k) => Some(&mut self.val[k]),
            None => None,
        }
    }

    /// Store v at (i, j); returns false (and stores nothing) outside the pattern.
    pub fn set(&mut self, i: usize, j: usize, v: T) -> bool {
        match self.entry_mut(i, j) {
            Some(c) => {
                *c = v;
                true
            }
            None => false,
        }
    }

    pub fn fill(&mut self, c: T) -> &mut Self {
        self.val_mut().iter_mut().for_each(|v| *v = c);
        self
    }

    /// y = A x
    pub fn spmv(&self, x: &[T], y: &mut [T]) {
        assert_eq!(x.len(), self.n);
        assert_eq!(y.len(), self.m);
        kernels::csr_mul(self.ind(), self.col(), self.val(), x, y);
    }

    pub fn mul_vec(&self, x: &Vector<T>, y: &mut Vector<T>) {
        self.spmv(x.val(), y.val_mut());
    }

    /// Structural (or, with `numeric`, value) symmetry.
    pub fn is_symmetric(&self, numeric: bool) -> bool {
        if self.m != self.n {
            return false;
        }
        // cursor into the lower part of each row
        let mut cursor: Vec<usize> = (0..self.m).map(|i| self.ind[i]).collect();
        for i in 0..self.m {
            for ki in self.row(i) {
                let j = self.col[ki];
                if j <= i {
                    continue;
                }
                let kj = cursor[j];
                if kj >= self.ind[j + 1] || self.col[kj] != i {
                    return false;
                }
                if numeric && self.val[kj] != self.val[ki] {
                    return false;
                }
                cursor[j] = kj + 1;
            }
        }
        // every strictly-lower entry must have been matched
        (0..self.m).all(|j| cursor[j] == self.ind[j + 1] || self.col[cursor[j]] >= j)
    }

    fn transposed_with(&self, f: impl Fn(T) -> T) -> (Vec<usize>, Vec<usize>, Vec<T>) {
        let nnz = self.nnz();
        let mut k0 = vec![0usize; self.n];
        for &j in self.col() {
            k0[j] += 1;
        }
        let mut ind = vec![0usize; self.n + 1];
        for j in 0..self.n {
            ind[j + 1] = ind[j] + k0[j];
            k0[j] = 0;
        }
        let mut col = vec![0usize; nnz];
        let mut val = vec![T::zero(); nnz];
        for i in 0..self.m {
            for k in self.row(i) {
                let j = self.col[k];
                let k1 = ind[j] + k0[j];
                col[k1] = i;
                val[k1] = f(self.val[k]);
                k0[j] += 1;
            }
        }
        (ind, col, val)
    }

    fn replace(&mut self, m: usize, n: usize, ind: &[usize], col: &[usize], val: &[T]) {
        let scal_r = std::mem::take(&mut self.scal_r);
        let scal_c = std::mem::take(&mut self.scal_c);
        *self = Self::new(m, n, ind, col, Some(val));
        self.scal_r = scal_r;
        self.scal_c = scal_c;
    }

    /// A ← Aᵀ
    pub fn transpose(&mut self) -> &mut Self {
        let (ind, col, val) = self.transposed_with(|v| v);
        let (m, n) = (self.n, self.m);
        self.replace(m, n, &ind, &col, &val);
        std::mem::swap(&mut self.scal_r, &mut self.scal_c);
        self
    }

    /// A ← Aᴴ
    pub fn conj(&mut self) -> &mut Self {
        let (ind, col, val) = self.transposed_with(|v| v.conj());
        let (m, n) = (self.n, self.m);
        self.replace(m, n, &ind, &col, &val);
        std::mem::swap(&mut self.scal_r, &mut self.scal_c);
        self
    }

    /// Row `i` of the result is row `perm[i]` of A.
    pub fn perm_row(&mut self, perm: &[usize]) -> &mut Self {
        assert_eq!(perm.len(), self.m);
        let mut ind = Vec::with_capacity(self.m + 1);
        let mut col = Vec::with_capacity(self.nnz());
        let mut val = Vec::with_capacity(self.nnz());
        ind.push(0);
        for &p in perm {
            let r = self.row(p);
            col.extend_from_slice(&self.col[r.clone()]);
            val.extend_from_slice(&self.val[r]);
            ind.push(col.len());
        }
        let (m, n) = (self.m, self.n);
        self.replace(m, n, &ind, &col, &val);
        self
    }

    /// A ← P A Pᵀ
    pub fn reorder(&mut self, perm: &[usize]) -> &mut Self {
        self.transpose();
        self.perm_row(perm);
        self.transpose();
        self.perm_row(perm)
    }

    /// Two-sided equilibration: repeat row/column max scaling until every row and
    /// column maximum is within `thres` of one, at most `m` sweeps. Ghost rows are
    /// refreshed through `coherent` between sweeps when given.
    pub fn normalize(&mut self, thres: T::Real, coherent: Option<&dyn Coherent<T>>) -> &mut Self {
        let nnz = self.nnz();
        let one = T::Real::one();
        let mut diag_r = vec![T::zero(); self.m];
        let mut diag_c = vec![T::zero(); self.n];
        let mut c: Vec<T> = self.val().to_vec();
        self.scal_r.fill(T::one());
        self.scal_c.fill(T::one());

        for sweep in 0..self.m {
            for i in 0..self.m {
                for k in self.row(i) {
                    let j = self.col[k];
                    let v = c[k].modulus();
                    if diag_r[i].re() < v {
                        diag_r[i] = T::from_real(v);
                    }
                    if diag_c[j].re() < v {
                        diag_c[j] = T::from_real(v);
                    }
                }
            }
            if let Some(coh) = coherent {
                coh.sync(&mut diag_r);
                coh.sync(&mut diag_c);
            }
            let mut max_r = T::Real::zero();
            let mut max_c = T::Real::zero();
            for (i, d) in diag_r.iter_mut().enumerate() {
                let d_re = d.re();
                max_r = max_r.max((one - d_re).abs());
                if d_re > T::Real::zero() {
                    self.scal_r[i] /= T::from_real(d_re.sqrt());
                }
                *d = T::zero();
            }
            for (j, d) in diag_c.iter_mut().enumerate() {
                let d_re = d.re();
                max_c = max_c.max((one - d_re).abs());
                if d_re > T::Real::zero() {
                    self.scal_c[j] /= T::from_real(d_re.sqrt());
                }
                *d = T::zero();
            }
            if let Some(coh) = coherent {
                max_r = coh.max_real(max_r);
                max_c = coh.max_real(max_c);
            }
            for i in 0..self.m {
                for k in self.row(i) {
                    c[k] = self.scal_r[i] * self.val[k] * self.scal_c[self.col[k]];
                }
            }
            log::trace!("normalize sweep {}: row dev {:e}, col dev {:e}", sweep, max_r, max_c);
            if max_r <= thres && max_c <= thres {
                break;
            }
        }
        self.val[..nnz].copy_from_slice(&c);
        self
    }

    /// Scale each row by the inverse of its largest modulus.
    pub fn normalize_row(&mut self) -> &mut Self {
        for i in 0..self.m {
            let s = self.row(i).map(|k| self.val[k].modulus()).fold(T::Real::zero(), Float::max);
            self.scal_r[i] = if s > T::Real::zero() { T::from_real(s.recip()) } else { T::one() };
            let sr = self.scal_r[i];
            for k in self.row(i) {
                self.val[k] *= sr;
            }
        }
        self
    }

    /// Scale each column by the inverse of its largest modulus.
    pub fn normalize_col(&mut self) -> &mut Self {
        let mut s = vec![T::Real::zero(); self.n];
        for k in 0..self.nnz() {
            let j = self.col[k];
            s[j] = s[j].max(self.val[k].modulus());
        }
        for (j, &sj) in s.iter().enumerate() {
            self.scal_c[j] = if sj > T::Real::zero() { T::from_real(sj.recip()) } else { T::one() };
        }
        for k in 0..self.nnz() {
            let sc = self.scal_c[self.col[k]];
            self.val[k] *= sc;
        }
        self
    }

    pub fn unnormalize(&mut self) -> &mut Self {
        for i in 0..self.m {
            for k in self.row(i) {
                let s = self.scal_r[i] * self.scal_c[self.col[k]];
                self.val[k] /= s;
            }
        }
        self
    }

    pub fn unnormalize_row(&mut self) -> &mut Self {
        for i in 0..self.m {
            let s = self.scal_r[i];
            for k in self.row(i) {
                self.val[k] /= s;
            }
        }
        self
    }

    pub fn unnormalize_col(&mut self) -> &mut Self {
        for k in 0..self.nnz() {
            let s = self.scal_c[self.col[k]];
            self.val[k] /= s;
        }
        self
    }

    /// Row scaling applied by the last normalization.
    pub fn scale_row(&self) -> &Vector<T> {
        &self.scal_r
    }

    /// Column scaling applied by the last normalization.
    pub fn scale_col(&self) -> &Vector<T> {
        &self.scal_c
    }

    pub fn scale_row_norm(&self) -> T::Real {
        self.scal_r.norm()
    }

    pub fn scale_col_norm(&self) -> T::Real {
        self.scal_c.norm()
    }

    /// ‖scale_row‖ / ‖1 / scale_col‖
    pub fn scale_ratio(&self) -> T::Real {
        let rnorm = self.scal_r.norm();
        let cnorm = self
            .scal_c
            .iter()
            .map(|&s| {
                let a = s.modulus();
                (a * a).recip()
            })
            .fold(T::Real::zero(), |acc, v| acc + v)
            .sqrt();
        rnorm / cnorm
    }

    /// Bytes held, padding and scale vectors included.
    pub fn mem(&self) -> usize {
        std::mem::size_of::<usize>() * (self.ind.len() + self.col.len())
            + std::mem::size_of::<T>() * self.val.len()
            + self.scal_r.mem()
            + self.scal_c.mem()
    }
}

impl Matrix<f64> {
    /// Dense copy, for direct reference solves.
    pub fn to_dense(&self) -> faer::Mat<f64> {
        faer::Mat::from_fn(self.m, self.n, |i, j| self.get(i, j))
    }
}

impl<T: Scalar> std::fmt::Debug for Matrix<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Matrix")
            .field("m", &self.m)
            .field("n", &self.n)
            .field("nnz", &self.nnz())
            .field("ind", &self.ind())
            .field("col", &self.col())
            .field("val", &self.val())
            .finish()
    }
}
