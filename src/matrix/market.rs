//! Matrix-Market text streams.
//!
//! Matrices are read from the `coordinate` style (1-based `row col value` lines),
//! vectors from `array` (one value per line) or from a one-column `coordinate` file.
//! `%` lines are comments. Output always uses the `general` layout with 15
//! significant digits. Complex files carry `re im` pairs.

use std::io::{BufRead, Write};

use crate::core::traits::Scalar;
use crate::core::vector::Vector;
use crate::error::{ElaiError, Result};
use crate::matrix::Matrix;

/// Header plus a token stream that remembers line numbers.
struct Reader<R> {
    inner: R,
    line: usize,
    tokens: Vec<String>,
    header: String,
}

impl<R: BufRead> Reader<R> {
    fn open(mut inner: R) -> Result<Self> {
        let mut header = String::new();
        inner.read_line(&mut header)?;
        Ok(Self { inner, line: 1, tokens: Vec::new(), header: header.to_lowercase() })
    }

    fn err(&self, reason: impl Into<String>) -> ElaiError {
        ElaiError::MatrixMarket { line: self.line, reason: reason.into() }
    }

    /// Next non-comment line, split into tokens.
    fn next_line(&mut self) -> Result<Vec<String>> {
        loop {
            let mut buf = String::new();
            if self.inner.read_line(&mut buf)? == 0 {
                return Err(self.err("unexpected end of stream"));
            }
            self.line += 1;
            let t = buf.trim();
            if t.is_empty() || t.starts_with('%') {
                continue;
            }
            return Ok(t.split_whitespace().map(str::to_owned).collect());
        }
    }

    fn token(&mut self) -> Result<String> {
        while self.tokens.is_empty() {
            let mut l = self.next_line()?;
            l.reverse();
            self.tokens = l;
        }
        self.tokens.pop().ok_or_else(|| self.err("missing token"))
    }

    fn int(&mut self) -> Result<usize> {
        let t = self.token()?;
        t.parse::<usize>().map_err(|_| self.err(format!("expected integer, found `{}`", t)))
    }

    fn real(&mut self) -> Result<f64> {
        let t = self.token()?;
        t.parse::<f64>().map_err(|_| self.err(format!("expected number, found `{}`", t)))
    }

    fn value<T: Scalar>(&mut self, complex: bool) -> Result<T> {
        let re = self.real()?;
        let im = if complex { self.real()? } else { 0.0 };
        Ok(T::from_parts(re, im))
    }

    /// Dimension line as integers.
    fn sizes(&mut self) -> Result<Vec<usize>> {
        let l = self.next_line()?;
        l.iter()
            .map(|t| t.parse::<usize>().map_err(|_| self.err(format!("bad size `{}`", t))))
            .collect()
    }
}

/// Read a sparse matrix in coordinate style.
pub fn read_matrix<T: Scalar, R: BufRead>(input: R) -> Result<Matrix<T>> {
    let mut rd = Reader::open(input)?;
    if !rd.header.contains("coordinate") {
        return Err(ElaiError::UnsupportedFormat(rd.header.trim().to_owned()));
    }
    let complex = rd.header.contains("complex");
    let symmetric = rd.header.contains("symmetric") || rd.header.contains("hermitian");
    let dims = rd.sizes()?;
    if dims.len() < 3 {
        return Err(rd.err("expected `rows cols nnz`"));
    }
    let (m, n, nnz) = (dims[0], dims[1], dims[2]);
    let mut entries = Vec::with_capacity(if symmetric { 2 * nnz } else { nnz });
    for _ in 0..nnz {
        let i = rd.int()?;
        let j = rd.int()?;
        let v: T = rd.value(complex)?;
        if i == 0 || j == 0 || i > m || j > n {
            return Err(rd.err(format!("entry ({}, {}) outside {}x{}", i, j, m, n)));
        }
        entries.push((i - 1, j - 1, v));
        if symmetric && i != j {
            let mirrored = if rd.header.contains("hermitian") { v.conj() } else { v };
            entries.push((j - 1, i - 1, mirrored));
        }
    }
    log::debug!("read {}x{} matrix with {} stored entries", m, n, entries.len());
    Ok(Matrix::from_triplets(m, n, &entries))
}

/// Read a dense vector from `array` or single-column `coordinate` style.
pub fn read_vector<T: Scalar, R: BufRead>(input: R) -> Result<Vector<T>> {
    let mut rd = Reader::open(input)?;
    let complex = rd.header.contains("complex");
    if rd.header.contains("array") {
        let dims = rd.sizes()?;
        if dims.len() < 2 || dims[1] != 1 {
            return Err(rd.err("array data is not a single column"));
        }
        let mut v = Vector::new(dims[0]);
        for i in 0..dims[0] {
            v[i] = rd.value(complex)?;
        }
        Ok(v)
    } else if rd.header.contains("coordinate") {
        let dims = rd.sizes()?;
        if dims.len() < 3 || dims[1] != 1 || dims[0] != dims[2] {
            return Err(rd.err("coordinate data is not a dense column"));
        }
        let mut v = Vector::new(dims[0]);
        for _ in 0..dims[2] {
            let i = rd.int()?;
            let _j = rd.int()?;
            if i == 0 || i > dims[0] {
                return Err(rd.err(format!("row {} outside 1..={}", i, dims[0])));
            }
            v[i - 1] = rd.value(complex)?;
        }
        Ok(v)
    } else {
        Err(ElaiError::UnsupportedFormat(rd.header.trim().to_owned()))
    }
}

fn field<T: Scalar>() -> &'static str {
    if T::is_complex() { "complex" } else { "real" }
}

fn put<T: Scalar, W: Write>(out: &mut W, v: T) -> Result<()> {
    if T::is_complex() {
        write!(out, "{:.14e} {:.14e}", v.re(), v.im())?;
    } else {
        write!(out, "{:.14e}", v.re())?;
    }
    Ok(())
}

pub fn write_matrix<T: Scalar, W: Write>(out: &mut W, a: &Matrix<T>) -> Result<()> {
    writeln!(out, "%%MatrixMarket matrix coordinate {} general", field::<T>())?;
    writeln!(out, "{} {}  {}", a.m(), a.n(), a.nnz())?;
    for i in 0..a.m() {
        for k in a.row(i) {
            write!(out, " {} {}  ", i + 1, a.col()[k] + 1)?;
            put(out, a.val()[k])?;
            writeln!(out)?;
        }
    }
    Ok(())
}

pub fn write_vector<T: Scalar, W: Write>(out: &mut W, v: &Vector<T>) -> Result<()> {
    writeln!(out, "%%MatrixMarket matrix array {} general", field::<T>())?;
    writeln!(out, "{} 1", v.m())?;
    for &x in v.iter() {
        write!(out, "  ")?;
        put(out, x)?;
        writeln!(out)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const TRIDIAG: &str = "%%MatrixMarket matrix coordinate real general
% 3x3 laplacian
3 3 7
1 1 2.0
1 2 -1.0
2 1 -1.0
2 2 2.0
2 3 -1.0
3 2 -1.0
3 3 2.0
";

    #[test]
    fn reads_coordinate_matrix() {
        let a: Matrix<f64> = read_matrix(Cursor::new(TRIDIAG)).unwrap();
        assert_eq!((a.m(), a.n(), a.nnz()), (3, 3, 7));
        assert_eq!(a.get(1, 2), -1.0);
        assert!(a.is_symmetric(true));
    }

    #[test]
    fn written_matrix_reads_back() {
        let a: Matrix<f64> = read_matrix(Cursor::new(TRIDIAG)).unwrap();
        let mut buf = Vec::new();
        write_matrix(&mut buf, &a).unwrap();
        let b: Matrix<f64> = read_matrix(Cursor::new(buf)).unwrap();
        assert_eq!(a.col(), b.col());
        assert_eq!(a.val(), b.val());
    }

    #[test]
    fn symmetric_header_mirrors_entries() {
        let src = "%%MatrixMarket matrix coordinate real symmetric\n2 2 2\n1 1 4\n2 1 1\n";
        let a: Matrix<f64> = read_matrix(Cursor::new(src)).unwrap();
        assert_eq!(a.get(0, 1), 1.0);
        assert_eq!(a.get(1, 0), 1.0);
    }

    #[test]
    fn array_vector() {
        let src = "%%MatrixMarket matrix array real general\n3 1\n1.5\n2\n-3\n";
        let v: Vector<f64> = read_vector(Cursor::new(src)).unwrap();
        assert_eq!(v.val(), &[1.5, 2.0, -3.0]);
    }

    #[test]
    fn bad_token_reports_line() {
        let src = "%%MatrixMarket matrix coordinate real general\n2 2 1\n1 x 3.0\n";
        match read_matrix::<f64, _>(Cursor::new(src)) {
            Err(ElaiError::MatrixMarket { line, .. }) => assert_eq!(line, 3),
            other => panic!("unexpected {:?}", other.map(|a| a.nnz())),
        }
    }

    #[test]
    fn array_style_matrix_is_rejected() {
        let src = "%%MatrixMarket matrix array real general\n2 2\n";
        assert!(matches!(
            read_matrix::<f64, _>(Cursor::new(src)),
            Err(ElaiError::UnsupportedFormat(_))
        ));
    }
}
