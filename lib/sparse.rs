//! Square complex-valued operators in compressed sparse row (CSR) format.
//!
//! Operators on the composite chain space are extremely sparse (a lowering
//! operator has at most one non-zero element per row), so everything in the
//! operator algebra is done sparsely. Density matrices remain dense, and are
//! only ever multiplied by sparse operators from one side; these products are
//! parallelized over rows.

use std::ops::{ Add, AddAssign, Mul, Neg, Sub };
use ndarray::{ self as nd, parallel::prelude::* };
use num_complex::Complex64 as C64;
use num_traits::Zero;
use rustc_hash::FxHashMap as HashMap;

/// A square sparse operator.
#[derive(Clone, Debug, PartialEq)]
pub struct SpOp {
    dim: usize,
    indptr: Vec<usize>,
    indices: Vec<usize>,
    data: Vec<C64>,
}

impl SpOp {
    /// The zero operator.
    pub fn zeros(dim: usize) -> Self {
        Self {
            dim,
            indptr: vec![0; dim + 1],
            indices: Vec::new(),
            data: Vec::new(),
        }
    }

    /// The identity operator.
    pub fn eye(dim: usize) -> Self {
        Self {
            dim,
            indptr: (0..=dim).collect(),
            indices: (0..dim).collect(),
            data: vec![C64::from(1.0); dim],
        }
    }

    // rows are given as column-keyed accumulators; exact zeros are dropped
    fn from_rows(dim: usize, rows: Vec<HashMap<usize, C64>>) -> Self {
        let mut indptr: Vec<usize> = Vec::with_capacity(dim + 1);
        let mut indices: Vec<usize> = Vec::new();
        let mut data: Vec<C64> = Vec::new();
        indptr.push(0);
        for row in rows.into_iter() {
            let mut entries: Vec<(usize, C64)>
                = row.into_iter()
                .filter(|(_, a)| !a.is_zero())
                .collect();
            entries.sort_unstable_by_key(|(j, _)| *j);
            for (j, a) in entries.into_iter() {
                indices.push(j);
                data.push(a);
            }
            indptr.push(indices.len());
        }
        Self { dim, indptr, indices, data }
    }

    /// Build from `(row, column, value)` triplets. Duplicate entries are
    /// summed.
    ///
    /// *Panics* if any index is out of bounds.
    pub fn from_triplets<I>(dim: usize, triplets: I) -> Self
    where I: IntoIterator<Item = (usize, usize, C64)>
    {
        let mut rows: Vec<HashMap<usize, C64>>
            = (0..dim).map(|_| HashMap::default()).collect();
        for (i, j, a) in triplets.into_iter() {
            if i >= dim || j >= dim {
                panic!(
                    "SpOp::from_triplets: index ({}, {}) out of bounds for \
                    dimension {}",
                    i, j, dim,
                );
            }
            *rows[i].entry(j).or_insert_with(C64::zero) += a;
        }
        Self::from_rows(dim, rows)
    }

    /// Convert a dense square array.
    ///
    /// *Panics* if the array is not square.
    pub fn from_dense<S>(a: &nd::ArrayBase<S, nd::Ix2>) -> Self
    where S: nd::Data<Elem = C64>
    {
        if !a.is_square() {
            panic!("SpOp::from_dense: encountered non-square matrix");
        }
        Self::from_triplets(
            a.nrows(),
            a.indexed_iter()
                .filter(|(_, x)| !x.is_zero())
                .map(|((i, j), x)| (i, j, *x)),
        )
    }

    /// Convert to a dense array.
    pub fn to_dense(&self) -> nd::Array2<C64> {
        let mut a: nd::Array2<C64> = nd::Array2::zeros((self.dim, self.dim));
        for i in 0..self.dim {
            for (j, x) in self.row(i) {
                a[[i, j]] = x;
            }
        }
        a
    }

    /// Side length of the operator's matrix.
    pub fn dim(&self) -> usize { self.dim }

    /// Number of stored non-zero elements.
    pub fn nnz(&self) -> usize { self.data.len() }

    /// Iterate over the stored `(column, value)` pairs of the `i`-th row.
    pub fn row(&self, i: usize) -> impl Iterator<Item = (usize, C64)> + '_ {
        let rng = self.indptr[i]..self.indptr[i + 1];
        self.indices[rng.clone()].iter().copied()
            .zip(self.data[rng].iter().copied())
    }

    /// Iterate over all stored `(row, column, value)` triplets.
    pub fn triplets(&self) -> impl Iterator<Item = (usize, usize, C64)> + '_ {
        (0..self.dim)
            .flat_map(move |i| self.row(i).map(move |(j, x)| (i, j, x)))
    }

    /// Get the `(i, j)`-th element.
    pub fn get(&self, i: usize, j: usize) -> C64 {
        self.row(i)
            .find(|(k, _)| *k == j)
            .map(|(_, x)| x)
            .unwrap_or_else(C64::zero)
    }

    /// Largest absolute value of any element.
    pub fn max_abs(&self) -> f64 {
        self.data.iter().map(|x| x.norm()).fold(0.0, f64::max)
    }

    /// Conjugate transpose.
    pub fn adjoint(&self) -> Self {
        Self::from_triplets(
            self.dim,
            self.triplets().map(|(i, j, x)| (j, i, x.conj())),
        )
    }

    /// Multiply by a scalar.
    pub fn scale<T: Into<C64>>(&self, a: T) -> Self {
        let a: C64 = a.into();
        if a.is_zero() { return Self::zeros(self.dim); }
        Self {
            dim: self.dim,
            indptr: self.indptr.clone(),
            indices: self.indices.clone(),
            data: self.data.iter().map(|x| *x * a).collect(),
        }
    }

    /// Kronecker product `self ⊗ other`, with `self` as the more significant
    /// factor.
    pub fn kron(&self, other: &Self) -> Self {
        let n = other.dim;
        let dim = self.dim * n;
        let mut indptr: Vec<usize> = Vec::with_capacity(dim + 1);
        let mut indices: Vec<usize> = Vec::with_capacity(self.nnz() * other.nnz());
        let mut data: Vec<C64> = Vec::with_capacity(self.nnz() * other.nnz());
        indptr.push(0);
        for ia in 0..self.dim {
            for ib in 0..n {
                for (ja, a) in self.row(ia) {
                    for (jb, b) in other.row(ib) {
                        indices.push(ja * n + jb);
                        data.push(a * b);
                    }
                }
                indptr.push(indices.len());
            }
        }
        Self { dim, indptr, indices, data }
    }

    /// Sparse matrix product `self · other`.
    ///
    /// *Panics* if the dimensions differ.
    pub fn matmul(&self, other: &Self) -> Self {
        assert_eq!(self.dim, other.dim, "SpOp::matmul: dimension mismatch");
        let rows: Vec<HashMap<usize, C64>>
            = (0..self.dim)
            .map(|i| {
                let mut acc: HashMap<usize, C64> = HashMap::default();
                for (k, a) in self.row(i) {
                    for (j, b) in other.row(k) {
                        *acc.entry(j).or_insert_with(C64::zero) += a * b;
                    }
                }
                acc
            })
            .collect();
        Self::from_rows(self.dim, rows)
    }

    fn combine(&self, other: &Self, sign: f64) -> Self {
        assert_eq!(self.dim, other.dim, "SpOp: dimension mismatch");
        Self::from_triplets(
            self.dim,
            self.triplets()
                .chain(other.triplets().map(|(i, j, x)| (i, j, x * sign))),
        )
    }

    /// Return `true` if `self` equals its own adjoint to within `tol` in every
    /// element.
    pub fn is_hermitian(&self, tol: f64) -> bool {
        self.combine(&self.adjoint(), -1.0).max_abs() <= tol
    }

    /// Operator-vector product `self · psi`.
    pub fn dot_vec<S>(&self, psi: &nd::ArrayBase<S, nd::Ix1>)
        -> nd::Array1<C64>
    where S: nd::Data<Elem = C64>
    {
        assert_eq!(self.dim, psi.len(), "SpOp::dot_vec: dimension mismatch");
        nd::Array1::from_shape_fn(
            self.dim,
            |i| self.row(i).map(|(j, a)| a * psi[j]).sum(),
        )
    }

    /// Sparse-dense product `self · x`.
    pub fn dot_dense(&self, x: &nd::Array2<C64>) -> nd::Array2<C64> {
        assert_eq!(self.dim, x.nrows(), "SpOp::dot_dense: dimension mismatch");
        let mut out: nd::Array2<C64> = nd::Array2::zeros((self.dim, x.ncols()));
        out.axis_iter_mut(nd::Axis(0)).into_par_iter()
            .enumerate()
            .for_each(|(i, mut row)| {
                for (k, a) in self.row(i) {
                    row.scaled_add(a, &x.row(k));
                }
            });
        out
    }

    /// Dense-sparse product `x · self`.
    pub fn dense_dot(&self, x: &nd::Array2<C64>) -> nd::Array2<C64> {
        assert_eq!(self.dim, x.ncols(), "SpOp::dense_dot: dimension mismatch");
        let mut out: nd::Array2<C64> = nd::Array2::zeros((x.nrows(), self.dim));
        out.axis_iter_mut(nd::Axis(0)).into_par_iter()
            .zip(x.axis_iter(nd::Axis(0)).into_par_iter())
            .for_each(|(mut row, xrow)| {
                for (k, xk) in xrow.iter().enumerate() {
                    if xk.is_zero() { continue; }
                    for (j, a) in self.row(k) {
                        row[j] += *xk * a;
                    }
                }
            });
        out
    }

    /// Compute `Tr(x · self)`.
    pub fn expect_dense(&self, x: &nd::Array2<C64>) -> C64 {
        assert_eq!(
            [self.dim; 2], x.shape(), "SpOp::expect_dense: dimension mismatch");
        self.triplets()
            .map(|(i, j, a)| a * x[[j, i]])
            .sum()
    }

    /// Compute `⟨psi| self |psi⟩`.
    pub fn expect_vec<S>(&self, psi: &nd::ArrayBase<S, nd::Ix1>) -> C64
    where S: nd::Data<Elem = C64>
    {
        assert_eq!(self.dim, psi.len(), "SpOp::expect_vec: dimension mismatch");
        (0..self.dim)
            .map(|i| {
                psi[i].conj() * self.row(i).map(|(j, a)| a * psi[j]).sum::<C64>()
            })
            .sum()
    }
}

/// Compute the commutator `[A, B] = A B - B A`.
pub fn commutator(A: &SpOp, B: &SpOp) -> SpOp {
    A.matmul(B).combine(&B.matmul(A), -1.0)
}

impl Add<&SpOp> for &SpOp {
    type Output = SpOp;

    fn add(self, rhs: &SpOp) -> SpOp { self.combine(rhs, 1.0) }
}

impl Add<SpOp> for SpOp {
    type Output = SpOp;

    fn add(self, rhs: SpOp) -> SpOp { self.combine(&rhs, 1.0) }
}

impl AddAssign<&SpOp> for SpOp {
    fn add_assign(&mut self, rhs: &SpOp) {
        *self = self.combine(rhs, 1.0);
    }
}

impl AddAssign<SpOp> for SpOp {
    fn add_assign(&mut self, rhs: SpOp) {
        *self = self.combine(&rhs, 1.0);
    }
}

impl Sub<&SpOp> for &SpOp {
    type Output = SpOp;

    fn sub(self, rhs: &SpOp) -> SpOp { self.combine(rhs, -1.0) }
}

impl Sub<SpOp> for SpOp {
    type Output = SpOp;

    fn sub(self, rhs: SpOp) -> SpOp { self.combine(&rhs, -1.0) }
}

impl Mul<&SpOp> for &SpOp {
    type Output = SpOp;

    fn mul(self, rhs: &SpOp) -> SpOp { self.matmul(rhs) }
}

impl Mul<SpOp> for SpOp {
    type Output = SpOp;

    fn mul(self, rhs: SpOp) -> SpOp { self.matmul(&rhs) }
}

impl Mul<f64> for &SpOp {
    type Output = SpOp;

    fn mul(self, rhs: f64) -> SpOp { self.scale(rhs) }
}

impl Mul<f64> for SpOp {
    type Output = SpOp;

    fn mul(self, rhs: f64) -> SpOp { self.scale(rhs) }
}

impl Mul<C64> for &SpOp {
    type Output = SpOp;

    fn mul(self, rhs: C64) -> SpOp { self.scale(rhs) }
}

impl Mul<C64> for SpOp {
    type Output = SpOp;

    fn mul(self, rhs: C64) -> SpOp { self.scale(rhs) }
}

impl Neg for &SpOp {
    type Output = SpOp;

    fn neg(self) -> SpOp { self.scale(-1.0) }
}
