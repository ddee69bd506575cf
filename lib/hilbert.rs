//! Definitions to describe the sites of the chain and the composite
//! tensor-product space they span.

use itertools::Itertools;
use ndarray as nd;
use num_complex::Complex64 as C64;
use num_traits::{ One, Zero };
use crate::{
    error::{ Error, Result },
    sparse::SpOp,
};

/// Tolerance on `|⟨ψ|ψ⟩ - 1|` for an initial state to count as normalized.
pub const NORM_TOL: f64 = 1e-8;

/// A single element of the chain.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Site {
    LeftResonator,
    /// The `i`-th transmon, counting from the left resonator.
    Transmon(usize),
    RightResonator,
}

impl Site {
    /// Short label, numbering transmons from 1.
    pub fn label(&self) -> String {
        match self {
            Self::LeftResonator => "r1".into(),
            Self::Transmon(i) => format!("t{}", i + 1),
            Self::RightResonator => "rN".into(),
        }
    }
}

/// Ordered collection of sites defining the full tensor-product space.
///
/// Sites are always ordered as left resonator, transmons `0..n`, right
/// resonator, with the first site as the most significant tensor factor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompositeSpace {
    sites: Vec<(Site, usize)>,
}

impl CompositeSpace {
    /// Describe a chain of `n_transmons` transmons between two resonators.
    ///
    /// Fails if either dimension is zero.
    pub fn chain(dim_resonator: usize, n_transmons: usize, dim_transmon: usize)
        -> Result<Self>
    {
        if dim_resonator == 0 || dim_transmon == 0 {
            return Err(Error::config(format!(
                "site dimensions must be positive; got resonator dimension {} \
                and transmon dimension {}",
                dim_resonator, dim_transmon,
            )));
        }
        let sites: Vec<(Site, usize)>
            = [(Site::LeftResonator, dim_resonator)].into_iter()
            .chain((0..n_transmons).map(|i| (Site::Transmon(i), dim_transmon)))
            .chain([(Site::RightResonator, dim_resonator)])
            .collect();
        Ok(Self { sites })
    }

    /// Number of sites.
    pub fn len(&self) -> usize { self.sites.len() }

    /// Always `false`; a chain has at least its two resonators.
    pub fn is_empty(&self) -> bool { self.sites.is_empty() }

    /// Number of transmons.
    pub fn n_transmons(&self) -> usize { self.sites.len() - 2 }

    /// Iterate over the sites in chain order.
    pub fn sites(&self) -> impl Iterator<Item = Site> + '_ {
        self.sites.iter().map(|(s, _)| *s)
    }

    /// Per-site dimensions in chain order.
    pub fn dims(&self) -> Vec<usize> {
        self.sites.iter().map(|(_, d)| *d).collect()
    }

    /// Total dimension of the space.
    pub fn dim(&self) -> usize {
        self.sites.iter().map(|(_, d)| *d).product()
    }

    /// Position of a site in the chain.
    pub fn index_of(&self, site: Site) -> Option<usize> {
        self.sites.iter().position(|(s, _)| *s == site)
    }

    /// Embed a single-site operator acting on the `k`-th site.
    pub fn embed(&self, op: &SpOp, k: usize) -> SpOp {
        embed(op, k, &self.dims())
    }

    /// Iterate over occupation-number labels of all basis states, in the same
    /// order as the basis vectors of the composite space.
    pub fn occupations(&self) -> impl Iterator<Item = Vec<usize>> + '_ {
        self.sites.iter()
            .map(|(_, d)| 0..*d)
            .multi_cartesian_product()
    }

    /// Index of the basis state with the given per-site occupations.
    pub fn basis_index(&self, occupations: &[usize]) -> Result<usize> {
        if occupations.len() != self.len() {
            return Err(Error::config(format!(
                "expected {} occupation numbers, got {}",
                self.len(), occupations.len(),
            )));
        }
        occupations.iter()
            .zip(&self.sites)
            .try_fold(0, |acc, (&n, (site, d))| {
                (n < *d).then_some(acc * d + n)
                    .ok_or_else(|| Error::config(format!(
                        "occupation {} exceeds the truncation of site {}",
                        n, site.label(),
                    )))
            })
    }

    /// State vector of a single basis state `|n_r1, n_t1, ..., n_rN⟩`.
    pub fn basis_state(&self, occupations: &[usize]) -> Result<nd::Array1<C64>> {
        let idx = self.basis_index(occupations)?;
        let mut psi: nd::Array1<C64> = nd::Array1::zeros(self.dim());
        psi[idx] = C64::one();
        Ok(psi)
    }

    /// Check that `psi` is a normalized state vector on this space.
    pub fn check_state<S>(&self, psi: &nd::ArrayBase<S, nd::Ix1>) -> Result<()>
    where S: nd::Data<Elem = C64>
    {
        if psi.len() != self.dim() {
            return Err(Error::DimensionMismatch {
                expected: self.dim(),
                got: psi.len(),
            });
        }
        let norm2: f64 = psi.iter().map(|a| a.norm_sqr()).sum();
        if !norm2.is_finite() || (norm2 - 1.0).abs() > NORM_TOL {
            return Err(Error::config(format!(
                "initial state must be normalized; got ⟨ψ|ψ⟩ = {}", norm2)));
        }
        Ok(())
    }
}

/// Lowering operator on a single site truncated to `dim` levels.
pub fn destroy(dim: usize) -> SpOp {
    SpOp::from_triplets(
        dim,
        (1..dim).map(|n| (n - 1, n, C64::from((n as f64).sqrt()))),
    )
}

/// Identity on a single site truncated to `dim` levels.
pub fn eye(dim: usize) -> SpOp { SpOp::eye(dim) }

/// Embed a single-site operator into the product space of `dims`, acting on the
/// `k`-th factor.
///
/// *Panics* if `k` is out of bounds or `op` does not match `dims[k]`.
pub fn embed(op: &SpOp, k: usize, dims: &[usize]) -> SpOp {
    if k >= dims.len() || op.dim() != dims[k] {
        panic!(
            "embed: operator of dimension {} does not fit factor {} of {:?}",
            op.dim(), k, dims,
        );
    }
    let eyesize1: usize = dims.iter().take(k).product();
    let eyesize2: usize = dims.iter().skip(k + 1).product();
    eye(eyesize1).kron(op).kron(&eye(eyesize2))
}

/// Single-site basis vector `|n⟩` in a `dim`-level space.
///
/// *Panics* if `n >= dim`.
pub fn basis(dim: usize, n: usize) -> nd::Array1<C64> {
    let mut psi: nd::Array1<C64> = nd::Array1::zeros(dim);
    psi[n] = C64::one();
    psi
}

/// Tensor product of single-site kets, first factor most significant.
pub fn product_state<'a, I>(kets: I) -> nd::Array1<C64>
where I: IntoIterator<Item = &'a nd::Array1<C64>>
{
    kets.into_iter()
        .fold(nd::array![C64::one()], |acc, ket| {
            acc.iter()
                .cartesian_product(ket.iter())
                .map(|(a, b)| a * b)
                .collect()
        })
}

/// Outer product `|a⟩⟨b|`.
pub fn outer_prod<S, T>(a: &nd::ArrayBase<S, nd::Ix1>, b: &nd::ArrayBase<T, nd::Ix1>)
    -> nd::Array2<C64>
where
    S: nd::Data<Elem = C64>,
    T: nd::Data<Elem = C64>,
{
    nd::Array2::from_shape_fn((a.len(), b.len()), |(i, j)| a[i] * b[j].conj())
}

/// Normalize a state vector in place, returning its original norm.
///
/// Returns `None` and leaves `psi` untouched if the norm is zero.
pub fn normalize(psi: &mut nd::Array1<C64>) -> Option<f64> {
    let norm: f64 = psi.iter().map(|a| a.norm_sqr()).sum::<f64>().sqrt();
    (!norm.is_zero()).then(|| {
        *psi /= C64::from(norm);
        norm
    })
}
