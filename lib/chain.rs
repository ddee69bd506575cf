//! Elementary lowering operators for every site of the chain.

use crate::{
    error::Result,
    hilbert::{ CompositeSpace, Site, destroy },
    sparse::SpOp,
};

/// The composite space of a chain together with the lowering operator of each
/// of its sites, embedded in the full space.
///
/// Operators are built once and shared by everything downstream (Hamiltonian,
/// jump operators, observables).
#[derive(Clone, Debug)]
pub struct Chain {
    space: CompositeSpace,
    ops: Vec<SpOp>,
}

impl Chain {
    /// Build the operators for a chain of `n_transmons` transmons between two
    /// resonators.
    ///
    /// Fails if either dimension is zero.
    pub fn new(dim_resonator: usize, n_transmons: usize, dim_transmon: usize)
        -> Result<Self>
    {
        let space
            = CompositeSpace::chain(dim_resonator, n_transmons, dim_transmon)?;
        let ops: Vec<SpOp>
            = space.dims().into_iter()
            .enumerate()
            .map(|(k, d)| space.embed(&destroy(d), k))
            .collect();
        Ok(Self { space, ops })
    }

    /// Return a reference to the composite space.
    pub fn space(&self) -> &CompositeSpace { &self.space }

    /// Lowering operators in chain order.
    pub fn ops(&self) -> &[SpOp] { &self.ops }

    /// Consume `self`, returning only the lowering operators.
    pub fn into_ops(self) -> Vec<SpOp> { self.ops }

    /// Lowering operator of the left resonator.
    pub fn left(&self) -> &SpOp { &self.ops[0] }

    /// Lowering operator of the right resonator.
    pub fn right(&self) -> &SpOp { &self.ops[self.ops.len() - 1] }

    /// Lowering operator of a particular site.
    pub fn op(&self, site: Site) -> Option<&SpOp> {
        self.space.index_of(site).map(|k| &self.ops[k])
    }

    /// Number operators `a† a` in chain order.
    pub fn number_ops(&self) -> Vec<SpOp> {
        self.ops.iter()
            .map(|a| a.adjoint().matmul(a))
            .collect()
    }
}

/// Build the lowering operators for a chain of `n_transmons` transmons between
/// two resonators, in the order left resonator, transmons, right resonator.
///
/// If `return_transmons` is `false`, only the left resonator's operator is
/// returned.
pub fn lowering_ops(
    dim_resonator: usize,
    n_transmons: usize,
    dim_transmon: usize,
    return_transmons: bool,
) -> Result<Vec<SpOp>>
{
    let mut ops = Chain::new(dim_resonator, n_transmons, dim_transmon)?
        .into_ops();
    if !return_transmons { ops.truncate(1); }
    Ok(ops)
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_abs_diff_eq;
    use crate::{ error::Error, sparse::commutator };

    #[test]
    fn one_operator_per_site() {
        for n in 1..=3 {
            let ops = lowering_ops(2, n, 2, true).unwrap();
            assert_eq!(ops.len(), n + 2);
            assert!(ops.iter().all(|a| a.dim() == 2_usize.pow(n as u32 + 2)));
        }
        assert_eq!(lowering_ops(3, 0, 2, true).unwrap().len(), 2);
        assert_eq!(lowering_ops(3, 2, 2, false).unwrap().len(), 1);
        assert!(matches!(lowering_ops(0, 2, 2, true), Err(Error::Config(_))));
    }

    #[test]
    fn distinct_sites_commute() {
        let chain = Chain::new(3, 2, 2).unwrap();
        let ops = chain.ops();
        for (i, ai) in ops.iter().enumerate() {
            for (j, aj) in ops.iter().enumerate() {
                if i == j { continue; }
                assert_abs_diff_eq!(
                    commutator(ai, aj).max_abs(), 0.0, epsilon = 1e-12);
                assert_abs_diff_eq!(
                    commutator(ai, &aj.adjoint()).max_abs(), 0.0, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn canonical_commutator_below_truncation() {
        let chain = Chain::new(3, 1, 3).unwrap();
        let a = chain.op(Site::Transmon(0)).unwrap();
        let comm = commutator(a, &a.adjoint());
        let space = chain.space();
        for (idx, occ) in space.occupations().enumerate() {
            let expected = if occ[1] == 2 { -2.0 } else { 1.0 };
            assert_abs_diff_eq!(comm.get(idx, idx).re, expected, epsilon = 1e-12);
        }
    }

    #[test]
    fn site_lookup() {
        let chain = Chain::new(2, 2, 3).unwrap();
        assert_eq!(chain.left(), &chain.ops()[0]);
        assert_eq!(chain.right(), &chain.ops()[3]);
        assert_eq!(chain.op(Site::Transmon(1)), Some(&chain.ops()[2]));
        assert!(chain.op(Site::Transmon(2)).is_none());
        let psi = chain.space().basis_state(&[1, 0, 2, 0]).unwrap();
        let nums: Vec<f64>
            = chain.number_ops().iter()
            .map(|n| n.expect_vec(&psi).re)
            .collect();
        assert_abs_diff_eq!(nums[0], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(nums[2], 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(nums[1], 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(nums[3], 0.0, epsilon = 1e-12);
    }
}
