//! Evolution functions for the Lindblad equation.

use super::*;
use crate::{
    dynamics::LOperator,
    hilbert::outer_prod,
    sparse::SpOp,
};

/// Right-hand side of the Lindblad equation,
/// `-i [H, ρ] + Σ_k (L_k ρ L_k† - {L_k† L_k, ρ} / 2)`.
pub fn rhs(H: &SpOp, L: &LOperator, rho: &nd::Array2<C64>) -> nd::Array2<C64> {
    (H.dot_dense(rho) - H.dense_dot(rho)) * (-C64::i()) + L.op(rho)
}

// same as `rhs`, but with the anticommutator folded into the effective
// Hamiltonian to save two sparse-dense products per evaluation
fn rhs_eff(
    h_eff: &SpOp,
    h_eff_dag: &SpOp,
    L: &LOperator,
    rho: &nd::Array2<C64>,
) -> nd::Array2<C64>
{
    (h_eff.dot_dense(rho) - h_eff_dag.dense_dot(rho)) * (-C64::i())
        + L.jump_term(rho)
}

fn check_dims(H: &SpOp, L: &LOperator) -> Result<()> {
    if L.decay_op().dim() != H.dim() {
        return Err(Error::DimensionMismatch {
            expected: H.dim(),
            got: L.decay_op().dim(),
        });
    }
    Ok(())
}

/// Numerically integrate the Lindblad equation for a time-independent
/// Hamiltonian with reduced integration output.
///
/// Fails if `rho0` does not match the dimension of `H`, or if the integration
/// fails. [`Method::MonteCarlo`] is not supported here; see
/// [`mcwf::evolve_reduced`][super::mcwf::evolve_reduced].
pub fn evolve_reduced<X, T>(
    rho0: &nd::Array2<C64>,
    H: &SpOp,
    L: &LOperator,
    t: &nd::Array1<f64>,
    x: X,
    opts: &SolverOptions,
) -> Result<Vec<T>>
where X: Fn(&nd::Array2<C64>) -> T
{
    check_dims(H, L)?;
    if rho0.shape() != [H.dim(); 2] {
        return Err(Error::DimensionMismatch {
            expected: H.dim(),
            got: rho0.nrows().max(rho0.ncols()),
        });
    }
    let h_eff = L.h_eff(H);
    let h_eff_dag = h_eff.adjoint();
    do_evolve_reduced(
        rho0, |rho| rhs_eff(&h_eff, &h_eff_dag, L, rho), t, x, opts)
}

/// Like [`evolve_reduced`], but starting from the pure state `|psi0⟩⟨psi0|`.
pub fn evolve_pure_reduced<X, T>(
    psi0: &nd::Array1<C64>,
    H: &SpOp,
    L: &LOperator,
    t: &nd::Array1<f64>,
    x: X,
    opts: &SolverOptions,
) -> Result<Vec<T>>
where X: Fn(&nd::Array2<C64>) -> T
{
    if psi0.len() != H.dim() {
        return Err(Error::DimensionMismatch { expected: H.dim(), got: psi0.len() });
    }
    evolve_reduced(&outer_prod(psi0, psi0), H, L, t, x, opts)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::hilbert::{ basis, destroy };
    use approx::assert_abs_diff_eq;

    #[test]
    fn folded_rhs_matches_plain_rhs() {
        let a = destroy(3);
        let H = a.adjoint().matmul(&a) * 1.3 + (&a + &a.adjoint()) * 0.2;
        let L = LOperator::new(3, [&a * 0.3, a.adjoint() * 0.1]);
        let rho: nd::Array2<C64>
            = nd::Array2::from_shape_fn((3, 3), |(i, j)| {
                C64::new(0.1 * (i + j) as f64, 0.05 * (i as f64 - j as f64))
            });
        let h_eff = L.h_eff(&H);
        let diff = rhs(&H, &L, &rho) - rhs_eff(&h_eff, &h_eff.adjoint(), &L, &rho);
        assert_abs_diff_eq!(
            diff.iter().map(|e| e.norm()).fold(0.0, f64::max),
            0.0,
            epsilon = 1e-14,
        );
    }

    #[test]
    fn two_level_decay() {
        let gamma: f64 = 0.4;
        let a = destroy(2);
        let H = a.adjoint().matmul(&a);
        let L = LOperator::new(2, [&a * gamma.sqrt()]);
        let t: nd::Array1<f64> = nd::Array1::linspace(0.0, 5.0, 11);
        let opts = SolverOptions::default();
        let n = a.adjoint().matmul(&a);
        let pops = evolve_pure_reduced(
            &basis(2, 1), &H, &L, &t, |rho| n.expect_dense(rho).re, &opts)
            .unwrap();
        for (tk, pk) in t.iter().zip(&pops) {
            assert_abs_diff_eq!(*pk, (-gamma * tk).exp(), epsilon = 1e-5);
        }
    }

    #[test]
    fn mismatched_state() {
        let a = destroy(2);
        let H = a.adjoint().matmul(&a);
        let L = LOperator::new(2, [a.clone()]);
        let t: nd::Array1<f64> = nd::Array1::linspace(0.0, 1.0, 3);
        let res = evolve_pure_reduced(
            &basis(3, 0), &H, &L, &t, |_| (), &SolverOptions::default());
        assert!(matches!(
            res, Err(Error::DimensionMismatch { expected: 2, got: 3 })));
    }
}
