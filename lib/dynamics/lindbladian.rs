//! Thermal baths attached to the two boundary resonators.
//!
//! See also [`hamiltonian`][super::hamiltonian].

use ndarray as nd;
use num_complex::Complex64 as C64;
use crate::{
    chain::Chain,
    config::{ ParamTable, require },
    error::{ Error, Result },
    sparse::SpOp,
};

/// Bath coupling parameters.
///
/// `n_h` and `n_c` are the mean thermal occupations of the baths attached to
/// the left (hot) and right (cold) resonators; see
/// [`bose_einstein`][crate::config::bose_einstein].
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct JumpParams {
    /// Left resonator damping rate.
    pub gamma_1: f64,
    /// Right resonator damping rate.
    pub gamma_N: f64,
    /// Left bath occupation.
    pub n_h: f64,
    /// Right bath occupation.
    pub n_c: f64,
}

impl JumpParams {
    pub const KEYS: [&'static str; 4] = ["gamma_1", "gamma_N", "n_h", "n_c"];

    /// Read all parameters from a table.
    ///
    /// Fails if any key is missing.
    pub fn from_table(table: &ParamTable) -> Result<Self> {
        Ok(Self {
            gamma_1: require(table, "gamma_1")?,
            gamma_N: require(table, "gamma_N")?,
            n_h: require(table, "n_h")?,
            n_c: require(table, "n_c")?,
        })
    }

    /// Return all parameters as a table, keyed as in [`Self::KEYS`].
    pub fn to_table(&self) -> ParamTable {
        Self::KEYS.iter()
            .zip([self.gamma_1, self.gamma_N, self.n_h, self.n_c])
            .map(|(k, v)| (k.to_string(), v))
            .collect()
    }

    /// Fail if any rate or occupation is negative or not finite.
    pub fn validate(&self) -> Result<()> {
        check_rate("gamma_1", self.gamma_1)?;
        check_rate("gamma_N", self.gamma_N)?;
        check_rate("n_h", self.n_h)?;
        check_rate("n_c", self.n_c)?;
        Ok(())
    }
}

fn check_rate(name: &str, x: f64) -> Result<()> {
    if x.is_finite() && x >= 0.0 {
        Ok(())
    } else {
        Err(Error::config(format!(
            "'{}' must be finite and non-negative; got {}", name, x)))
    }
}

/// Construct the four jump operators for the boundary baths, in the order
/// decay and excitation of the left resonator, then decay and excitation of
/// the right resonator:
/// ```text
/// b_r1     = sqrt(gamma_1 (n_r1 + 1)) a_r1
/// b_r1_dag = sqrt(gamma_1 n_r1) a_r1†
/// b_rN     = sqrt(gamma_N (n_rN + 1)) a_rN
/// b_rN_dag = sqrt(gamma_N n_rN) a_rN†
/// ```
///
/// Fails if any rate or occupation is negative or not finite.
pub fn jumps(
    a_r1: &SpOp,
    a_rN: &SpOp,
    gamma_1: f64,
    gamma_N: f64,
    n_r1: f64,
    n_rN: f64,
) -> Result<[SpOp; 4]>
{
    JumpParams { gamma_1, gamma_N, n_h: n_r1, n_c: n_rN }.validate()?;
    Ok([
        a_r1 * (gamma_1 * (n_r1 + 1.0)).sqrt(),
        a_r1.adjoint() * (gamma_1 * n_r1).sqrt(),
        a_rN * (gamma_N * (n_rN + 1.0)).sqrt(),
        a_rN.adjoint() * (gamma_N * n_rN).sqrt(),
    ])
}

/// Dissipative part of the Lindblad equation for an arbitrary set of jump
/// operators `L_k`:
/// ```text
/// D(ρ) = Σ_k (L_k ρ L_k† - {L_k† L_k, ρ} / 2)
/// ```
#[derive(Clone, Debug)]
pub struct LOperator {
    jumps: Vec<SpOp>,
    jumps_dag: Vec<SpOp>,
    decay: SpOp,
}

impl LOperator {
    /// Create a new `LOperator` on a `dim`-dimensional space.
    ///
    /// Jump operators that are identically zero are dropped.
    ///
    /// *Panics* if any operator does not have dimension `dim`.
    pub fn new<I>(dim: usize, jumps: I) -> Self
    where I: IntoIterator<Item = SpOp>
    {
        let jumps: Vec<SpOp>
            = jumps.into_iter()
            .inspect(|l| {
                if l.dim() != dim {
                    panic!(
                        "LOperator::new: jump operator of dimension {} on a \
                        space of dimension {}",
                        l.dim(), dim,
                    );
                }
            })
            .filter(|l| l.nnz() > 0)
            .collect();
        let jumps_dag: Vec<SpOp> = jumps.iter().map(SpOp::adjoint).collect();
        let decay: SpOp
            = jumps.iter().zip(&jumps_dag)
            .fold(SpOp::zeros(dim), |acc, (l, l_dag)| acc + l_dag.matmul(l));
        Self { jumps, jumps_dag, decay }
    }

    /// Create a new `LOperator` for the boundary baths of a chain.
    pub fn thermal(chain: &Chain, params: &JumpParams) -> Result<Self> {
        let JumpParams { gamma_1, gamma_N, n_h, n_c } = *params;
        let ops = jumps(chain.left(), chain.right(), gamma_1, gamma_N, n_h, n_c)?;
        Ok(Self::new(chain.space().dim(), ops))
    }

    /// Return the non-zero jump operators.
    pub fn jumps(&self) -> &[SpOp] { &self.jumps }

    /// Return the adjoints of [`Self::jumps`], in the same order.
    pub fn jumps_dag(&self) -> &[SpOp] { &self.jumps_dag }

    /// Return `Σ_k L_k† L_k`.
    pub fn decay_op(&self) -> &SpOp { &self.decay }

    /// Compute the effective non-Hermitian Hamiltonian
    /// `H - (i/2) Σ_k L_k† L_k` that generates evolution between jumps.
    pub fn h_eff(&self, H: &SpOp) -> SpOp {
        H - &(&self.decay * C64::new(0.0, 0.5))
    }

    /// Compute the recycling term `Σ_k L_k ρ L_k†`.
    pub fn jump_term(&self, rho: &nd::Array2<C64>) -> nd::Array2<C64> {
        let mut J: nd::Array2<C64> = nd::Array2::zeros(rho.raw_dim());
        for (l, l_dag) in self.jumps.iter().zip(&self.jumps_dag) {
            J += &l_dag.dense_dot(&l.dot_dense(rho));
        }
        J
    }

    /// Perform the operator action on a density matrix.
    pub fn op(&self, rho: &nd::Array2<C64>) -> nd::Array2<C64> {
        let anti = self.decay.dot_dense(rho) + self.decay.dense_dot(rho);
        self.jump_term(rho) - anti * 0.5
    }
}
