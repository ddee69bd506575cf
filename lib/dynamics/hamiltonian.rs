//! Hamiltonian of a resonator–transmon–…–transmon–resonator chain.
//!
//! See also [`lindbladian`][super::lindbladian].

use crate::{
    config::{ ParamTable, require },
    error::{ Error, Result },
    sparse::SpOp,
};

/// Scalar parameters of the chain Hamiltonian, in units of angular frequency.
///
/// Transmon frequencies, anharmonicities and transmon–transmon couplings are
/// uniform along the chain.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct HParams {
    /// Left resonator frequency.
    pub w_r1: f64,
    /// Right resonator frequency.
    pub w_rN: f64,
    /// Transmon frequency.
    pub w_t: f64,
    /// Transmon anharmonicity.
    pub alpha_t: f64,
    /// Nearest-neighbor transmon–transmon coupling.
    pub g_t: f64,
    /// Left resonator–first transmon coupling.
    pub g_r1_t1: f64,
    /// Last transmon–right resonator coupling.
    pub g_tN_rN: f64,
}

impl HParams {
    pub const KEYS: [&'static str; 7]
        = ["w_r1", "w_rN", "w_t", "alpha_t", "g_t", "g_r1_t1", "g_tN_rN"];

    /// Read all parameters from a table.
    ///
    /// Fails if any key is missing.
    pub fn from_table(table: &ParamTable) -> Result<Self> {
        Ok(Self {
            w_r1: require(table, "w_r1")?,
            w_rN: require(table, "w_rN")?,
            w_t: require(table, "w_t")?,
            alpha_t: require(table, "alpha_t")?,
            g_t: require(table, "g_t")?,
            g_r1_t1: require(table, "g_r1_t1")?,
            g_tN_rN: require(table, "g_tN_rN")?,
        })
    }

    /// Return all parameters as a table, keyed as in [`Self::KEYS`].
    pub fn to_table(&self) -> ParamTable {
        Self::KEYS.iter()
            .zip(self.values())
            .map(|(k, v)| (k.to_string(), v))
            .collect()
    }

    fn values(&self) -> [f64; 7] {
        [
            self.w_r1,
            self.w_rN,
            self.w_t,
            self.alpha_t,
            self.g_t,
            self.g_r1_t1,
            self.g_tN_rN,
        ]
    }

    /// Fail if any parameter is not finite.
    pub fn validate(&self) -> Result<()> {
        Self::KEYS.iter()
            .zip(self.values())
            .try_for_each(|(k, v)| {
                v.is_finite().then_some(())
                    .ok_or_else(|| Error::config(format!(
                        "Hamiltonian parameter '{}' must be finite; got {}",
                        k, v,
                    )))
            })
    }
}

/// Hamiltonian builder for a chain of lowering operators.
///
/// The operators must be in chain order (left resonator, transmons, right
/// resonator) and include at least one transmon. This builder produces
/// ```math
/// \begin{align*}
///     H
///         &= \omega_{r_1} n_{r_1} + \omega_{r_N} n_{r_N}
///         \\
///         &+ \sum_i \left[
///             \omega_t n_{t_i} - \frac{\alpha_t}{2} a_{t_i}^\dagger a_{t_i}^\dagger a_{t_i} a_{t_i}
///         \right]
///         \\
///         &+ g_{r_1 t_1} (a_{r_1} a_{t_1}^\dagger + a_{r_1}^\dagger a_{t_1})
///         + g_t \sum_i (a_{t_i} a_{t_{i+1}}^\dagger + a_{t_i}^\dagger a_{t_{i+1}})
///         + g_{t_N r_N} (a_{t_N} a_{r_N}^\dagger + a_{t_N}^\dagger a_{r_N})
/// \end{align*}
/// ```
#[derive(Clone, Debug)]
pub struct HBuilderChain<'a> {
    a_r1: &'a SpOp,
    a_ts: &'a [SpOp],
    a_rN: &'a SpOp,
    params: HParams,
}

impl<'a> HBuilderChain<'a> {
    /// Create a new `HBuilderChain`.
    ///
    /// Fails if the chain has no transmons (including the single-operator
    /// sequence produced by [`lowering_ops`][crate::chain::lowering_ops] with
    /// `return_transmons = false`), or if any parameter is not finite.
    pub fn new(ops: &'a [SpOp], params: HParams) -> Result<Self> {
        params.validate()?;
        match ops {
            [a_r1, a_ts @ .., a_rN] if !a_ts.is_empty() => {
                if ops.iter().any(|a| a.dim() != a_r1.dim()) {
                    return Err(Error::config(
                        "chain operators act on spaces of different dimension"));
                }
                Ok(Self { a_r1, a_ts, a_rN, params })
            },
            _ => Err(Error::config(format!(
                "the Hamiltonian needs a resonator, at least one transmon, and \
                a resonator; got {} operator(s)",
                ops.len(),
            ))),
        }
    }

    /// Return the model parameters.
    pub fn params(&self) -> HParams { self.params }

    fn number(a: &SpOp) -> SpOp { a.adjoint().matmul(a) }

    // a b† + a† b
    fn hop(a: &SpOp, b: &SpOp) -> SpOp {
        a.matmul(&b.adjoint()) + a.adjoint().matmul(b)
    }

    /// Build the Hamiltonian.
    pub fn build(&self) -> SpOp {
        let HParams { w_r1, w_rN, w_t, alpha_t, g_t, g_r1_t1, g_tN_rN }
            = self.params;
        let n_t = self.a_ts.len();

        let mut H: SpOp = Self::number(self.a_r1) * w_r1;
        H += Self::hop(self.a_r1, &self.a_ts[0]) * g_r1_t1;
        for (i, a_t) in self.a_ts.iter().enumerate() {
            let a_t_dag = a_t.adjoint();
            let n = a_t_dag.matmul(a_t);
            H += &n * w_t;
            H += a_t_dag.matmul(&n).matmul(a_t) * (-alpha_t / 2.0);
            if let Some(a_next) = self.a_ts.get(i + 1) {
                H += Self::hop(a_t, a_next) * g_t;
            }
        }
        H += Self::hop(&self.a_ts[n_t - 1], self.a_rN) * g_tN_rN;
        H += Self::number(self.a_rN) * w_rN;
        H
    }
}

/// Build the chain Hamiltonian from lowering operators in chain order.
///
/// See [`HBuilderChain`].
pub fn hamiltonian(ops: &[SpOp], params: &HParams) -> Result<SpOp> {
    Ok(HBuilderChain::new(ops, *params)?.build())
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_abs_diff_eq;
    use crate::chain::{ Chain, lowering_ops };

    fn params() -> HParams {
        HParams {
            w_r1: 1.1,
            w_rN: 0.9,
            w_t: 1.0,
            alpha_t: 0.3,
            g_t: 0.05,
            g_r1_t1: 0.1,
            g_tN_rN: 0.07,
        }
    }

    #[test]
    fn hermitian() {
        for (d, n) in [(2, 1), (3, 2), (2, 3)] {
            let ops = lowering_ops(d, n, d, true).unwrap();
            let H = hamiltonian(&ops, &params()).unwrap();
            assert!(H.is_hermitian(1e-10));
        }
    }

    #[test]
    fn anharmonicity_shifts_double_occupation() {
        let chain = Chain::new(2, 1, 3).unwrap();
        let p = HParams { g_t: 0.0, g_r1_t1: 0.0, g_tN_rN: 0.0, ..params() };
        let H = hamiltonian(chain.ops(), &p).unwrap();
        let psi = chain.space().basis_state(&[1, 2, 1]).unwrap();
        let energy = H.expect_vec(&psi).re;
        let expected = p.w_r1 + 2.0 * p.w_t - p.alpha_t + p.w_rN;
        assert_abs_diff_eq!(energy, expected, epsilon = 1e-12);
    }

    #[test]
    fn couplings_follow_the_path_graph() {
        let chain = Chain::new(2, 2, 2).unwrap();
        let H = hamiltonian(chain.ops(), &params()).unwrap();
        let space = chain.space();
        let idx = |occ: &[usize]| space.basis_index(occ).unwrap();
        let r1 = idx(&[1, 0, 0, 0]);
        let t1 = idx(&[0, 1, 0, 0]);
        let t2 = idx(&[0, 0, 1, 0]);
        let rN = idx(&[0, 0, 0, 1]);
        assert_abs_diff_eq!(H.get(r1, t1).re, 0.1, epsilon = 1e-12);
        assert_abs_diff_eq!(H.get(t1, t2).re, 0.05, epsilon = 1e-12);
        assert_abs_diff_eq!(H.get(t2, rN).re, 0.07, epsilon = 1e-12);
        assert_eq!(H.get(r1, rN).norm(), 0.0);
        assert_eq!(H.get(r1, t2).norm(), 0.0);
    }

    #[test]
    fn incomplete_chains_are_rejected() {
        let reduced = lowering_ops(2, 2, 2, false).unwrap();
        assert!(matches!(
            hamiltonian(&reduced, &params()), Err(Error::Config(_))));
        let bare = lowering_ops(2, 0, 2, true).unwrap();
        assert!(matches!(
            hamiltonian(&bare, &params()), Err(Error::Config(_))));
    }

    #[test]
    fn missing_key_is_a_config_error() {
        let mut table = params().to_table();
        assert_eq!(HParams::from_table(&table).unwrap(), params());
        table.shift_remove("g_tN_rN");
        let err = HParams::from_table(&table).unwrap_err();
        assert!(matches!(err, Error::Config(msg) if msg.contains("g_tN_rN")));
    }
}
