//! Open-system dynamics of a full chain coupled to two thermal baths.
//!
//! [`simulate`] builds the chain operators, the Hamiltonian and the four bath
//! jump operators, integrates from a pure initial state over an even time
//! grid, and returns the expectation value of each site's number operator,
//! followed by the correlation `a_r1† a_t1 + a_t1† a_r1` between the left
//! resonator and the first transmon.

use ndarray as nd;
use num_complex::Complex64 as C64;
use crate::{
    chain::Chain,
    config::{ ChainConfig, ParamTable, require },
    dynamics::{ HParams, JumpParams, LOperator, hamiltonian, jumps },
    error::{ Error, Result },
    integrate::{ Method, SolverOptions, lindblad, mcwf },
    sparse::SpOp,
};

/// Time grid parameters.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SimParams {
    /// End of the time grid.
    pub T_final: f64,
    /// Number of grid points, including both endpoints.
    pub nsteps: usize,
}

impl SimParams {
    pub const KEYS: [&'static str; 2] = ["T_final", "nsteps"];

    /// Read all parameters from a table.
    ///
    /// Fails if any key is missing or `nsteps` is not a non-negative integer.
    pub fn from_table(table: &ParamTable) -> Result<Self> {
        let T_final = require(table, "T_final")?;
        let nsteps = require(table, "nsteps")?;
        if nsteps < 0.0 || nsteps.fract() != 0.0 || !nsteps.is_finite() {
            return Err(Error::config(format!(
                "'nsteps' must be a non-negative integer; got {}", nsteps)));
        }
        Ok(Self { T_final, nsteps: nsteps as usize })
    }

    /// Return all parameters as a table, keyed as in [`Self::KEYS`].
    pub fn to_table(&self) -> ParamTable {
        Self::KEYS.iter()
            .zip([self.T_final, self.nsteps as f64])
            .map(|(k, v)| (k.to_string(), v))
            .collect()
    }

    /// Fail unless `T_final` is positive and finite and `nsteps >= 2`.
    pub fn validate(&self) -> Result<()> {
        if !(self.T_final.is_finite() && self.T_final > 0.0) {
            return Err(Error::config(format!(
                "T_final must be positive and finite; got {}", self.T_final)));
        }
        if self.nsteps < 2 {
            return Err(Error::config(format!(
                "nsteps must be at least 2; got {}", self.nsteps)));
        }
        Ok(())
    }

    /// Evenly spaced grid of `nsteps` points from 0 to `T_final`, inclusive.
    pub fn time_grid(&self) -> nd::Array1<f64> {
        let mut t: nd::Array1<f64>
            = nd::Array1::linspace(0.0, self.T_final, self.nsteps);
        if let Some(last) = t.iter_mut().next_back() { *last = self.T_final; }
        t
    }
}

/// Build the standard observables for a chain: the number operator of each
/// site in chain order, then the left resonator–first transmon correlation.
///
/// Fails if the chain has no transmons.
pub fn observables(chain: &Chain) -> Result<(Vec<SpOp>, Vec<String>)> {
    if chain.space().n_transmons() == 0 {
        return Err(Error::config(
            "the resonator-transmon correlation needs at least one transmon"));
    }
    let mut ops: Vec<SpOp> = chain.number_ops();
    let mut labels: Vec<String>
        = chain.space().sites()
        .map(|site| format!("{}: a†a", site.label()))
        .collect();
    let a_r1 = &chain.ops()[0];
    let a_t1 = &chain.ops()[1];
    ops.push(a_r1.adjoint().matmul(a_t1) + a_t1.adjoint().matmul(a_r1));
    labels.push("r1-t1 correlation".into());
    Ok((ops, labels))
}

/// Output of a simulation: one expectation trajectory per observable, aligned
/// with the time grid.
#[derive(Clone, Debug, PartialEq)]
pub struct Trajectories {
    pub times: nd::Array1<f64>,
    pub expect: Vec<nd::Array1<f64>>,
    pub labels: Vec<String>,
}

impl Trajectories {
    /// Number of observables.
    pub fn len(&self) -> usize { self.expect.len() }

    /// Return `true` if no observables were requested.
    pub fn is_empty(&self) -> bool { self.expect.is_empty() }

    /// Trajectory of the `i`-th observable.
    pub fn observable(&self, i: usize) -> Option<&nd::Array1<f64>> {
        self.expect.get(i)
    }

    /// Value of each observable at the last grid point.
    pub fn final_values(&self) -> Vec<f64> {
        self.expect.iter()
            .map(|x| x.iter().next_back().copied().unwrap_or(f64::NAN))
            .collect()
    }

    /// All trajectories as a single `observables × time` array.
    pub fn expect_array(&self) -> nd::Array2<f64> {
        nd::Array2::from_shape_fn(
            (self.expect.len(), self.times.len()),
            |(i, k)| self.expect[i][k],
        )
    }
}

/// Simulate a chain with the default [`SolverOptions`].
///
/// See [`simulate_with`].
#[allow(clippy::too_many_arguments)]
pub fn simulate(
    dim_resonator: usize,
    n_transmons: usize,
    dim_transmon: usize,
    H_params: &HParams,
    jumps_params: &JumpParams,
    sim_params: &SimParams,
    psi_0: &nd::Array1<C64>,
    return_obs: bool,
) -> Result<Trajectories>
{
    simulate_with(
        dim_resonator,
        n_transmons,
        dim_transmon,
        H_params,
        jumps_params,
        sim_params,
        psi_0,
        return_obs,
        &SolverOptions::default(),
    )
}

/// Simulate a chain of `n_transmons` transmons between two resonators,
/// starting from the normalized pure state `psi_0`.
///
/// If `return_obs` is `false`, the dynamics are still integrated but no
/// observables are recorded.
///
/// Fails if any parameter is out of its domain, if the chain has no
/// transmons, if `psi_0` has the wrong length or is not normalized, or if the
/// integration fails. No partial results are returned.
#[allow(clippy::too_many_arguments)]
pub fn simulate_with(
    dim_resonator: usize,
    n_transmons: usize,
    dim_transmon: usize,
    H_params: &HParams,
    jumps_params: &JumpParams,
    sim_params: &SimParams,
    psi_0: &nd::Array1<C64>,
    return_obs: bool,
    opts: &SolverOptions,
) -> Result<Trajectories>
{
    sim_params.validate()?;
    opts.validate()?;
    if n_transmons == 0 {
        return Err(Error::config(
            "a chain needs at least one transmon between its resonators"));
    }
    let chain = Chain::new(dim_resonator, n_transmons, dim_transmon)?;
    chain.space().check_state(psi_0)?;

    let H = hamiltonian(chain.ops(), H_params)?;
    let JumpParams { gamma_1, gamma_N, n_h, n_c } = *jumps_params;
    let L = LOperator::new(
        chain.space().dim(),
        jumps(chain.left(), chain.right(), gamma_1, gamma_N, n_h, n_c)?,
    );
    let times = sim_params.time_grid();
    let (obs, labels): (Vec<SpOp>, Vec<String>)
        = if return_obs { observables(&chain)? } else { (Vec::new(), Vec::new()) };

    let x_t: Vec<nd::Array1<f64>> = match opts.method {
        Method::MonteCarlo { ntraj, seed } => {
            let x = |psi: &nd::Array1<C64>| -> nd::Array1<f64> {
                obs.iter().map(|o| o.expect_vec(psi).re).collect()
            };
            mcwf::evolve_reduced(psi_0, &H, &L, &times, x, ntraj, seed, opts)?
        },
        Method::Dopri5 | Method::Rk4 { .. } => {
            let x = |rho: &nd::Array2<C64>| -> nd::Array1<f64> {
                obs.iter().map(|o| o.expect_dense(rho).re).collect()
            };
            lindblad::evolve_pure_reduced(psi_0, &H, &L, &times, x, opts)?
        },
    };

    let expect: Vec<nd::Array1<f64>>
        = (0..obs.len())
        .map(|i| x_t.iter().map(|xk| xk[i]).collect())
        .collect();
    Ok(Trajectories { times, expect, labels })
}

/// Simulate the chain described by a configuration record.
pub fn simulate_config(config: &ChainConfig, psi_0: &nd::Array1<C64>)
    -> Result<Trajectories>
{
    config.validate()?;
    simulate_with(
        config.dim_resonator,
        config.n_transmons,
        config.dim_transmon,
        &config.hamiltonian,
        &config.jumps,
        &config.sim,
        psi_0,
        true,
        &config.solver,
    )
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_abs_diff_eq;
    use crate::hilbert::{ CompositeSpace, basis, product_state };

    fn uniform(w: f64, alpha: f64, g: f64) -> HParams {
        HParams {
            w_r1: w,
            w_rN: w,
            w_t: w,
            alpha_t: alpha,
            g_t: g,
            g_r1_t1: g,
            g_tN_rN: g,
        }
    }

    fn total_excitation(traj: &Trajectories, n_sites: usize) -> nd::Array1<f64> {
        traj.expect.iter().take(n_sites)
            .fold(nd::Array1::zeros(traj.times.len()), |acc, x| acc + x)
    }

    #[test]
    fn time_grid_is_inclusive() {
        let sim = SimParams { T_final: 50.0, nsteps: 200 };
        let t = sim.time_grid();
        assert_eq!(t.len(), 200);
        assert_eq!(t[0], 0.0);
        assert_eq!(t[199], 50.0);
        assert!(SimParams { T_final: 0.0, nsteps: 10 }.validate().is_err());
        assert!(SimParams { T_final: 1.0, nsteps: 1 }.validate().is_err());
    }

    #[test]
    fn single_excitation_decays() {
        let H = uniform(1.0, 0.0, 0.1);
        let J = JumpParams { gamma_1: 0.1, gamma_N: 0.1, n_h: 0.0, n_c: 0.0 };
        let sim = SimParams { T_final: 50.0, nsteps: 200 };
        let psi0 = product_state(&[basis(2, 1), basis(2, 0), basis(2, 0)]);
        let traj = simulate(2, 1, 2, &H, &J, &sim, &psi0, true).unwrap();
        assert_eq!(traj.times.len(), 200);
        assert_eq!(
            traj.labels,
            vec!["r1: a†a", "t1: a†a", "rN: a†a", "r1-t1 correlation"],
        );
        assert_eq!(traj.expect[0][0], 1.0);
        let total = total_excitation(&traj, 3);
        assert!(total.iter().zip(total.iter().skip(1)).all(|(a, b)| *b <= a + 1e-7));
        assert!(total[199] < 0.1);
    }

    #[test]
    fn closed_chain_conserves_excitations() {
        let H = uniform(1.0, 0.2, 0.15);
        let J = JumpParams { gamma_1: 0.0, gamma_N: 0.0, n_h: 0.0, n_c: 0.0 };
        let sim = SimParams { T_final: 30.0, nsteps: 61 };
        let space = CompositeSpace::chain(2, 2, 3).unwrap();
        let psi0 = space.basis_state(&[1, 0, 0, 0]).unwrap();
        let traj = simulate(2, 2, 3, &H, &J, &sim, &psi0, true).unwrap();
        let total = total_excitation(&traj, 4);
        for n in total.iter() {
            assert_abs_diff_eq!(*n, 1.0, epsilon = 1e-6);
        }
        // the excitation actually moves along the chain
        assert!(traj.expect[0].iter().any(|n| *n < 0.9));
    }

    #[test]
    fn trace_is_preserved() {
        let chain = Chain::new(3, 1, 2).unwrap();
        let H = hamiltonian(chain.ops(), &uniform(1.0, 0.1, 0.2)).unwrap();
        let L = LOperator::thermal(
            &chain,
            &JumpParams { gamma_1: 0.3, gamma_N: 0.2, n_h: 0.4, n_c: 0.1 },
        ).unwrap();
        let t = SimParams { T_final: 20.0, nsteps: 21 }.time_grid();
        let psi0 = chain.space().basis_state(&[1, 1, 0]).unwrap();
        let traces = lindblad::evolve_pure_reduced(
            &psi0, &H, &L, &t, |rho| rho.diag().sum(), &SolverOptions::default())
            .unwrap();
        for tr in traces.iter() {
            assert_abs_diff_eq!(tr.re, 1.0, epsilon = 1e-8);
            assert_abs_diff_eq!(tr.im, 0.0, epsilon = 1e-8);
        }
    }

    #[test]
    fn boundaries_thermalize() {
        let H = uniform(1.0, 0.0, 0.01);
        let J = JumpParams { gamma_1: 0.5, gamma_N: 0.5, n_h: 0.2, n_c: 0.05 };
        let sim = SimParams { T_final: 40.0, nsteps: 41 };
        let space = CompositeSpace::chain(4, 1, 2).unwrap();
        let psi0 = space.basis_state(&[0, 0, 0]).unwrap();
        let traj = simulate(4, 1, 2, &H, &J, &sim, &psi0, true).unwrap();
        let fin = traj.final_values();
        assert_abs_diff_eq!(fin[0], 0.2, epsilon = 0.02);
        assert_abs_diff_eq!(fin[2], 0.05, epsilon = 0.01);
        assert!(fin[0] > fin[2]);
    }

    #[test]
    fn runs_are_reproducible() {
        let H = uniform(1.0, 0.1, 0.05);
        let J = JumpParams { gamma_1: 0.2, gamma_N: 0.1, n_h: 0.3, n_c: 0.1 };
        let sim = SimParams { T_final: 10.0, nsteps: 11 };
        let psi0 = CompositeSpace::chain(2, 2, 2).unwrap()
            .basis_state(&[1, 0, 1, 0]).unwrap();
        let a = simulate(2, 2, 2, &H, &J, &sim, &psi0, true).unwrap();
        let b = simulate(2, 2, 2, &H, &J, &sim, &psi0, true).unwrap();
        assert_eq!(a, b);

        let opts = SolverOptions {
            method: Method::MonteCarlo { ntraj: 16, seed: 1234 },
            ..Default::default()
        };
        let a = simulate_with(2, 2, 2, &H, &J, &sim, &psi0, true, &opts).unwrap();
        let b = simulate_with(2, 2, 2, &H, &J, &sim, &psi0, true, &opts).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn methods_agree() {
        let H = uniform(1.0, 0.0, 0.1);
        let J = JumpParams { gamma_1: 0.3, gamma_N: 0.3, n_h: 0.5, n_c: 0.0 };
        let sim = SimParams { T_final: 5.0, nsteps: 6 };
        let psi0 = product_state(&[basis(2, 1), basis(2, 0), basis(2, 0)]);
        let me = simulate(2, 1, 2, &H, &J, &sim, &psi0, true).unwrap();

        let rk4 = SolverOptions {
            method: Method::Rk4 { substeps: 200 },
            ..Default::default()
        };
        let fixed = simulate_with(2, 1, 2, &H, &J, &sim, &psi0, true, &rk4)
            .unwrap();
        for (x, y) in me.expect.iter().zip(&fixed.expect) {
            for (a, b) in x.iter().zip(y) {
                assert_abs_diff_eq!(*a, *b, epsilon = 1e-5);
            }
        }

        let mc = SolverOptions {
            method: Method::MonteCarlo { ntraj: 400, seed: 0 },
            ..Default::default()
        };
        let jumps = simulate_with(2, 1, 2, &H, &J, &sim, &psi0, true, &mc)
            .unwrap();
        assert_eq!(jumps.expect[0][0], 1.0);
        for (x, y) in me.final_values().iter().zip(jumps.final_values()) {
            assert_abs_diff_eq!(*x, y, epsilon = 0.1);
        }
    }

    #[test]
    fn observables_can_be_skipped() {
        let H = uniform(1.0, 0.0, 0.1);
        let J = JumpParams { gamma_1: 0.1, gamma_N: 0.1, n_h: 0.0, n_c: 0.0 };
        let sim = SimParams { T_final: 1.0, nsteps: 5 };
        let psi0 = product_state(&[basis(2, 0), basis(2, 0), basis(2, 0)]);
        let traj = simulate(2, 1, 2, &H, &J, &sim, &psi0, false).unwrap();
        assert!(traj.is_empty());
        assert_eq!(traj.times.len(), 5);
        assert_eq!(traj.expect_array().shape(), &[0, 5]);
    }

    #[test]
    fn invalid_inputs() {
        let H = uniform(1.0, 0.0, 0.1);
        let J = JumpParams { gamma_1: 0.1, gamma_N: 0.1, n_h: 0.0, n_c: 0.0 };
        let sim = SimParams { T_final: 1.0, nsteps: 5 };
        let psi0 = product_state(&[basis(2, 1), basis(2, 0), basis(2, 0)]);

        let bare = product_state(&[basis(2, 1), basis(2, 0)]);
        assert!(matches!(
            simulate(2, 0, 2, &H, &J, &sim, &bare, true),
            Err(Error::Config(_)),
        ));
        assert!(matches!(
            simulate(2, 2, 2, &H, &J, &sim, &psi0, true),
            Err(Error::DimensionMismatch { expected: 16, got: 8 }),
        ));
        let unnormalized = &psi0 * C64::from(1.1);
        assert!(matches!(
            simulate(2, 1, 2, &H, &J, &sim, &unnormalized, true),
            Err(Error::Config(_)),
        ));
        let short = SimParams { nsteps: 1, ..sim };
        assert!(matches!(
            simulate(2, 1, 2, &H, &J, &short, &psi0, true),
            Err(Error::Config(_)),
        ));
        let negative = JumpParams { gamma_N: -0.1, ..J };
        assert!(matches!(
            simulate(2, 1, 2, &H, &negative, &sim, &psi0, true),
            Err(Error::Config(_)),
        ));
    }

    #[test]
    fn unstable_fixed_step_is_an_error() {
        let H = uniform(1.0, 0.0, 0.1);
        let J = JumpParams { gamma_1: 10.0, gamma_N: 10.0, n_h: 0.0, n_c: 0.0 };
        let sim = SimParams { T_final: 10.0, nsteps: 11 };
        let psi0 = product_state(&[basis(2, 1), basis(2, 0), basis(2, 0)]);
        let coarse = SolverOptions {
            method: Method::Rk4 { substeps: 1 },
            ..Default::default()
        };
        assert!(matches!(
            simulate_with(2, 1, 2, &H, &J, &sim, &psi0, true, &coarse),
            Err(Error::Integration(_)),
        ));
        // the same run with enough substeps stays physical
        let fine = SolverOptions {
            method: Method::Rk4 { substeps: 200 },
            ..Default::default()
        };
        let traj = simulate_with(2, 1, 2, &H, &J, &sim, &psi0, true, &fine)
            .unwrap();
        assert!(traj.observable(0).unwrap().iter().all(|n| *n > -1e-9 && *n < 1.0 + 1e-9));
    }

    #[test]
    fn run_from_config() {
        let config = ChainConfig {
            dim_resonator: 2,
            n_transmons: 1,
            dim_transmon: 2,
            sim: SimParams { T_final: 2.0, nsteps: 3 },
            ..Default::default()
        };
        let psi0 = CompositeSpace::chain(2, 1, 2).unwrap()
            .basis_state(&[0, 0, 0]).unwrap();
        let traj = simulate_config(&config, &psi0).unwrap();
        assert_eq!(traj.len(), 4);
        assert_eq!(traj.expect_array().shape(), &[4, 3]);
        assert!(traj.observable(4).is_none());
        // the hot bath starts populating the left resonator
        assert!(traj.observable(0).unwrap()[2] > 0.0);
    }
}
