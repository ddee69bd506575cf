//! Parameter tables and TOML configuration for a complete chain run.
//!
//! A configuration file looks like
//! ```toml
//! [chain]
//! dim_resonator = 4
//! n_transmons = 3
//! dim_transmon = 4
//!
//! [hamiltonian]
//! w_r1 = 5.0
//! w_rN = 5.0
//! w_t = 5.0
//! alpha_t = 0.1
//! g_t = 0.02
//! g_r1_t1 = 0.02
//! g_tN_rN = 0.02
//!
//! [jumps]
//! gamma_1 = 0.0795774715459477
//! gamma_N = 0.0795774715459477
//! # n_h and n_c may be given here directly, or derived from [baths]
//!
//! [baths]
//! omega = 5.0
//! omega_h = 3.0
//! omega_c = 2.0
//!
//! [sim]
//! T_final = 10000.0
//! nsteps = 1000
//!
//! [solver] # optional
//! method = "dopri5" # or "rk4", "montecarlo"
//! rtol = 1e-6
//! atol = 1e-8
//! ```

use std::{ f64::consts::TAU, path::Path };
use indexmap::IndexMap;
use crate::{
    dynamics::{ HParams, JumpParams },
    error::{ Error, Result },
    integrate::{ Method, SolverOptions },
    simulate::SimParams,
};

/// Named scalar parameters, in insertion order.
pub type ParamTable = IndexMap<String, f64>;

/// Look up a required key.
pub(crate) fn require(table: &ParamTable, key: &str) -> Result<f64> {
    table.get(key).copied()
        .ok_or_else(|| Error::config(format!("missing parameter '{}'", key)))
}

/// Mean occupation `1 / (exp(omega / omega_bath) - 1)` of a bosonic mode of
/// frequency `omega` in contact with a bath whose temperature is expressed as
/// the frequency `omega_bath`.
///
/// Fails unless `omega / omega_bath` is positive and finite.
pub fn bose_einstein(omega: f64, omega_bath: f64) -> Result<f64> {
    let x = omega / omega_bath;
    if x.is_finite() && x > 0.0 {
        Ok(x.exp_m1().recip())
    } else {
        Err(Error::config(format!(
            "Bose-Einstein occupation requires omega / omega_bath > 0; got \
            {} / {}",
            omega, omega_bath,
        )))
    }
}

fn section<'a>(root: &'a toml::Table, name: &str) -> Result<Option<&'a toml::Table>> {
    root.get(name)
        .map(|v| {
            v.as_table()
                .ok_or_else(|| Error::config(format!(
                    "'{}' must be a table", name)))
        })
        .transpose()
}

fn required_section<'a>(root: &'a toml::Table, name: &str) -> Result<&'a toml::Table> {
    section(root, name)?
        .ok_or_else(|| Error::config(format!("missing section [{}]", name)))
}

fn as_number(section: &str, key: &str, value: &toml::Value) -> Result<f64> {
    match value {
        toml::Value::Float(x) => Ok(*x),
        toml::Value::Integer(n) => Ok(*n as f64),
        _ => Err(Error::config(format!(
            "[{}] '{}' must be a number", section, key))),
    }
}

fn as_count(section: &str, key: &str, value: &toml::Value) -> Result<usize> {
    value.as_integer()
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| Error::config(format!(
            "[{}] '{}' must be a non-negative integer", section, key)))
}

/// Convert a TOML table of numbers into a [`ParamTable`].
fn param_table(name: &str, table: &toml::Table) -> Result<ParamTable> {
    table.iter()
        .map(|(k, v)| Ok((k.clone(), as_number(name, k, v)?)))
        .collect()
}

/// All parameters needed for a run of
/// [`simulate_config`][crate::simulate::simulate_config].
#[derive(Clone, Debug, PartialEq)]
pub struct ChainConfig {
    pub dim_resonator: usize,
    pub n_transmons: usize,
    pub dim_transmon: usize,
    pub hamiltonian: HParams,
    pub jumps: JumpParams,
    pub sim: SimParams,
    pub solver: SolverOptions,
}

impl Default for ChainConfig {
    /// Three 4-level transmons between two 4-level resonators, all at
    /// frequency 5, with bath temperatures 3 (hot) and 2 (cold) in the same
    /// units.
    fn default() -> Self {
        let omega = 5.0;
        let g = 0.02;
        let gamma = 0.5 / TAU;
        Self {
            dim_resonator: 4,
            n_transmons: 3,
            dim_transmon: 4,
            hamiltonian: HParams {
                w_r1: omega,
                w_rN: omega,
                w_t: omega,
                alpha_t: 0.1,
                g_t: g,
                g_r1_t1: g,
                g_tN_rN: g,
            },
            jumps: JumpParams {
                gamma_1: gamma,
                gamma_N: gamma,
                n_h: (omega / 3.0_f64).exp_m1().recip(),
                n_c: (omega / 2.0_f64).exp_m1().recip(),
            },
            sim: SimParams { T_final: 10000.0, nsteps: 1000 },
            solver: SolverOptions::default(),
        }
    }
}

impl ChainConfig {
    /// Parse a configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let root: toml::Table = s.parse()?;

        let chain = required_section(&root, "chain")?;
        let count = |key: &str| -> Result<usize> {
            chain.get(key)
                .ok_or_else(|| Error::config(format!(
                    "missing parameter '{}' in [chain]", key)))
                .and_then(|v| as_count("chain", key, v))
        };
        let dim_resonator = count("dim_resonator")?;
        let n_transmons = count("n_transmons")?;
        let dim_transmon = count("dim_transmon")?;

        let hamiltonian = HParams::from_table(
            &param_table("hamiltonian", required_section(&root, "hamiltonian")?)?)?;

        let mut jumps_table
            = param_table("jumps", required_section(&root, "jumps")?)?;
        if let Some(baths) = section(&root, "baths")? {
            let baths = param_table("baths", baths)?;
            let omega = require(&baths, "omega")?;
            if !jumps_table.contains_key("n_h") {
                let n_h = bose_einstein(omega, require(&baths, "omega_h")?)?;
                jumps_table.insert("n_h".into(), n_h);
            }
            if !jumps_table.contains_key("n_c") {
                let n_c = bose_einstein(omega, require(&baths, "omega_c")?)?;
                jumps_table.insert("n_c".into(), n_c);
            }
        }
        let jumps = JumpParams::from_table(&jumps_table)?;

        let sim = SimParams::from_table(
            &param_table("sim", required_section(&root, "sim")?)?)?;

        let solver = section(&root, "solver")?
            .map(solver_options)
            .transpose()?
            .unwrap_or_default();

        let config = Self {
            dim_resonator,
            n_transmons,
            dim_transmon,
            hamiltonian,
            jumps,
            sim,
            solver,
        };
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let s = std::fs::read_to_string(path)?;
        Self::from_toml_str(&s)
    }

    /// Check every parameter record.
    pub fn validate(&self) -> Result<()> {
        if self.dim_resonator == 0 || self.dim_transmon == 0 {
            return Err(Error::config("site dimensions must be positive"));
        }
        self.hamiltonian.validate()?;
        self.jumps.validate()?;
        self.sim.validate()?;
        self.solver.validate()?;
        self.dim()?;
        Ok(())
    }

    /// Total dimension of the chain's Hilbert space.
    ///
    /// Fails if the dimension does not fit in a `usize`.
    pub fn dim(&self) -> Result<usize> {
        u32::try_from(self.n_transmons).ok()
            .and_then(|n| self.dim_transmon.checked_pow(n))
            .zip(self.dim_resonator.checked_pow(2))
            .and_then(|(d_t, d_r)| d_t.checked_mul(d_r))
            .ok_or_else(|| Error::config(format!(
                "Hilbert space of {} transmon(s) with dimension {} between \
                resonators of dimension {} is too large",
                self.n_transmons, self.dim_transmon, self.dim_resonator,
            )))
    }

    /// Render the configuration as a TOML table with the same layout accepted
    /// by [`Self::from_toml_str`] (with `n_h` and `n_c` given explicitly).
    pub fn to_table(&self) -> toml::Table {
        fn float_table(params: ParamTable) -> toml::Value {
            toml::Value::Table(
                params.into_iter()
                    .map(|(k, v)| (k, toml::Value::Float(v)))
                    .collect()
            )
        }

        let mut chain = toml::Table::new();
        chain.insert("dim_resonator".into(), (self.dim_resonator as i64).into());
        chain.insert("n_transmons".into(), (self.n_transmons as i64).into());
        chain.insert("dim_transmon".into(), (self.dim_transmon as i64).into());

        let mut sim = toml::Table::new();
        sim.insert("T_final".into(), self.sim.T_final.into());
        sim.insert("nsteps".into(), (self.sim.nsteps as i64).into());

        let mut root = toml::Table::new();
        root.insert("chain".into(), toml::Value::Table(chain));
        root.insert("hamiltonian".into(), float_table(self.hamiltonian.to_table()));
        root.insert("jumps".into(), float_table(self.jumps.to_table()));
        root.insert("sim".into(), toml::Value::Table(sim));
        root.insert("solver".into(), toml::Value::Table(solver_table(&self.solver)));
        root
    }
}

fn solver_options(table: &toml::Table) -> Result<SolverOptions> {
    let mut opts = SolverOptions::default();
    let number = |key: &str| -> Result<Option<f64>> {
        table.get(key).map(|v| as_number("solver", key, v)).transpose()
    };
    let count = |key: &str| -> Result<Option<usize>> {
        table.get(key).map(|v| as_count("solver", key, v)).transpose()
    };
    if let Some(rtol) = number("rtol")? { opts.rtol = rtol; }
    if let Some(atol) = number("atol")? { opts.atol = atol; }
    if let Some(max_steps) = count("max_steps")? { opts.max_steps = max_steps; }
    if let Some(progress) = table.get("progress") {
        opts.progress = progress.as_bool()
            .ok_or_else(|| Error::config("[solver] 'progress' must be a boolean"))?;
    }
    let method = match table.get("method") {
        None => "dopri5",
        Some(v) => v.as_str()
            .ok_or_else(|| Error::config("[solver] 'method' must be a string"))?,
    };
    opts.method = match method {
        "dopri5" => Method::Dopri5,
        "rk4" => Method::Rk4 {
            substeps: count("substeps")?.unwrap_or(Method::DEFAULT_SUBSTEPS),
        },
        "montecarlo" => Method::MonteCarlo {
            ntraj: count("ntraj")?.unwrap_or(Method::DEFAULT_NTRAJ),
            seed: table.get("seed")
                .map(|v| {
                    v.as_integer()
                        .and_then(|n| u64::try_from(n).ok())
                        .ok_or_else(|| Error::config(
                            "[solver] 'seed' must be a non-negative integer"))
                })
                .transpose()?
                .unwrap_or(0),
        },
        other => {
            return Err(Error::config(format!(
                "unknown solver method '{}'; expected one of 'dopri5', 'rk4', \
                'montecarlo'",
                other,
            )));
        },
    };
    Ok(opts)
}

fn solver_table(opts: &SolverOptions) -> toml::Table {
    let mut table = toml::Table::new();
    match opts.method {
        Method::Dopri5 => {
            table.insert("method".into(), "dopri5".into());
        },
        Method::Rk4 { substeps } => {
            table.insert("method".into(), "rk4".into());
            table.insert("substeps".into(), (substeps as i64).into());
        },
        Method::MonteCarlo { ntraj, seed } => {
            table.insert("method".into(), "montecarlo".into());
            table.insert("ntraj".into(), (ntraj as i64).into());
            table.insert("seed".into(), (seed as i64).into());
        },
    }
    table.insert("rtol".into(), opts.rtol.into());
    table.insert("atol".into(), opts.atol.into());
    table.insert("max_steps".into(), (opts.max_steps as i64).into());
    table.insert("progress".into(), opts.progress.into());
    table
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;

    const SAMPLE: &str = r#"
        [chain]
        dim_resonator = 3
        n_transmons = 2
        dim_transmon = 2

        [hamiltonian]
        w_r1 = 5
        w_rN = 5.0
        w_t = 5.0
        alpha_t = 0.1
        g_t = 0.02
        g_r1_t1 = 0.02
        g_tN_rN = 0.02

        [jumps]
        gamma_1 = 0.1
        gamma_N = 0.1
        n_c = 0.25

        [baths]
        omega = 5.0
        omega_h = 3.0
        omega_c = 2.0

        [sim]
        T_final = 100
        nsteps = 51
    "#;

    #[test]
    fn bose_einstein_occupation() {
        assert_relative_eq!(
            bose_einstein(5.0, 3.0).unwrap(),
            1.0 / ((5.0_f64 / 3.0).exp() - 1.0),
            max_relative = 1e-12,
        );
        assert!(bose_einstein(1.0, 0.0).is_err());
        assert!(bose_einstein(1.0, -2.0).is_err());
        assert!(bose_einstein(0.0, 1.0).is_err());
    }

    #[test]
    fn parse_sample() {
        let config = ChainConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.dim_resonator, 3);
        assert_eq!(config.n_transmons, 2);
        assert_eq!(config.dim().unwrap(), 36);
        assert_eq!(config.hamiltonian.w_r1, 5.0);
        assert_relative_eq!(
            config.jumps.n_h, bose_einstein(5.0, 3.0).unwrap(), max_relative = 1e-15);
        assert_eq!(config.jumps.n_c, 0.25);
        assert_eq!(config.sim, SimParams { T_final: 100.0, nsteps: 51 });
        assert_eq!(config.solver, SolverOptions::default());
    }

    #[test]
    fn table_roundtrip() {
        let config = ChainConfig::default();
        let s = toml::to_string(&config.to_table()).unwrap();
        let parsed = ChainConfig::from_toml_str(&s).unwrap();
        assert_eq!(parsed, config);

        let mut mc = config;
        mc.solver.method = Method::MonteCarlo { ntraj: 16, seed: 7 };
        let s = toml::to_string(&mc.to_table()).unwrap();
        assert_eq!(ChainConfig::from_toml_str(&s).unwrap().solver, mc.solver);
    }

    #[test]
    fn config_errors() {
        let missing = SAMPLE.replace("g_t = 0.02\n", "");
        let err = ChainConfig::from_toml_str(&missing).unwrap_err();
        assert!(matches!(err, Error::Config(msg) if msg.contains("'g_t'")));

        let no_baths = SAMPLE.replace("omega_h = 3.0", "");
        assert!(matches!(
            ChainConfig::from_toml_str(&no_baths), Err(Error::Config(_))));

        let bad_method = format!("{}\n[solver]\nmethod = \"euler\"\n", SAMPLE);
        assert!(matches!(
            ChainConfig::from_toml_str(&bad_method), Err(Error::Config(_))));

        let short = SAMPLE.replace("nsteps = 51", "nsteps = 1");
        assert!(matches!(
            ChainConfig::from_toml_str(&short), Err(Error::Config(_))));

        assert!(matches!(
            ChainConfig::from_toml_str("[chain"), Err(Error::Toml(_))));
    }

    #[test]
    fn sim_section_errors() {
        let no_final = SAMPLE.replace("T_final = 100\n", "");
        let err = ChainConfig::from_toml_str(&no_final).unwrap_err();
        assert!(matches!(err, Error::Config(msg) if msg.contains("'T_final'")));

        let fractional = SAMPLE.replace("nsteps = 51", "nsteps = 51.5");
        let err = ChainConfig::from_toml_str(&fractional).unwrap_err();
        assert!(matches!(err, Error::Config(msg) if msg.contains("'nsteps'")));

        let negative = SAMPLE.replace("nsteps = 51", "nsteps = -3");
        assert!(matches!(
            ChainConfig::from_toml_str(&negative), Err(Error::Config(_))));

        let integral_float = SAMPLE.replace("nsteps = 51", "nsteps = 51.0");
        assert_eq!(
            ChainConfig::from_toml_str(&integral_float).unwrap().sim.nsteps, 51);
    }

    #[test]
    fn oversized_chain_dimension() {
        let config = ChainConfig {
            dim_resonator: 4,
            n_transmons: 200,
            dim_transmon: 3,
            ..Default::default()
        };
        assert!(matches!(config.dim(), Err(Error::Config(_))));
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }
}
