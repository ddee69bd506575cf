#![allow(dead_code, non_snake_case, non_upper_case_globals)]

use std::{
    fs::File,
    io::{ BufWriter, Write },
    path::PathBuf,
};
use anyhow::Context;
use ndarray as nd;
use thermal_chain::{
    mkdir,
    println_flush,
    write_npz,
    config::ChainConfig,
    dynamics::{ HParams, JumpParams },
    hilbert::CompositeSpace,
    simulate::{ SimParams, Trajectories, simulate_config },
};

fn load_config() -> anyhow::Result<ChainConfig> {
    match std::env::args().nth(1) {
        Some(path) => {
            ChainConfig::load(&path)
                .with_context(|| format!("failed to load configuration '{}'", path))
        },
        None => Ok(ChainConfig::default()),
    }
}

fn keys(k: &[&str]) -> toml::Value {
    toml::Value::Array(k.iter().map(|s| (*s).into()).collect())
}

fn metadata(config: &ChainConfig, traj: &Trajectories) -> toml::Table {
    let mut run = toml::Table::new();
    run.insert("n_observables".into(), (traj.len() as i64).into());
    run.insert(
        "observables".into(),
        toml::Value::Array(
            traj.labels.iter().map(|l| l.as_str().into()).collect()),
    );
    run.insert("H_params_keys".into(), keys(&HParams::KEYS));
    run.insert("jumps_params_keys".into(), keys(&JumpParams::KEYS));
    run.insert("sim_params_keys".into(), keys(&SimParams::KEYS));

    let mut table = config.to_table();
    table.insert("run".into(), toml::Value::Table(run));
    table
}

fn write_summary(path: PathBuf, config: &ChainConfig, traj: &Trajectories)
    -> anyhow::Result<()>
{
    let mut out = BufWriter::new(File::create(path)?);
    writeln!(out, "thermal chain simulation summary")?;
    writeln!(out, "{}", "=".repeat(50))?;
    writeln!(out)?;
    writeln!(out, "final time: {}", config.sim.T_final)?;
    writeln!(out, "time steps: {}", config.sim.nsteps)?;
    writeln!(out, "transmons: {}", config.n_transmons)?;
    writeln!(out, "resonator dimension: {}", config.dim_resonator)?;
    writeln!(out, "transmon dimension: {}", config.dim_transmon)?;
    writeln!(out, "observables: {}", traj.len())?;
    writeln!(out)?;
    writeln!(out, "final observable values:")?;
    for (label, x) in traj.labels.iter().zip(traj.final_values()) {
        writeln!(out, "  {:<20} {:.6}", label, x)?;
    }
    out.flush()?;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let outdir = PathBuf::from("output/heat_chain");
    mkdir!(outdir);

    let mut config = load_config()?;
    config.solver.progress = true;
    config.validate().context("invalid configuration")?;
    println_flush!(
        "simulating {} transmon(s) between two resonators (total dimension {})",
        config.n_transmons, config.dim()?,
    );

    let space = CompositeSpace::chain(
        config.dim_resonator, config.n_transmons, config.dim_transmon)?;
    let psi0 = space.basis_state(&vec![0; space.len()])?;
    let traj = simulate_config(&config, &psi0)?;
    println_flush!("simulation complete");

    let H_params: nd::Array1<f64>
        = config.hamiltonian.to_table().into_values().collect();
    let jumps_params: nd::Array1<f64>
        = config.jumps.to_table().into_values().collect();
    let sim_params: nd::Array1<f64>
        = config.sim.to_table().into_values().collect();
    write_npz!(
        outdir.join("trajectories.npz"),
        arrays: {
            "time" => &traj.times,
            "expect" => &traj.expect_array(),
            "H_params" => &H_params,
            "jumps_params" => &jumps_params,
            "sim_params" => &sim_params,
            "dims" => &nd::array![
                config.dim_resonator as u32,
                config.n_transmons as u32,
                config.dim_transmon as u32,
            ],
        }
    );
    println_flush!("wrote {}", outdir.join("trajectories.npz").display());

    std::fs::write(
        outdir.join("metadata.toml"),
        toml::to_string(&metadata(&config, &traj))?,
    )?;
    println_flush!("wrote {}", outdir.join("metadata.toml").display());

    write_summary(outdir.join("summary.txt"), &config, &traj)?;
    println_flush!("wrote {}", outdir.join("summary.txt").display());

    Ok(())
}
