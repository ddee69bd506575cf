//! Monte-Carlo wavefunction (quantum-jump) unraveling of the Lindblad
//! equation.
//!
//! Each trajectory evolves an unnormalized state under the effective
//! Hamiltonian `H - (i/2) Σ_k L_k† L_k`. When the squared norm of the state
//! falls below a uniformly drawn threshold, a jump `ψ → L_k ψ / ‖L_k ψ‖` is
//! applied at the end of the current step, with `k` drawn with probability
//! proportional to `‖L_k ψ‖²`, and a new threshold is drawn. Measurements are
//! taken on the normalized state and averaged over trajectories.

use std::sync::atomic::{ AtomicUsize, Ordering };
use rand::{ Rng, SeedableRng, rngs::StdRng };
use rayon::prelude::*;
use super::*;
use crate::{
    dynamics::LOperator,
    hilbert::normalize,
    sparse::SpOp,
};

// pick an index with probability proportional to its weight, given a uniform
// draw `r` in [0, total)
fn choose(weights: &[f64], r: f64) -> usize {
    let mut acc = 0.0;
    for (k, w) in weights.iter().enumerate() {
        acc += w;
        if r < acc { return k; }
    }
    weights.len() - 1
}

// apply one quantum jump to `psi` in place
fn jump<R: Rng>(psi: &mut nd::Array1<C64>, jumps: &[SpOp], rng: &mut R) {
    let candidates: Vec<nd::Array1<C64>>
        = jumps.iter().map(|l| l.dot_vec(psi)).collect();
    let weights: Vec<f64>
        = candidates.iter()
        .map(|phi| phi.iter().map(|a| a.norm_sqr()).sum())
        .collect();
    let total: f64 = weights.iter().sum();
    if total > 0.0 {
        let k = choose(&weights, rng.gen::<f64>() * total);
        if let Some(phi) = candidates.into_iter().nth(k) { *psi = phi; }
    }
    normalize(psi);
}

/// Integrate a single quantum-jump trajectory seeded by `seed`.
///
/// `x` receives the normalized state at each point of `t`.
pub fn trajectory<X, T>(
    psi0: &nd::Array1<C64>,
    h_eff: &SpOp,
    jumps: &[SpOp],
    t: &nd::Array1<f64>,
    x: &X,
    opts: &SolverOptions,
    seed: u64,
) -> Result<Vec<T>>
where X: Fn(&nd::Array1<C64>) -> T
{
    let mut rng = StdRng::seed_from_u64(seed);
    let rhs = |psi: &nd::Array1<C64>| h_eff.dot_vec(psi) * (-C64::i());
    let mut psi: nd::Array1<C64> = psi0.clone();
    let mut threshold: f64 = rng.gen();
    let mut stepper: Dopri5<nd::Ix1> = Dopri5::new(opts);
    let mut x_t: Vec<T> = Vec::with_capacity(t.len());
    if t.is_empty() { return Ok(x_t); }
    let mut phi = psi.clone();
    normalize(&mut phi);
    x_t.push(x(&phi));
    for (tk, tkp1) in t.iter().zip(t.iter().skip(1)) {
        stepper.advance(
            &mut psi, *tk, *tkp1, &rhs,
            |psi| {
                let norm2 = psi.norm().powi(2);
                if norm2 > threshold { return false; }
                jump(psi, jumps, &mut rng);
                threshold = rng.gen();
                true
            },
        )?;
        let mut phi = psi.clone();
        if normalize(&mut phi).is_none() || !phi.norm().is_finite() {
            return Err(Error::integration(format!(
                "trajectory state vanished or diverged at t = {}", tkp1)));
        }
        x_t.push(x(&phi));
    }
    Ok(x_t)
}

/// Average `ntraj` quantum-jump trajectories starting from `psi0`, run in
/// parallel.
///
/// Trajectory `k` is seeded by `seed + k`, so the result does not depend on
/// thread scheduling. The measurement function `x` returns one value per
/// observable; its output is averaged elementwise.
///
/// Fails if `psi0` does not match the dimension of `H`, if `ntraj == 0`, or if
/// any trajectory fails.
#[allow(clippy::too_many_arguments)]
pub fn evolve_reduced<X>(
    psi0: &nd::Array1<C64>,
    H: &SpOp,
    L: &LOperator,
    t: &nd::Array1<f64>,
    x: X,
    ntraj: usize,
    seed: u64,
    opts: &SolverOptions,
) -> Result<Vec<nd::Array1<f64>>>
where X: Fn(&nd::Array1<C64>) -> nd::Array1<f64> + Sync
{
    if psi0.len() != H.dim() {
        return Err(Error::DimensionMismatch { expected: H.dim(), got: psi0.len() });
    }
    if L.decay_op().dim() != H.dim() {
        return Err(Error::DimensionMismatch {
            expected: H.dim(),
            got: L.decay_op().dim(),
        });
    }
    if ntraj == 0 {
        return Err(Error::config("number of trajectories must be positive"));
    }
    let opts = SolverOptions { method: Method::Dopri5, ..*opts };
    opts.validate()?;
    let h_eff = L.h_eff(H);
    let done = AtomicUsize::new(0);
    let trajectories: Vec<Vec<nd::Array1<f64>>>
        = (0..ntraj).into_par_iter()
        .map(|k| {
            let res = trajectory(
                psi0, &h_eff, L.jumps(), t, &x, &opts,
                seed.wrapping_add(k as u64),
            );
            let n = done.fetch_add(1, Ordering::Relaxed) + 1;
            if opts.progress {
                crate::eprint_flush!("\r  trajectory {} / {} ", n, ntraj);
            }
            res
        })
        .collect::<Result<_>>()?;
    if opts.progress { eprintln!(); }

    let mut trajectories = trajectories.into_iter();
    let mut avg: Vec<nd::Array1<f64>> = trajectories.next().unwrap_or_default();
    for traj in trajectories {
        avg.iter_mut().zip(traj).for_each(|(a, b)| { *a += &b; });
    }
    avg.iter_mut().for_each(|a| { *a /= ntraj as f64; });
    Ok(avg)
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::{ abs_diff_eq, assert_abs_diff_eq };
    use crate::hilbert::{ basis, destroy };

    #[test]
    fn weighted_choice() {
        let w = [0.0, 1.0, 3.0];
        assert_eq!(choose(&w, 0.0), 1);
        assert_eq!(choose(&w, 0.99), 1);
        assert_eq!(choose(&w, 1.0), 2);
        assert_eq!(choose(&w, 3.9999), 2);
    }

    #[test]
    fn single_jump_empties_two_level_atom() {
        let a = destroy(2);
        let H = a.adjoint().matmul(&a);
        let L = LOperator::new(2, [&a * 0.5]);
        let t: nd::Array1<f64> = nd::Array1::linspace(0.0, 80.0, 9);
        let n = a.adjoint().matmul(&a);
        let pops = trajectory(
            &basis(2, 1), &L.h_eff(&H), L.jumps(), &t,
            &|psi: &nd::Array1<C64>| n.expect_vec(psi).re,
            &SolverOptions::default(), 3,
        ).unwrap();
        assert_eq!(pops[0], 1.0);
        // each trajectory is either excited or has jumped to the ground state
        assert!(pops.iter().all(|p| {
            abs_diff_eq!(*p, 1.0, epsilon = 1e-6) || abs_diff_eq!(*p, 0.0, epsilon = 1e-6)
        }));
        assert_abs_diff_eq!(*pops.last().unwrap(), 0.0, epsilon = 1e-6);
    }

    #[test]
    fn seeded_average_is_reproducible() {
        let a = destroy(3);
        let H = a.adjoint().matmul(&a);
        let L = LOperator::new(3, [&a * 0.3, a.adjoint() * 0.2]);
        let t: nd::Array1<f64> = nd::Array1::linspace(0.0, 5.0, 6);
        let n = a.adjoint().matmul(&a);
        let x = |psi: &nd::Array1<C64>| nd::array![n.expect_vec(psi).re];
        let opts = SolverOptions::default();
        let run = |seed| {
            evolve_reduced(&basis(3, 1), &H, &L, &t, x, 8, seed, &opts).unwrap()
        };
        assert_eq!(run(11), run(11));
        assert_eq!(run(11).len(), 6);
    }
}
