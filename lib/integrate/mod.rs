//! ODE drivers for time-independent generators acting on state arrays.
//!
//! The drivers here are generic over the dimension of the state array, so the
//! same steppers serve both density matrices ([`lindblad`]) and wavefunctions
//! ([`mcwf`]). All drivers produce only "reduced" output, i.e. the value of a
//! measurement function at each point of a time grid, rather than the full
//! state history.

use ndarray as nd;
use num_complex::Complex64 as C64;
use crate::error::{ Error, Result };

pub mod lindblad;
pub mod mcwf;

/// Compute a "norm" of an object, treating it as a representation of a quantum
/// state.
pub trait StateNorm {
    fn norm(&self) -> f64;

    /// Return `true` if every element is finite and the state stays within the
    /// bounds of a physical state whose norm is `scale`, up to a relative
    /// tolerance `tol`.
    fn in_bounds(&self, scale: f64, tol: f64) -> bool;
}

/// The norm of an `ndarray::Array1<num_complex::Complex64>` is the quadrature
/// sum of its elements.
///
/// A wavefunction is in bounds if its norm does not exceed `scale`.
impl StateNorm for nd::Array1<C64> {
    fn norm(&self) -> f64 {
        self.iter().map(|a| a.norm_sqr()).sum::<f64>().sqrt()
    }

    fn in_bounds(&self, scale: f64, tol: f64) -> bool {
        self.iter().all(|a| a.is_finite())
            && self.norm() <= scale * (1.0 + tol)
    }
}

/// The norm of an `ndarray::Array2<num_complex::Complex64>` is the real part of
/// the sum of its main diagonal.
///
/// A density matrix is in bounds if every population lies in `[0, scale]` and
/// no element exceeds `scale` in magnitude.
impl StateNorm for nd::Array2<C64> {
    fn norm(&self) -> f64 { self.diag().iter().map(|a| a.re).sum() }

    fn in_bounds(&self, scale: f64, tol: f64) -> bool {
        let bound = scale * (1.0 + tol);
        self.iter().all(|a| a.is_finite() && a.norm() <= bound)
            && self.diag().iter()
                .all(|a| a.re >= -scale * tol && a.re <= bound)
    }
}

/// Integration scheme.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Method {
    /// Adaptive Dormand-Prince 5(4) with error control set by
    /// [`SolverOptions::rtol`] and [`SolverOptions::atol`].
    Dopri5,
    /// Classical fourth-order Runge-Kutta with a fixed number of steps per
    /// output interval.
    Rk4 { substeps: usize },
    /// Average over `ntraj` quantum-jump trajectories, each integrated with
    /// [`Dopri5`][Method::Dopri5] and seeded by `seed` plus its index.
    MonteCarlo { ntraj: usize, seed: u64 },
}

impl Method {
    pub const DEFAULT_SUBSTEPS: usize = 100;
    pub const DEFAULT_NTRAJ: usize = 250;
}

/// Settings shared by all integration methods.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SolverOptions {
    pub method: Method,
    /// Relative tolerance.
    pub rtol: f64,
    /// Absolute tolerance.
    pub atol: f64,
    /// Maximum number of attempted steps per output interval.
    pub max_steps: usize,
    /// Print a status line to stderr after each output interval.
    pub progress: bool,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            method: Method::Dopri5,
            rtol: 1e-6,
            atol: 1e-8,
            max_steps: 100_000,
            progress: false,
        }
    }
}

impl SolverOptions {
    /// Fail if any tolerance or count is out of its domain.
    pub fn validate(&self) -> Result<()> {
        if !(self.rtol.is_finite() && self.rtol > 0.0) {
            return Err(Error::config(format!(
                "rtol must be positive and finite; got {}", self.rtol)));
        }
        if !(self.atol.is_finite() && self.atol > 0.0) {
            return Err(Error::config(format!(
                "atol must be positive and finite; got {}", self.atol)));
        }
        if self.max_steps == 0 {
            return Err(Error::config("max_steps must be positive"));
        }
        match self.method {
            Method::Rk4 { substeps: 0 } => {
                Err(Error::config("RK4 substeps must be positive"))
            },
            Method::MonteCarlo { ntraj: 0, .. } => {
                Err(Error::config("number of trajectories must be positive"))
            },
            _ => Ok(()),
        }
    }
}

/// Smallest relative tolerance used when checking that an integrated state
/// stays physical.
pub const BOUND_TOL: f64 = 1e-6;

pub(crate) fn array_diff<A>(arr: &nd::Array1<A>) -> nd::Array1<A>
where A: Copy + std::ops::Sub<A, Output = A>
{
    arr.iter().zip(arr.iter().skip(1))
        .map(|(ak, akp1)| *akp1 - *ak)
        .collect()
}

// z + h Σ_i c_i k_i
fn lincomb<D>(z: &nd::Array<C64, D>, h: f64, terms: &[(f64, &nd::Array<C64, D>)])
    -> nd::Array<C64, D>
where D: nd::Dimension
{
    let mut out = z.clone();
    for (c, k) in terms.iter() {
        if *c != 0.0 { out.scaled_add(C64::from(h * c), *k); }
    }
    out
}

// RMS of x / (atol + rtol max(|y0|, |y1|)), elementwise
fn scaled_norm<D>(
    x: &nd::Array<C64, D>,
    y0: &nd::Array<C64, D>,
    y1: &nd::Array<C64, D>,
    rtol: f64,
    atol: f64,
) -> f64
where D: nd::Dimension
{
    let n = x.len().max(1) as f64;
    let sum: f64
        = x.iter().zip(y0.iter()).zip(y1.iter())
        .map(|((xk, ak), bk)| {
            let sc = atol + rtol * ak.norm().max(bk.norm());
            (xk.norm() / sc).powi(2)
        })
        .sum();
    (sum / n).sqrt()
}

/// Dormand-Prince 5(4) tableau. The nodes are omitted since all generators
/// here are time-independent.
mod tableau {
    pub const A21: f64 = 1.0 / 5.0;
    pub const A31: f64 = 3.0 / 40.0;
    pub const A32: f64 = 9.0 / 40.0;
    pub const A41: f64 = 44.0 / 45.0;
    pub const A42: f64 = -56.0 / 15.0;
    pub const A43: f64 = 32.0 / 9.0;
    pub const A51: f64 = 19372.0 / 6561.0;
    pub const A52: f64 = -25360.0 / 2187.0;
    pub const A53: f64 = 64448.0 / 6561.0;
    pub const A54: f64 = -212.0 / 729.0;
    pub const A61: f64 = 9017.0 / 3168.0;
    pub const A62: f64 = -355.0 / 33.0;
    pub const A63: f64 = 46732.0 / 5247.0;
    pub const A64: f64 = 49.0 / 176.0;
    pub const A65: f64 = -5103.0 / 18656.0;
    pub const A71: f64 = 35.0 / 384.0;
    pub const A73: f64 = 500.0 / 1113.0;
    pub const A74: f64 = 125.0 / 192.0;
    pub const A75: f64 = -2187.0 / 6784.0;
    pub const A76: f64 = 11.0 / 84.0;

    // fifth- minus fourth-order weights
    pub const E1: f64 = 71.0 / 57600.0;
    pub const E3: f64 = -71.0 / 16695.0;
    pub const E4: f64 = 71.0 / 1920.0;
    pub const E5: f64 = -17253.0 / 339200.0;
    pub const E6: f64 = 22.0 / 525.0;
    pub const E7: f64 = -1.0 / 40.0;
}

const SAFETY: f64 = 0.9;
const MIN_FACTOR: f64 = 0.2;
const MAX_FACTOR: f64 = 5.0;

/// Adaptive Dormand-Prince 5(4) stepper for an autonomous ODE `dz/dt = f(z)`.
///
/// The stepper carries its step size and the last derivative (first same as
/// last) across calls to [`advance`][Self::advance], so a sequence of output
/// intervals is integrated as one continuous run.
#[derive(Clone, Debug)]
pub(crate) struct Dopri5<D>
where D: nd::Dimension
{
    rtol: f64,
    atol: f64,
    max_steps: usize,
    h: Option<f64>,
    k1: Option<nd::Array<C64, D>>,
}

impl<D> Dopri5<D>
where D: nd::Dimension
{
    pub(crate) fn new(opts: &SolverOptions) -> Self {
        Self {
            rtol: opts.rtol,
            atol: opts.atol,
            max_steps: opts.max_steps,
            h: None,
            k1: None,
        }
    }

    // Hairer, Nørsett & Wanner, "Solving Ordinary Differential Equations I",
    // section II.4
    fn initial_step<F>(
        &self,
        z: &nd::Array<C64, D>,
        f0: &nd::Array<C64, D>,
        rhs: &F,
    ) -> f64
    where F: Fn(&nd::Array<C64, D>) -> nd::Array<C64, D>
    {
        let d0 = scaled_norm(z, z, z, self.rtol, self.atol);
        let d1 = scaled_norm(f0, z, z, self.rtol, self.atol);
        let h0 = if d0 < 1e-5 || d1 < 1e-5 { 1e-6 } else { 0.01 * d0 / d1 };
        let z1 = lincomb(z, h0, &[(1.0, f0)]);
        let f1 = rhs(&z1);
        let d2 = scaled_norm(&(&f1 - f0), z, z, self.rtol, self.atol) / h0;
        let dmax = d1.max(d2);
        let h1 = if dmax <= 1e-15 {
            (h0 * 1e-3).max(1e-6)
        } else {
            (0.01 / dmax).powf(0.2)
        };
        (100.0 * h0).min(h1)
    }

    /// Integrate `z` in place from `t0` to `t1`.
    ///
    /// After each accepted step, `on_step` is called with the new state; if it
    /// returns `true`, the state is taken to have been modified and the stored
    /// derivative is discarded.
    pub(crate) fn advance<F, S>(
        &mut self,
        z: &mut nd::Array<C64, D>,
        t0: f64,
        t1: f64,
        rhs: &F,
        mut on_step: S,
    ) -> Result<()>
    where
        F: Fn(&nd::Array<C64, D>) -> nd::Array<C64, D>,
        S: FnMut(&mut nd::Array<C64, D>) -> bool,
    {
        use tableau::*;
        let span = t1 - t0;
        if span <= 0.0 { return Ok(()); }
        let t_eps = 4.0 * f64::EPSILON * t0.abs().max(t1.abs()).max(1.0);
        let mut t = t0;
        let mut attempts: usize = 0;
        while t1 - t > t_eps {
            if attempts >= self.max_steps {
                return Err(Error::integration(format!(
                    "exceeded {} steps between t = {} and t = {}",
                    self.max_steps, t0, t1,
                )));
            }
            attempts += 1;

            let k1 = match self.k1.take() {
                Some(k1) => k1,
                None => rhs(z),
            };
            let h_prop = match self.h {
                Some(h) => h,
                None => self.initial_step(z, &k1, rhs),
            };
            if !h_prop.is_finite() || h_prop <= t_eps {
                return Err(Error::integration(format!(
                    "step size underflow at t = {}", t)));
            }
            let clamped = h_prop >= t1 - t;
            let h = if clamped { t1 - t } else { h_prop };

            let k2 = rhs(&lincomb(z, h, &[(A21, &k1)]));
            let k3 = rhs(&lincomb(z, h, &[(A31, &k1), (A32, &k2)]));
            let k4 = rhs(&lincomb(z, h, &[(A41, &k1), (A42, &k2), (A43, &k3)]));
            let k5 = rhs(&lincomb(
                z, h, &[(A51, &k1), (A52, &k2), (A53, &k3), (A54, &k4)]));
            let k6 = rhs(&lincomb(
                z, h,
                &[(A61, &k1), (A62, &k2), (A63, &k3), (A64, &k4), (A65, &k5)],
            ));
            let z_new = lincomb(
                z, h,
                &[(A71, &k1), (A73, &k3), (A74, &k4), (A75, &k5), (A76, &k6)],
            );
            let k7 = rhs(&z_new);
            let err = lincomb(
                &nd::Array::zeros(z.raw_dim()), h,
                &[
                    (E1, &k1), (E3, &k3), (E4, &k4),
                    (E5, &k5), (E6, &k6), (E7, &k7),
                ],
            );
            let err_norm = scaled_norm(&err, z, &z_new, self.rtol, self.atol);
            if !err_norm.is_finite() {
                return Err(Error::integration(format!(
                    "encountered non-finite values at t = {}", t)));
            }

            if err_norm <= 1.0 {
                let factor = if err_norm == 0.0 {
                    MAX_FACTOR
                } else {
                    (SAFETY * err_norm.powf(-0.2)).clamp(MIN_FACTOR, MAX_FACTOR)
                };
                t = if clamped { t1 } else { t + h };
                self.h = Some(if clamped { h_prop.max(h * factor) } else { h * factor });
                *z = z_new;
                self.k1 = (!on_step(&mut *z)).then_some(k7);
            } else {
                let factor
                    = (SAFETY * err_norm.powf(-0.2)).clamp(MIN_FACTOR, 1.0);
                self.h = Some(h * factor);
                self.k1 = Some(k1);
            }
        }
        Ok(())
    }
}

/// Take a single classical RK4 step.
pub(crate) fn rk4_step<D, F>(z: &nd::Array<C64, D>, dt: f64, rhs: &F)
    -> nd::Array<C64, D>
where
    D: nd::Dimension,
    F: Fn(&nd::Array<C64, D>) -> nd::Array<C64, D>,
{
    let k1 = rhs(z);
    let k2 = rhs(&(z + &k1 * (dt / 2.0)));
    let k3 = rhs(&(z + &k2 * (dt / 2.0)));
    let k4 = rhs(&(z + &k3 * dt));
    z + (k1 + k2 * 2.0 + k3 * 2.0 + k4) * (dt / 6.0)
}

// integrate an autonomous ODE over a time grid with reduced output, generic
// over the dimension of the state array and the RHS of the ODE being solved
pub(crate) fn do_evolve_reduced<D, F, X, T>(
    z0: &nd::Array<C64, D>,
    rhs: F,
    t: &nd::Array1<f64>,
    x: X,
    opts: &SolverOptions,
) -> Result<Vec<T>>
where
    D: nd::Dimension,
    nd::Array<C64, D>: StateNorm,
    F: Fn(&nd::Array<C64, D>) -> nd::Array<C64, D>,
    X: Fn(&nd::Array<C64, D>) -> T,
{
    opts.validate()?;
    let dt = array_diff(t);
    if dt.iter().any(|dtk| !dtk.is_finite() || *dtk < 0.0) {
        return Err(Error::config("time grid must be finite and non-decreasing"));
    }
    let t_final = t.iter().next_back().copied().unwrap_or(0.0);
    let mut z: nd::Array<C64, D> = z0.clone();
    let mut x_t: Vec<T> = Vec::with_capacity(t.len());
    if t.is_empty() { return Ok(x_t); }
    // generators here never increase the norm, so a physical initial state
    // must stay within its own bounds
    let scale = z0.norm();
    let tol = (100.0 * opts.rtol).max(BOUND_TOL);
    let bounded = scale.is_finite() && scale > 0.0 && z0.in_bounds(scale, tol);
    x_t.push(x(&z));
    let mut stepper: Dopri5<D> = Dopri5::new(opts);
    for (k, &dtk) in dt.iter().enumerate() {
        match opts.method {
            Method::Dopri5 => {
                stepper.advance(&mut z, t[k], t[k + 1], &rhs, |_| false)?;
            },
            Method::Rk4 { substeps } => {
                let h = dtk / substeps as f64;
                for _ in 0..substeps { z = rk4_step(&z, h, &rhs); }
            },
            Method::MonteCarlo { .. } => {
                return Err(Error::config(
                    "Monte-Carlo integration requires a pure initial state"));
            },
        }
        let norm = z.norm();
        if !norm.is_finite() {
            return Err(Error::integration(format!(
                "state norm became non-finite at t = {}", t[k + 1])));
        }
        if bounded && !z.in_bounds(scale, tol) {
            return Err(Error::integration(format!(
                "state left the physical region at t = {}; \
                the integration is unstable for this step size",
                t[k + 1],
            )));
        }
        if opts.progress {
            crate::eprint_flush!("\r  t = {:.3} / {:.3} ", t[k + 1], t_final);
        }
        x_t.push(x(&z));
    }
    if opts.progress { eprintln!(); }
    Ok(x_t)
}
