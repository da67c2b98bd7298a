//! Parameters in, sampled trajectory out.
//!
//! The simulator is stateless: every call builds its own solver and grid,
//! so identical inputs give bit-identical series.

use crate::error::SimulationError;
use crate::model::LogisticModel;
use crate::parameters::Parameters;
use crate::series::TimeSeries;
use crate::solvers::{Rosenbrock23, Tsit5, RK4};
use crate::traits::{AdaptiveSteppable, DynamicalSystem, StepAttempt, Steppable};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

/// Largest grid the simulator will allocate.
pub const MAX_SAMPLES: usize = 10_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Method {
    /// Tsit5 while the problem is non-stiff, Rosenbrock 2(3) once the
    /// explicit step is held back by stability rather than accuracy.
    Auto,
    /// Adaptive Tsitouras 5(4).
    Tsit5,
    /// Adaptive linearly implicit Rosenbrock 2(3).
    Rosenbrock23,
    /// Fixed-step RK4 with `substeps` equal steps per sample interval.
    Rk4 { substeps: usize },
}

/// How sample times are laid out over the horizon.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SamplingPolicy {
    /// `0, 1, 2, ...` strictly below `t_max`; `t_max` is also the sample count.
    UnitSpaced,
    /// `samples` points spread evenly over `[0, t_max]`, both ends included.
    Uniform { samples: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorSettings {
    pub method: Method,
    pub sampling: SamplingPolicy,
    pub rel_tol: f64,
    pub abs_tol: f64,
    /// Smallest step the adaptive solver may shrink to.
    pub min_step: f64,
    /// Step attempts allowed per sample interval, accepted or rejected.
    pub max_steps: usize,
}

impl Default for SimulatorSettings {
    fn default() -> Self {
        Self {
            method: Method::Auto,
            sampling: SamplingPolicy::UnitSpaced,
            rel_tol: 1e-6,
            abs_tol: 1e-8,
            min_step: 1e-12,
            max_steps: 500,
        }
    }
}

impl SimulatorSettings {
    pub fn validate(&self) -> Result<(), SimulationError> {
        let invalid = |reason: &str| -> Result<(), SimulationError> {
            Err(SimulationError::InvalidSettings {
                reason: reason.to_string(),
            })
        };
        if !(self.rel_tol > 0.0 && self.rel_tol.is_finite()) {
            return invalid("rel_tol must be positive.");
        }
        if !(self.abs_tol > 0.0 && self.abs_tol.is_finite()) {
            return invalid("abs_tol must be positive.");
        }
        if !(self.min_step > 0.0 && self.min_step.is_finite()) {
            return invalid("min_step must be positive.");
        }
        if self.max_steps == 0 {
            return invalid("max_steps must be greater than zero.");
        }
        if let Method::Rk4 { substeps: 0 } = self.method {
            return invalid("RK4 substeps must be at least 1.");
        }
        if let SamplingPolicy::Uniform { samples: 0 } = self.sampling {
            return invalid("Uniform sampling needs at least one sample.");
        }
        Ok(())
    }
}

/// Simulates with default settings.
pub fn simulate(params: Parameters) -> Result<TimeSeries, SimulationError> {
    Simulator::default().run(&params)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Simulator {
    settings: SimulatorSettings,
}

impl Simulator {
    pub fn with_settings(settings: SimulatorSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &SimulatorSettings {
        &self.settings
    }

    pub fn run(&self, params: &Parameters) -> Result<TimeSeries, SimulationError> {
        self.settings.validate()?;
        validate_parameters(params)?;

        let times = sample_grid(params.t_max, self.settings.sampling)?;
        let model = LogisticModel::from(params);

        let mut rate = [0.0];
        model.apply(0.0, &[params.p0], &mut rate);
        if !rate[0].is_finite() {
            return Err(SimulationError::DomainError {
                t: 0.0,
                population: params.p0,
            });
        }

        let populations = match self.settings.method {
            Method::Auto | Method::Tsit5 | Method::Rosenbrock23 => {
                integrate_adaptive(&model, params.p0, &times, &self.settings)?
            }
            Method::Rk4 { substeps } => integrate_fixed(&model, params.p0, &times, substeps)?,
        };

        debug!(
            samples = times.len(),
            final_population = populations.last().copied().unwrap_or(params.p0),
            "simulation complete"
        );
        Ok(TimeSeries::from_parts(times, populations))
    }
}

fn validate_parameters(params: &Parameters) -> Result<(), SimulationError> {
    let fields = [
        ("r", params.r),
        ("alpha", params.alpha),
        ("beta", params.beta),
        ("K", params.k),
        ("P0", params.p0),
        ("t_max", params.t_max),
    ];
    for (name, value) in fields {
        if !value.is_finite() {
            return Err(SimulationError::InvalidParameters {
                reason: format!("{name} must be finite, got {value}."),
            });
        }
    }
    if params.t_max <= 0.0 {
        return Err(SimulationError::InvalidParameters {
            reason: format!("t_max must be positive, got {}.", params.t_max),
        });
    }
    Ok(())
}

/// Builds the sample times for a horizon.
pub fn sample_grid(t_max: f64, policy: SamplingPolicy) -> Result<Vec<f64>, SimulationError> {
    match policy {
        SamplingPolicy::UnitSpaced => {
            let count = t_max.ceil();
            if count > MAX_SAMPLES as f64 {
                return Err(SimulationError::InvalidParameters {
                    reason: format!("t_max = {t_max} exceeds the {MAX_SAMPLES} sample limit."),
                });
            }
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let count = count as usize;
            Ok((0..count).map(|i| i as f64).collect())
        }
        SamplingPolicy::Uniform { samples } => {
            if samples > MAX_SAMPLES {
                return Err(SimulationError::InvalidSettings {
                    reason: format!("{samples} samples exceeds the {MAX_SAMPLES} sample limit."),
                });
            }
            if samples == 1 {
                return Ok(vec![0.0]);
            }
            let last = (samples - 1) as f64;
            Ok((0..samples)
                .map(|i| {
                    if i == samples - 1 {
                        t_max
                    } else {
                        t_max * (i as f64) / last
                    }
                })
                .collect())
        }
    }
}

fn initial_step(model: &LogisticModel<f64>, p0: f64, settings: &SimulatorSettings) -> f64 {
    let scale = settings.abs_tol + settings.rel_tol * p0.abs();
    let d0 = p0.abs() / scale;
    let d1 = model.rate(0.0, p0).abs() / scale;
    if d0 < 1e-5 || d1 < 1e-5 {
        1e-6
    } else {
        0.01 * d0 / d1
    }
}

/// Step attempts voting for the other method before it takes over.
const SWITCH_VOTES: usize = 15;
/// Dissenting attempts in a row that clear the vote count.
const DISSENT_RESET: usize = 6;
/// `h * -df/dP` past which Tsit5 is running along its stability boundary.
const STIFF_ENTER: f64 = 2.0;
/// `h * -df/dP` below which an explicit step would do as well.
const STIFF_EXIT: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Regime {
    NonStiff,
    Stiff,
}

/// Adaptive stepper that picks between Tsit5 and Rosenbrock 2(3).
struct AdaptiveStepper {
    explicit: Tsit5<f64>,
    implicit: Rosenbrock23,
    regime: Regime,
    switching: bool,
    votes: usize,
    dissent: usize,
}

impl AdaptiveStepper {
    fn new(method: Method) -> Self {
        let regime = match method {
            Method::Rosenbrock23 => Regime::Stiff,
            _ => Regime::NonStiff,
        };
        Self {
            explicit: Tsit5::new(1),
            implicit: Rosenbrock23::new(1),
            regime,
            switching: method == Method::Auto,
            votes: 0,
            dissent: 0,
        }
    }

    fn try_step(
        &mut self,
        model: &LogisticModel<f64>,
        t: f64,
        state: &[f64],
        h: f64,
        settings: &SimulatorSettings,
    ) -> StepAttempt<f64> {
        match self.regime {
            Regime::NonStiff => {
                self.explicit
                    .try_step(model, t, state, h, settings.rel_tol, settings.abs_tol)
            }
            Regime::Stiff => {
                self.implicit
                    .try_step(model, t, state, h, settings.rel_tol, settings.abs_tol)
            }
        }
    }

    fn accept(&mut self, t: &mut f64, state: &mut [f64]) {
        match self.regime {
            Regime::NonStiff => self.explicit.accept(t, state),
            Regime::Stiff => self.implicit.accept(t, state),
        }
    }

    /// Exponent of the step-size controller, `-1 / (q + 1)`.
    fn exponent(&self) -> f64 {
        let order = match self.regime {
            Regime::NonStiff => self.explicit.error_order(),
            Regime::Stiff => self.implicit.error_order(),
        };
        -1.0 / f64::from(order + 1)
    }

    /// Stiffness vote for a full-length attempt of size `h` at `(t, p)`.
    fn observe(&mut self, model: &LogisticModel<f64>, t: f64, p: f64, h: f64) {
        if !self.switching {
            return;
        }
        let ratio = -h * model.rate_derivative(t, p);
        let leaning = match self.regime {
            Regime::NonStiff => ratio.is_finite() && ratio >= STIFF_ENTER,
            Regime::Stiff => ratio < STIFF_EXIT,
        };
        if leaning {
            self.votes += 1;
            self.dissent = 0;
        } else {
            self.dissent += 1;
            if self.dissent >= DISSENT_RESET {
                self.votes = 0;
                self.dissent = 0;
            }
        }
        if self.votes < SWITCH_VOTES {
            return;
        }
        self.votes = 0;
        self.dissent = 0;
        self.regime = match self.regime {
            Regime::NonStiff => {
                self.implicit.reset();
                Regime::Stiff
            }
            Regime::Stiff => {
                self.explicit.reset();
                Regime::NonStiff
            }
        };
        debug!(t, h, ratio, regime = ?self.regime, "switching adaptive method");
    }
}

fn integrate_adaptive(
    model: &LogisticModel<f64>,
    p0: f64,
    times: &[f64],
    settings: &SimulatorSettings,
) -> Result<Vec<f64>, SimulationError> {
    let mut populations = Vec::with_capacity(times.len());
    populations.push(p0);

    let mut stepper = AdaptiveStepper::new(settings.method);
    let mut t = 0.0;
    let mut state = [p0];
    let mut dt = initial_step(model, p0, settings);
    let mut total_attempts = 0usize;
    let mut rejected = 0usize;

    for &target in times.iter().skip(1) {
        let mut attempts = 0usize;
        while t < target {
            let remaining = target - t;
            let truncated = dt >= remaining;
            let h = if truncated { remaining } else { dt };

            attempts += 1;
            if attempts > settings.max_steps {
                return Err(SimulationError::IntegrationFailure {
                    t,
                    reason: format!(
                        "exceeded {} step attempts before t = {target}",
                        settings.max_steps
                    ),
                });
            }

            let exponent = stepper.exponent();
            match stepper.try_step(model, t, &state, h, settings) {
                StepAttempt::Computed { error } if error <= 1.0 => {
                    stepper.accept(&mut t, &mut state);
                    if truncated {
                        t = target;
                    }
                    let factor = if error == 0.0 {
                        10.0
                    } else {
                        (0.9 * error.powf(exponent)).clamp(0.2, 10.0)
                    };
                    let proposed = h * factor;
                    if truncated {
                        dt = dt.max(proposed);
                    } else {
                        dt = proposed;
                        stepper.observe(model, t, state[0], h);
                    }
                }
                StepAttempt::Computed { error } => {
                    rejected += 1;
                    if !truncated {
                        stepper.observe(model, t, state[0], h);
                    }
                    dt = h * (0.9 * error.powf(exponent)).max(0.2);
                    trace!(t, h, error, "step rejected");
                    if dt < settings.min_step {
                        return Err(SimulationError::IntegrationFailure {
                            t,
                            reason: format!(
                                "step size {dt:e} fell below minimum {:e}",
                                settings.min_step
                            ),
                        });
                    }
                }
                StepAttempt::NonFinite => {
                    rejected += 1;
                    dt = h * 0.25;
                    trace!(t, h, "non-finite stage");
                    if dt < settings.min_step {
                        return Err(SimulationError::DomainError {
                            t,
                            population: state[0],
                        });
                    }
                }
            }
        }
        total_attempts += attempts;
        populations.push(state[0]);
    }

    debug!(
        attempts = total_attempts,
        rejected, "adaptive integration finished"
    );
    Ok(populations)
}

fn integrate_fixed(
    model: &LogisticModel<f64>,
    p0: f64,
    times: &[f64],
    substeps: usize,
) -> Result<Vec<f64>, SimulationError> {
    let mut populations = Vec::with_capacity(times.len());
    populations.push(p0);

    let mut solver = RK4::new(1);
    let mut t = 0.0;
    let mut state = [p0];

    for &target in times.iter().skip(1) {
        let h = (target - t) / substeps as f64;
        for _ in 0..substeps {
            let before = state[0];
            let t_before = t;
            solver.step(model, &mut t, &mut state, h);
            if !state[0].is_finite() || !model.rate(t, state[0]).is_finite() {
                return Err(SimulationError::DomainError {
                    t: t_before,
                    population: before,
                });
            }
        }
        t = target;
        populations.push(state[0]);
    }

    Ok(populations)
}
