use num_traits::{Float, FromPrimitive};
use std::fmt::Debug;

/// A trait for types that can be used as scalars in the population model.
/// Must support basic arithmetic, debug printing, and conversion from f64.
pub trait Scalar: Float + FromPrimitive + Debug + 'static {}

impl<T: Float + FromPrimitive + Debug + 'static> Scalar for T {}

/// Represents a continuous-time dynamical system dx/dt = f(t, x).
pub trait DynamicalSystem<T: Scalar> {
    /// Returns the dimension of the state space.
    fn dimension(&self) -> usize;

    /// Evaluates the vector field.
    /// x: current state
    /// t: current time
    /// out: buffer to write dx/dt
    fn apply(&self, t: T, x: &[T], out: &mut [T]);
}

/// A system that can also report its partial derivatives, as needed by
/// linearly implicit solvers.
pub trait JacobianSystem<T: Scalar>: DynamicalSystem<T> {
    /// Writes the row-major `dimension x dimension` Jacobian df/dx at (t, x).
    fn jacobian(&self, t: T, x: &[T], out: &mut [T]);

    /// Writes df/dt at (t, x).
    fn time_derivative(&self, t: T, x: &[T], out: &mut [T]);
}

/// A trait for fixed-step solvers.
pub trait Steppable<T: Scalar> {
    /// Performs one step of size dt.
    /// t: current time (updated after step)
    /// state: current state (updated after step)
    /// dt: step size
    fn step(&mut self, system: &impl DynamicalSystem<T>, t: &mut T, state: &mut [T], dt: T);
}

/// Outcome of a single adaptive step attempt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StepAttempt<T> {
    /// The step was computed. `error` is the weighted RMS error estimate;
    /// the step is acceptable when `error <= 1`.
    Computed { error: T },
    /// A stage evaluation produced NaN or infinity.
    NonFinite,
}

/// A trait for solvers with an embedded error estimate.
pub trait AdaptiveSteppable<T: Scalar> {
    /// Attempts one step of size dt from (t, state).
    ///
    /// The candidate is kept internally; `state` and `t` are only touched
    /// by `accept`. Tolerances weight the error estimate as
    /// `abs_tol + rel_tol * max(|y|, |y_new|)`.
    fn try_step(
        &mut self,
        system: &impl DynamicalSystem<T>,
        t: T,
        state: &[T],
        dt: T,
        rel_tol: T,
        abs_tol: T,
    ) -> StepAttempt<T>;

    /// Commits the last computed candidate.
    fn accept(&mut self, t: &mut T, state: &mut [T]);

    /// Order of the error estimator, used for step-size control.
    fn error_order(&self) -> i32;
}
