use crate::traits::{
    AdaptiveSteppable, DynamicalSystem, JacobianSystem, Scalar, StepAttempt, Steppable,
};
use nalgebra::{DMatrix, DVector};

fn constant<T: Scalar>(value: f64) -> T {
    T::from_f64(value).unwrap_or_else(T::nan)
}

/// Classic Runge-Kutta 4th Order Solver
pub struct RK4<T: Scalar> {
    k1: Vec<T>,
    k2: Vec<T>,
    k3: Vec<T>,
    k4: Vec<T>,
    tmp: Vec<T>,
}

impl<T: Scalar> RK4<T> {
    pub fn new(dim: usize) -> Self {
        Self {
            k1: vec![T::zero(); dim],
            k2: vec![T::zero(); dim],
            k3: vec![T::zero(); dim],
            k4: vec![T::zero(); dim],
            tmp: vec![T::zero(); dim],
        }
    }
}

impl<T: Scalar> Steppable<T> for RK4<T> {
    fn step(&mut self, system: &impl DynamicalSystem<T>, t: &mut T, state: &mut [T], dt: T) {
        let half = constant::<T>(0.5);
        let sixth = constant::<T>(1.0 / 6.0);
        let two = constant::<T>(2.0);

        let t0 = *t;

        // k1 = f(t, y)
        system.apply(t0, state, &mut self.k1);

        // k2 = f(t + dt/2, y + dt*k1/2)
        for i in 0..state.len() {
            self.tmp[i] = state[i] + dt * self.k1[i] * half;
        }
        system.apply(t0 + dt * half, &self.tmp, &mut self.k2);

        // k3 = f(t + dt/2, y + dt*k2/2)
        for i in 0..state.len() {
            self.tmp[i] = state[i] + dt * self.k2[i] * half;
        }
        system.apply(t0 + dt * half, &self.tmp, &mut self.k3);

        // k4 = f(t + dt, y + dt*k3)
        for i in 0..state.len() {
            self.tmp[i] = state[i] + dt * self.k3[i];
        }
        system.apply(t0 + dt, &self.tmp, &mut self.k4);

        for i in 0..state.len() {
            state[i] = state[i]
                + dt * sixth * (self.k1[i] + two * self.k2[i] + two * self.k3[i] + self.k4[i]);
        }

        *t = t0 + dt;
    }
}

/// Tsitouras 5(4) Solver with embedded error estimate.
///
/// The seventh stage is evaluated at the candidate point and doubles as the
/// first stage of the next step (FSAL), so an accepted step costs six
/// evaluations of the vector field.
pub struct Tsit5<T: Scalar> {
    k1: Vec<T>,
    k2: Vec<T>,
    k3: Vec<T>,
    k4: Vec<T>,
    k5: Vec<T>,
    k6: Vec<T>,
    k7: Vec<T>,
    tmp: Vec<T>,
    candidate: Vec<T>,
    candidate_t: T,
    k1_ready: bool,
}

impl<T: Scalar> Tsit5<T> {
    pub fn new(dim: usize) -> Self {
        let z = T::zero();
        Self {
            k1: vec![z; dim],
            k2: vec![z; dim],
            k3: vec![z; dim],
            k4: vec![z; dim],
            k5: vec![z; dim],
            k6: vec![z; dim],
            k7: vec![z; dim],
            tmp: vec![z; dim],
            candidate: vec![z; dim],
            candidate_t: z,
            k1_ready: false,
        }
    }

    /// Forgets the cached first stage. Call when the state is changed
    /// other than through `accept`.
    pub fn reset(&mut self) {
        self.k1_ready = false;
    }
}

fn all_finite<T: Scalar>(values: &[T]) -> bool {
    values.iter().all(|v| v.is_finite())
}

impl<T: Scalar> AdaptiveSteppable<T> for Tsit5<T> {
    fn try_step(
        &mut self,
        system: &impl DynamicalSystem<T>,
        t: T,
        state: &[T],
        dt: T,
        rel_tol: T,
        abs_tol: T,
    ) -> StepAttempt<T> {
        let c2 = constant::<T>(0.161);
        let c3 = constant::<T>(0.327);
        let c4 = constant::<T>(0.9);
        let c5 = constant::<T>(0.9800255409045097);

        let a21 = constant::<T>(0.161);

        let a31 = constant::<T>(-0.008480655492356989);
        let a32 = constant::<T>(0.335480655492357);

        let a41 = constant::<T>(2.898);
        let a42 = constant::<T>(-6.359447987781783);
        let a43 = constant::<T>(4.361447987781783);

        let a51 = constant::<T>(5.325864858437957);
        let a52 = constant::<T>(-11.748883564062828);
        let a53 = constant::<T>(7.495539342889693);
        let a54 = constant::<T>(-0.09249506636030195);

        let a61 = constant::<T>(5.86145544294642);
        let a62 = constant::<T>(-12.92096931784711);
        let a63 = constant::<T>(8.159367898576159);
        let a64 = constant::<T>(-0.071584973281401);
        let a65 = constant::<T>(-0.02826857949054663);

        // b coefficients (5th order)
        let b1 = constant::<T>(0.09646076681806523);
        let b2 = constant::<T>(0.01);
        let b3 = constant::<T>(0.4798896504144996);
        let b4 = constant::<T>(1.379008574103742);
        let b5 = constant::<T>(-3.290069515436099);
        let b6 = constant::<T>(2.324710524099774);

        // b - b_hat, including the FSAL stage
        let e1 = constant::<T>(-0.00178001105222577714);
        let e2 = constant::<T>(-0.0008164344596567469);
        let e3 = constant::<T>(0.007880878010261995);
        let e4 = constant::<T>(-0.1447110071732629);
        let e5 = constant::<T>(0.5823571654525552);
        let e6 = constant::<T>(-0.45808210592918697);
        let e7 = constant::<T>(0.015151515151515152);

        let n = state.len();

        if !self.k1_ready {
            system.apply(t, state, &mut self.k1);
            if !all_finite(&self.k1) {
                return StepAttempt::NonFinite;
            }
            self.k1_ready = true;
        }

        for i in 0..n {
            self.tmp[i] = state[i] + dt * (a21 * self.k1[i]);
        }
        system.apply(t + c2 * dt, &self.tmp, &mut self.k2);
        if !all_finite(&self.k2) {
            return StepAttempt::NonFinite;
        }

        for i in 0..n {
            self.tmp[i] = state[i] + dt * (a31 * self.k1[i] + a32 * self.k2[i]);
        }
        system.apply(t + c3 * dt, &self.tmp, &mut self.k3);
        if !all_finite(&self.k3) {
            return StepAttempt::NonFinite;
        }

        for i in 0..n {
            self.tmp[i] = state[i] + dt * (a41 * self.k1[i] + a42 * self.k2[i] + a43 * self.k3[i]);
        }
        system.apply(t + c4 * dt, &self.tmp, &mut self.k4);
        if !all_finite(&self.k4) {
            return StepAttempt::NonFinite;
        }

        for i in 0..n {
            self.tmp[i] = state[i]
                + dt * (a51 * self.k1[i] + a52 * self.k2[i] + a53 * self.k3[i] + a54 * self.k4[i]);
        }
        system.apply(t + c5 * dt, &self.tmp, &mut self.k5);
        if !all_finite(&self.k5) {
            return StepAttempt::NonFinite;
        }

        for i in 0..n {
            self.tmp[i] = state[i]
                + dt * (a61 * self.k1[i]
                    + a62 * self.k2[i]
                    + a63 * self.k3[i]
                    + a64 * self.k4[i]
                    + a65 * self.k5[i]);
        }
        system.apply(t + dt, &self.tmp, &mut self.k6);
        if !all_finite(&self.k6) {
            return StepAttempt::NonFinite;
        }

        for i in 0..n {
            self.candidate[i] = state[i]
                + dt * (b1 * self.k1[i]
                    + b2 * self.k2[i]
                    + b3 * self.k3[i]
                    + b4 * self.k4[i]
                    + b5 * self.k5[i]
                    + b6 * self.k6[i]);
        }
        self.candidate_t = t + dt;
        if !all_finite(&self.candidate) {
            return StepAttempt::NonFinite;
        }

        system.apply(self.candidate_t, &self.candidate, &mut self.k7);
        if !all_finite(&self.k7) {
            return StepAttempt::NonFinite;
        }

        let mut sum_sq = T::zero();
        for i in 0..n {
            let local = dt
                * (e1 * self.k1[i]
                    + e2 * self.k2[i]
                    + e3 * self.k3[i]
                    + e4 * self.k4[i]
                    + e5 * self.k5[i]
                    + e6 * self.k6[i]
                    + e7 * self.k7[i]);
            let scale = abs_tol + rel_tol * state[i].abs().max(self.candidate[i].abs());
            let ratio = local / scale;
            sum_sq = sum_sq + ratio * ratio;
        }
        let count = T::from_usize(n.max(1)).unwrap_or_else(T::one);
        StepAttempt::Computed {
            error: (sum_sq / count).sqrt(),
        }
    }

    fn accept(&mut self, t: &mut T, state: &mut [T]) {
        state.copy_from_slice(&self.candidate);
        *t = self.candidate_t;
        std::mem::swap(&mut self.k1, &mut self.k7);
        self.k1_ready = true;
    }

    fn error_order(&self) -> i32 {
        4
    }
}

/// Linearly implicit Rosenbrock 2(3) solver of Shampine and Reichelt.
///
/// L-stable, so decaying modes far faster than the solution itself do not
/// limit the step. Every attempt factors `W = I - h d J` once and reuses the
/// factorization for all three stages. The Jacobian is evaluated once per
/// accepted state.
pub struct Rosenbrock23 {
    f0: Vec<f64>,
    f1: Vec<f64>,
    f2: Vec<f64>,
    jacobian: Vec<f64>,
    dfdt: Vec<f64>,
    tmp: Vec<f64>,
    candidate: Vec<f64>,
    candidate_t: f64,
    linearized: bool,
}

const ROS_D: f64 = 0.292_893_218_813_452_4; // 1 / (2 + sqrt(2))
const ROS_E32: f64 = 7.414_213_562_373_095; // 6 + sqrt(2)

impl Rosenbrock23 {
    pub fn new(dim: usize) -> Self {
        Self {
            f0: vec![0.0; dim],
            f1: vec![0.0; dim],
            f2: vec![0.0; dim],
            jacobian: vec![0.0; dim * dim],
            dfdt: vec![0.0; dim],
            tmp: vec![0.0; dim],
            candidate: vec![0.0; dim],
            candidate_t: 0.0,
            linearized: false,
        }
    }

    /// Forgets the cached linearization. Call when the state is changed
    /// other than through `accept`.
    pub fn reset(&mut self) {
        self.linearized = false;
    }

    /// Attempts one step of size dt from (t, state); see
    /// `AdaptiveSteppable::try_step` for the contract.
    ///
    /// A singular iteration matrix is reported as `NonFinite` so the caller
    /// retries with a smaller step.
    pub fn try_step(
        &mut self,
        system: &impl JacobianSystem<f64>,
        t: f64,
        state: &[f64],
        dt: f64,
        rel_tol: f64,
        abs_tol: f64,
    ) -> StepAttempt<f64> {
        let n = state.len();

        if !self.linearized {
            system.apply(t, state, &mut self.f0);
            system.jacobian(t, state, &mut self.jacobian);
            system.time_derivative(t, state, &mut self.dfdt);
            if !(all_finite(&self.f0) && all_finite(&self.jacobian) && all_finite(&self.dfdt)) {
                return StepAttempt::NonFinite;
            }
            self.linearized = true;
        }

        let hd = dt * ROS_D;
        let jacobian = &self.jacobian;
        let w = DMatrix::from_fn(n, n, |i, j| {
            let identity = if i == j { 1.0 } else { 0.0 };
            identity - hd * jacobian[i * n + j]
        });
        let lu = w.lu();

        // k1 = W^-1 (f0 + h d df/dt)
        let rhs = DVector::from_fn(n, |i, _| self.f0[i] + hd * self.dfdt[i]);
        let k1 = match lu.solve(&rhs) {
            Some(k) if all_finite(k.as_slice()) => k,
            _ => return StepAttempt::NonFinite,
        };

        for i in 0..n {
            self.tmp[i] = state[i] + 0.5 * dt * k1[i];
        }
        system.apply(t + 0.5 * dt, &self.tmp, &mut self.f1);
        if !all_finite(&self.f1) {
            return StepAttempt::NonFinite;
        }

        // k2 = W^-1 (f1 - k1) + k1
        let rhs = DVector::from_fn(n, |i, _| self.f1[i] - k1[i]);
        let k2 = match lu.solve(&rhs) {
            Some(k) if all_finite(k.as_slice()) => k + &k1,
            _ => return StepAttempt::NonFinite,
        };

        for i in 0..n {
            self.candidate[i] = state[i] + dt * k2[i];
        }
        self.candidate_t = t + dt;
        if !all_finite(&self.candidate) {
            return StepAttempt::NonFinite;
        }

        system.apply(self.candidate_t, &self.candidate, &mut self.f2);
        if !all_finite(&self.f2) {
            return StepAttempt::NonFinite;
        }

        // k3 = W^-1 (f2 - e32 (k2 - f1) - 2 (k1 - f0) + h d df/dt)
        let rhs = DVector::from_fn(n, |i, _| {
            self.f2[i] - ROS_E32 * (k2[i] - self.f1[i]) - 2.0 * (k1[i] - self.f0[i])
                + hd * self.dfdt[i]
        });
        let k3 = match lu.solve(&rhs) {
            Some(k) if all_finite(k.as_slice()) => k,
            _ => return StepAttempt::NonFinite,
        };

        let mut sum_sq = 0.0;
        for i in 0..n {
            let local = dt / 6.0 * (k1[i] - 2.0 * k2[i] + k3[i]);
            let scale = abs_tol + rel_tol * state[i].abs().max(self.candidate[i].abs());
            let ratio = local / scale;
            sum_sq += ratio * ratio;
        }
        StepAttempt::Computed {
            error: (sum_sq / n.max(1) as f64).sqrt(),
        }
    }

    /// Commits the last computed candidate.
    pub fn accept(&mut self, t: &mut f64, state: &mut [f64]) {
        state.copy_from_slice(&self.candidate);
        *t = self.candidate_t;
        self.linearized = false;
    }

    pub fn error_order(&self) -> i32 {
        2
    }
}
