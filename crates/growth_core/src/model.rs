//! Generalized logistic growth law.
//!
//! ```text
//! dP/dt = r * (K - P) / (K - (1 - beta) * P) * P^alpha
//! ```
//!
//! With `alpha = beta = 1` this is the classical logistic equation
//! `r * P * (1 - P / K)`. The denominator vanishes at `P = K / (1 - beta)`,
//! where the rate is infinite; for `P < 0` and non-integer `alpha` the power
//! is NaN. Both cases surface as non-finite rates and are left for the
//! integrator to report.

use crate::parameters::Parameters;
use crate::traits::{DynamicalSystem, JacobianSystem, Scalar};

/// Evaluates the growth rate at population `p`.
pub fn rate<T: Scalar>(_t: T, p: T, r: T, alpha: T, beta: T, k: T) -> T {
    let one = T::one();
    r * (k - p) / (k - (one - beta) * p) * p.powf(alpha)
}

/// The growth law bound to a fixed set of shape parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogisticModel<T: Scalar> {
    pub r: T,
    pub alpha: T,
    pub beta: T,
    pub k: T,
}

impl<T: Scalar> LogisticModel<T> {
    pub fn new(r: T, alpha: T, beta: T, k: T) -> Self {
        Self { r, alpha, beta, k }
    }

    pub fn rate(&self, t: T, p: T) -> T {
        rate(t, p, self.r, self.alpha, self.beta, self.k)
    }

    /// Slope of the rate with respect to the population, `d(dP/dt)/dP`.
    ///
    /// Near `P = K` this is `-r K^(alpha - 1) / beta`, which sets how stiff
    /// the approach to capacity is.
    pub fn rate_derivative(&self, _t: T, p: T) -> T {
        let one = T::one();
        let denominator = self.k - (one - self.beta) * p;
        let saturation = (self.k - p) / denominator;
        let saturation_slope = -self.beta * self.k / (denominator * denominator);
        let power = p.powf(self.alpha);
        let power_slope = if self.alpha == T::zero() {
            T::zero()
        } else {
            self.alpha * p.powf(self.alpha - one)
        };
        self.r * (saturation_slope * power + saturation * power_slope)
    }
}

impl From<&Parameters> for LogisticModel<f64> {
    fn from(params: &Parameters) -> Self {
        Self::new(params.r, params.alpha, params.beta, params.k)
    }
}

impl<T: Scalar> DynamicalSystem<T> for LogisticModel<T> {
    fn dimension(&self) -> usize {
        1
    }

    fn apply(&self, t: T, x: &[T], out: &mut [T]) {
        out[0] = self.rate(t, x[0]);
    }
}

impl<T: Scalar> JacobianSystem<T> for LogisticModel<T> {
    fn jacobian(&self, t: T, x: &[T], out: &mut [T]) {
        out[0] = self.rate_derivative(t, x[0]);
    }

    fn time_derivative(&self, _t: T, _x: &[T], out: &mut [T]) {
        out[0] = T::zero();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_shape_reduces_to_classical_logistic() {
        let (r, k) = (0.7_f64, 500.0);
        for &p in &[0.0, 1.0, 120.0, 250.0, 499.0, 500.0, 650.0] {
            let expected = r * p * (1.0 - p / k);
            let got = rate(0.0, p, r, 1.0, 1.0, k);
            assert!(
                (got - expected).abs() < 1e-9 * expected.abs().max(1.0),
                "p = {p}: got {got}, expected {expected}"
            );
        }
    }

    #[test]
    fn carrying_capacity_and_zero_are_equilibria() {
        let model = LogisticModel::new(2.0, 1.3, 0.4, 1000.0);
        assert_eq!(model.rate(0.0, 1000.0), 0.0);
        assert_eq!(model.rate(0.0, 0.0), 0.0);
    }

    #[test]
    fn singular_denominator_is_non_finite() {
        // K / (1 - beta) = 2000
        let value = rate(0.0_f64, 2000.0, 1.0, 1.0, 0.5, 1000.0);
        assert!(!value.is_finite());
    }

    #[test]
    fn negative_population_with_fractional_exponent_is_nan() {
        let value = rate(0.0_f64, -1.0, 1.0, 0.5, 1.0, 1000.0);
        assert!(value.is_nan());
    }

    #[test]
    fn apply_writes_rate_into_buffer() {
        let model = LogisticModel::new(1.0_f32, 1.0, 1.0, 10.0);
        let mut out = [0.0_f32];
        model.apply(0.0, &[5.0], &mut out);
        assert!((out[0] - 2.5).abs() < 1e-6);
    }

    #[test]
    fn rate_derivative_matches_central_difference() {
        let models = [
            LogisticModel::new(1.0_f64, 1.0, 1.0, 1000.0),
            LogisticModel::new(6.0, 2.0, 1.0, 10_000.0),
            LogisticModel::new(0.3, 0.5, 0.4, 800.0),
            LogisticModel::new(2.0, 1.5, 1.7, 500.0),
        ];
        for model in models {
            for &p in &[10.0, 250.0, 499.0, 700.0] {
                let h = 1e-4 * p;
                let numeric = (model.rate(0.0, p + h) - model.rate(0.0, p - h)) / (2.0 * h);
                let exact = model.rate_derivative(0.0, p);
                assert!(
                    (numeric - exact).abs() <= 1e-5 * exact.abs().max(1.0),
                    "{model:?} at P = {p}: {exact} vs {numeric}"
                );
            }
        }
    }

    #[test]
    fn slope_at_capacity_sets_stiffness() {
        let model = LogisticModel::new(6.0_f64, 2.0, 1.0, 10_000.0);
        let slope = model.rate_derivative(0.0, 10_000.0);
        assert!((slope + 60_000.0).abs() < 1e-6, "slope = {slope}");

        let mut jacobian = [0.0];
        model.jacobian(0.0, &[10_000.0], &mut jacobian);
        assert_eq!(jacobian[0], slope);
    }

    #[test]
    fn constant_power_has_no_power_slope_at_zero() {
        let model = LogisticModel::new(1.0_f64, 0.0, 1.0, 100.0);
        let slope = model.rate_derivative(0.0, 0.0);
        assert!((slope + 0.01).abs() < 1e-12, "slope = {slope}");
    }
}
