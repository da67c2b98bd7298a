use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// The six scalars driving one simulation.
///
/// Missing fields deserialize to their `Default` values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Parameters {
    /// Intrinsic growth rate.
    pub r: f64,
    /// Exponent applied to the population.
    pub alpha: f64,
    /// Saturation correction.
    pub beta: f64,
    /// Carrying capacity.
    #[serde(alias = "K")]
    pub k: f64,
    /// Initial population at t = 0.
    #[serde(alias = "P0")]
    pub p0: f64,
    /// Simulation horizon.
    pub t_max: f64,
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            r: 1.0,
            alpha: 1.0,
            beta: 1.0,
            k: 1_000.0,
            p0: 1_000.0,
            t_max: 180.0,
        }
    }
}

impl Parameters {
    pub fn get(&self, parameter: Parameter) -> f64 {
        match parameter {
            Parameter::R => self.r,
            Parameter::Alpha => self.alpha,
            Parameter::Beta => self.beta,
            Parameter::K => self.k,
            Parameter::P0 => self.p0,
            Parameter::TMax => self.t_max,
        }
    }

    pub fn set(&mut self, parameter: Parameter, value: f64) {
        match parameter {
            Parameter::R => self.r = value,
            Parameter::Alpha => self.alpha = value,
            Parameter::Beta => self.beta = value,
            Parameter::K => self.k = value,
            Parameter::P0 => self.p0 = value,
            Parameter::TMax => self.t_max = value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown parameter '{0}'. Expected one of r, alpha, beta, K, P0, t_max.")]
pub struct UnknownParameter(pub String);

/// Names a single field of `Parameters`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Parameter {
    R,
    Alpha,
    Beta,
    K,
    P0,
    TMax,
}

impl Parameter {
    pub const ALL: [Parameter; 6] = [
        Parameter::R,
        Parameter::Alpha,
        Parameter::Beta,
        Parameter::K,
        Parameter::P0,
        Parameter::TMax,
    ];

    /// Display label used on the input widgets.
    pub fn label(self) -> &'static str {
        match self {
            Parameter::R => "r",
            Parameter::Alpha => "alpha",
            Parameter::Beta => "beta",
            Parameter::K => "K",
            Parameter::P0 => "P0",
            Parameter::TMax => "t",
        }
    }

    /// Slider range and start position for this parameter.
    ///
    /// Presentation metadata only; the simulator does not enforce it. The
    /// `t` slider starts at 1000 while the start-up curve uses the default
    /// horizon of 180, so `initial` is not always `Parameters::default()`.
    pub fn spec(self) -> ParameterSpec {
        let (min, max, initial) = match self {
            Parameter::R => (0.01, 6.0, 1.0),
            Parameter::Alpha => (0.0, 2.0, 1.0),
            Parameter::Beta => (0.0, 2.0, 1.0),
            Parameter::K => (100.0, 10_000.0, 1_000.0),
            Parameter::P0 => (0.0, 1_000_000.0, 1_000.0),
            Parameter::TMax => (0.0, 10_000.0, 1_000.0),
        };
        ParameterSpec {
            parameter: self,
            label: self.label().to_string(),
            min,
            max,
            initial,
        }
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Parameter {
    type Err = UnknownParameter;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "r" => Ok(Parameter::R),
            "alpha" => Ok(Parameter::Alpha),
            "beta" => Ok(Parameter::Beta),
            "K" | "k" => Ok(Parameter::K),
            "P0" | "p0" => Ok(Parameter::P0),
            "t" | "t_max" | "tMax" => Ok(Parameter::TMax),
            other => Err(UnknownParameter(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub parameter: Parameter,
    pub label: String,
    pub min: f64,
    pub max: f64,
    /// Where the slider starts.
    pub initial: f64,
}

/// Slider metadata for every parameter, in display order.
pub fn parameter_specs() -> Vec<ParameterSpec> {
    Parameter::ALL.iter().map(|p| p.spec()).collect()
}

/// A change arriving from the input boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParameterUpdate {
    /// Replace every field.
    Snapshot(Parameters),
    /// Edit a subset of fields; applied together.
    Fields(Vec<(Parameter, f64)>),
}

impl ParameterUpdate {
    pub fn single(parameter: Parameter, value: f64) -> Self {
        ParameterUpdate::Fields(vec![(parameter, value)])
    }

    pub fn apply_to(&self, params: &mut Parameters) {
        match self {
            ParameterUpdate::Snapshot(snapshot) => *params = *snapshot,
            ParameterUpdate::Fields(edits) => {
                for &(parameter, value) in edits {
                    params.set(parameter, value);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_round_trip_through_from_str() {
        for parameter in Parameter::ALL {
            let parsed: Parameter = parameter.label().parse().expect("label should parse");
            assert_eq!(parsed, parameter);
        }
        assert_eq!("t_max".parse::<Parameter>(), Ok(Parameter::TMax));
    }

    #[test]
    fn unknown_label_is_rejected() {
        let err = "gamma".parse::<Parameter>().expect_err("gamma is not a parameter");
        assert!(err.to_string().contains("gamma"));
    }

    #[test]
    fn field_updates_apply_in_order() {
        let mut params = Parameters::default();
        ParameterUpdate::Fields(vec![
            (Parameter::R, 2.0),
            (Parameter::K, 5_000.0),
            (Parameter::R, 3.0),
        ])
        .apply_to(&mut params);
        assert_eq!(params.r, 3.0);
        assert_eq!(params.k, 5_000.0);
        assert_eq!(params.alpha, 1.0);
    }

    #[test]
    fn snapshot_update_replaces_everything() {
        let mut params = Parameters::default();
        let target = Parameters {
            r: 0.2,
            alpha: 0.5,
            beta: 1.5,
            k: 300.0,
            p0: 10.0,
            t_max: 50.0,
        };
        ParameterUpdate::Snapshot(target).apply_to(&mut params);
        assert_eq!(params, target);
    }

    #[test]
    fn specs_cover_defaults_within_range() {
        let specs = parameter_specs();
        assert_eq!(specs.len(), 6);
        for spec in specs {
            assert!(spec.min <= spec.initial && spec.initial <= spec.max, "{spec:?}");
        }
    }

    #[test]
    fn slider_start_values_follow_the_widgets() {
        let defaults = Parameters::default();
        for parameter in Parameter::ALL {
            let spec = parameter.spec();
            match parameter {
                Parameter::TMax => assert_eq!(spec.initial, 1_000.0),
                other => assert_eq!(spec.initial, defaults.get(other), "{other}"),
            }
        }
    }
}
