use thiserror::Error;

/// Why a single simulation attempt produced no series.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimulationError {
    /// Inputs rejected before the solver ran.
    #[error("Invalid parameters: {reason}")]
    InvalidParameters { reason: String },

    #[error("Invalid simulator settings: {reason}")]
    InvalidSettings { reason: String },

    /// The growth rate became NaN or infinite.
    #[error("Growth rate is not finite at t = {t} (P = {population}).")]
    DomainError { t: f64, population: f64 },

    /// The solver gave up before reaching the horizon.
    #[error("Integration failed at t = {t}: {reason}")]
    IntegrationFailure { t: f64, reason: String },
}

impl SimulationError {
    /// True for failures raised while integrating, as opposed to input checks.
    pub fn is_numerical(&self) -> bool {
        matches!(
            self,
            SimulationError::DomainError { .. } | SimulationError::IntegrationFailure { .. }
        )
    }
}
