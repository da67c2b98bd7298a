//! The `growth_core` crate simulates a generalized logistic growth law and
//! recomputes its trajectory whenever the parameters change.
//!
//! Key components:
//! - **Traits**: `Scalar` (numeric type abstraction), `DynamicalSystem` (ODEs), `JacobianSystem` (ODEs with derivatives), `Steppable` and `AdaptiveSteppable` (Solvers).
//! - **Model**: the growth law `dP/dt = r (K - P) / (K - (1 - beta) P) P^alpha`.
//! - **Solvers**: fixed-step RK4, adaptive Tsit5, and the stiff Rosenbrock 2(3).
//! - **Simulator**: parameters to sampled `TimeSeries`, with typed `SimulationError`s.
//! - **Controller**: owns the parameters, recomputes on change, publishes to a `SeriesSink`.

pub mod controller;
pub mod error;
pub mod model;
pub mod parameters;
pub mod series;
pub mod simulator;
pub mod solvers;
pub mod traits;

pub use controller::{spawn_controller, ReactiveController, SeriesSink, SharedSeries};
pub use error::SimulationError;
pub use parameters::{Parameter, ParameterUpdate, Parameters};
pub use series::TimeSeries;
pub use simulator::{simulate, Method, SamplingPolicy, Simulator, SimulatorSettings};
