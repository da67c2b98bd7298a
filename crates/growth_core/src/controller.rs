//! Recomputes the trajectory whenever the parameters change.
//!
//! The controller owns the current `Parameters`. Each change copies the full
//! snapshot, runs the simulator from scratch, and hands the finished series
//! to a `SeriesSink`. A failed run publishes nothing: the sink keeps showing
//! the last good series.

use crate::error::SimulationError;
use crate::parameters::{Parameter, ParameterUpdate, Parameters};
use crate::series::TimeSeries;
use crate::simulator::Simulator;
use crossbeam_channel::{Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

/// The display side of the controller.
pub trait SeriesSink {
    /// Receives a complete series. Never called with a partial result.
    fn publish(&mut self, series: &Arc<TimeSeries>);
}

impl<F> SeriesSink for F
where
    F: FnMut(&Arc<TimeSeries>),
{
    fn publish(&mut self, series: &Arc<TimeSeries>) {
        (self)(series)
    }
}

/// Latest published series, readable from any thread.
///
/// Publishing swaps a whole `Arc`, so a reader gets either the previous
/// series or the new one.
#[derive(Debug, Clone, Default)]
pub struct SharedSeries {
    inner: Arc<Mutex<Option<Arc<TimeSeries>>>>,
}

impl SharedSeries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Option<Arc<TimeSeries>> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl SeriesSink for SharedSeries {
    fn publish(&mut self, series: &Arc<TimeSeries>) {
        *self.inner.lock().unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(series));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    /// The held series matches the held parameters, or the last attempt failed.
    Idle,
    Recomputing,
}

pub struct ReactiveController<S: SeriesSink> {
    params: Parameters,
    simulator: Simulator,
    sink: S,
    state: ControllerState,
    series: Option<Arc<TimeSeries>>,
    last_error: Option<SimulationError>,
    recomputations: u64,
}

impl<S: SeriesSink> ReactiveController<S> {
    /// Builds the controller and publishes the start-up series.
    pub fn new(params: Parameters, sink: S) -> Self {
        Self::with_simulator(params, Simulator::default(), sink)
    }

    pub fn with_simulator(params: Parameters, simulator: Simulator, sink: S) -> Self {
        let mut controller = Self {
            params,
            simulator,
            sink,
            state: ControllerState::Idle,
            series: None,
            last_error: None,
            recomputations: 0,
        };
        // A bad start-up state is recorded in `last_error`.
        let _ = controller.recompute();
        controller
    }

    pub fn parameters(&self) -> Parameters {
        self.params
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    /// Last successfully computed series.
    pub fn series(&self) -> Option<&Arc<TimeSeries>> {
        self.series.as_ref()
    }

    /// Error from the most recent attempt, cleared by the next success.
    pub fn last_error(&self) -> Option<&SimulationError> {
        self.last_error.as_ref()
    }

    /// Number of recomputations attempted, including the start-up one.
    pub fn recomputations(&self) -> u64 {
        self.recomputations
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Full-snapshot change notification from the input boundary.
    pub fn on_parameters_changed(&mut self, params: Parameters) -> Result<(), SimulationError> {
        self.params = params;
        self.recompute()
    }

    /// Single-field change notification, as a slider would send it.
    pub fn on_parameter_changed(
        &mut self,
        parameter: Parameter,
        value: f64,
    ) -> Result<(), SimulationError> {
        self.params.set(parameter, value);
        self.recompute()
    }

    pub fn apply(&mut self, update: &ParameterUpdate) -> Result<(), SimulationError> {
        update.apply_to(&mut self.params);
        self.recompute()
    }

    fn recompute(&mut self) -> Result<(), SimulationError> {
        self.state = ControllerState::Recomputing;
        self.recomputations += 1;
        let snapshot = self.params;
        let result = self.simulator.run(&snapshot);
        self.state = ControllerState::Idle;

        match result {
            Ok(series) => {
                let series = Arc::new(series);
                debug!(
                    recomputation = self.recomputations,
                    samples = series.len(),
                    "publishing series"
                );
                self.sink.publish(&series);
                self.series = Some(series);
                self.last_error = None;
                Ok(())
            }
            Err(err) => {
                warn!(
                    recomputation = self.recomputations,
                    params = ?snapshot,
                    error = %err,
                    "recomputation failed; keeping previous series"
                );
                self.last_error = Some(err.clone());
                Err(err)
            }
        }
    }

    /// Processes updates until every sender is dropped.
    ///
    /// Updates that queue up while a recomputation runs are folded together
    /// and trigger a single recomputation with the latest values.
    pub fn run(&mut self, events: &Receiver<ParameterUpdate>) {
        while let Ok(update) = events.recv() {
            update.apply_to(&mut self.params);
            let mut coalesced = 1usize;
            for update in events.try_iter() {
                update.apply_to(&mut self.params);
                coalesced += 1;
            }
            if coalesced > 1 {
                debug!(coalesced, "coalesced parameter updates");
            }
            let _ = self.recompute();
        }
        info!(
            recomputations = self.recomputations,
            "parameter channel closed; controller stopping"
        );
    }
}

/// Handle to a controller running on its own thread.
pub struct ControllerHandle {
    pub updates: Sender<ParameterUpdate>,
    pub series: SharedSeries,
    pub thread: JoinHandle<()>,
}

/// Starts a controller thread fed by an unbounded channel.
///
/// The start-up series is published before this returns. Dropping every
/// clone of `updates` stops the thread.
pub fn spawn_controller(params: Parameters, simulator: Simulator) -> ControllerHandle {
    let (updates, events) = crossbeam_channel::unbounded();
    let series = SharedSeries::new();
    let mut controller = ReactiveController::with_simulator(params, simulator, series.clone());
    let thread = thread::spawn(move || controller.run(&events));
    ControllerHandle {
        updates,
        series,
        thread,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingSink {
        published: Vec<Arc<TimeSeries>>,
    }

    impl SeriesSink for RecordingSink {
        fn publish(&mut self, series: &Arc<TimeSeries>) {
            self.published.push(Arc::clone(series));
        }
    }

    fn start() -> ReactiveController<RecordingSink> {
        ReactiveController::new(Parameters::default(), RecordingSink::default())
    }

    #[test]
    fn publishes_start_up_series() {
        let controller = start();
        assert_eq!(controller.sink().published.len(), 1);
        assert_eq!(controller.state(), ControllerState::Idle);
        let series = controller.series().expect("start-up series");
        assert_eq!(series.len(), 180);
        assert!(series.populations().iter().all(|&p| p == 1000.0));
    }

    #[test]
    fn parameter_change_recomputes_full_series() {
        let mut controller = start();
        controller
            .on_parameter_changed(Parameter::P0, 10.0)
            .expect("valid change");
        let series = controller.series().expect("series");
        assert_eq!(series.populations()[0], 10.0);
        assert!(series.populations()[179] > 999.0);
        assert_eq!(controller.sink().published.len(), 2);
        assert_eq!(controller.parameters().p0, 10.0);
    }

    #[test]
    fn failure_keeps_last_good_series_and_publishes_nothing() {
        let mut controller = start();
        let before = Arc::clone(controller.series().expect("series"));

        let singular = Parameters {
            beta: 0.5,
            p0: 2000.0,
            ..Parameters::default()
        };
        let err = controller
            .on_parameters_changed(singular)
            .expect_err("pole should fail");
        assert!(matches!(err, SimulationError::DomainError { .. }));
        assert_eq!(controller.sink().published.len(), 1);
        assert!(Arc::ptr_eq(controller.series().expect("series"), &before));
        assert_eq!(controller.last_error(), Some(&err));
        assert_eq!(controller.state(), ControllerState::Idle);

        controller
            .on_parameter_changed(Parameter::P0, 500.0)
            .expect("recovers");
        assert!(controller.last_error().is_none());
        assert_eq!(controller.sink().published.len(), 2);
    }

    #[test]
    fn invalid_start_up_parameters_leave_no_series() {
        let params = Parameters {
            t_max: 0.0,
            ..Parameters::default()
        };
        let controller = ReactiveController::new(params, RecordingSink::default());
        assert!(controller.series().is_none());
        assert!(matches!(
            controller.last_error(),
            Some(SimulationError::InvalidParameters { .. })
        ));
        assert!(controller.sink().published.is_empty());
    }

    #[test]
    fn batched_update_applies_all_fields_before_recomputing() {
        let mut controller = start();
        controller
            .apply(&ParameterUpdate::Fields(vec![
                (Parameter::P0, 5.0),
                (Parameter::TMax, 20.0),
            ]))
            .expect("valid batch");
        assert_eq!(controller.recomputations(), 2);
        let series = controller.series().expect("series");
        assert_eq!(series.len(), 20);
        assert_eq!(series.populations()[0], 5.0);
    }

    #[test]
    fn run_coalesces_queued_updates() {
        let mut controller = start();
        let (tx, rx) = crossbeam_channel::unbounded();
        tx.send(ParameterUpdate::single(Parameter::P0, 1.0)).expect("send");
        tx.send(ParameterUpdate::single(Parameter::P0, 2.0)).expect("send");
        tx.send(ParameterUpdate::single(Parameter::TMax, 30.0)).expect("send");
        drop(tx);

        controller.run(&rx);

        assert_eq!(controller.sink().published.len(), 2);
        assert_eq!(controller.recomputations(), 2);
        let series = controller.series().expect("series");
        assert_eq!(series.len(), 30);
        assert_eq!(series.populations()[0], 2.0);
    }

    #[test]
    fn closure_sink_receives_series() {
        let mut lengths = Vec::new();
        {
            let mut controller =
                ReactiveController::new(Parameters::default(), |s: &Arc<TimeSeries>| {
                    lengths.push(s.len())
                });
            controller
                .on_parameter_changed(Parameter::TMax, 10.0)
                .expect("valid change");
        }
        assert_eq!(lengths, vec![180, 10]);
    }

    #[test]
    fn spawned_controller_converges_on_latest_parameters() {
        let handle = spawn_controller(Parameters::default(), Simulator::default());
        assert_eq!(handle.series.snapshot().expect("start-up").len(), 180);

        for t_max in [50.0, 60.0, 70.0] {
            handle
                .updates
                .send(ParameterUpdate::single(Parameter::TMax, t_max))
                .expect("controller alive");
        }
        let ControllerHandle {
            updates,
            series,
            thread,
        } = handle;
        drop(updates);
        thread.join().expect("controller thread");

        let latest = series.snapshot().expect("series");
        assert_eq!(latest.len(), 70);
    }
}
