//! Reactive controller exposed to the JavaScript front-end.
//!
//! Sliders call `set_parameter`; the plot registers a callback with
//! `subscribe` and receives `(times, populations)` on every recomputation.

use crate::convert::{decode_parameters, decode_settings, resolve_fields, to_js_error};
use growth_core::controller::{ReactiveController, SeriesSink};
use growth_core::parameters::ParameterUpdate;
use growth_core::{Parameter, Parameters, Simulator, SimulatorSettings, TimeSeries};
use js_sys::{Float64Array, Function};
use serde_wasm_bindgen::to_value;
use std::sync::Arc;
use tracing::warn;
use wasm_bindgen::prelude::*;

#[derive(Default)]
pub(crate) struct JsSink {
    callback: Option<Function>,
}

impl SeriesSink for JsSink {
    fn publish(&mut self, series: &Arc<TimeSeries>) {
        let Some(callback) = &self.callback else {
            return;
        };
        let times = Float64Array::from(series.times());
        let populations = Float64Array::from(series.populations());
        if let Err(err) = callback.call2(&JsValue::NULL, &times.into(), &populations.into()) {
            warn!(?err, "series callback threw");
        }
    }
}

#[wasm_bindgen]
pub struct WasmController {
    inner: ReactiveController<JsSink>,
}

impl WasmController {
    pub(crate) fn from_parts(params: Parameters, settings: SimulatorSettings) -> Self {
        Self {
            inner: ReactiveController::with_simulator(
                params,
                Simulator::with_settings(settings),
                JsSink::default(),
            ),
        }
    }

    /// True when the last recomputation produced a new series.
    fn published(&self) -> bool {
        self.inner.last_error().is_none()
    }
}

#[wasm_bindgen]
impl WasmController {
    /// Both arguments may be `undefined` or omitted for the defaults.
    #[wasm_bindgen(constructor)]
    pub fn new(params_val: JsValue, settings_val: JsValue) -> Result<WasmController, JsValue> {
        console_error_panic_hook::set_once();

        let params = decode_parameters(params_val)?;
        let settings = decode_settings(settings_val)?;
        Ok(Self::from_parts(params, settings))
    }

    /// Registers the plot callback and replays the current series to it.
    pub fn subscribe(&mut self, callback: Function) {
        self.inner.sink_mut().callback = Some(callback);
        if let Some(series) = self.inner.series().cloned() {
            self.inner.sink_mut().publish(&series);
        }
    }

    pub fn unsubscribe(&mut self) {
        self.inner.sink_mut().callback = None;
    }

    /// Returns whether the curve was updated. A rejected combination keeps
    /// the previous curve; `last_error` says why.
    pub fn set_parameter(&mut self, name: &str, value: f64) -> Result<bool, JsValue> {
        let parameter: Parameter = name
            .parse()
            .map_err(|e| JsValue::from_str(&format!("{}", e)))?;
        let _ = self.inner.on_parameter_changed(parameter, value);
        Ok(self.published())
    }

    /// Applies several slider values together before recomputing once.
    pub fn set_parameters(
        &mut self,
        names: Vec<String>,
        values: Vec<f64>,
    ) -> Result<bool, JsValue> {
        let fields = resolve_fields(&names, &values).map_err(to_js_error)?;
        let _ = self.inner.apply(&ParameterUpdate::Fields(fields));
        Ok(self.published())
    }

    pub fn replace_parameters(&mut self, params_val: JsValue) -> Result<bool, JsValue> {
        let params = decode_parameters(params_val)?;
        let _ = self.inner.on_parameters_changed(params);
        Ok(self.published())
    }

    pub fn parameters(&self) -> Result<JsValue, JsValue> {
        to_value(&self.inner.parameters())
            .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
    }

    pub fn times(&self) -> Float64Array {
        match self.inner.series() {
            Some(series) => Float64Array::from(series.times()),
            None => Float64Array::new_with_length(0),
        }
    }

    pub fn populations(&self) -> Float64Array {
        match self.inner.series() {
            Some(series) => Float64Array::from(series.populations()),
            None => Float64Array::new_with_length(0),
        }
    }

    /// Axis limits `{ t_max, p_max }` for the current curve, or `undefined`.
    pub fn extent(&self) -> Result<JsValue, JsValue> {
        let extent = self.inner.series().and_then(|series| series.extent());
        to_value(&extent).map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
    }

    pub fn last_error(&self) -> Option<String> {
        self.inner.last_error().map(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_parameter_reports_whether_curve_updated() {
        let mut controller =
            WasmController::from_parts(Parameters::default(), SimulatorSettings::default());
        assert!(controller.last_error().is_none());

        let updated = controller.set_parameter("P0", 10.0).expect("known parameter");
        assert!(updated);
        assert_eq!(controller.inner.parameters().p0, 10.0);

        // Pole of the growth law at K / (1 - beta) = 2000.
        controller.set_parameter("beta", 0.5).expect("known parameter");
        let updated = controller.set_parameter("P0", 2000.0).expect("known parameter");
        assert!(!updated);
        let message = controller.last_error().expect("error recorded");
        assert!(message.contains("not finite"), "{message}");
        let kept = controller.inner.series().expect("previous series kept");
        assert_eq!(kept.populations()[0], 10.0);
    }

    #[test]
    fn set_parameters_applies_batch() {
        let mut controller =
            WasmController::from_parts(Parameters::default(), SimulatorSettings::default());
        let updated = controller
            .set_parameters(vec!["P0".to_string(), "t".to_string()], vec![1.0, 25.0])
            .expect("known parameters");
        assert!(updated);
        let series = controller.inner.series().expect("series");
        assert_eq!(series.len(), 25);
        assert_eq!(controller.inner.recomputations(), 2);
    }
}
