//! WASM bridge for `growth_core`.

mod controller;
mod convert;

pub use controller::WasmController;

use convert::{decode_parameters, decode_settings};
use growth_core::parameters::parameter_specs as core_parameter_specs;
use growth_core::Simulator;
use serde_wasm_bindgen::to_value;
use wasm_bindgen::prelude::*;

/// One-shot simulation: `{ times, populations }` for the given parameters.
///
/// `settings` is optional; omitting it from JS passes `undefined`, which
/// selects `SimulatorSettings::default()`.
#[wasm_bindgen]
pub fn simulate(params_val: JsValue, settings_val: JsValue) -> Result<JsValue, JsValue> {
    console_error_panic_hook::set_once();

    let params = decode_parameters(params_val)?;
    let settings = decode_settings(settings_val)?;
    let series = Simulator::with_settings(settings)
        .run(&params)
        .map_err(|e| JsValue::from_str(&format!("Simulation failed: {}", e)))?;
    to_value(&series).map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
}

/// Slider labels, ranges and start values.
#[wasm_bindgen]
pub fn parameter_specs() -> Result<JsValue, JsValue> {
    to_value(&core_parameter_specs())
        .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
}
