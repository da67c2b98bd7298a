//! Decoding helpers shared by the exported entry points.

use anyhow::Context;
use growth_core::{Parameter, Parameters, SimulatorSettings};
use serde_wasm_bindgen::from_value;
use wasm_bindgen::prelude::*;

/// `undefined`/`null` mean "use the defaults".
pub(crate) fn decode_parameters(value: JsValue) -> Result<Parameters, JsValue> {
    if value.is_undefined() || value.is_null() {
        return Ok(Parameters::default());
    }
    from_value(value).map_err(|e| JsValue::from_str(&format!("Invalid parameters: {}", e)))
}

pub(crate) fn decode_settings(value: JsValue) -> Result<SimulatorSettings, JsValue> {
    if value.is_undefined() || value.is_null() {
        return Ok(SimulatorSettings::default());
    }
    from_value(value).map_err(|e| JsValue::from_str(&format!("Invalid simulator settings: {}", e)))
}

/// Pairs slider names with values for a batched update.
pub(crate) fn resolve_fields(
    names: &[String],
    values: &[f64],
) -> anyhow::Result<Vec<(Parameter, f64)>> {
    if names.len() != values.len() {
        anyhow::bail!(
            "Got {} parameter names but {} values",
            names.len(),
            values.len()
        );
    }
    names
        .iter()
        .zip(values)
        .map(|(name, &value)| {
            let parameter: Parameter = name
                .parse()
                .with_context(|| format!("Cannot update parameter '{}'", name))?;
            Ok::<_, anyhow::Error>((parameter, value))
        })
        .collect()
}

pub(crate) fn to_js_error(err: anyhow::Error) -> JsValue {
    JsValue::from_str(&format!("{:#}", err))
}
