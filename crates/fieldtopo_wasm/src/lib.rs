//! WASM bindings for the fieldtopo core.
//!
//! Settings cross the boundary as plain JS objects and are decoded with
//! `serde-wasm-bindgen`; `undefined` or `null` selects the defaults.

use fieldtopo_core::lic::{generate_noise, NoiseSettings};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_wasm_bindgen::{from_value, to_value};
use wasm_bindgen::prelude::*;

mod field;
mod scalar;
mod topology;

pub use field::WasmVectorField;
pub use scalar::WasmScalarField;
pub use topology::WasmTopologyRunner;

pub(crate) fn settings_or_default<T: DeserializeOwned + Default>(
    value: JsValue,
) -> Result<T, JsValue> {
    if value.is_undefined() || value.is_null() {
        return Ok(T::default());
    }
    from_value(value).map_err(|e| JsValue::from_str(&format!("Invalid settings: {}", e)))
}

pub(crate) fn serialize<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    to_value(value).map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
}

pub(crate) fn js_error(context: &str, err: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&format!("{}: {}", context, err))
}

/// Generates a gray-value noise texture, row-major, one byte per texel.
#[wasm_bindgen]
pub fn generate_noise_texture(settings: JsValue) -> Result<Vec<u8>, JsValue> {
    console_error_panic_hook::set_once();
    let settings: NoiseSettings = settings_or_default(settings)?;
    let noise = generate_noise(&settings).map_err(|e| js_error("Noise generation failed", e))?;
    Ok(noise.into_raw())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wasm_bindgen_test::wasm_bindgen_test;

    #[wasm_bindgen_test]
    fn noise_texture_uses_requested_size() {
        let settings = NoiseSettings {
            width: 8,
            height: 4,
            black_white: true,
            seed: 9,
        };
        let texels =
            generate_noise_texture(to_value(&settings).expect("settings")).expect("noise");
        assert_eq!(texels.len(), 32);
        assert!(texels.iter().all(|&v| v == 0 || v == 255));
    }

    #[wasm_bindgen_test]
    fn noise_texture_rejects_tiny_size() {
        let settings = NoiseSettings {
            width: 1,
            ..NoiseSettings::default()
        };
        let message = generate_noise_texture(to_value(&settings).expect("settings"))
            .err()
            .and_then(|err| err.as_string())
            .unwrap_or_default();
        assert!(message.contains("width"));
    }
}
