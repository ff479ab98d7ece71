use serde::de::DeserializeOwned;
use shelf_core::{ConfigError, ShelfConfig};
use wasm_bindgen::JsValue;

use crate::errors::to_js_error;

/// Reads a (possibly partial) options object from JS; `undefined`/`null` give the defaults.
pub(crate) fn from_js<T: DeserializeOwned + Default>(value: JsValue) -> Result<T, JsValue> {
    if value.is_undefined() || value.is_null() {
        return Ok(T::default());
    }
    serde_wasm_bindgen::from_value(value).map_err(to_js_error)
}

/// Reads and validates a full [`ShelfConfig`].
pub(crate) fn shelf_config(value: JsValue) -> Result<ShelfConfig, JsValue> {
    let config: ShelfConfig = from_js(value)?;
    config.validate().map_err(to_js_error)?;
    Ok(config)
}

/// Validates one config section with its own rules.
pub(crate) fn validated<T>(
    section: T,
    validate: impl FnOnce(&T) -> Result<(), ConfigError>,
) -> Result<T, JsValue> {
    validate(&section).map_err(to_js_error)?;
    Ok(section)
}
