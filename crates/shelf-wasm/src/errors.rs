use std::fmt::Display;

use wasm_bindgen::JsValue;

/// A JS `Error` carrying `message`.
pub(crate) fn js_error(message: &str) -> JsValue {
    js_sys::Error::new(message).into()
}

/// Converts a Rust error into a JS `Error` with the error's display text.
pub(crate) fn to_js_error<E: Display>(err: E) -> JsValue {
    js_error(&err.to_string())
}
