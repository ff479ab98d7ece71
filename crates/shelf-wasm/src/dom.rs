use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{CanvasRenderingContext2d, Document, HtmlCanvasElement, Window};

use crate::errors::js_error;

pub(crate) fn window() -> Result<Window, JsValue> {
    web_sys::window().ok_or_else(|| js_error("no global `window` exists"))
}

pub(crate) fn document() -> Result<Document, JsValue> {
    window()?
        .document()
        .ok_or_else(|| js_error("window has no `document`"))
}

/// Looks up an element by id; `None` when it is absent or not a `T`.
pub(crate) fn element_by_id<T: JsCast>(id: &str) -> Result<Option<T>, JsValue> {
    Ok(document()?
        .get_element_by_id(id)
        .and_then(|element| element.dyn_into::<T>().ok()))
}

pub(crate) fn create_canvas(width: u32, height: u32) -> Result<HtmlCanvasElement, JsValue> {
    let canvas: HtmlCanvasElement = document()?.create_element("canvas")?.dyn_into()?;
    canvas.set_width(width);
    canvas.set_height(height);
    Ok(canvas)
}

pub(crate) fn context_2d(canvas: &HtmlCanvasElement) -> Result<CanvasRenderingContext2d, JsValue> {
    canvas
        .get_context("2d")?
        .ok_or_else(|| js_error("2d canvas context is unavailable"))?
        .dyn_into::<CanvasRenderingContext2d>()
        .map_err(JsValue::from)
}

/// Encodes the canvas contents as a JPEG data URI.
pub(crate) fn canvas_to_jpeg(canvas: &HtmlCanvasElement, quality: f64) -> Result<String, JsValue> {
    canvas.to_data_url_with_type_and_encoder_options("image/jpeg", &JsValue::from_f64(quality))
}
