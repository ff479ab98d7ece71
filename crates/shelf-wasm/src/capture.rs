//! File picking and image normalization.

use js_sys::Promise;
use log::{debug, info, warn};
use shelf_core::{fit_within, CaptureConfig};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::future_to_promise;
use web_sys::{Event, File, FileReader, HtmlElement, HtmlImageElement, HtmlInputElement};

use crate::dom::{canvas_to_jpeg, context_2d, create_canvas, element_by_id};
use crate::errors::{js_error, to_js_error};
use crate::events::EventFuture;
use crate::options::{from_js, validated};

const FILE_READ_FAILED: &str = "File read failed";

/// Dispatched on an input when a new pick starts, settling any pick still waiting on it.
const PICK_SUPERSEDED: &str = "shelf-pick-superseded";

/// Clears the input's current selection and opens its file dialog.
///
/// Clearing first lets the user pick the same file twice in a row. Missing elements are ignored.
#[wasm_bindgen(js_name = "triggerClick")]
pub fn trigger_click(input_id: &str) -> Result<(), JsValue> {
    let Some(element) = element_by_id::<HtmlElement>(input_id)? else {
        debug!("event=trigger_click status=skipped reason=missing_element id={input_id}");
        return Ok(());
    };
    reset_and_open(&element);
    Ok(())
}

/// Reads the first selected file of an input as a data URI, unprocessed.
///
/// Resolves `null` when the input is missing or empty; rejects with `File read failed` when
/// the browser cannot read the file.
#[wasm_bindgen(js_name = "readFile")]
pub fn read_file(input_id: String) -> Promise {
    future_to_promise(async move {
        let Some(file) = selected_file(&input_id)? else {
            return Ok(JsValue::NULL);
        };
        let data_url = read_data_url(&file).await?;
        Ok(JsValue::from_str(&data_url))
    })
}

/// Opens the input's file dialog and resolves with the chosen image as a data URI.
///
/// With `options.downscale` (the default) the image is scaled to fit `maxDimension` and
/// re-encoded as JPEG at `jpegQuality`. Resolves `null` when the dialog is cancelled, nothing
/// is chosen, the file cannot be read or it is not a decodable image.
///
/// Browsers without the input `cancel` event never report a dismissed dialog; such a pick
/// stays pending until the next `pickImage` on the same input, which resolves it `null`.
#[wasm_bindgen(js_name = "pickImage")]
pub fn pick_image(input_id: String, options: JsValue) -> Promise {
    future_to_promise(async move {
        let config = validated(from_js::<CaptureConfig>(options)?, CaptureConfig::validate)?;
        match pick(&input_id, &config).await? {
            Some(data_url) => Ok(JsValue::from_str(&data_url)),
            None => Ok(JsValue::NULL),
        }
    })
}

async fn pick(input_id: &str, config: &CaptureConfig) -> Result<Option<String>, JsValue> {
    let Some(input) = element_by_id::<HtmlInputElement>(input_id)? else {
        debug!("event=pick_image status=skipped reason=missing_element id={input_id}");
        return Ok(None);
    };

    // Settle an earlier pick on this input, then listen before opening so this call owns the
    // outcome of its own dialog.
    input.dispatch_event(&Event::new(PICK_SUPERSEDED)?)?;
    let chosen = EventFuture::new(&input, &["change", "cancel", PICK_SUPERSEDED])?;
    reset_and_open(&input);
    let (event, _) = chosen.wait().await.map_err(to_js_error)?;
    if event != "change" {
        debug!("event=pick_image status=cancelled reason={event} id={input_id}");
        return Ok(None);
    }

    let Some(file) = first_file(&input) else {
        return Ok(None);
    };
    let data_url = match read_data_url(&file).await {
        Ok(data_url) => data_url,
        Err(err) => {
            warn!("event=pick_image status=read_failed id={input_id} error={err:?}");
            return Ok(None);
        }
    };
    if !config.downscale {
        info!("event=pick_image status=ok id={input_id} bytes={} downscaled=false", file.size());
        return Ok(Some(data_url));
    }

    let normalized = downscale_data_url(&data_url, config).await?;
    match &normalized {
        Some(_) => info!("event=pick_image status=ok id={input_id} bytes={} downscaled=true", file.size()),
        None => warn!("event=pick_image status=not_an_image id={input_id}"),
    }
    Ok(normalized)
}

fn reset_and_open(element: &HtmlElement) {
    if let Some(input) = element.dyn_ref::<HtmlInputElement>() {
        input.set_value("");
    }
    element.click();
}

fn selected_file(input_id: &str) -> Result<Option<File>, JsValue> {
    Ok(element_by_id::<HtmlInputElement>(input_id)?.and_then(|input| first_file(&input)))
}

fn first_file(input: &HtmlInputElement) -> Option<File> {
    input.files().and_then(|files| files.get(0))
}

async fn read_data_url(file: &File) -> Result<String, JsValue> {
    let reader = FileReader::new()?;
    let done = EventFuture::new(&reader, &["load", "error", "abort"])?;
    reader.read_as_data_url(file)?;
    let (event, _) = done.wait().await.map_err(to_js_error)?;
    if event != "load" {
        return Err(js_error(FILE_READ_FAILED));
    }
    reader
        .result()?
        .as_string()
        .ok_or_else(|| js_error(FILE_READ_FAILED))
}

/// Decodes `data_url` as an image and redraws it within the configured bound.
///
/// `None` when the browser cannot decode it as an image.
async fn downscale_data_url(data_url: &str, config: &CaptureConfig) -> Result<Option<String>, JsValue> {
    let image = HtmlImageElement::new()?;
    let loaded = EventFuture::new(&image, &["load", "error"])?;
    image.set_src(data_url);
    let (event, _) = loaded.wait().await.map_err(to_js_error)?;
    if event != "load" {
        return Ok(None);
    }

    let (width, height) = fit_within(image.natural_width(), image.natural_height(), config.max_dimension);
    let canvas = create_canvas(width, height)?;
    context_2d(&canvas)?.draw_image_with_html_image_element_and_dw_and_dh(
        &image,
        0.0,
        0.0,
        f64::from(width),
        f64::from(height),
    )?;
    debug!(
        "event=image_downscale from={}x{} to={width}x{height}",
        image.natural_width(),
        image.natural_height()
    );
    Ok(Some(canvas_to_jpeg(&canvas, config.jpeg_quality)?))
}
