//! `.xlsx` import from base64 and export as a browser download.

use chrono::NaiveDate;
use js_sys::{Array, Date, Uint8Array};
use log::info;
use serde_json::Value as JsonValue;
use shelf_core::{decode_base64_payload, export_file_name, ExportConfig};
use shelf_xlsx::{read_first_sheet_rows, write_rows_workbook, WriteOptions, XLSX_MIME};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Blob, BlobPropertyBag, HtmlAnchorElement, Url};

use crate::dom::document;
use crate::errors::{js_error, to_js_error};
use crate::options::{from_js, validated};

/// Parses the first sheet of a base64-encoded workbook.
///
/// Returns a JSON array string of row objects keyed by the header row; every value is a string
/// and cells a row leaves empty read as `""`.
#[wasm_bindgen(js_name = "parseExcel")]
pub fn parse_excel(base64: &str) -> Result<String, JsValue> {
    let bytes = decode_base64_payload(base64).map_err(to_js_error)?;
    let rows = read_first_sheet_rows(&bytes).map_err(to_js_error)?;
    let json = serde_json::to_string(&rows).map_err(to_js_error)?;
    info!("event=xlsx_import status=ok bytes={} rows={}", bytes.len(), rows.len());
    Ok(json)
}

/// Writes `rows` (an array of arrays, headers first) to a workbook and downloads it.
///
/// The sheet is named `sheet_name`, or the configured default when it is absent or blank. The
/// file name embeds today's local date.
#[wasm_bindgen(js_name = "exportToExcel")]
pub fn export_to_excel(rows: JsValue, sheet_name: Option<String>, config: JsValue) -> Result<(), JsValue> {
    let config = validated(from_js::<ExportConfig>(config)?, ExportConfig::validate)?;
    let rows: Vec<Vec<JsonValue>> = serde_wasm_bindgen::from_value(rows).map_err(to_js_error)?;

    let options = WriteOptions {
        sheet_name: config.sheet_name(sheet_name.as_deref()).to_string(),
        column_widths: config.column_widths.clone(),
    };
    let bytes = write_rows_workbook(&rows, &options).map_err(to_js_error)?;
    let file_name = export_file_name(&config.file_prefix, today()?);

    download(&bytes, &file_name)?;
    info!(
        "event=xlsx_export status=ok rows={} bytes={} sheet={}",
        rows.len(),
        bytes.len(),
        options.sheet_name
    );
    Ok(())
}

/// The local calendar date.
fn today() -> Result<NaiveDate, JsValue> {
    let now = Date::new_0();
    NaiveDate::from_ymd_opt(now.get_full_year() as i32, now.get_month() + 1, now.get_date())
        .ok_or_else(|| js_error("current date is out of range"))
}

/// Saves `bytes` as `file_name` through a temporary object URL and anchor.
fn download(bytes: &[u8], file_name: &str) -> Result<(), JsValue> {
    let parts = Array::of1(&Uint8Array::from(bytes));
    let properties = BlobPropertyBag::new();
    properties.set_type(XLSX_MIME);
    let blob = Blob::new_with_u8_array_sequence_and_options(&parts, &properties)?;
    let url = Url::create_object_url_with_blob(&blob)?;

    let clicked = click_anchor(&url, file_name);
    Url::revoke_object_url(&url)?;
    clicked
}

fn click_anchor(url: &str, file_name: &str) -> Result<(), JsValue> {
    let document = document()?;
    let body = document
        .body()
        .ok_or_else(|| js_error("document has no body"))?;
    let anchor: HtmlAnchorElement = document.create_element("a")?.dyn_into()?;
    anchor.set_href(url);
    anchor.set_download(file_name);
    anchor.style().set_property("display", "none")?;

    body.append_child(&anchor)?;
    anchor.click();
    anchor.remove();
    Ok(())
}
