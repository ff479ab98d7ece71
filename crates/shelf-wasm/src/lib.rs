//! Browser bindings for the Shelf adapters.
//!
//! Exposed to JS:
//! - `RecordDb`: IndexedDB record storage (`getAll`, `add`, `update`, `delete`, `clear`)
//! - `Camera`: rear camera preview and still capture (`start`, `stop`, `capture`)
//! - `triggerClick`, `readFile`, `pickImage`: file input helpers
//! - `parseExcel`, `exportToExcel`: spreadsheet import/export
//! - `initLogging`: console logging
//!
//! Browser failures reach JS unchanged as promise rejections or thrown values; failures raised
//! here become `Error` objects.

mod camera;
mod capture;
mod dom;
mod errors;
mod events;
mod idb;
mod logging;
mod options;
mod record_db;
mod spreadsheet;

pub use camera::Camera;
pub use capture::{pick_image, read_file, trigger_click};
pub use idb::{IdbError, IdbRecordStore};
pub use logging::init_logging;
pub use record_db::RecordDb;
pub use spreadsheet::{export_to_excel, parse_excel};

/// Crate version, for diagnostics.
#[wasm_bindgen::prelude::wasm_bindgen(js_name = "shelfVersion")]
pub fn shelf_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
