//! Platform-independent pieces of the Shelf browser adapters.
//!
//! The wasm bindings (`shelf-wasm`) are thin wrappers around browser APIs; every rule that
//! can be expressed without a browser lives here so it can be tested natively:
//! - the record model and the [`RecordStore`] contract (plus an in-memory store)
//! - adapter configuration
//! - image bounds for capture downscaling
//! - data URI / base64 payload handling
//! - export file naming
//! - log level parsing

pub mod config;
pub mod data_uri;
pub mod export;
pub mod image;
pub mod logging;
pub mod record;
pub mod store;

pub use config::{
    CameraConfig, CaptureConfig, ConfigError, DatabaseConfig, ExportConfig, ShelfConfig,
};
pub use data_uri::{decode_base64_payload, DataUri, DataUriError};
pub use export::export_file_name;
pub use image::fit_within;
pub use record::{Record, RecordId};
pub use store::{MemoryRecordStore, RecordStore, StoreError};

