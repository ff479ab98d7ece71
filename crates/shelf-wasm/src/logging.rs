//! `log` sink writing to the browser console.

use log::{LevelFilter, Log, Metadata, Record};
use wasm_bindgen::prelude::*;

use crate::errors::to_js_error;

struct ConsoleLogger;

static LOGGER: ConsoleLogger = ConsoleLogger;

impl Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = JsValue::from_str(&format!("[{}] {}", record.target(), record.args()));
        match record.level() {
            log::Level::Error => web_sys::console::error_1(&line),
            log::Level::Warn => web_sys::console::warn_1(&line),
            log::Level::Info => web_sys::console::info_1(&line),
            log::Level::Debug | log::Level::Trace => web_sys::console::debug_1(&line),
        }
    }

    fn flush(&self) {}
}

/// Installs the console logger at `level` (`trace|debug|info|warn|error|off`).
///
/// Without a level, debug builds log at `debug` and release builds at `info`. Calling again only
/// changes the level.
#[wasm_bindgen(js_name = "initLogging")]
pub fn init_logging(level: Option<String>) -> Result<(), JsValue> {
    let filter = shelf_core::logging::resolve_level(level.as_deref()).map_err(to_js_error)?;
    install(filter);
    Ok(())
}

fn install(filter: LevelFilter) {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();

    // Fails only when a logger is already installed, which is ours or the host's.
    let _ = log::set_logger(&LOGGER);
    log::set_max_level(filter);
    log::debug!("event=logging_init level={filter}");
}
