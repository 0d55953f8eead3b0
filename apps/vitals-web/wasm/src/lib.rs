//! WASM bindings for the vitals reporter
//!
//! Metrics are accumulated in Rust and sent once when the page goes away.
//! JavaScript only forwards metric callbacks and optional hooks.
//!
//! ## Usage (JavaScript)
//!
//! ```javascript
//! import init, { createApiReporter, getDeviceInfo } from './pkg/vitals_wasm.js';
//!
//! await init();
//!
//! const reporter = createApiReporter('/analytics', {
//!   initial: getDeviceInfo(),
//!   beforeSend: (result) => ({ release: window.RELEASE }),
//! });
//! onLCP(reporter.callback());
//! ```

pub mod browser;
pub mod callbacks;
pub mod device;
pub mod reporter;

use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;
use tracing_web::MakeWebConsoleWriter;
use wasm_bindgen::prelude::*;

// Re-export main types for JavaScript
pub use browser::{BrowserHost, BrowserTransport, PerformanceClock};
pub use device::collect_device_info;
pub use reporter::ApiReporter;

/// Initialize the WASM module
/// Called automatically by wasm-bindgen
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
    init_logging();
    web_sys::console::log_1(&"vitals-wasm initialized".into());
}

/// Send `tracing` events at info and above to the browser console.
/// Only the first call installs the subscriber.
pub fn init_logging() {
    let console = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .without_time()
        .with_writer(MakeWebConsoleWriter::new());

    let _ = tracing_subscriber::registry()
        .with(LevelFilter::INFO)
        .with(console)
        .try_init();
}

/// Create a reporter posting to `url` once the session ends
#[wasm_bindgen(js_name = createApiReporter)]
pub fn create_api_reporter(url: &str, options: JsValue) -> Result<ApiReporter, JsValue> {
    ApiReporter::new(url, options)
}

/// Device and connection details, suitable as `initial`
#[wasm_bindgen(js_name = getDeviceInfo)]
pub fn get_device_info() -> Result<JsValue, JsValue> {
    callbacks::to_js(&collect_device_info()).map_err(reporter::to_js_error)
}

/// Get the library version
#[wasm_bindgen(js_name = getVersion)]
pub fn get_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
