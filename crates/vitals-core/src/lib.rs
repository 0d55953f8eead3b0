//! Web vitals session reporting
//!
//! This crate provides the platform-independent half of the vitals reporter:
//! metrics are accumulated into one flat result per page session and
//! delivered exactly once, when the page lifecycle says the session is over.
//!
//! # Features
//!
//! - **Reporter**: last-write-wins accumulation, exactly-once flush, pluggable
//!   `map_metric` / `before_send` / `on_send` hooks
//! - **Lifecycle detection**: one terminal signal per session despite
//!   inconsistent `visibilitychange` / `pagehide` behavior across engines
//! - **Transport policy**: beacon first, blocking `text/plain` POST second,
//!   silent no-op without a request context
//!
//! Browser bindings live in the `vitals-wasm` crate; everything here runs and
//! tests natively.

pub mod clock;
pub mod config;
pub mod device;
pub mod error;
pub mod id;
pub mod lifecycle;
pub mod metric;
pub mod options;
pub mod payload;
pub mod reporter;
pub mod transport;

// Re-export main types for convenience
pub use clock::Clock;
pub use config::{LifecycleStrategyChoice, ReporterConfig};
pub use device::{ConnectionInfo, DeviceInfo};
pub use error::ReporterError;
pub use lifecycle::{
    register_terminal_callback, schedule_terminal_callback, LifecycleHost, LifecycleStrategy,
    PageHide, PageLifecycle, TerminalEvent, Visibility,
};
pub use metric::{Metric, WebVital};
pub use options::{BeforeSend, MapMetric, OnSend, ReporterOptions, WebVitalsMapper};
pub use payload::{Payload, SessionResult};
pub use reporter::{FlushOutcome, Reporter};
pub use transport::{DeliveryOutcome, Transport};
