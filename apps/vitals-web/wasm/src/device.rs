//! Device information from `navigator`, `location` and `document`
//!
//! - Effective connection type: Network Information API (`navigator.connection`)
//! - Device memory: `navigator.deviceMemory`
//!
//! Neither is in every engine, so both are read reflectively.

use crate::callbacks::property;
use vitals_core::device::{ConnectionInfo, DeviceInfo};

/// Snapshot of the current environment; empty outside a page
pub fn collect_device_info() -> DeviceInfo {
    let Some(window) = web_sys::window() else {
        return DeviceInfo::default();
    };
    let navigator = window.navigator();

    let connection = property(&navigator, "connection").map(|connection| ConnectionInfo {
        effective_type: property(&connection, "effectiveType").and_then(|v| v.as_string()),
        rtt: property(&connection, "rtt").and_then(|v| v.as_f64()),
        downlink: property(&connection, "downlink").and_then(|v| v.as_f64()),
    });

    let cpus = navigator.hardware_concurrency();

    DeviceInfo {
        url: window.location().href().ok(),
        referrer: window.document().map(|document| document.referrer()),
        user_agent: navigator.user_agent().ok(),
        memory: property(&navigator, "deviceMemory").and_then(|v| v.as_f64()),
        cpus: (cpus > 0.0).then_some(cpus as u32),
        connection,
    }
}
