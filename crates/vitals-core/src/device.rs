//! Device and network description, usually passed as `initial`

use crate::error::ReporterError;
use crate::payload::SessionResult;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Environment details; every field is absent when the capability is missing
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referrer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    /// Approximate device memory in GiB (`navigator.deviceMemory`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<f64>,
    /// Logical processors (`navigator.hardwareConcurrency`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpus: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection: Option<ConnectionInfo>,
}

/// Subset of the Network Information API
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionInfo {
    /// `slow-2g`, `2g`, `3g` or `4g`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effective_type: Option<String>,
    /// Round-trip time estimate in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rtt: Option<f64>,
    /// Bandwidth estimate in megabits per second
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub downlink: Option<f64>,
}

impl DeviceInfo {
    /// Fields ready to merge into a session result
    pub fn to_result(&self) -> Result<SessionResult, ReporterError> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            other => Err(ReporterError::Serialization(format!(
                "device info serialized to {}",
                other
            ))),
        }
    }
}
