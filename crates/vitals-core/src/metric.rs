//! Metric events and the default web-vitals mapping
//!
//! A [`Metric`] is what instrumentation hands to the reporter: a name, a
//! numeric value and whatever else the producer attached (`delta`, `id`,
//! `rating`, ...). The default mapping turns one metric into one result field.

use crate::payload::{number, SessionResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single named measurement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub name: String,
    pub value: f64,
    /// Remaining fields of the event, kept for custom mappers
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Metric {
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            value,
            extra: Map::new(),
        }
    }

    /// Attach an extra field (builder style)
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Look up an extra field
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }

    pub fn web_vital(&self) -> Option<WebVital> {
        WebVital::from_name(&self.name)
    }
}

/// Metric names recognized by the default mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WebVital {
    /// First Contentful Paint
    Fcp,
    /// Time To First Byte
    Ttfb,
    /// Largest Contentful Paint
    Lcp,
    /// Cumulative Layout Shift
    Cls,
    /// First Input Delay
    Fid,
}

impl WebVital {
    pub const ALL: [WebVital; 5] = [
        WebVital::Fcp,
        WebVital::Ttfb,
        WebVital::Lcp,
        WebVital::Cls,
        WebVital::Fid,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "FCP" => Some(WebVital::Fcp),
            "TTFB" => Some(WebVital::Ttfb),
            "LCP" => Some(WebVital::Lcp),
            "CLS" => Some(WebVital::Cls),
            "FID" => Some(WebVital::Fid),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WebVital::Fcp => "FCP",
            WebVital::Ttfb => "TTFB",
            WebVital::Lcp => "LCP",
            WebVital::Cls => "CLS",
            WebVital::Fid => "FID",
        }
    }

    /// Decimal digits kept when reporting this metric.
    ///
    /// CLS is a unitless score well below 1, everything else is milliseconds.
    pub fn precision(&self) -> u32 {
        match self {
            WebVital::Cls => 4,
            _ => 0,
        }
    }
}

/// Default mapping: `{name: value}`, rounding recognized web vitals
pub fn map_web_vital(metric: &Metric) -> SessionResult {
    let value = match metric.web_vital() {
        Some(vital) => round(metric.value, vital.precision()),
        None => metric.value,
    };

    let mut patch = SessionResult::new();
    patch.insert(metric.name.clone(), number(value));
    patch
}

/// Round to `precision` decimal digits, half-up.
///
/// Scaling goes through the decimal text form (`"1.005e2"`) rather than a
/// float multiply so that values like `1.005` round to `1.01`.
pub fn round(value: f64, precision: u32) -> f64 {
    if !value.is_finite() {
        return value;
    }

    let scaled: f64 = match format!("{}e{}", value, precision).parse() {
        Ok(scaled) => scaled,
        Err(_) => return value,
    };
    if !scaled.is_finite() {
        return value;
    }

    let rounded = round_half_up(scaled);
    format!("{}e-{}", rounded, precision)
        .parse()
        .unwrap_or(value)
}

/// `Math.round` semantics: ties go towards positive infinity
fn round_half_up(value: f64) -> f64 {
    let floor = value.floor();
    if value - floor >= 0.5 {
        floor + 1.0
    } else {
        floor
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Property: rounding to N digits leaves at most N decimal digits
        #[test]
        fn round_is_idempotent(value in -1.0e6f64..1.0e6, precision in 0u32..6) {
            let once = round(value, precision);
            prop_assert_eq!(round(once, precision), once);
        }

        /// Property: rounding moves a value by at most half a unit in the last place kept
        #[test]
        fn round_stays_close(value in -1.0e6f64..1.0e6, precision in 0u32..6) {
            let unit = 10f64.powi(-(precision as i32));
            prop_assert!((round(value, precision) - value).abs() <= unit / 2.0 + 1e-9);
        }

        /// Property: unrecognized names are never rounded
        #[test]
        fn unknown_names_pass_through(name in "[a-z]{1,8}", value in -1.0e6f64..1.0e6) {
            let patch = map_web_vital(&Metric::new(name.clone(), value));
            prop_assert_eq!(patch.get(&name), Some(&number(value)));
        }
    }
}
