//! Pluggable reporter behavior
//!
//! Each hook is a small trait with a blanket impl for closures, so callers
//! can pass either a type or a closure.

use crate::metric::{map_web_vital, Metric};
use crate::payload::SessionResult;
use std::fmt;

/// Turns a metric event into the result field(s) it contributes
pub trait MapMetric {
    fn map(&self, metric: &Metric, current: &SessionResult) -> SessionResult;
}

impl<F> MapMetric for F
where
    F: Fn(&Metric, &SessionResult) -> SessionResult,
{
    fn map(&self, metric: &Metric, current: &SessionResult) -> SessionResult {
        self(metric, current)
    }
}

/// Default mapping, see [`map_web_vital`]
#[derive(Debug, Clone, Copy, Default)]
pub struct WebVitalsMapper;

impl MapMetric for WebVitalsMapper {
    fn map(&self, metric: &Metric, _current: &SessionResult) -> SessionResult {
        map_web_vital(metric)
    }
}

/// Late transform run once right before delivery.
///
/// A returned map is merged over the result; `None` leaves it as is.
pub trait BeforeSend {
    fn before_send(&self, result: &SessionResult) -> Option<SessionResult>;
}

impl<F> BeforeSend for F
where
    F: Fn(&SessionResult) -> Option<SessionResult>,
{
    fn before_send(&self, result: &SessionResult) -> Option<SessionResult> {
        self(result)
    }
}

/// Replacement for the default delivery
pub trait OnSend {
    fn on_send(&self, url: &str, result: &SessionResult);
}

impl<F> OnSend for F
where
    F: Fn(&str, &SessionResult),
{
    fn on_send(&self, url: &str, result: &SessionResult) {
        self(url, result)
    }
}

/// Reporter construction options
pub struct ReporterOptions {
    /// Fields merged into the result at construction
    pub initial: SessionResult,
    pub map_metric: Box<dyn MapMetric>,
    pub before_send: Option<Box<dyn BeforeSend>>,
    pub on_send: Option<Box<dyn OnSend>>,
}

impl ReporterOptions {
    pub fn new() -> Self {
        Self {
            initial: SessionResult::new(),
            map_metric: Box::new(WebVitalsMapper),
            before_send: None,
            on_send: None,
        }
    }

    pub fn with_initial(mut self, initial: SessionResult) -> Self {
        self.initial = initial;
        self
    }

    pub fn with_map_metric(mut self, map_metric: impl MapMetric + 'static) -> Self {
        self.map_metric = Box::new(map_metric);
        self
    }

    pub fn with_before_send(mut self, before_send: impl BeforeSend + 'static) -> Self {
        self.before_send = Some(Box::new(before_send));
        self
    }

    pub fn with_on_send(mut self, on_send: impl OnSend + 'static) -> Self {
        self.on_send = Some(Box::new(on_send));
        self
    }
}

impl Default for ReporterOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ReporterOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReporterOptions")
            .field("initial", &self.initial)
            .field("before_send", &self.before_send.is_some())
            .field("on_send", &self.on_send.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_options_use_web_vitals_mapper() {
        let options = ReporterOptions::default();
        let patch = options
            .map_metric
            .map(&Metric::new("LCP", 1500.7), &SessionResult::new());

        assert_eq!(patch.get("LCP"), Some(&json!(1501)));
        assert!(options.before_send.is_none());
        assert!(options.on_send.is_none());
    }

    #[test]
    fn test_closure_mapper_sees_current_result() {
        let options = ReporterOptions::new().with_map_metric(
            |metric: &Metric, current: &SessionResult| {
                let mut patch = SessionResult::new();
                patch.insert(
                    format!("{}_seen", metric.name),
                    json!(current.contains_key(&metric.name)),
                );
                patch
            },
        );

        let mut current = SessionResult::new();
        current.insert("FCP".to_string(), json!(10));
        let patch = options.map_metric.map(&Metric::new("FCP", 20.0), &current);

        assert_eq!(patch.get("FCP_seen"), Some(&json!(true)));
    }

    #[test]
    fn test_debug_hides_callbacks() {
        let options = ReporterOptions::new().with_on_send(|_url: &str, _result: &SessionResult| {});
        let debug = format!("{:?}", options);
        assert!(debug.contains("on_send: true"));
        assert!(debug.contains("before_send: false"));
    }
}
