//! Conversions between JS values and the core types
//!
//! JS hooks (`mapMetric`, `beforeSend`, `onSend`) are wrapped so they plug
//! into the core's strategy traits. A hook that throws is logged and treated
//! as if it returned nothing.

use js_sys::{Array, Function, Object, Reflect};
use serde::Serialize;
use serde_json::Value;
use std::cell::RefCell;
use std::rc::Rc;
use tracing::warn;
use vitals_core::config::{LifecycleStrategyChoice, ReporterConfig};
use vitals_core::error::ReporterError;
use vitals_core::metric::Metric;
use vitals_core::options::{BeforeSend, MapMetric, OnSend, ReporterOptions};
use vitals_core::payload::SessionResult;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

/// Human-readable text for a thrown JS value
pub(crate) fn describe(value: &JsValue) -> String {
    if let Some(text) = value.as_string() {
        return text;
    }
    if let Some(error) = value.dyn_ref::<js_sys::Error>() {
        return String::from(error.message());
    }
    format!("{:?}", value)
}

/// Serialize to plain JS objects (not `Map`s)
pub(crate) fn to_js<T: Serialize + ?Sized>(value: &T) -> Result<JsValue, ReporterError> {
    value
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(|e| ReporterError::Serialization(e.to_string()))
}

fn result_from_js(value: JsValue) -> Result<Option<SessionResult>, ReporterError> {
    if value.is_undefined() || value.is_null() {
        return Ok(None);
    }
    serde_wasm_bindgen::from_value(value)
        .map(Some)
        .map_err(|e| ReporterError::Serialization(e.to_string()))
}

/// Property lookup, `None` when missing, `undefined` or `null`
pub(crate) fn property(target: &JsValue, key: &str) -> Option<JsValue> {
    Reflect::get(target, &JsValue::from_str(key))
        .ok()
        .filter(|value| !value.is_undefined() && !value.is_null())
}

/// Decode a web-vitals style metric object.
///
/// `name` and a numeric `value` are required; every other own property that
/// converts to JSON is kept in [`Metric::extra`].
pub fn metric_from_js(value: &JsValue) -> Result<Metric, ReporterError> {
    if !value.is_object() {
        return Err(ReporterError::InvalidMetric(
            "expected an object with name and value".to_string(),
        ));
    }

    let name = property(value, "name")
        .and_then(|name| name.as_string())
        .ok_or_else(|| ReporterError::InvalidMetric("missing string `name`".to_string()))?;
    let number = property(value, "value")
        .and_then(|number| number.as_f64())
        .ok_or_else(|| {
            ReporterError::InvalidMetric(format!("metric {} has no numeric `value`", name))
        })?;

    let mut metric = Metric::new(name, number);
    for entry in Object::entries(value.unchecked_ref::<Object>()).iter() {
        let pair: Array = entry.unchecked_into();
        let Some(key) = pair.get(0).as_string() else {
            continue;
        };
        if key == "name" || key == "value" {
            continue;
        }
        if let Ok(field) = serde_wasm_bindgen::from_value::<Value>(pair.get(1)) {
            metric.extra.insert(key, field);
        }
    }

    Ok(metric)
}

/// The JS object behind the metric being ingested.
///
/// Set for the duration of one ingestion so a JS `mapMetric` sees the event
/// exactly as the instrumentation produced it, prototype getters and DOM
/// references included.
#[derive(Clone, Default)]
pub struct RawMetric(Rc<RefCell<Option<JsValue>>>);

impl RawMetric {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `ingest` with `value` as the current raw metric
    pub(crate) fn scope<R>(&self, value: &JsValue, ingest: impl FnOnce() -> R) -> R {
        let previous = self.0.replace(Some(value.clone()));
        let out = ingest();
        self.0.replace(previous);
        out
    }

    fn current(&self) -> Option<JsValue> {
        self.0.borrow().clone()
    }
}

/// JS `mapMetric(metric, result) => partial result`
pub struct JsMapMetric {
    hook: Function,
    raw: RawMetric,
}

impl MapMetric for JsMapMetric {
    fn map(&self, metric: &Metric, current: &SessionResult) -> SessionResult {
        let mapped = (|| {
            let event = match self.raw.current() {
                Some(event) => event,
                None => to_js(metric)?,
            };
            let current = to_js(current)?;
            let patch = self
                .hook
                .call2(&JsValue::NULL, &event, &current)
                .map_err(|e| ReporterError::InvalidMetric(describe(&e)))?;
            result_from_js(patch)
        })();

        match mapped {
            Ok(patch) => patch.unwrap_or_default(),
            Err(err) => {
                warn!("mapMetric failed for {}: {}", metric.name, err);
                SessionResult::new()
            }
        }
    }
}

/// JS `beforeSend(result) => partial result | undefined`
pub struct JsBeforeSend(Function);

impl BeforeSend for JsBeforeSend {
    fn before_send(&self, result: &SessionResult) -> Option<SessionResult> {
        let patch = (|| {
            let result = to_js(result)?;
            let patch = self
                .0
                .call1(&JsValue::NULL, &result)
                .map_err(|e| ReporterError::Serialization(describe(&e)))?;
            result_from_js(patch)
        })();

        patch.unwrap_or_else(|err| {
            warn!("beforeSend failed: {}", err);
            None
        })
    }
}

/// JS `onSend(url, result)`
pub struct JsOnSend(Function);

impl OnSend for JsOnSend {
    fn on_send(&self, url: &str, result: &SessionResult) {
        let sent = to_js(result).and_then(|result| {
            self.0
                .call2(&JsValue::NULL, &JsValue::from_str(url), &result)
                .map(|_| ())
                .map_err(|e| ReporterError::Transport(describe(&e)))
        });

        if let Err(err) = sent {
            warn!("onSend failed: {}", err);
        }
    }
}

fn hook(options: &JsValue, key: &str) -> Result<Option<Function>, ReporterError> {
    match property(options, key) {
        None => Ok(None),
        Some(value) => value
            .dyn_into::<Function>()
            .map(Some)
            .map_err(|_| ReporterError::InvalidConfig(format!("`{}` must be a function", key))),
    }
}

/// Split a JS options object into its data part and the reporter options.
///
/// A JS `mapMetric` reads the event from `raw`.
pub fn decode_options(
    options: &JsValue,
    raw: &RawMetric,
) -> Result<(ReporterConfig, ReporterOptions), ReporterError> {
    if options.is_undefined() || options.is_null() {
        return Ok((ReporterConfig::default(), ReporterOptions::default()));
    }
    if !options.is_object() {
        return Err(ReporterError::InvalidConfig(
            "options must be an object".to_string(),
        ));
    }

    let initial = match property(options, "initial") {
        Some(initial) => serde_wasm_bindgen::from_value(initial)
            .map_err(|e| ReporterError::InvalidConfig(format!("`initial`: {}", e)))?,
        None => SessionResult::new(),
    };
    let strategy = match property(options, "strategy").and_then(|s| s.as_string()) {
        Some(strategy) => serde_json::from_value::<LifecycleStrategyChoice>(Value::String(strategy))
            .map_err(|e| ReporterError::InvalidConfig(format!("`strategy`: {}", e)))?,
        None => LifecycleStrategyChoice::Auto,
    };
    let config = ReporterConfig { initial, strategy };

    let mut reporter_options = config.clone().into_options();
    if let Some(map_metric) = hook(options, "mapMetric")? {
        reporter_options = reporter_options.with_map_metric(JsMapMetric {
            hook: map_metric,
            raw: raw.clone(),
        });
    }
    if let Some(before_send) = hook(options, "beforeSend")? {
        reporter_options = reporter_options.with_before_send(JsBeforeSend(before_send));
    }
    if let Some(on_send) = hook(options, "onSend")? {
        reporter_options = reporter_options.with_on_send(JsOnSend(on_send));
    }

    Ok((config, reporter_options))
}
