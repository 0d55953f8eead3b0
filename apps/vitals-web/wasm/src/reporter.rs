//! JS-facing reporter
//!
//! Wraps a core [`Reporter`] in `Rc<RefCell<_>>` so the ingestion entry
//! point and the lifecycle callback share it. Every access goes through
//! `try_borrow_mut`: a hook that calls back into the reporter while it is
//! flushing gets a no-op instead of a panic.

use crate::browser::{BrowserHost, BrowserTransport, PerformanceClock};
use crate::callbacks::{decode_options, metric_from_js, RawMetric};
use js_sys::Function;
use std::cell::RefCell;
use std::rc::Rc;
use tracing::{debug, warn};
use vitals_core::error::ReporterError;
use vitals_core::lifecycle::{schedule_terminal_callback, PageLifecycle};
use vitals_core::metric::Metric;
use vitals_core::reporter::Reporter;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

type BrowserReporter = Reporter<BrowserTransport, PerformanceClock>;
type Shared = Rc<RefCell<BrowserReporter>>;

pub(crate) fn to_js_error(err: ReporterError) -> JsValue {
    JsValue::from_str(&err.to_string())
}

fn ingest_shared(shared: &Shared, raw: &RawMetric, event: &JsValue, metric: &Metric) {
    match shared.try_borrow_mut() {
        Ok(mut reporter) => raw.scope(event, || reporter.ingest(metric)),
        Err(_) => debug!("Reporter busy, dropping {}", metric.name),
    }
}

fn flush_shared(shared: &Shared) -> bool {
    match shared.try_borrow_mut() {
        Ok(mut reporter) => reporter.flush().is_sent(),
        Err(_) => {
            debug!("Flush requested while flushing, ignoring");
            false
        }
    }
}

/// Collects metrics for one page session and sends them once when the page goes away.
///
/// ```javascript
/// import init, { createApiReporter, getDeviceInfo } from './pkg/vitals_wasm.js';
/// import { onCLS, onFCP, onLCP, onTTFB } from 'web-vitals';
///
/// await init();
/// const reporter = createApiReporter('/analytics', { initial: getDeviceInfo() });
/// const report = reporter.callback();
/// onTTFB(report); onFCP(report); onLCP(report); onCLS(report);
/// ```
#[wasm_bindgen]
pub struct ApiReporter {
    inner: Shared,
    raw: RawMetric,
    id: String,
}

#[wasm_bindgen]
impl ApiReporter {
    /// Create a reporter sending to `url`.
    ///
    /// `options`: `{ initial?, mapMetric?, beforeSend?, onSend?, strategy? }`.
    /// Lifecycle listeners are attached on the next tick.
    #[wasm_bindgen(constructor)]
    pub fn new(url: &str, options: JsValue) -> Result<ApiReporter, JsValue> {
        let raw = RawMetric::new();
        let (config, options) = decode_options(&options, &raw).map_err(to_js_error)?;
        let reporter = Reporter::new(
            url,
            options,
            BrowserTransport::new(),
            PerformanceClock::new(),
        );
        let id = reporter.id().to_string();
        let inner = Rc::new(RefCell::new(reporter));

        match BrowserHost::new() {
            Some(host) => {
                let shared = inner.clone();
                schedule_terminal_callback(
                    &host,
                    PageLifecycle::global(),
                    config.strategy,
                    Box::new(move |event| {
                        debug!(
                            "Session ended at {}ms (unloading: {})",
                            event.timestamp, event.is_unloading
                        );
                        flush_shared(&shared);
                    }),
                );
            }
            None => debug!("No window, lifecycle detection disabled"),
        }

        Ok(Self { inner, raw, id })
    }

    /// Ingest one metric (`{ name, value, ... }`)
    pub fn report(&self, metric: JsValue) -> Result<(), JsValue> {
        let decoded = metric_from_js(&metric).map_err(to_js_error)?;
        ingest_shared(&self.inner, &self.raw, &metric, &decoded);
        Ok(())
    }

    /// `report` as a plain function, for instrumentation callbacks.
    /// Malformed metrics are logged and dropped.
    pub fn callback(&self) -> Function {
        let shared = self.inner.clone();
        let raw = self.raw.clone();
        Closure::<dyn FnMut(JsValue)>::new(move |metric: JsValue| {
            match metric_from_js(&metric) {
                Ok(decoded) => ingest_shared(&shared, &raw, &metric, &decoded),
                Err(err) => warn!("Ignoring metric: {}", err),
            }
        })
        .into_js_value()
        .unchecked_into()
    }

    /// Send now instead of waiting for the page to go away.
    /// Returns `true` only for the call that produced the payload.
    pub fn flush(&self) -> bool {
        flush_shared(&self.inner)
    }

    /// Session id
    #[wasm_bindgen(getter)]
    pub fn id(&self) -> String {
        self.id.clone()
    }

    #[wasm_bindgen(getter, js_name = isSent)]
    pub fn is_sent(&self) -> bool {
        self.inner
            .try_borrow()
            .map(|reporter| reporter.is_sent())
            .unwrap_or(true)
    }
}

#[cfg(target_arch = "wasm32")]
mod wasm_tests {
    use super::*;
    use js_sys::{Array, Object, Reflect};
    use serde_json::Value;
    use std::cell::OnceCell;
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    fn set(target: &JsValue, key: &str, value: &JsValue) {
        Reflect::set(target, &JsValue::from_str(key), value).unwrap();
    }

    fn get(target: &JsValue, key: &str) -> JsValue {
        Reflect::get(target, &JsValue::from_str(key)).unwrap()
    }

    fn metric(name: &str, value: f64) -> JsValue {
        let metric: JsValue = Object::new().into();
        set(&metric, "name", &JsValue::from_str(name));
        set(&metric, "value", &JsValue::from_f64(value));
        metric
    }

    fn evaluate(source: &str) -> JsValue {
        Function::new_no_args(source).call0(&JsValue::NULL).unwrap()
    }

    fn navigator() -> JsValue {
        web_sys::window().unwrap().navigator().into()
    }

    fn remove(target: &JsValue, key: &str) {
        Reflect::delete_property(target.unchecked_ref(), &JsValue::from_str(key)).unwrap();
    }

    /// Options whose `onSend` pushes `{ url, result }` into the returned array
    fn capturing_options() -> (JsValue, Array) {
        let sent = Array::new();
        let on_send =
            Function::new_with_args("url, result", "this.push({url: url, result: result})")
                .bind(&sent);
        let options: JsValue = Object::new().into();
        set(&options, "onSend", &on_send);
        (options, sent)
    }

    /// Run `f` with every console method writing into the returned lines
    fn capture_console(f: impl FnOnce()) -> Vec<String> {
        const METHODS: [&str; 5] = ["debug", "log", "info", "warn", "error"];
        let console = get(&js_sys::global(), "console");
        let lines = Array::new();
        let record = Function::new_with_args("...args", "this.push(args.map(String).join(' '))")
            .bind(&lines);

        let saved: Vec<JsValue> = METHODS.iter().map(|method| get(&console, method)).collect();
        for method in METHODS {
            set(&console, method, &record);
        }
        f();
        for (method, original) in METHODS.iter().zip(saved) {
            set(&console, method, &original);
        }

        lines.iter().filter_map(|line| line.as_string()).collect()
    }

    #[wasm_bindgen_test]
    fn test_flush_sends_once() {
        let (options, sent) = capturing_options();
        let reporter = ApiReporter::new("/analytics", options).unwrap();
        reporter.report(metric("foo", 1.0)).unwrap();

        assert!(reporter.flush());
        assert!(!reporter.flush());
        assert!(reporter.is_sent());
        assert_eq!(sent.length(), 1);

        let entry = sent.get(0);
        assert_eq!(get(&entry, "url").as_string().as_deref(), Some("/analytics"));
        let result = get(&entry, "result");
        assert_eq!(get(&result, "foo").as_f64(), Some(1.0));
        assert_eq!(get(&result, "id").as_string(), Some(reporter.id()));
        assert!(get(&result, "duration").as_f64().is_some());
    }

    #[wasm_bindgen_test]
    fn test_flush_without_metrics_sends_nothing() {
        let (options, sent) = capturing_options();
        let reporter = ApiReporter::new("/analytics", options).unwrap();

        assert!(!reporter.flush());
        assert!(!reporter.is_sent());
        assert_eq!(sent.length(), 0);
    }

    #[wasm_bindgen_test]
    fn test_js_hooks_shape_the_result() {
        let (options, sent) = capturing_options();
        set(
            &options,
            "mapMetric",
            &Function::new_with_args(
                "metric",
                "return { [metric.name.toLowerCase()]: metric.value * 2 }",
            ),
        );
        set(
            &options,
            "beforeSend",
            &Function::new_with_args("result", "return { extra: 'x' }"),
        );
        let reporter = ApiReporter::new("/analytics", options).unwrap();
        reporter.report(metric("LCP", 100.0)).unwrap();
        reporter.flush();

        let result = get(&sent.get(0), "result");
        assert_eq!(get(&result, "lcp").as_f64(), Some(200.0));
        assert_eq!(get(&result, "extra").as_string().as_deref(), Some("x"));
    }

    #[wasm_bindgen_test]
    fn test_map_metric_receives_the_original_event() {
        let (options, sent) = capturing_options();
        set(
            &options,
            "mapMetric",
            &Function::new_with_args(
                "metric",
                "return { [metric.name]: metric.entries[0].startTime }",
            ),
        );
        let reporter = ApiReporter::new("/analytics", options).unwrap();

        // startTime lives on the prototype, like PerformanceEntry getters
        let event = evaluate(
            "return { name: 'LCP', value: 10, \
             entries: [Object.create({ get startTime() { return 42; } })] };",
        );
        reporter.report(event).unwrap();
        let late = evaluate(
            "return { name: 'FCP', value: 5, \
             entries: [Object.create({ get startTime() { return 7; } })] };",
        );
        reporter.callback().call1(&JsValue::NULL, &late).unwrap();
        reporter.flush();

        let result = get(&sent.get(0), "result");
        assert_eq!(get(&result, "LCP").as_f64(), Some(42.0));
        assert_eq!(get(&result, "FCP").as_f64(), Some(7.0));
    }

    #[wasm_bindgen_test]
    fn test_throwing_hook_is_logged_and_ignored() {
        crate::init_logging();
        let (options, sent) = capturing_options();
        set(
            &options,
            "beforeSend",
            &Function::new_with_args("result", "throw new Error('boom')"),
        );
        let reporter = ApiReporter::new("/analytics", options).unwrap();
        reporter.report(metric("TTFB", 12.0)).unwrap();

        let mut flushed = false;
        let lines = capture_console(|| flushed = reporter.flush());

        assert!(flushed);
        assert_eq!(get(&get(&sent.get(0), "result"), "TTFB").as_f64(), Some(12.0));
        assert!(
            lines
                .iter()
                .any(|line| line.contains("beforeSend failed") && line.contains("boom")),
            "console output: {:?}",
            lines
        );
    }

    #[wasm_bindgen_test]
    fn test_hooks_calling_back_during_flush_are_ignored() {
        let handle: Rc<OnceCell<ApiReporter>> = Rc::new(OnceCell::new());
        let seen = Rc::new(RefCell::new(Vec::new()));
        let deliveries = Rc::new(RefCell::new(0));

        let on_send = {
            let handle = handle.clone();
            let seen = seen.clone();
            let deliveries = deliveries.clone();
            Closure::<dyn FnMut(JsValue, JsValue)>::new(move |_url: JsValue, _result: JsValue| {
                *deliveries.borrow_mut() += 1;
                if let Some(reporter) = handle.get() {
                    seen.borrow_mut().push((
                        reporter.flush(),
                        reporter.report(metric("late", 1.0)).is_ok(),
                        reporter.id(),
                        reporter.is_sent(),
                    ));
                }
            })
        };
        let options: JsValue = Object::new().into();
        set(&options, "onSend", on_send.as_ref());

        let reporter = ApiReporter::new("/analytics", options).unwrap();
        reporter.report(metric("LCP", 1.0)).unwrap();
        let id = reporter.id();
        let _ = handle.set(reporter);
        let reporter = handle.get().unwrap();

        assert!(reporter.flush());
        assert!(!reporter.flush());
        assert_eq!(*deliveries.borrow(), 1);

        let seen = seen.borrow();
        assert_eq!(seen.len(), 1);
        let (nested_flush, nested_report, nested_id, nested_is_sent) = seen[0].clone();
        assert!(!nested_flush);
        assert!(nested_report);
        assert_eq!(nested_id, id);
        assert!(nested_is_sent);
    }

    #[wasm_bindgen_test]
    fn test_default_delivery_uses_beacon() {
        let navigator = navigator();
        let beacons = Array::new();
        let send_beacon =
            Function::new_with_args("url, body", "this.push([url, body]); return true;")
                .bind(&beacons);
        set(&navigator, "sendBeacon", &send_beacon);

        let reporter = ApiReporter::new("/collect", JsValue::UNDEFINED).unwrap();
        reporter.report(metric("LCP", 1834.2)).unwrap();
        let first = reporter.flush();
        let second = reporter.flush();
        remove(&navigator, "sendBeacon");

        assert!(first);
        assert!(!second);
        assert_eq!(beacons.length(), 1);

        let call: Array = beacons.get(0).unchecked_into();
        assert_eq!(call.get(0).as_string().as_deref(), Some("/collect"));
        let body: Value = serde_json::from_str(&call.get(1).as_string().unwrap()).unwrap();
        assert_eq!(body["LCP"], 1834);
        assert_eq!(body["id"], reporter.id());
    }

    #[wasm_bindgen_test]
    fn test_sync_post_when_beacon_is_missing() {
        let global = js_sys::global();
        let navigator = navigator();
        set(&navigator, "sendBeacon", &JsValue::UNDEFINED);

        let requests = Array::new();
        let fake_xhr = Function::new_with_args(
            "log",
            "return class { \
               open(method, url, async) { log.push(`open ${method} ${url} ${async}`); } \
               setRequestHeader(name, value) { log.push(`header ${name} ${value}`); } \
               send(body) { log.push(`send ${body}`); } \
             };",
        )
        .call1(&JsValue::NULL, &requests)
        .unwrap();
        let original_xhr = get(&global, "XMLHttpRequest");
        set(&global, "XMLHttpRequest", &fake_xhr);

        let reporter = ApiReporter::new("/collect", JsValue::UNDEFINED).unwrap();
        reporter.report(metric("TTFB", 80.4)).unwrap();
        let sent = reporter.flush();

        set(&global, "XMLHttpRequest", &original_xhr);
        remove(&navigator, "sendBeacon");

        assert!(sent);
        let log: Vec<String> = requests.iter().filter_map(|line| line.as_string()).collect();
        assert_eq!(log.len(), 3, "requests: {:?}", log);
        assert_eq!(log[0], "open POST /collect false");
        assert_eq!(log[1], "header Content-Type text/plain;charset=UTF-8");
        let body: Value = serde_json::from_str(log[2].trim_start_matches("send ")).unwrap();
        assert_eq!(body["TTFB"], 80);
    }

    #[wasm_bindgen_test]
    fn test_invalid_input_is_rejected() {
        let (options, _) = capturing_options();
        let reporter = ApiReporter::new("/analytics", options).unwrap();
        assert!(reporter.report(JsValue::from_str("not a metric")).is_err());

        let missing_value: JsValue = Object::new().into();
        set(&missing_value, "name", &JsValue::from_str("LCP"));
        assert!(reporter.report(missing_value).is_err());

        let bad_hook: JsValue = Object::new().into();
        set(&bad_hook, "onSend", &JsValue::from_f64(1.0));
        assert!(ApiReporter::new("/analytics", bad_hook).is_err());
    }

    #[wasm_bindgen_test]
    fn test_callback_ingests_metrics() {
        let (options, sent) = capturing_options();
        let reporter = ApiReporter::new("/analytics", options).unwrap();
        let report = reporter.callback();
        report.call1(&JsValue::NULL, &metric("CLS", 0.123456)).unwrap();
        // malformed input is dropped, not thrown
        report.call1(&JsValue::NULL, &JsValue::NULL).unwrap();

        assert!(reporter.flush());
        assert_eq!(get(&get(&sent.get(0), "result"), "CLS").as_f64(), Some(0.1235));
    }

    #[wasm_bindgen_test]
    fn test_session_id_format() {
        let reporter = ApiReporter::new("/analytics", JsValue::UNDEFINED).unwrap();
        assert_eq!(reporter.id().len(), 27);
        assert_eq!(reporter.id().as_bytes()[13], b'-');
    }

    #[wasm_bindgen_test]
    fn test_device_info_is_plain_object() {
        let info = crate::get_device_info().unwrap();
        assert!(info.is_object());
        assert!(get(&info, "userAgent").as_string().is_some());
    }
}
