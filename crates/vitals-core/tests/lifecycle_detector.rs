//! Terminal-signal detection against a scripted page

mod common;

use common::{fresh_lifecycle, init_tracing, FakeHost, ManualClock};
use std::cell::RefCell;
use std::rc::Rc;
use vitals_core::config::LifecycleStrategyChoice;
use vitals_core::lifecycle::{
    register_terminal_callback, schedule_terminal_callback, LifecycleStrategy, TerminalEvent,
    Visibility,
};
use vitals_core::metric::Metric;
use vitals_core::options::ReporterOptions;
use vitals_core::reporter::Reporter;
use vitals_core::transport::MemoryTransport;

type Fired = Rc<RefCell<Vec<TerminalEvent>>>;

fn recorder() -> (Fired, Box<dyn FnOnce(TerminalEvent)>) {
    let fired: Fired = Rc::default();
    let sink = fired.clone();
    (fired, Box::new(move |event| sink.borrow_mut().push(event)))
}

#[test]
fn test_shared_listeners_installed_once() {
    let host = FakeHost::modern();
    let lifecycle = fresh_lifecycle();

    for _ in 0..3 {
        let (_fired, callback) = recorder();
        register_terminal_callback(&host, lifecycle, LifecycleStrategy::VisibilityHidden, callback);
    }

    assert!(lifecycle.is_installed());
    assert_eq!(host.page_hide_installs(), 1);
    assert_eq!(host.unload_listeners(), 1);
    assert_eq!(host.visibility_listeners(), 3);
}

#[test]
fn test_tab_switch_does_not_fire() {
    let host = FakeHost::modern();
    let (fired, callback) = recorder();
    register_terminal_callback(
        &host,
        fresh_lifecycle(),
        LifecycleStrategy::VisibilityHidden,
        callback,
    );

    host.set_visibility(Visibility::Hidden);
    host.set_visibility(Visibility::Visible);
    host.set_visibility(Visibility::Hidden);

    assert!(fired.borrow().is_empty());
}

#[test]
fn test_bfcache_hide_does_not_fire_visibility_strategy() {
    let host = FakeHost::modern();
    let (fired, callback) = recorder();
    register_terminal_callback(
        &host,
        fresh_lifecycle(),
        LifecycleStrategy::VisibilityHidden,
        callback,
    );

    host.hide_page(true);
    host.set_visibility(Visibility::Hidden);

    assert!(fired.borrow().is_empty());
}

#[test]
fn test_hidden_during_unload_fires_once() {
    init_tracing();
    let host = FakeHost::modern();
    let lifecycle = fresh_lifecycle();
    let (fired, callback) = recorder();
    register_terminal_callback(&host, lifecycle, LifecycleStrategy::VisibilityHidden, callback);

    host.set_visibility(Visibility::Hidden);
    host.set_visibility(Visibility::Visible);
    host.set_now(4321.0);
    host.hide_page(false);
    host.set_visibility(Visibility::Hidden);
    host.set_visibility(Visibility::Hidden);

    assert!(lifecycle.is_unloading());
    let fired = fired.borrow();
    assert_eq!(fired.len(), 1);
    assert_eq!(
        fired[0],
        TerminalEvent {
            timestamp: 4321.0,
            is_unloading: true
        }
    );
}

#[test]
fn test_page_hide_strategy_fires_even_when_persisted() {
    let host = FakeHost::legacy();
    let (fired, callback) = recorder();
    register_terminal_callback(&host, fresh_lifecycle(), LifecycleStrategy::PageHide, callback);

    host.set_visibility(Visibility::Hidden);
    assert!(fired.borrow().is_empty());

    host.hide_page(true);
    host.hide_page(false);

    let fired = fired.borrow();
    assert_eq!(fired.len(), 1);
    assert!(!fired[0].is_unloading);
    assert_eq!(host.page_hide_once_listeners(), 0);
}

#[test]
fn test_schedule_defers_registration() {
    let host = FakeHost::modern();
    let lifecycle = fresh_lifecycle();
    let (_fired, callback) = recorder();

    schedule_terminal_callback(&host, lifecycle, LifecycleStrategyChoice::Auto, callback);

    assert_eq!(host.pending_deferred(), 1);
    assert!(!lifecycle.is_installed());
    assert_eq!(host.visibility_listeners(), 0);

    host.run_deferred();

    assert!(lifecycle.is_installed());
    assert_eq!(host.visibility_listeners(), 1);
}

#[test]
fn test_schedule_auto_detects_legacy_engine() {
    let host = FakeHost::legacy();
    let (fired, callback) = recorder();

    schedule_terminal_callback(&host, fresh_lifecycle(), LifecycleStrategyChoice::Auto, callback);
    host.run_deferred();

    assert_eq!(host.visibility_listeners(), 0);
    assert_eq!(host.page_hide_once_listeners(), 1);

    host.hide_page(true);
    assert_eq!(fired.borrow().len(), 1);
}

#[test]
fn test_schedule_honors_strategy_override() {
    let host = FakeHost::modern();
    let (_fired, callback) = recorder();

    schedule_terminal_callback(
        &host,
        fresh_lifecycle(),
        LifecycleStrategyChoice::PageHide,
        callback,
    );
    host.run_deferred();

    assert_eq!(host.visibility_listeners(), 0);
    assert_eq!(host.page_hide_once_listeners(), 1);
}

#[test]
fn test_reporter_flushes_once_on_terminal_signal() {
    let host = FakeHost::modern();
    let transport = MemoryTransport::with_beacon();
    let reporter = Rc::new(RefCell::new(Reporter::new(
        "/analytics",
        ReporterOptions::default(),
        transport.clone(),
        ManualClock::new(),
    )));

    let shared = reporter.clone();
    schedule_terminal_callback(
        &host,
        fresh_lifecycle(),
        LifecycleStrategyChoice::Auto,
        Box::new(move |_event| {
            shared.borrow_mut().flush();
        }),
    );

    // Synchronous ingestion right after construction, before the deferred registration.
    reporter.borrow_mut().ingest(&Metric::new("TTFB", 95.0));
    host.run_deferred();

    reporter.borrow_mut().ingest(&Metric::new("CLS", 0.02));
    host.set_visibility(Visibility::Hidden);
    assert_eq!(transport.send_count(), 0);

    host.set_visibility(Visibility::Visible);
    reporter.borrow_mut().ingest(&Metric::new("CLS", 0.05));
    host.hide_page(false);
    host.set_visibility(Visibility::Hidden);
    reporter.borrow_mut().flush();

    let sent = transport.sent();
    assert_eq!(sent.len(), 1);
    let payload: serde_json::Value = serde_json::from_str(&sent[0].body).unwrap();
    assert_eq!(payload["TTFB"], serde_json::json!(95));
    assert_eq!(payload["CLS"], serde_json::json!(0.05));
}

#[test]
fn test_reporter_without_metrics_never_sends_on_page_hide() {
    let host = FakeHost::legacy();
    let transport = MemoryTransport::with_beacon();
    let reporter = Rc::new(RefCell::new(Reporter::new(
        "/analytics",
        ReporterOptions::default(),
        transport.clone(),
        ManualClock::new(),
    )));

    let shared = reporter.clone();
    schedule_terminal_callback(
        &host,
        fresh_lifecycle(),
        LifecycleStrategyChoice::Auto,
        Box::new(move |_event| {
            shared.borrow_mut().flush();
        }),
    );
    host.run_deferred();
    host.hide_page(false);

    assert_eq!(transport.send_count(), 0);
}
