//! Browser implementations of the core traits
//!
//! - [`BrowserTransport`]: `navigator.sendBeacon`, else synchronous XHR
//! - [`PerformanceClock`]: `Date.now()` and `performance.now()`
//! - [`BrowserHost`]: `window` listeners and `setTimeout`

use crate::callbacks::describe;
use js_sys::{Array, Function, Reflect};
use tracing::warn;
use vitals_core::clock::Clock;
use vitals_core::error::ReporterError;
use vitals_core::lifecycle::{LifecycleHost, PageHide, Visibility};
use vitals_core::transport::Transport;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{
    AddEventListenerOptions, Event, Navigator, PageTransitionEvent, Performance, VisibilityState,
    Window, XmlHttpRequest,
};

/// Beacon-first transport over `navigator`
pub struct BrowserTransport {
    navigator: Option<Navigator>,
}

impl BrowserTransport {
    pub fn new() -> Self {
        Self {
            navigator: web_sys::window().map(|window| window.navigator()),
        }
    }
}

impl Default for BrowserTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for BrowserTransport {
    fn is_available(&self) -> bool {
        self.navigator.is_some()
    }

    fn has_beacon(&self) -> bool {
        self.navigator
            .as_ref()
            .and_then(|navigator| Reflect::get(navigator, &"sendBeacon".into()).ok())
            .map(|send_beacon| send_beacon.is_function())
            .unwrap_or(false)
    }

    fn send_beacon(&self, url: &str, body: &str) -> Result<bool, ReporterError> {
        let navigator = self
            .navigator
            .as_ref()
            .ok_or_else(|| ReporterError::Transport("No navigator".to_string()))?;

        navigator
            .send_beacon_with_opt_str(url, Some(body))
            .map_err(|e| ReporterError::Transport(describe(&e)))
    }

    fn post_sync(&self, url: &str, body: &str, content_type: &str) -> Result<(), ReporterError> {
        let transport_error = |e: JsValue| ReporterError::Transport(describe(&e));

        let client = XmlHttpRequest::new().map_err(transport_error)?;
        // async = false: the request completes before the page goes away
        client
            .open_with_async("POST", url, false)
            .map_err(transport_error)?;
        client
            .set_request_header("Content-Type", content_type)
            .map_err(transport_error)?;
        client.send_with_opt_str(Some(body)).map_err(transport_error)
    }
}

/// `Date.now()` for ids, `performance.now()` for durations
pub struct PerformanceClock {
    performance: Option<Performance>,
}

impl PerformanceClock {
    pub fn new() -> Self {
        Self {
            performance: web_sys::window().and_then(|window| window.performance()),
        }
    }
}

impl Default for PerformanceClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for PerformanceClock {
    fn epoch_millis(&self) -> f64 {
        js_sys::Date::now()
    }

    fn monotonic_millis(&self) -> f64 {
        self.performance
            .as_ref()
            .map(|performance| performance.now())
            .unwrap_or_else(js_sys::Date::now)
    }
}

/// Lifecycle host backed by the page's `window`
#[derive(Clone)]
pub struct BrowserHost {
    window: Window,
}

impl BrowserHost {
    /// `None` outside a page (workers, Node)
    pub fn new() -> Option<Self> {
        web_sys::window().map(|window| Self { window })
    }

    /// Capturing listener on `window`
    fn listen(&self, event: &str, callback: &Function, once: bool) {
        let options = AddEventListenerOptions::new();
        options.set_capture(true);
        options.set_once(once);

        if let Err(err) = self
            .window
            .add_event_listener_with_callback_and_add_event_listener_options(
                event, callback, &options,
            )
        {
            warn!("Failed to listen for {}: {}", event, describe(&err));
        }
    }
}

fn page_hide_from(event: &Event) -> PageHide {
    PageHide {
        persisted: event
            .dyn_ref::<PageTransitionEvent>()
            .map(|event| event.persisted())
            .unwrap_or(false),
    }
}

impl LifecycleHost for BrowserHost {
    fn supported_entry_types(&self) -> Vec<String> {
        let observer = match Reflect::get(&self.window, &"PerformanceObserver".into()) {
            Ok(observer) if observer.is_object() || observer.is_function() => observer,
            _ => return Vec::new(),
        };

        match Reflect::get(&observer, &"supportedEntryTypes".into()) {
            Ok(types) if Array::is_array(&types) => Array::from(&types)
                .iter()
                .filter_map(|entry| entry.as_string())
                .collect(),
            _ => Vec::new(),
        }
    }

    fn on_page_hide(&self, mut listener: Box<dyn FnMut(PageHide)>) {
        let closure =
            Closure::<dyn FnMut(Event)>::new(move |event: Event| listener(page_hide_from(&event)));
        self.listen("pagehide", closure.as_ref().unchecked_ref(), false);
        closure.forget();
    }

    fn on_page_hide_once(&self, listener: Box<dyn FnOnce(PageHide)>) {
        let closure = Closure::once(Box::new(move |event: Event| {
            listener(page_hide_from(&event))
        }) as Box<dyn FnOnce(_)>);
        self.listen("pagehide", closure.as_ref().unchecked_ref(), true);
        closure.forget();
    }

    fn on_unload_noop(&self) {
        let closure = Closure::<dyn FnMut()>::new(|| {});
        self.listen("unload", closure.as_ref().unchecked_ref(), false);
        closure.forget();
    }

    fn on_visibility_change(&self, mut listener: Box<dyn FnMut(Visibility)>) {
        let document = self.window.document();
        let closure = Closure::<dyn FnMut(Event)>::new(move |_event: Event| {
            let hidden = document
                .as_ref()
                .map(|document| document.visibility_state() == VisibilityState::Hidden)
                .unwrap_or(false);
            listener(if hidden {
                Visibility::Hidden
            } else {
                Visibility::Visible
            });
        });
        self.listen("visibilitychange", closure.as_ref().unchecked_ref(), false);
        closure.forget();
    }

    fn defer(&self, task: Box<dyn FnOnce()>) {
        let closure = Closure::once(Box::new(move || task()) as Box<dyn FnOnce()>);
        if let Err(err) = self
            .window
            .set_timeout_with_callback_and_timeout_and_arguments_0(
                closure.as_ref().unchecked_ref(),
                0,
            )
        {
            warn!("Failed to schedule lifecycle registration: {}", describe(&err));
        }
        closure.forget();
    }

    fn now(&self) -> f64 {
        self.window
            .performance()
            .map(|performance| performance.now())
            .unwrap_or_else(js_sys::Date::now)
    }
}
