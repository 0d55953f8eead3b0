//! Page lifecycle detection
//!
//! Browsers have no dependable "page closed" event. Some engines never fire
//! `visibilitychange` on tab close; others fire it on every tab switch and
//! again on close. This module picks a single terminal moment per session:
//!
//! - Engines that support `layout-shift` entries fire a reliable hidden
//!   transition. There the session ends on the first hidden transition that
//!   happens during a true unload (a page-hide that will not be restored
//!   from the back/forward cache). Plain tab switches are ignored so late
//!   layout shifts still make it into the payload.
//! - Other engines fall back to a one-shot `pagehide`, persisted or not.
//!
//! The page-hide and `unload` listeners that track "is this a true unload"
//! are shared by every registration and installed once per process, see
//! [`PageLifecycle::ensure_listeners_installed`].

use crate::config::LifecycleStrategyChoice;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Once;
use tracing::debug;

/// Performance entry type used as the proxy for a reliable hidden event
pub const LAYOUT_SHIFT_ENTRY: &str = "layout-shift";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Visible,
    Hidden,
}

/// A `pagehide` event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageHide {
    /// The page is kept in the back/forward cache and may come back
    pub persisted: bool,
}

/// Passed to the terminal callback when the session ends
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TerminalEvent {
    pub timestamp: f64,
    pub is_unloading: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecycleStrategy {
    /// First hidden transition during a true unload
    VisibilityHidden,
    /// One-shot `pagehide`
    PageHide,
}

impl LifecycleStrategy {
    pub fn detect(supported_entry_types: &[String]) -> Self {
        if supported_entry_types
            .iter()
            .any(|entry| entry == LAYOUT_SHIFT_ENTRY)
        {
            LifecycleStrategy::VisibilityHidden
        } else {
            LifecycleStrategy::PageHide
        }
    }
}

/// The event surface of the page
pub trait LifecycleHost {
    /// `PerformanceObserver.supportedEntryTypes`, empty when unsupported
    fn supported_entry_types(&self) -> Vec<String>;

    /// Persistent capturing `pagehide` listener
    fn on_page_hide(&self, listener: Box<dyn FnMut(PageHide)>);

    /// Capturing `pagehide` listener removed after its first call
    fn on_page_hide_once(&self, listener: Box<dyn FnOnce(PageHide)>);

    /// Empty `unload` listener.
    ///
    /// Some engines only dispatch a discard-accurate `pagehide` when an
    /// `unload` handler exists.
    fn on_unload_noop(&self);

    /// Capturing `visibilitychange` listener
    fn on_visibility_change(&self, listener: Box<dyn FnMut(Visibility)>);

    /// Run `task` on a later tick (zero-delay timer)
    fn defer(&self, task: Box<dyn FnOnce()>);

    /// Event timestamp in milliseconds
    fn now(&self) -> f64;
}

/// Process-wide lifecycle flags
#[derive(Debug)]
pub struct PageLifecycle {
    unloading: AtomicBool,
    installed: Once,
}

static GLOBAL: PageLifecycle = PageLifecycle::new();

impl PageLifecycle {
    pub const fn new() -> Self {
        Self {
            unloading: AtomicBool::new(false),
            installed: Once::new(),
        }
    }

    /// The instance shared by every reporter in this process
    pub fn global() -> &'static PageLifecycle {
        &GLOBAL
    }

    /// Whether a true unload page-hide has been seen
    pub fn is_unloading(&self) -> bool {
        self.unloading.load(Ordering::SeqCst)
    }

    pub fn is_installed(&self) -> bool {
        self.installed.is_completed()
    }

    pub fn record_page_hide(&self, event: PageHide) {
        self.unloading.store(!event.persisted, Ordering::SeqCst);
    }

    /// Attach the shared page-hide and `unload` listeners, once.
    ///
    /// Later calls, with any host, do nothing.
    pub fn ensure_listeners_installed<H>(&'static self, host: &H)
    where
        H: LifecycleHost + ?Sized,
    {
        self.installed.call_once(|| {
            debug!("Installing page lifecycle listeners");
            host.on_page_hide(Box::new(move |event| self.record_page_hide(event)));
            host.on_unload_noop();
        });
    }
}

impl Default for PageLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

/// Call `callback` once, at the terminal moment chosen by `strategy`
pub fn register_terminal_callback<H>(
    host: &H,
    lifecycle: &'static PageLifecycle,
    strategy: LifecycleStrategy,
    callback: Box<dyn FnOnce(TerminalEvent)>,
) where
    H: LifecycleHost + Clone + 'static,
{
    lifecycle.ensure_listeners_installed(host);
    debug!("Registering terminal callback with {:?}", strategy);

    let clock = host.clone();
    match strategy {
        LifecycleStrategy::VisibilityHidden => {
            let mut callback = Some(callback);
            host.on_visibility_change(Box::new(move |visibility| {
                if visibility != Visibility::Hidden || !lifecycle.is_unloading() {
                    return;
                }
                if let Some(callback) = callback.take() {
                    callback(TerminalEvent {
                        timestamp: clock.now(),
                        is_unloading: true,
                    });
                }
            }));
        }
        LifecycleStrategy::PageHide => {
            host.on_page_hide_once(Box::new(move |event| {
                callback(TerminalEvent {
                    timestamp: clock.now(),
                    is_unloading: !event.persisted,
                });
            }));
        }
    }
}

/// Register the terminal callback on the next tick.
///
/// Deferring keeps metrics ingested synchronously right after reporter
/// construction ahead of any lifecycle listener.
pub fn schedule_terminal_callback<H>(
    host: &H,
    lifecycle: &'static PageLifecycle,
    choice: LifecycleStrategyChoice,
    callback: Box<dyn FnOnce(TerminalEvent)>,
) where
    H: LifecycleHost + Clone + 'static,
{
    let deferred_host = host.clone();
    host.defer(Box::new(move || {
        let strategy = choice.resolve(&deferred_host.supported_entry_types());
        register_terminal_callback(&deferred_host, lifecycle, strategy, callback);
    }));
}
