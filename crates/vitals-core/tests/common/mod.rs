//! Test doubles for the lifecycle host and clock
#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use vitals_core::clock::Clock;
use vitals_core::lifecycle::{LifecycleHost, PageHide, PageLifecycle, Visibility};

/// Route `tracing` output to the test harness
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Fresh lifecycle flags for one test, independent of the process global
pub fn fresh_lifecycle() -> &'static PageLifecycle {
    Box::leak(Box::new(PageLifecycle::new()))
}

/// Clock whose monotonic time the test moves by hand
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Rc<Cell<f64>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Rc::new(Cell::new(0.0)),
        }
    }

    pub fn advance(&self, millis: f64) {
        self.now.set(self.now.get() + millis);
    }
}

impl Clock for ManualClock {
    fn epoch_millis(&self) -> f64 {
        1_700_000_000_000.0
    }

    fn monotonic_millis(&self) -> f64 {
        self.now.get()
    }
}

#[derive(Default)]
struct HostState {
    entry_types: Vec<String>,
    page_hide: Vec<Box<dyn FnMut(PageHide)>>,
    page_hide_once: Vec<Box<dyn FnOnce(PageHide)>>,
    visibility: Vec<Box<dyn FnMut(Visibility)>>,
    deferred: Vec<Box<dyn FnOnce()>>,
    unload_listeners: usize,
    page_hide_installs: usize,
    now: f64,
}

/// Scripted page: the test dispatches events and runs deferred tasks
#[derive(Clone, Default)]
pub struct FakeHost {
    state: Rc<RefCell<HostState>>,
}

impl FakeHost {
    /// Engine reporting `layout-shift` support
    pub fn modern() -> Self {
        let host = Self::default();
        host.state.borrow_mut().entry_types = vec![
            "largest-contentful-paint".to_string(),
            "layout-shift".to_string(),
            "paint".to_string(),
        ];
        host
    }

    /// Engine without `layout-shift` support
    pub fn legacy() -> Self {
        let host = Self::default();
        host.state.borrow_mut().entry_types = vec!["paint".to_string()];
        host
    }

    pub fn set_now(&self, now: f64) {
        self.state.borrow_mut().now = now;
    }

    /// Run every deferred task queued so far
    pub fn run_deferred(&self) {
        let tasks = std::mem::take(&mut self.state.borrow_mut().deferred);
        for task in tasks {
            task();
        }
    }

    pub fn pending_deferred(&self) -> usize {
        self.state.borrow().deferred.len()
    }

    pub fn hide_page(&self, persisted: bool) {
        let event = PageHide { persisted };

        let mut persistent = std::mem::take(&mut self.state.borrow_mut().page_hide);
        for listener in persistent.iter_mut() {
            listener(event);
        }
        let mut state = self.state.borrow_mut();
        persistent.append(&mut state.page_hide);
        state.page_hide = persistent;
        drop(state);

        let once = std::mem::take(&mut self.state.borrow_mut().page_hide_once);
        for listener in once {
            listener(event);
        }
    }

    pub fn set_visibility(&self, visibility: Visibility) {
        let mut listeners = std::mem::take(&mut self.state.borrow_mut().visibility);
        for listener in listeners.iter_mut() {
            listener(visibility);
        }
        let mut state = self.state.borrow_mut();
        listeners.append(&mut state.visibility);
        state.visibility = listeners;
    }

    pub fn page_hide_installs(&self) -> usize {
        self.state.borrow().page_hide_installs
    }

    pub fn unload_listeners(&self) -> usize {
        self.state.borrow().unload_listeners
    }

    pub fn visibility_listeners(&self) -> usize {
        self.state.borrow().visibility.len()
    }

    pub fn page_hide_once_listeners(&self) -> usize {
        self.state.borrow().page_hide_once.len()
    }
}

impl LifecycleHost for FakeHost {
    fn supported_entry_types(&self) -> Vec<String> {
        self.state.borrow().entry_types.clone()
    }

    fn on_page_hide(&self, listener: Box<dyn FnMut(PageHide)>) {
        let mut state = self.state.borrow_mut();
        state.page_hide_installs += 1;
        state.page_hide.push(listener);
    }

    fn on_page_hide_once(&self, listener: Box<dyn FnOnce(PageHide)>) {
        self.state.borrow_mut().page_hide_once.push(listener);
    }

    fn on_unload_noop(&self) {
        self.state.borrow_mut().unload_listeners += 1;
    }

    fn on_visibility_change(&self, listener: Box<dyn FnMut(Visibility)>) {
        self.state.borrow_mut().visibility.push(listener);
    }

    fn defer(&self, task: Box<dyn FnOnce()>) {
        self.state.borrow_mut().deferred.push(task);
    }

    fn now(&self) -> f64 {
        self.state.borrow().now
    }
}
