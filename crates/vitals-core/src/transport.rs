//! Delivery primitives and the default delivery policy
//!
//! The policy prefers a beacon (fire-and-forget, survives page teardown),
//! falls back to a blocking POST, and does nothing when there is no request
//! context at all. Failures are logged and swallowed: a page that is going
//! away cannot act on them.

use crate::error::ReporterError;
use std::cell::RefCell;
use std::rc::Rc;
use tracing::{debug, warn};

/// Content type of the blocking fallback request.
///
/// `text/plain` keeps the request "simple" so the browser skips the CORS
/// pre-flight.
pub const SYNC_CONTENT_TYPE: &str = "text/plain;charset=UTF-8";

/// Outbound primitives offered by the environment
pub trait Transport {
    /// Whether any request context exists (a `navigator` in browsers)
    fn is_available(&self) -> bool;

    /// Whether the beacon primitive exists
    fn has_beacon(&self) -> bool;

    /// Queue `body` for delivery. Returns whether the environment accepted it.
    fn send_beacon(&self, url: &str, body: &str) -> Result<bool, ReporterError>;

    /// Blocking POST that completes before returning
    fn post_sync(&self, url: &str, body: &str, content_type: &str) -> Result<(), ReporterError>;
}

/// What the default policy did with a payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Handed to the beacon primitive
    Beacon { queued: bool },
    /// Sent with the blocking fallback
    SyncRequest,
    /// No request context; nothing sent
    Unavailable,
    /// The primitive threw; nothing retried
    Failed,
}

/// Default delivery policy
pub fn deliver<T: Transport + ?Sized>(transport: &T, url: &str, body: &str) -> DeliveryOutcome {
    if !transport.is_available() {
        debug!("No request context, dropping payload for {}", url);
        return DeliveryOutcome::Unavailable;
    }

    if transport.has_beacon() {
        return match transport.send_beacon(url, body) {
            Ok(queued) => {
                if !queued {
                    warn!("Beacon to {} was not queued", url);
                }
                DeliveryOutcome::Beacon { queued }
            }
            Err(err) => {
                warn!("Beacon to {} failed: {}", url, err);
                DeliveryOutcome::Failed
            }
        };
    }

    match transport.post_sync(url, body, SYNC_CONTENT_TYPE) {
        Ok(()) => DeliveryOutcome::SyncRequest,
        Err(err) => {
            warn!("Synchronous POST to {} failed: {}", url, err);
            DeliveryOutcome::Failed
        }
    }
}

/// Transport for environments without any request context
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTransport;

impl Transport for NoopTransport {
    fn is_available(&self) -> bool {
        false
    }

    fn has_beacon(&self) -> bool {
        false
    }

    fn send_beacon(&self, _url: &str, _body: &str) -> Result<bool, ReporterError> {
        Ok(false)
    }

    fn post_sync(&self, _url: &str, _body: &str, _content_type: &str) -> Result<(), ReporterError> {
        Ok(())
    }
}

/// Which primitive carried a recorded request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Channel {
    Beacon,
    SyncPost { content_type: String },
}

/// A request captured by [`MemoryTransport`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentRequest {
    pub url: String,
    pub body: String,
    pub channel: Channel,
}

/// In-memory transport that records every request.
///
/// Clones share the same log, so a clone kept by the caller observes what
/// the reporter sent.
#[derive(Debug, Clone)]
pub struct MemoryTransport {
    beacon: bool,
    fail: bool,
    sent: Rc<RefCell<Vec<SentRequest>>>,
}

impl MemoryTransport {
    /// Transport offering a beacon primitive
    pub fn with_beacon() -> Self {
        Self {
            beacon: true,
            fail: false,
            sent: Rc::default(),
        }
    }

    /// Transport offering only the blocking fallback
    pub fn sync_only() -> Self {
        Self {
            beacon: false,
            ..Self::with_beacon()
        }
    }

    /// Make every primitive return an error
    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn sent(&self) -> Vec<SentRequest> {
        self.sent.borrow().clone()
    }

    pub fn send_count(&self) -> usize {
        self.sent.borrow().len()
    }

    fn record(&self, url: &str, body: &str, channel: Channel) -> Result<(), ReporterError> {
        if self.fail {
            return Err(ReporterError::Transport("simulated failure".to_string()));
        }
        self.sent.borrow_mut().push(SentRequest {
            url: url.to_string(),
            body: body.to_string(),
            channel,
        });
        Ok(())
    }
}

impl Transport for MemoryTransport {
    fn is_available(&self) -> bool {
        true
    }

    fn has_beacon(&self) -> bool {
        self.beacon
    }

    fn send_beacon(&self, url: &str, body: &str) -> Result<bool, ReporterError> {
        self.record(url, body, Channel::Beacon)?;
        Ok(true)
    }

    fn post_sync(&self, url: &str, body: &str, content_type: &str) -> Result<(), ReporterError> {
        self.record(
            url,
            body,
            Channel::SyncPost {
                content_type: content_type.to_string(),
            },
        )
    }
}
