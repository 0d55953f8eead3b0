//! Session accumulator with exactly-once delivery
//!
//! A [`Reporter`] collects metric contributions into one flat result and
//! delivers it once, when [`Reporter::flush`] is first called after at least
//! one metric arrived. Every later flush is a no-op.
//!
//! # Example
//!
//! ```
//! use vitals_core::clock::SystemClock;
//! use vitals_core::metric::Metric;
//! use vitals_core::options::ReporterOptions;
//! use vitals_core::reporter::{FlushOutcome, Reporter};
//! use vitals_core::transport::{DeliveryOutcome, MemoryTransport};
//!
//! let transport = MemoryTransport::with_beacon();
//! let mut reporter = Reporter::new(
//!     "/analytics",
//!     ReporterOptions::default(),
//!     transport.clone(),
//!     SystemClock::new(),
//! );
//!
//! reporter.ingest(&Metric::new("LCP", 1834.2));
//! assert_eq!(
//!     reporter.flush(),
//!     FlushOutcome::Delivered(DeliveryOutcome::Beacon { queued: true })
//! );
//! assert_eq!(reporter.flush(), FlushOutcome::AlreadySent);
//! assert_eq!(transport.send_count(), 1);
//! ```

use crate::clock::Clock;
use crate::id::generate_unique_id;
use crate::metric::{round, Metric};
use crate::options::{BeforeSend, MapMetric, OnSend, ReporterOptions};
use crate::payload::{merge, number, Payload, SessionResult};
use crate::transport::{deliver, DeliveryOutcome, Transport};
use serde_json::Value;
use std::fmt;
use tracing::{debug, instrument, trace, warn};

/// What a call to [`Reporter::flush`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// A previous flush already delivered
    AlreadySent,
    /// Nothing was ingested, nothing sent
    NoData,
    /// Handed to the caller's `on_send`
    Custom,
    /// Handed to the default transport policy
    Delivered(DeliveryOutcome),
}

impl FlushOutcome {
    /// Whether this call produced the session's payload
    pub fn is_sent(&self) -> bool {
        matches!(self, FlushOutcome::Custom | FlushOutcome::Delivered(_))
    }
}

pub struct Reporter<T, C> {
    url: String,
    id: String,
    result: SessionResult,
    map_metric: Box<dyn MapMetric>,
    before_send: Option<Box<dyn BeforeSend>>,
    on_send: Option<Box<dyn OnSend>>,
    transport: T,
    clock: C,
    started_at: f64,
    has_data: bool,
    is_sent: bool,
}

impl<T: Transport, C: Clock> Reporter<T, C> {
    /// Create a reporter for one page session
    pub fn new(url: impl Into<String>, options: ReporterOptions, transport: T, clock: C) -> Self {
        let ReporterOptions {
            initial,
            map_metric,
            before_send,
            on_send,
        } = options;

        let id = generate_unique_id(clock.epoch_millis());
        let mut result = SessionResult::new();
        result.insert("id".to_string(), Value::String(id.clone()));
        merge(&mut result, initial);

        let started_at = clock.monotonic_millis();
        let url = url.into();
        debug!("Created reporter {} for {}", id, url);

        Self {
            url,
            id,
            result,
            map_metric,
            before_send,
            on_send,
            transport,
            clock,
            started_at,
            has_data: false,
            is_sent: false,
        }
    }

    /// Merge one metric into the result. Never delivers.
    pub fn ingest(&mut self, metric: &Metric) {
        if self.is_sent {
            debug!("Ignoring {} after flush", metric.name);
            return;
        }

        let patch = self.map_metric.map(metric, &self.result);
        trace!("Ingested {} -> {:?}", metric.name, patch);
        merge(&mut self.result, patch);
        self.has_data = true;
    }

    /// Finalize and deliver the result, at most once per reporter
    #[instrument(skip(self), fields(id = %self.id))]
    pub fn flush(&mut self) -> FlushOutcome {
        if self.is_sent {
            debug!("Already sent");
            return FlushOutcome::AlreadySent;
        }
        if !self.has_data {
            debug!("No metrics collected, skipping delivery");
            return FlushOutcome::NoData;
        }

        let duration = round(self.clock.monotonic_millis() - self.started_at, 0).max(0.0);
        self.result.insert("duration".to_string(), number(duration));

        if let Some(before_send) = &self.before_send {
            if let Some(patch) = before_send.before_send(&self.result) {
                merge(&mut self.result, patch);
            }
        }

        // Set before delivery so a reentrant flush from a hook is a no-op.
        self.is_sent = true;

        let payload = Payload::new(self.url.clone(), self.result.clone());
        if let Some(on_send) = &self.on_send {
            on_send.on_send(payload.url(), payload.result());
            return FlushOutcome::Custom;
        }

        match payload.to_json() {
            Ok(body) => FlushOutcome::Delivered(deliver(&self.transport, payload.url(), &body)),
            Err(err) => {
                warn!("Dropping payload: {}", err);
                FlushOutcome::Delivered(DeliveryOutcome::Failed)
            }
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn is_sent(&self) -> bool {
        self.is_sent
    }

    pub fn has_data(&self) -> bool {
        self.has_data
    }

    /// Current result (frozen once sent)
    pub fn result(&self) -> &SessionResult {
        &self.result
    }
}

impl<T, C> fmt::Debug for Reporter<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reporter")
            .field("url", &self.url)
            .field("id", &self.id)
            .field("result", &self.result)
            .field("has_data", &self.has_data)
            .field("is_sent", &self.is_sent)
            .finish_non_exhaustive()
    }
}
