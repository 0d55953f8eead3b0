//! Time sources used by the reporter

/// Wall-clock and monotonic time, both in milliseconds
pub trait Clock {
    /// Milliseconds since the Unix epoch (session ids)
    fn epoch_millis(&self) -> f64;

    /// Monotonic milliseconds from an arbitrary origin (session duration)
    fn monotonic_millis(&self) -> f64;
}

/// Clock backed by `std::time`, for native hosts.
///
/// `std::time::Instant` is unavailable on `wasm32-unknown-unknown`; browser
/// builds use a `performance.now()` clock instead.
#[cfg(not(target_arch = "wasm32"))]
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: std::time::Instant,
}

#[cfg(not(target_arch = "wasm32"))]
impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: std::time::Instant::now(),
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl Clock for SystemClock {
    fn epoch_millis(&self) -> f64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis() as f64)
            .unwrap_or(0.0)
    }

    fn monotonic_millis(&self) -> f64 {
        self.origin.elapsed().as_secs_f64() * 1000.0
    }
}
