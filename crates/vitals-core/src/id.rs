//! Session identifiers
//!
//! Format: `<epoch millis, 13 digits>-<random, 13 digits>`, 27 characters.

use std::sync::atomic::{AtomicU64, Ordering};
use tracing::warn;

/// Length of every id produced by [`generate_unique_id`]
pub const SESSION_ID_LEN: usize = 27;

const RANDOM_MIN: u64 = 1_000_000_000_000;
const RANDOM_SPAN: u64 = 9_000_000_000_000;

static FALLBACK_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Build a session id from the current wall-clock time
pub fn generate_unique_id(epoch_millis: f64) -> String {
    let timestamp = epoch_millis.max(0.0) as u64;
    format!("{:013}-{}", timestamp, random_suffix(timestamp))
}

/// Uniform-ish integer in `[10^12, 10^13)`
fn random_suffix(epoch_millis: u64) -> u64 {
    let mut buf = [0u8; 8];
    let bits = match getrandom::getrandom(&mut buf) {
        Ok(()) => u64::from_le_bytes(buf),
        Err(err) => {
            warn!("No randomness source for session id: {}", err);
            fallback_bits(epoch_millis)
        }
    };
    RANDOM_MIN + bits % RANDOM_SPAN
}

/// Clock and a process-wide sequence number, scrambled with splitmix64
fn fallback_bits(epoch_millis: u64) -> u64 {
    let sequence = FALLBACK_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    let mut z = epoch_millis.wrapping_add(sequence.wrapping_mul(0x9E37_79B9_7F4A_7C15));
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}
