//! Correlation id generation
//!
//! Ids link a request to its eventual reply. Each id is
//! `<millis>-<counter>-<suffix>`: a millisecond timestamp, a process-wide
//! atomically incremented counter, and an 8-character random alphanumeric
//! suffix. The counter guarantees uniqueness within one millisecond even if
//! the random suffix collides; `'-'` never appears inside the parts, so ids
//! split unambiguously. Generation never blocks.

use rand::distributions::Alphanumeric;
use rand::Rng;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

static COUNTER: AtomicU64 = AtomicU64::new(0);

const SUFFIX_LEN: usize = 8;

/// Generate a correlation id, unique within the process lifetime.
pub fn generate() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    let count = COUNTER.fetch_add(1, Ordering::Relaxed);
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SUFFIX_LEN)
        .map(char::from)
        .collect();

    format!("{millis}-{count}-{suffix}")
}
