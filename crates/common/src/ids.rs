//! Transaction identifier generation
//!
//! Produces unique, human-readable transaction ids of the form
//! `tx_<unix_millis>_<seq>`. The sequence counter disambiguates ids
//! generated within the same millisecond.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;

/// Monotonic transaction id generator
///
/// A single instance is shared per manager; ids are unique across threads
/// for the lifetime of the process.
#[derive(Debug, Default)]
pub struct TxIdGenerator {
    seq: AtomicU64,
}

impl TxIdGenerator {
    /// Create a new generator with the sequence at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Generate the next transaction id
    pub fn next_id(&self) -> String {
        let seq = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
        format!("tx_{}_{}", Utc::now().timestamp_millis(), seq)
    }
}
