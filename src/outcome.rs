//! Accumulator for best-effort loops.
//!
//! Every loop that tolerates per-item failure (metadata files, pointer
//! tokens, merge inputs) pushes either a success or a skip into an
//! [`Outcome`]. The counts travel with the operation's return value, so
//! partial success can be asserted on instead of only read from logs.

use crate::error::ClipError;

/// One item the loop gave up on, and why.
#[derive(Debug)]
pub struct Skipped {
    pub item: String,
    pub reason: ClipError,
}

#[derive(Debug)]
pub struct Outcome<T> {
    pub succeeded: Vec<T>,
    pub skipped: Vec<Skipped>,
}

impl<T> Default for Outcome<T> {
    fn default() -> Self {
        Self {
            succeeded: Vec::new(),
            skipped: Vec::new(),
        }
    }
}

impl<T> Outcome<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, value: T) {
        self.succeeded.push(value);
    }

    /// Record a skip and emit the matching `warn!` event.
    pub fn skip(&mut self, item: impl Into<String>, reason: ClipError) {
        let item = item.into();
        tracing::warn!(item = %item, "{}", reason);
        self.skipped.push(Skipped { item, reason });
    }

    pub fn success_count(&self) -> usize {
        self.succeeded.len()
    }

    pub fn skip_count(&self) -> usize {
        self.skipped.len()
    }

    /// Append another outcome, successes and skips in order.
    pub fn extend(&mut self, other: Outcome<T>) {
        self.succeeded.extend(other.succeeded);
        self.skipped.extend(other.skipped);
    }
}
