//! Identifier generation for service instances and bindings.
//!
//! Instance and binding ids are chosen by the client, not the broker, so a
//! caller that retries with the same id gets idempotent behaviour.

#[cfg(any(test, feature = "test-utils"))]
use std::sync::atomic::{AtomicU64, Ordering};

/// Source of fresh instance and binding identifiers.
pub trait IdGenerator: Send + Sync {
    /// Produce a new identifier. Every call must return a distinct value.
    fn next_id(&self) -> String;
}

/// Generates random v4 UUIDs.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    fn next_id(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

/// Deterministic ids (`prefix-1`, `prefix-2`, ...) for tests.
#[cfg(any(test, feature = "test-utils"))]
#[derive(Debug)]
pub struct SequentialIds {
    prefix: String,
    next: AtomicU64,
}

#[cfg(any(test, feature = "test-utils"))]
impl SequentialIds {
    /// Create a generator whose ids start at `prefix-1`.
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: AtomicU64::new(1),
        }
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl IdGenerator for SequentialIds {
    fn next_id(&self) -> String {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        format!("{}-{n}", self.prefix)
    }
}
