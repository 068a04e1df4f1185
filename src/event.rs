//! Audit records and statistics windows.
//!
//! Both types are plain values: every listener receives its own copy of an
//! [`Event`], and a [`StatWindow`] is owned by exactly one statistics task.

use std::collections::HashMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Audit record of one authorized call.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Event {
    /// Unix timestamp (seconds) at which the call was authorized.
    pub timestamp: i64,
    /// Consumer identity taken from call metadata.
    pub consumer: String,
    /// Fully-qualified method path, e.g. `/gatekeep.Biz/Check`.
    pub method: String,
    /// Caller's remote address.
    pub host: String,
}

impl Event {
    /// Create an event stamped with the current time.
    #[must_use]
    pub fn now(
        consumer: impl Into<String>,
        method: impl Into<String>,
        host: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: unix_now(),
            consumer: consumer.into(),
            method: method.into(),
            host: host.into(),
        }
    }
}

/// Call counts accumulated over one statistics interval.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatWindow {
    /// Unix timestamp (seconds) at which the window was closed; 0 while open.
    pub timestamp: i64,
    /// Calls per fully-qualified method.
    pub by_method: HashMap<String, u64>,
    /// Calls per consumer.
    pub by_consumer: HashMap<String, u64>,
}

impl StatWindow {
    /// An empty, open window.
    #[must_use]
    pub fn new() -> Self {
        Self {
            timestamp: 0,
            by_method: HashMap::with_capacity(8),
            by_consumer: HashMap::with_capacity(8),
        }
    }

    /// Count one event.
    pub fn record(&mut self, event: &Event) {
        *self.by_method.entry(event.method.clone()).or_insert(0) += 1;
        *self.by_consumer.entry(event.consumer.clone()).or_insert(0) += 1;
    }

    /// Close the window at the current time and replace it with a fresh one.
    ///
    /// Returns the closed window.
    pub fn rotate(&mut self) -> Self {
        let mut closed = std::mem::take(self);
        closed.timestamp = unix_now();
        *self = Self::new();
        closed
    }

    /// Total number of events counted.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.by_method.values().sum()
    }

    /// Returns true if no event has been counted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_method.is_empty()
    }
}

/// Current unix time in whole seconds.
#[must_use]
pub fn unix_now() -> i64 {
    Utc::now().timestamp()
}
