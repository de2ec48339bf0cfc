//! Classifier composition
//!
//! A classifier is the comma-separated qualifier shown next to an entry's
//! subject. It is assembled from an ordered list: the base descriptor from
//! subject resolution first, then any batch markers.

use crate::types::{BatchScope, EventType};

pub const ACK_ALL_MARKER: &str = "Ack-All";
pub const CLOSE_ALL_MARKER: &str = "Close-All";

/// Marker for service-wide acknowledge/close writes
pub fn batch_marker(event: EventType, scope: BatchScope) -> Option<&'static str> {
    match (scope, event) {
        (BatchScope::Service, EventType::Acknowledged) => Some(ACK_ALL_MARKER),
        (BatchScope::Service, EventType::Closed) => Some(CLOSE_ALL_MARKER),
        _ => None,
    }
}

/// "1 minute", "5 minutes"
pub(crate) fn minutes(n: i64) -> String {
    if n == 1 {
        "1 minute".to_string()
    } else {
        format!("{} minutes", n)
    }
}

/// Ordered classifier builder
#[derive(Debug, Clone, Default)]
pub struct ClassifierBuilder {
    base: Option<String>,
    markers: Vec<String>,
}

impl ClassifierBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Base descriptor; always placed first. Empty text is ignored.
    pub fn base(mut self, base: impl Into<String>) -> Self {
        let base = base.into();
        self.base = if base.is_empty() { None } else { Some(base) };
        self
    }

    /// Append a marker after the base and any earlier markers
    pub fn marker(mut self, marker: impl Into<String>) -> Self {
        self.markers.push(marker.into());
        self
    }

    /// Add the batch marker for `event` under `scope`, if any
    pub fn batch(self, event: EventType, scope: BatchScope) -> Self {
        match batch_marker(event, scope) {
            Some(m) => self.marker(m),
            None => self,
        }
    }

    pub fn build(self) -> String {
        self.base
            .into_iter()
            .chain(self.markers)
            .collect::<Vec<_>>()
            .join(", ")
    }
}
