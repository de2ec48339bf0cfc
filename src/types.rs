//! Core value types for the alert log
//!
//! All types use snake_case JSON enum values and camelCase field names for
//! wire compatibility with the history views that consume them.

use crate::error::{AlertLogError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Lifecycle event recorded against an alert or escalation policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Created,
    Reopened,
    StatusChanged,
    AssignmentChanged,
    Escalated,
    EscalationRequest,
    Acknowledged,
    PolicyUpdated,
    DuplicateSuppressed,
    NotificationSent,
    NotificationFailed,
    NoNotificationSent,
    ResponseReceived,
    Closed,
}

impl EventType {
    pub const ALL: [EventType; 14] = [
        Self::Created,
        Self::Reopened,
        Self::StatusChanged,
        Self::AssignmentChanged,
        Self::Escalated,
        Self::EscalationRequest,
        Self::Acknowledged,
        Self::PolicyUpdated,
        Self::DuplicateSuppressed,
        Self::NotificationSent,
        Self::NotificationFailed,
        Self::NoNotificationSent,
        Self::ResponseReceived,
        Self::Closed,
    ];

    /// Stored representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Reopened => "reopened",
            Self::StatusChanged => "status_changed",
            Self::AssignmentChanged => "assignment_changed",
            Self::Escalated => "escalated",
            Self::EscalationRequest => "escalation_request",
            Self::Acknowledged => "acknowledged",
            Self::PolicyUpdated => "policy_updated",
            Self::DuplicateSuppressed => "duplicate_suppressed",
            Self::NotificationSent => "notification_sent",
            Self::NotificationFailed => "notification_failed",
            Self::NoNotificationSent => "no_notification_sent",
            Self::ResponseReceived => "response_received",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = AlertLogError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| AlertLogError::validation("EventType", format!("unsupported value '{}'", s)))
    }
}

/// Kind of actor a log entry is attributed to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubjectType {
    #[default]
    None,
    User,
    IntegrationKey,
    HeartbeatMonitor,
    Channel,
}

impl SubjectType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::User => "user",
            Self::IntegrationKey => "integration_key",
            Self::HeartbeatMonitor => "heartbeat_monitor",
            Self::Channel => "channel",
        }
    }
}

impl fmt::Display for SubjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a write covers explicitly named alerts or a whole service
///
/// Service scope marks acknowledge/close entries with an "all" marker in the
/// classifier. The stored event type is never altered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BatchScope {
    #[default]
    Alerts,
    Service,
}

/// What an entry is recorded against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "id")]
pub enum LogTarget {
    Alert(Uuid),
    EscalationPolicy(Uuid),
}

impl LogTarget {
    pub fn alert_id(&self) -> Option<Uuid> {
        match self {
            Self::Alert(id) => Some(*id),
            Self::EscalationPolicy(_) => None,
        }
    }

    pub fn escalation_policy_id(&self) -> Option<Uuid> {
        match self {
            Self::EscalationPolicy(id) => Some(*id),
            Self::Alert(_) => None,
        }
    }
}

/// Alert status as seen by the storage layer when resolving service-wide writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    Triggered,
    Active,
    Closed,
}

/// Integration key flavor, as stored on the key row
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IntegrationKeyType {
    Generic,
    Grafana,
    Site24x7,
    Email,
    Other(String),
}

impl IntegrationKeyType {
    /// Classifier text for entries attributed to a key of this type
    ///
    /// Unrecognized types produce no classifier rather than an error.
    pub fn classifier(&self) -> &'static str {
        match self {
            Self::Generic => "Generic API",
            Self::Grafana => "Grafana",
            Self::Site24x7 => "Site24x7",
            Self::Email => "Email",
            Self::Other(_) => "",
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Generic => "generic",
            Self::Grafana => "grafana",
            Self::Site24x7 => "site24x7",
            Self::Email => "email",
            Self::Other(s) => s,
        }
    }
}

impl From<&str> for IntegrationKeyType {
    fn from(s: &str) -> Self {
        match s {
            "generic" => Self::Generic,
            "grafana" => Self::Grafana,
            "site24x7" => Self::Site24x7,
            "email" => Self::Email,
            other => Self::Other(other.to_string()),
        }
    }
}

/// Metadata attached to `Escalated` entries
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EscalationMetaData {
    /// Zero-based index of the step escalated to
    pub new_step_index: u32,

    /// The policy wrapped around to its first step
    #[serde(default)]
    pub repeat: bool,

    /// Escalation was requested manually
    #[serde(default)]
    pub forced: bool,

    /// The current step was deleted
    #[serde(default)]
    pub deleted: bool,

    /// Delay of the step being left, in minutes
    #[serde(default)]
    pub old_delay_minutes: u32,
}

/// Metadata attached to notification entries
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationMetaData {
    pub message_id: Uuid,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_parse_roundtrip() {
        for t in EventType::ALL {
            assert_eq!(t.as_str().parse::<EventType>().unwrap(), t);
        }
    }

    #[test]
    fn test_event_type_unknown_is_validation_error() {
        let err = "ack_all".parse::<EventType>().unwrap_err();
        assert!(matches!(err, AlertLogError::Validation { .. }));
    }

    #[test]
    fn test_event_type_serde_matches_as_str() {
        let json = serde_json::to_string(&EventType::NoNotificationSent).unwrap();
        assert_eq!(json, "\"no_notification_sent\"");
    }

    #[test]
    fn test_integration_key_classifier_mapping() {
        assert_eq!(IntegrationKeyType::from("generic").classifier(), "Generic API");
        assert_eq!(IntegrationKeyType::from("grafana").classifier(), "Grafana");
        assert_eq!(IntegrationKeyType::from("site24x7").classifier(), "Site24x7");
        assert_eq!(IntegrationKeyType::from("email").classifier(), "Email");
        assert_eq!(IntegrationKeyType::from("prometheusAlertmanager").classifier(), "");
    }

    #[test]
    fn test_log_target_accessors() {
        let id = Uuid::new_v4();
        assert_eq!(LogTarget::Alert(id).alert_id(), Some(id));
        assert_eq!(LogTarget::Alert(id).escalation_policy_id(), None);
        assert_eq!(LogTarget::EscalationPolicy(id).escalation_policy_id(), Some(id));
    }

    #[test]
    fn test_escalation_meta_backward_compat() {
        let meta: EscalationMetaData = serde_json::from_str(r#"{"newStepIndex": 2}"#).unwrap();
        assert_eq!(meta.new_step_index, 2);
        assert!(!meta.repeat);
        assert_eq!(meta.old_delay_minutes, 0);
    }
}
