//! Log entries, their subjects, and the write-side entry template

use crate::classifier::{minutes, ClassifierBuilder};
use crate::error::Result;
use crate::types::{BatchScope, EscalationMetaData, EventType, LogTarget, SubjectType};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity of the actor an entry is attributed to
///
/// Exactly one identity exists per subject and it always agrees with the
/// subject type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "id")]
pub enum SubjectId {
    #[default]
    None,
    User(Uuid),
    IntegrationKey(Uuid),
    HeartbeatMonitor(Uuid),
    Channel(Uuid),
}

impl SubjectId {
    pub fn subject_type(&self) -> SubjectType {
        match self {
            Self::None => SubjectType::None,
            Self::User(_) => SubjectType::User,
            Self::IntegrationKey(_) => SubjectType::IntegrationKey,
            Self::HeartbeatMonitor(_) => SubjectType::HeartbeatMonitor,
            Self::Channel(_) => SubjectType::Channel,
        }
    }

    pub fn id(&self) -> Option<Uuid> {
        match self {
            Self::None => None,
            Self::User(id)
            | Self::IntegrationKey(id)
            | Self::HeartbeatMonitor(id)
            | Self::Channel(id) => Some(*id),
        }
    }
}

/// Result of subject resolution: who acted, plus the base classifier text
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attribution {
    pub subject: SubjectId,
    pub base_classifier: String,
}

impl Attribution {
    pub fn new(subject: SubjectId, base_classifier: impl Into<String>) -> Self {
        Self {
            subject,
            base_classifier: base_classifier.into(),
        }
    }
}

/// Subject embedded in a persisted entry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    id: SubjectId,
    classifier: String,
    name: String,
}

impl Subject {
    pub fn subject_type(&self) -> SubjectType {
        self.id.subject_type()
    }

    pub fn id(&self) -> SubjectId {
        self.id
    }

    pub fn user_id(&self) -> Option<Uuid> {
        match self.id {
            SubjectId::User(id) => Some(id),
            _ => None,
        }
    }

    pub fn integration_key_id(&self) -> Option<Uuid> {
        match self.id {
            SubjectId::IntegrationKey(id) => Some(id),
            _ => None,
        }
    }

    pub fn heartbeat_monitor_id(&self) -> Option<Uuid> {
        match self.id {
            SubjectId::HeartbeatMonitor(id) => Some(id),
            _ => None,
        }
    }

    pub fn channel_id(&self) -> Option<Uuid> {
        match self.id {
            SubjectId::Channel(id) => Some(id),
            _ => None,
        }
    }

    pub fn classifier(&self) -> &str {
        &self.classifier
    }

    /// Display name of the referenced user/key/monitor/channel; empty if it no longer exists
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Everything shared by the rows of one write call
///
/// One template is resolved per call and stamped onto every target row.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryTemplate {
    pub event: EventType,
    pub subject: SubjectId,
    pub classifier: String,
    pub message: Option<String>,
    pub meta: Option<serde_json::Value>,
}

impl EntryTemplate {
    /// Compose the template from a resolved attribution
    pub fn build(
        event: EventType,
        scope: BatchScope,
        attribution: Attribution,
        meta: Option<serde_json::Value>,
    ) -> Self {
        let classifier = ClassifierBuilder::new()
            .base(attribution.base_classifier)
            .batch(event, scope)
            .build();

        Self {
            event,
            subject: attribution.subject,
            classifier,
            message: None,
            meta,
        }
    }
}

/// A stored row as returned by a provider, with the subject name joined in
#[derive(Debug, Clone, PartialEq)]
pub struct LogRow {
    pub id: i64,
    pub target: LogTarget,
    pub timestamp: DateTime<Utc>,
    pub event: EventType,
    pub message: Option<String>,
    pub subject: SubjectId,
    pub subject_name: String,
    pub classifier: String,
    pub meta: Option<serde_json::Value>,
}

/// An immutable alert log entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    id: i64,
    target: LogTarget,
    timestamp: DateTime<Utc>,
    event: EventType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    subject: Subject,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    meta: Option<serde_json::Value>,
}

impl From<LogRow> for Entry {
    fn from(row: LogRow) -> Self {
        Self {
            id: row.id,
            target: row.target,
            timestamp: row.timestamp,
            event: row.event,
            message: row.message,
            subject: Subject {
                id: row.subject,
                classifier: row.classifier,
                name: row.subject_name,
            },
            meta: row.meta,
        }
    }
}

impl Entry {
    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn target(&self) -> LogTarget {
        self.target
    }

    pub fn alert_id(&self) -> Option<Uuid> {
        self.target.alert_id()
    }

    pub fn escalation_policy_id(&self) -> Option<Uuid> {
        self.target.escalation_policy_id()
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn event(&self) -> EventType {
        self.event
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn subject(&self) -> &Subject {
        &self.subject
    }

    /// Raw metadata payload
    pub fn meta(&self) -> Option<&serde_json::Value> {
        self.meta.as_ref()
    }

    /// Decode the metadata payload; `Ok(None)` when there is none
    pub fn meta_as<T: DeserializeOwned>(&self) -> Result<Option<T>> {
        match &self.meta {
            Some(v) => Ok(Some(serde_json::from_value(v.clone())?)),
            None => Ok(None),
        }
    }

    /// Human-readable line for history views
    ///
    /// e.g. `Acknowledged by Jane (Web, Ack-All)` or
    /// `Notification sent to Jane (Voice Call)`.
    pub fn describe(&self) -> String {
        if let Some(msg) = self.message.as_deref().filter(|m| !m.is_empty()) {
            return msg.to_string();
        }

        let (verb, to_user) = match self.event {
            EventType::Created => ("Created".to_string(), false),
            EventType::Reopened => ("Reopened".to_string(), false),
            EventType::StatusChanged => ("Status updated".to_string(), false),
            EventType::AssignmentChanged => ("Assignment changed".to_string(), false),
            EventType::Escalated => (self.escalation_text(), false),
            EventType::EscalationRequest => ("Escalation requested".to_string(), false),
            EventType::Acknowledged => ("Acknowledged".to_string(), false),
            EventType::PolicyUpdated => ("Policy updated".to_string(), false),
            EventType::DuplicateSuppressed => ("Suppressed duplicate: created".to_string(), false),
            EventType::NotificationSent => ("Notification sent".to_string(), true),
            EventType::NotificationFailed => ("Notification failed".to_string(), true),
            EventType::NoNotificationSent => ("No notification sent".to_string(), true),
            EventType::ResponseReceived => ("Response received".to_string(), false),
            EventType::Closed => ("Closed".to_string(), false),
        };

        verb + &self.subject_phrase(to_user)
    }

    fn escalation_text(&self) -> String {
        let meta = match self.meta_as::<EscalationMetaData>() {
            Ok(Some(meta)) => meta,
            _ => return "Escalated".to_string(),
        };

        let mut s = format!("Escalated to step #{}", meta.new_step_index + 1);
        if meta.repeat {
            s.push_str(" (policy repeat)");
        }
        if meta.forced {
            s.push_str(" due to manual escalation");
        } else if meta.deleted {
            s.push_str(" due to current step being deleted");
        } else if meta.old_delay_minutes > 0 {
            s.push_str(" automatically after ");
            s.push_str(&minutes(i64::from(meta.old_delay_minutes)));
        }
        s
    }

    fn subject_phrase(&self, to_user: bool) -> String {
        let prefix = match self.subject.id {
            SubjectId::None => return String::new(),
            SubjectId::User(_) if to_user => "to",
            SubjectId::User(_) => "by",
            SubjectId::IntegrationKey(_)
            | SubjectId::HeartbeatMonitor(_)
            | SubjectId::Channel(_) => "via",
        };
        let name = if self.subject.name.is_empty() {
            "[unknown]"
        } else {
            self.subject.name.as_str()
        };

        let mut s = format!(" {} {}", prefix, name);
        if !self.subject.classifier.is_empty() {
            s.push_str(&format!(" ({})", self.subject.classifier));
        }
        s
    }
}
