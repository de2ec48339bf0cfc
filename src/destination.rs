//! Destination registry — display metadata for destination types
//!
//! Notification channels, contact methods, and callbacks store an opaque
//! destination type tag (e.g. `builtin-twilio-sms`). The registry turns that
//! tag into the friendly name used as an entry classifier.

use crate::error::{AlertLogError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;

pub const DEST_TYPE_EMAIL: &str = "builtin-smtp-email";
pub const DEST_TYPE_SMS: &str = "builtin-twilio-sms";
pub const DEST_TYPE_VOICE: &str = "builtin-twilio-voice";
pub const DEST_TYPE_SLACK_CHANNEL: &str = "builtin-slack-channel";
pub const DEST_TYPE_SLACK_DM: &str = "builtin-slack-dm";
pub const DEST_TYPE_WEBHOOK: &str = "builtin-webhook";

/// Display metadata for one destination type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeInfo {
    /// Destination type tag
    pub type_id: String,

    /// Friendly name, used as the classifier
    pub name: String,

    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub supports_alert_notifications: bool,

    #[serde(default)]
    pub supports_status_updates: bool,

    #[serde(default)]
    pub supports_user_verification: bool,
}

impl TypeInfo {
    /// Enabled type that supports alert notifications only
    pub fn new(type_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            type_id: type_id.into(),
            name: name.into(),
            enabled: true,
            supports_alert_notifications: true,
            supports_status_updates: false,
            supports_user_verification: false,
        }
    }
}

/// Lookup of destination type metadata
#[async_trait]
pub trait DestinationRegistry: Send + Sync {
    /// Metadata for `dest_type`; unknown types are an error
    async fn type_info(&self, dest_type: &str) -> Result<TypeInfo>;
}

/// In-memory destination registry
pub struct MemoryDestinationRegistry {
    types: RwLock<HashMap<String, TypeInfo>>,
}

impl MemoryDestinationRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            types: RwLock::new(HashMap::new()),
        }
    }

    /// Registry pre-populated with the built-in destination types
    pub fn with_builtin_types() -> Self {
        let builtins = [
            TypeInfo {
                supports_status_updates: true,
                supports_user_verification: true,
                ..TypeInfo::new(DEST_TYPE_EMAIL, "Email")
            },
            TypeInfo {
                supports_status_updates: true,
                supports_user_verification: true,
                ..TypeInfo::new(DEST_TYPE_SMS, "Text Message (SMS)")
            },
            TypeInfo {
                supports_user_verification: true,
                ..TypeInfo::new(DEST_TYPE_VOICE, "Voice Call")
            },
            TypeInfo {
                supports_status_updates: true,
                ..TypeInfo::new(DEST_TYPE_SLACK_CHANNEL, "Slack Channel")
            },
            TypeInfo::new(DEST_TYPE_SLACK_DM, "Slack Message (DM)"),
            TypeInfo {
                supports_status_updates: true,
                ..TypeInfo::new(DEST_TYPE_WEBHOOK, "Webhook")
            },
        ];
        Self {
            types: RwLock::new(HashMap::from_iter(
                builtins.into_iter().map(|info| (info.type_id.clone(), info)),
            )),
        }
    }

    /// Register or replace a destination type
    pub fn register(&self, info: TypeInfo) -> Result<()> {
        if info.type_id.is_empty() {
            return Err(AlertLogError::Config(
                "Destination type id cannot be empty".to_string(),
            ));
        }
        let mut types = self.types.write().map_err(|e| {
            AlertLogError::Config(format!("Destination registry lock poisoned: {}", e))
        })?;
        types.insert(info.type_id.clone(), info);
        Ok(())
    }
}

impl Default for MemoryDestinationRegistry {
    fn default() -> Self {
        Self::with_builtin_types()
    }
}

#[async_trait]
impl DestinationRegistry for MemoryDestinationRegistry {
    async fn type_info(&self, dest_type: &str) -> Result<TypeInfo> {
        let types = self.types.read().map_err(|e| {
            AlertLogError::Config(format!("Destination registry lock poisoned: {}", e))
        })?;
        types
            .get(dest_type)
            .cloned()
            .ok_or_else(|| AlertLogError::validation("DestinationType", format!("unknown destination type '{}'", dest_type)))
    }
}
