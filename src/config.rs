//! Log store configuration

use crate::error::{AlertLogError, Result};
use crate::source::Role;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a `LogStore`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LogStoreConfig {
    /// Caller must hold any one of these roles for every operation
    pub required_roles: Vec<Role>,

    /// Deadline for each provider round trip, in milliseconds
    ///
    /// `None` disables the deadline; cancellation by dropping the future
    /// still applies.
    pub statement_timeout_ms: Option<u64>,

    /// Largest explicit alert id list accepted by a single batch write
    ///
    /// 0 means unlimited.
    pub max_batch_size: usize,
}

impl Default for LogStoreConfig {
    fn default() -> Self {
        Self {
            required_roles: Role::ALL.to_vec(),
            statement_timeout_ms: Some(5_000),
            max_batch_size: 10_000,
        }
    }
}

impl LogStoreConfig {
    pub fn statement_timeout(&self) -> Option<Duration> {
        self.statement_timeout_ms.map(Duration::from_millis)
    }

    pub fn validate(&self) -> Result<()> {
        if self.required_roles.is_empty() {
            return Err(AlertLogError::Config(
                "requiredRoles cannot be empty".to_string(),
            ));
        }
        if self.statement_timeout_ms == Some(0) {
            return Err(AlertLogError::Config(
                "statementTimeoutMs must be > 0 (omit it to disable the deadline)".to_string(),
            ));
        }
        Ok(())
    }
}
