//! Call context, call-source descriptors, and the authorization gate
//!
//! Every store operation receives an explicit `CallContext` describing who is
//! calling and through which mechanism. The `AuthorizationGate` decides
//! whether that caller may touch the log at all.

use crate::error::{AlertLogError, Result};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Mechanism through which the current call arrived
///
/// Each variant carries only the raw identifier its resolution needs. Ids are
/// kept as received and parsed during subject resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum Source {
    /// A shared notification channel (e.g. a Slack channel button)
    NotificationChannel { channel_id: String },
    /// An interactive web session
    AuthProvider { provider_id: String },
    /// A reply from one of the user's contact methods
    ContactMethod { contact_method_id: String },
    /// A callback tied to a specific outgoing notification
    NotificationCallback { callback_id: String },
    /// A heartbeat monitor expiring or recovering
    Heartbeat { monitor_id: String },
    /// An inbound API integration key
    IntegrationKey { key_id: String },
}

/// Caller role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    Admin,
    User,
    Service,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::System, Role::Admin, Role::User, Role::Service];
}

/// Explicit per-call context
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallContext {
    /// Roles held by the caller; empty means unauthenticated
    pub roles: Vec<Role>,

    /// Acting user, when the call is on behalf of a person
    pub user_id: Option<Uuid>,

    /// How the call arrived; `None` means the system itself
    pub source: Option<Source>,
}

impl CallContext {
    /// Context for internal engine work (no source, system role)
    pub fn system() -> Self {
        Self {
            roles: vec![Role::System],
            user_id: None,
            source: None,
        }
    }

    /// Context for a user acting through the given source
    pub fn user(user_id: Uuid, source: Source) -> Self {
        Self {
            roles: vec![Role::User],
            user_id: Some(user_id),
            source: Some(source),
        }
    }

    /// Context for an automated (non-user) source
    pub fn service(source: Source) -> Self {
        Self {
            roles: vec![Role::Service],
            user_id: None,
            source: Some(source),
        }
    }

    pub fn with_source(mut self, source: Source) -> Self {
        self.source = Some(source);
        self
    }
}

/// Authorization gate consulted before every read or write
pub trait AuthorizationGate: Send + Sync {
    /// Succeed if the caller holds any of `required`
    fn check_role(&self, ctx: &CallContext, required: &[Role]) -> Result<()>;

    /// Source descriptor for this call
    fn current_source<'a>(&self, ctx: &'a CallContext) -> Option<&'a Source> {
        ctx.source.as_ref()
    }

    /// Acting user for this call
    fn current_user(&self, ctx: &CallContext) -> Option<Uuid> {
        ctx.user_id
    }
}

/// Any-of role check against `CallContext::roles`
#[derive(Debug, Clone, Copy, Default)]
pub struct RoleGate;

impl AuthorizationGate for RoleGate {
    fn check_role(&self, ctx: &CallContext, required: &[Role]) -> Result<()> {
        if ctx.roles.iter().any(|r| required.contains(r)) {
            return Ok(());
        }
        Err(AlertLogError::Permission(format!(
            "caller holds {:?}, requires one of {:?}",
            ctx.roles, required
        )))
    }
}
