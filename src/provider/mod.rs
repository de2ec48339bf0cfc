//! Log provider trait — the storage abstraction for alert log backends
//!
//! A provider owns the physical tables: it runs the id→type lookups subject
//! resolution needs, performs the three insert shapes, answers the read
//! queries, and manages units of work. Every write and lookup accepts an
//! optional `UnitOfWork` so a log write can commit atomically with the alert
//! state change it documents.

use crate::entry::{EntryTemplate, LogRow};
use crate::error::Result;
use crate::types::EventType;
use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

pub mod memory;

/// Core trait for alert log backends
#[async_trait]
pub trait LogProvider: Send + Sync {
    /// Provider name (e.g., "memory", "postgres")
    fn name(&self) -> &str;

    /// Open a unit of work
    async fn begin(&self) -> Result<UnitOfWork>;

    /// Make every write performed under `uow` visible, atomically
    async fn commit(&self, uow: UnitOfWork) -> Result<()>;

    /// Discard every write performed under `uow`
    async fn rollback(&self, uow: UnitOfWork) -> Result<()>;

    /// Destination type configured on a notification channel
    async fn channel_destination_type(
        &self,
        uow: Option<&UnitOfWork>,
        channel_id: Uuid,
    ) -> Result<Option<String>>;

    /// Destination type of a contact method
    async fn contact_method_destination_type(
        &self,
        uow: Option<&UnitOfWork>,
        contact_method_id: Uuid,
    ) -> Result<Option<String>>;

    /// Destination type a notification callback was sent to
    async fn callback_destination_type(
        &self,
        uow: Option<&UnitOfWork>,
        callback_id: Uuid,
    ) -> Result<Option<String>>;

    /// Configured interval of a heartbeat monitor, in minutes
    async fn heartbeat_interval_minutes(
        &self,
        uow: Option<&UnitOfWork>,
        monitor_id: Uuid,
    ) -> Result<Option<i64>>;

    /// Stored type tag of an integration key
    async fn integration_key_type(
        &self,
        uow: Option<&UnitOfWork>,
        key_id: Uuid,
    ) -> Result<Option<String>>;

    /// Insert one row per alert id, all stamped from `template`
    ///
    /// Without a unit of work the insert is a single atomic statement.
    /// Returns the number of rows written.
    async fn insert_many(
        &self,
        uow: Option<&UnitOfWork>,
        alert_ids: &[Uuid],
        template: &EntryTemplate,
    ) -> Result<u64>;

    /// Insert one row per affected alert of a service
    ///
    /// The affected set is resolved by the provider: `Closed` targets every
    /// non-closed alert, `Acknowledged` every triggered alert, and any other
    /// event every non-closed alert.
    async fn insert_service(
        &self,
        uow: Option<&UnitOfWork>,
        service_id: Uuid,
        template: &EntryTemplate,
    ) -> Result<u64>;

    /// Insert one row against an escalation policy
    async fn insert_escalation_policy(
        &self,
        uow: Option<&UnitOfWork>,
        escalation_policy_id: Uuid,
        template: &EntryTemplate,
    ) -> Result<u64>;

    /// Row by primary key, with the subject name joined in
    async fn find_one(&self, log_id: i64) -> Result<Option<LogRow>>;

    /// All rows for an alert, id ascending
    async fn find_all(&self, alert_id: Uuid) -> Result<Vec<LogRow>>;

    /// Greatest-id row matching (alert, event)
    async fn find_latest_by_type(
        &self,
        alert_id: Uuid,
        event: EventType,
    ) -> Result<Option<LogRow>>;

    /// All rows for an escalation policy, id ascending
    async fn find_all_by_escalation_policy(
        &self,
        escalation_policy_id: Uuid,
    ) -> Result<Vec<LogRow>>;

    /// Provider status information
    async fn info(&self) -> Result<ProviderInfo>;

    /// Health check — returns true if the provider is operational
    ///
    /// Default implementation delegates to `info()`.
    async fn health(&self) -> Result<bool> {
        self.info().await.map(|_| true)
    }
}

/// Hook a provider installs so an abandoned unit of work is discarded
pub trait UnitOfWorkFinalizer: Send + Sync {
    /// Discard pending writes of unit `id`. Must not block.
    fn discard(&self, id: u64);
}

/// Caller-held transaction handle
///
/// Obtained from `LogProvider::begin` and finished with `commit` or
/// `rollback`. Dropping an unfinished unit of work rolls it back.
pub struct UnitOfWork {
    id: u64,
    finalizer: Arc<dyn UnitOfWorkFinalizer>,
    finished: bool,
}

impl UnitOfWork {
    /// Create a handle for unit `id`; used by provider implementations
    pub fn new(id: u64, finalizer: Arc<dyn UnitOfWorkFinalizer>) -> Self {
        Self {
            id,
            finalizer,
            finished: false,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Whether this handle was opened by the provider that owns `finalizer`
    ///
    /// Unit ids are only unique per provider; providers must check this
    /// before honoring a handle.
    pub fn opened_by<F: UnitOfWorkFinalizer>(&self, finalizer: &Arc<F>) -> bool {
        std::ptr::eq(
            Arc::as_ptr(&self.finalizer) as *const (),
            Arc::as_ptr(finalizer) as *const (),
        )
    }

    /// Mark the handle as committed or rolled back by its provider
    pub fn finish(mut self) -> u64 {
        self.finished = true;
        self.id
    }
}

impl std::fmt::Debug for UnitOfWork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnitOfWork")
            .field("id", &self.id)
            .field("finished", &self.finished)
            .finish()
    }
}

impl Drop for UnitOfWork {
    fn drop(&mut self) {
        if !self.finished {
            tracing::debug!(uow = self.id, "Unit of work dropped without commit, rolling back");
            self.finalizer.discard(self.id);
        }
    }
}

/// Provider status information
#[derive(Debug, Clone)]
pub struct ProviderInfo {
    /// Provider name
    pub provider: String,
    /// Committed alert-scoped entries
    pub alert_entries: u64,
    /// Committed escalation-policy-scoped entries
    pub escalation_policy_entries: u64,
    /// Units of work currently open
    pub open_units_of_work: usize,
}
