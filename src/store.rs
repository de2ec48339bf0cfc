//! High-level alert log store built on pluggable providers
//!
//! `LogStore` is the façade callers use: it checks authorization, validates
//! identifiers, resolves one entry template per call, and hands the write to
//! the provider, optionally inside the caller's unit of work.

use crate::config::LogStoreConfig;
use crate::destination::DestinationRegistry;
use crate::diagnostics::{DiagnosticSink, LogFailure, TracingSink};
use crate::entry::{Entry, EntryTemplate};
use crate::error::{parse_uuid, AlertLogError, Result};
use crate::provider::{LogProvider, ProviderInfo, UnitOfWork};
use crate::resolver::{ProviderLookup, SubjectResolver};
use crate::source::{AuthorizationGate, CallContext, RoleGate};
use crate::types::{BatchScope, EscalationMetaData, EventType};
use std::future::Future;
use std::sync::Arc;
use uuid::Uuid;

/// Append-only alert log backed by a pluggable provider
///
/// Holds no mutable state; share it behind an `Arc` for concurrent use.
pub struct LogStore {
    provider: Box<dyn LogProvider>,
    registry: Arc<dyn DestinationRegistry>,
    gate: Arc<dyn AuthorizationGate>,
    sink: Arc<dyn DiagnosticSink>,
    config: LogStoreConfig,
}

impl LogStore {
    /// Create a store with the default configuration, `RoleGate`, and `TracingSink`
    pub fn new(
        provider: impl LogProvider + 'static,
        registry: Arc<dyn DestinationRegistry>,
    ) -> Self {
        Self {
            provider: Box::new(provider),
            registry,
            gate: Arc::new(RoleGate),
            sink: Arc::new(TracingSink),
            config: LogStoreConfig::default(),
        }
    }

    /// Create a store with an explicit configuration
    pub fn with_config(
        provider: impl LogProvider + 'static,
        registry: Arc<dyn DestinationRegistry>,
        config: LogStoreConfig,
    ) -> Result<Self> {
        config.validate()?;
        let mut store = Self::new(provider, registry);
        store.config = config;
        Ok(store)
    }

    /// Replace the authorization gate
    pub fn set_gate(&mut self, gate: Arc<dyn AuthorizationGate>) {
        self.gate = gate;
    }

    /// Replace the sink that receives failures absorbed by `must_log*`
    pub fn set_diagnostic_sink(&mut self, sink: Arc<dyn DiagnosticSink>) {
        self.sink = sink;
    }

    pub fn config(&self) -> &LogStoreConfig {
        &self.config
    }

    /// Get the provider name
    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Get a reference to the underlying provider
    pub fn provider(&self) -> &dyn LogProvider {
        self.provider.as_ref()
    }

    /// Open a unit of work on the provider
    pub async fn begin(&self) -> Result<UnitOfWork> {
        self.deadline("begin", self.provider.begin()).await
    }

    pub async fn commit(&self, uow: UnitOfWork) -> Result<()> {
        self.deadline("commit", self.provider.commit(uow)).await
    }

    pub async fn rollback(&self, uow: UnitOfWork) -> Result<()> {
        self.deadline("rollback", self.provider.rollback(uow)).await
    }

    /// Record `event` for one alert
    pub async fn log_tx(
        &self,
        ctx: &CallContext,
        uow: Option<&UnitOfWork>,
        alert_id: &str,
        event: EventType,
        meta: Option<serde_json::Value>,
    ) -> Result<()> {
        self.log_many_tx(ctx, uow, &[alert_id], event, meta).await?;
        Ok(())
    }

    /// Record `event` for every alert in `alert_ids`
    ///
    /// One subject/classifier/metadata template is resolved and shared by all
    /// rows. The batch is atomic: all rows or none. Returns the rows written.
    pub async fn log_many_tx<S: AsRef<str>>(
        &self,
        ctx: &CallContext,
        uow: Option<&UnitOfWork>,
        alert_ids: &[S],
        event: EventType,
        meta: Option<serde_json::Value>,
    ) -> Result<u64> {
        self.authorize(ctx)?;

        let max = self.config.max_batch_size;
        if max > 0 && alert_ids.len() > max {
            return Err(AlertLogError::validation(
                "AlertIDs",
                format!("{} ids exceeds the batch limit of {}", alert_ids.len(), max),
            ));
        }
        let ids = alert_ids
            .iter()
            .map(|id| parse_uuid("AlertID", id.as_ref()))
            .collect::<Result<Vec<Uuid>>>()?;
        if ids.is_empty() {
            return Ok(0);
        }

        let template = self.template(ctx, uow, event, BatchScope::Alerts, meta).await?;
        let rows = self
            .deadline("insert alert logs", self.provider.insert_many(uow, &ids, &template))
            .await?;

        tracing::info!(
            event = %event,
            alerts = ids.len(),
            rows,
            classifier = %template.classifier,
            in_uow = uow.is_some(),
            "Alert log entries written"
        );
        Ok(rows)
    }

    /// Record `event` for the affected alerts of a whole service
    ///
    /// Acknowledge and close entries are marked "Ack-All" / "Close-All".
    pub async fn log_service_tx(
        &self,
        ctx: &CallContext,
        uow: Option<&UnitOfWork>,
        service_id: &str,
        event: EventType,
        meta: Option<serde_json::Value>,
    ) -> Result<u64> {
        self.authorize(ctx)?;
        let service_id = parse_uuid("ServiceID", service_id)?;

        let template = self.template(ctx, uow, event, BatchScope::Service, meta).await?;
        let rows = self
            .deadline(
                "insert service alert logs",
                self.provider.insert_service(uow, service_id, &template),
            )
            .await?;

        tracing::info!(
            service_id = %service_id,
            event = %event,
            rows,
            classifier = %template.classifier,
            in_uow = uow.is_some(),
            "Service alert log entries written"
        );
        Ok(rows)
    }

    /// Record `event` against an escalation policy
    pub async fn log_ep_tx(
        &self,
        ctx: &CallContext,
        uow: Option<&UnitOfWork>,
        escalation_policy_id: &str,
        event: EventType,
        meta: Option<&EscalationMetaData>,
    ) -> Result<()> {
        self.authorize(ctx)?;
        let ep_id = parse_uuid("EscalationPolicyID", escalation_policy_id)?;
        let meta = meta.map(serde_json::to_value).transpose()?;

        let template = self.template(ctx, uow, event, BatchScope::Alerts, meta).await?;
        self.deadline(
            "insert escalation policy log",
            self.provider.insert_escalation_policy(uow, ep_id, &template),
        )
        .await?;

        tracing::info!(
            escalation_policy_id = %ep_id,
            event = %event,
            classifier = %template.classifier,
            in_uow = uow.is_some(),
            "Escalation policy log entry written"
        );
        Ok(())
    }

    /// Best-effort `log_tx` without a unit of work
    pub async fn must_log(
        &self,
        ctx: &CallContext,
        alert_id: &str,
        event: EventType,
        meta: Option<serde_json::Value>,
    ) {
        self.must_log_tx(ctx, None, alert_id, event, meta).await
    }

    /// Best-effort `log_tx`: any failure goes to the diagnostic sink, never to the caller
    pub async fn must_log_tx(
        &self,
        ctx: &CallContext,
        uow: Option<&UnitOfWork>,
        alert_id: &str,
        event: EventType,
        meta: Option<serde_json::Value>,
    ) {
        if let Err(e) = self.log_tx(ctx, uow, alert_id, event, meta).await {
            self.absorb("must_log_tx", vec![alert_id.to_string()], event, e)
                .await;
        }
    }

    /// Best-effort `log_many_tx`
    pub async fn must_log_many_tx<S: AsRef<str>>(
        &self,
        ctx: &CallContext,
        uow: Option<&UnitOfWork>,
        alert_ids: &[S],
        event: EventType,
        meta: Option<serde_json::Value>,
    ) {
        if let Err(e) = self.log_many_tx(ctx, uow, alert_ids, event, meta).await {
            let ids = alert_ids.iter().map(|id| id.as_ref().to_string()).collect();
            self.absorb("must_log_many_tx", ids, event, e).await;
        }
    }

    /// Entry by id, with the subject's display name
    pub async fn find_one(&self, ctx: &CallContext, log_id: i64) -> Result<Entry> {
        self.authorize(ctx)?;
        self.deadline("find log entry", self.provider.find_one(log_id))
            .await?
            .map(Entry::from)
            .ok_or_else(|| AlertLogError::NotFound(format!("id={}", log_id)))
    }

    /// All entries for an alert, oldest first
    pub async fn find_all(&self, ctx: &CallContext, alert_id: &str) -> Result<Vec<Entry>> {
        self.authorize(ctx)?;
        let alert_id = parse_uuid("AlertID", alert_id)?;
        let rows = self
            .deadline("find alert log entries", self.provider.find_all(alert_id))
            .await?;
        Ok(rows.into_iter().map(Entry::from).collect())
    }

    /// Most recent entry of `event` for an alert
    pub async fn find_latest_by_type(
        &self,
        ctx: &CallContext,
        alert_id: &str,
        event: EventType,
    ) -> Result<Entry> {
        self.authorize(ctx)?;
        let id = parse_uuid("AlertID", alert_id)?;
        self.deadline(
            "find latest alert log entry",
            self.provider.find_latest_by_type(id, event),
        )
        .await?
        .map(Entry::from)
        .ok_or_else(|| AlertLogError::NotFound(format!("alert_id={} event={}", id, event)))
    }

    /// Whether `event` was ever recorded for an alert
    pub async fn has_event(
        &self,
        ctx: &CallContext,
        alert_id: &str,
        event: EventType,
    ) -> Result<bool> {
        match self.find_latest_by_type(ctx, alert_id, event).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// All entries for an escalation policy, oldest first
    pub async fn find_all_by_escalation_policy(
        &self,
        ctx: &CallContext,
        escalation_policy_id: &str,
    ) -> Result<Vec<Entry>> {
        self.authorize(ctx)?;
        let ep_id = parse_uuid("EscalationPolicyID", escalation_policy_id)?;
        let rows = self
            .deadline(
                "find escalation policy log entries",
                self.provider.find_all_by_escalation_policy(ep_id),
            )
            .await?;
        Ok(rows.into_iter().map(Entry::from).collect())
    }

    /// Get provider info
    pub async fn info(&self) -> Result<ProviderInfo> {
        self.provider.info().await
    }

    /// Health check
    pub async fn health(&self) -> Result<bool> {
        self.provider.health().await
    }

    fn authorize(&self, ctx: &CallContext) -> Result<()> {
        self.gate.check_role(ctx, &self.config.required_roles)
    }

    /// Resolve the single template shared by every row of one write call
    async fn template(
        &self,
        ctx: &CallContext,
        uow: Option<&UnitOfWork>,
        event: EventType,
        scope: BatchScope,
        meta: Option<serde_json::Value>,
    ) -> Result<EntryTemplate> {
        let lookup = ProviderLookup::new(self.provider.as_ref(), uow);
        let resolver = SubjectResolver::new(self.registry.as_ref(), &lookup);
        let attribution = self
            .deadline(
                "resolve subject",
                resolver.resolve(self.gate.current_source(ctx), self.gate.current_user(ctx), event),
            )
            .await?;
        Ok(EntryTemplate::build(event, scope, attribution, meta))
    }

    /// Bound a provider round trip by the configured statement timeout
    async fn deadline<T>(
        &self,
        operation: &str,
        fut: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        match self.config.statement_timeout() {
            Some(limit) => tokio::time::timeout(limit, fut).await.map_err(|_| {
                AlertLogError::Timeout(format!(
                    "{} exceeded {}ms",
                    operation,
                    limit.as_millis()
                ))
            })?,
            None => fut.await,
        }
    }

    async fn absorb(
        &self,
        operation: &'static str,
        alert_ids: Vec<String>,
        event: EventType,
        err: AlertLogError,
    ) {
        let failure = LogFailure::new(operation, alert_ids, event, err.to_string());
        if let Err(e) = self.sink.handle(failure).await {
            tracing::warn!(
                operation,
                error = %err,
                sink_error = %e,
                "Diagnostic sink rejected absorbed alert log failure"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::destination::MemoryDestinationRegistry;
    use crate::diagnostics::MemoryDiagnosticSink;
    use crate::provider::memory::MemoryProvider;
    use crate::source::{Role, Source};
    use crate::types::{AlertStatus, SubjectType};

    fn setup() -> (LogStore, MemoryProvider, Uuid) {
        let provider = MemoryProvider::new();
        let alert = Uuid::new_v4();
        provider.add_alert(alert, Uuid::new_v4(), AlertStatus::Triggered).unwrap();
        let store = LogStore::new(
            provider.clone(),
            Arc::new(MemoryDestinationRegistry::with_builtin_types()),
        );
        (store, provider, alert)
    }

    #[tokio::test]
    async fn test_system_write_has_no_subject() {
        let (store, _, alert) = setup();
        let ctx = CallContext::system();
        store
            .log_tx(&ctx, None, &alert.to_string(), EventType::Created, None)
            .await
            .unwrap();

        let entries = store.find_all(&ctx, &alert.to_string()).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].subject().subject_type(), SubjectType::None);
        assert_eq!(entries[0].subject().classifier(), "");
        assert_eq!(entries[0].alert_id(), Some(alert));
    }

    #[tokio::test]
    async fn test_invalid_alert_id_is_validation_error() {
        let (store, provider, _) = setup();
        let err = store
            .log_tx(&CallContext::system(), None, "42", EventType::Created, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AlertLogError::Validation { .. }));
        assert_eq!(provider.info().await.unwrap().alert_entries, 0);
    }

    #[tokio::test]
    async fn test_permission_checked_before_validation() {
        let (store, _, _) = setup();
        let err = store
            .log_tx(&CallContext::default(), None, "not-a-uuid", EventType::Created, None)
            .await
            .unwrap_err();
        assert!(err.is_permission());
    }

    #[tokio::test]
    async fn test_empty_batch_writes_nothing() {
        let (store, _, _) = setup();
        let ids: [&str; 0] = [];
        let n = store
            .log_many_tx(&CallContext::system(), None, &ids, EventType::Closed, None)
            .await
            .unwrap();
        assert_eq!(n, 0);
    }

    #[tokio::test]
    async fn test_batch_limit() {
        let provider = MemoryProvider::new();
        let config = LogStoreConfig {
            max_batch_size: 2,
            ..Default::default()
        };
        let store = LogStore::with_config(
            provider,
            Arc::new(MemoryDestinationRegistry::new()),
            config,
        )
        .unwrap();
        let ids: Vec<String> = (0..3).map(|_| Uuid::new_v4().to_string()).collect();
        let err = store
            .log_many_tx(&CallContext::system(), None, &ids, EventType::Closed, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AlertLogError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_with_config_rejects_invalid() {
        let config = LogStoreConfig {
            required_roles: vec![],
            ..Default::default()
        };
        let result = LogStore::with_config(
            MemoryProvider::new(),
            Arc::new(MemoryDestinationRegistry::new()),
            config,
        );
        assert!(matches!(result, Err(AlertLogError::Config(_))));
    }

    #[tokio::test]
    async fn test_required_roles_from_config() {
        let config = LogStoreConfig {
            required_roles: vec![Role::Admin],
            ..Default::default()
        };
        let store = LogStore::with_config(
            MemoryProvider::new(),
            Arc::new(MemoryDestinationRegistry::new()),
            config,
        )
        .unwrap();
        let err = store.find_one(&CallContext::system(), 1).await.unwrap_err();
        assert!(err.is_permission());
    }

    #[tokio::test]
    async fn test_must_log_absorbs_lookup_failure() {
        let (mut store, provider, alert) = setup();
        let sink = Arc::new(MemoryDiagnosticSink::default());
        store.set_diagnostic_sink(sink.clone());

        // Unknown heartbeat monitor: resolution fails
        let ctx = CallContext::service(Source::Heartbeat {
            monitor_id: Uuid::new_v4().to_string(),
        });
        store
            .must_log(&ctx, &alert.to_string(), EventType::Created, None)
            .await;

        assert_eq!(provider.info().await.unwrap().alert_entries, 0);
        let failures = sink.list(10).await.unwrap();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].operation, "must_log_tx");
        assert_eq!(failures[0].alert_ids, vec![alert.to_string()]);
        assert!(failures[0].error.contains("heartbeat"));
    }

    #[tokio::test]
    async fn test_has_event() {
        let (store, _, alert) = setup();
        let ctx = CallContext::system();
        let id = alert.to_string();
        assert!(!store.has_event(&ctx, &id, EventType::NotificationSent).await.unwrap());
        store
            .log_tx(&ctx, None, &id, EventType::NotificationSent, None)
            .await
            .unwrap();
        assert!(store.has_event(&ctx, &id, EventType::NotificationSent).await.unwrap());
    }

    #[tokio::test]
    async fn test_log_ep_meta_is_stored() {
        let (store, provider, _) = setup();
        let ep = Uuid::new_v4();
        provider.add_escalation_policy(ep, "Primary").unwrap();
        let ctx = CallContext::system();
        let meta = EscalationMetaData {
            new_step_index: 3,
            ..Default::default()
        };

        store
            .log_ep_tx(&ctx, None, &ep.to_string(), EventType::Escalated, Some(&meta))
            .await
            .unwrap();

        let entries = store
            .find_all_by_escalation_policy(&ctx, &ep.to_string())
            .await
            .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].escalation_policy_id(), Some(ep));
        assert_eq!(entries[0].meta_as::<EscalationMetaData>().unwrap(), Some(meta));
    }
}
