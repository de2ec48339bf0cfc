//! In-memory log provider
//!
//! Keeps the alert log and the small reference tables subject resolution
//! reads in process memory, with real unit-of-work semantics: writes under a
//! unit of work stay pending until commit and vanish on rollback or drop.
//! Suitable for tests and single-process deployments.

use super::{LogProvider, ProviderInfo, UnitOfWork, UnitOfWorkFinalizer};
use crate::entry::{EntryTemplate, LogRow, SubjectId};
use crate::error::{AlertLogError, Result};
use crate::types::{AlertStatus, EventType, LogTarget};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

#[derive(Debug, Clone)]
struct IntegrationKeyRow {
    name: String,
    key_type: String,
}

#[derive(Debug, Clone)]
struct HeartbeatRow {
    name: String,
    interval_minutes: i64,
}

#[derive(Debug, Clone)]
struct ChannelRow {
    name: String,
    dest_type: String,
}

#[derive(Debug, Clone, Copy)]
struct AlertRow {
    service_id: Uuid,
    status: AlertStatus,
}

/// A log row as stored, before the subject name join
#[derive(Debug, Clone)]
struct StoredRow {
    id: i64,
    target: LogTarget,
    timestamp: chrono::DateTime<Utc>,
    event: EventType,
    message: Option<String>,
    subject: SubjectId,
    classifier: String,
    meta: Option<serde_json::Value>,
}

#[derive(Default)]
struct State {
    users: HashMap<Uuid, String>,
    integration_keys: HashMap<Uuid, IntegrationKeyRow>,
    heartbeat_monitors: HashMap<Uuid, HeartbeatRow>,
    channels: HashMap<Uuid, ChannelRow>,
    contact_methods: HashMap<Uuid, String>,
    callbacks: HashMap<Uuid, String>,
    escalation_policies: HashMap<Uuid, String>,
    alerts: HashMap<Uuid, AlertRow>,

    alert_logs: BTreeMap<i64, StoredRow>,
    escalation_policy_logs: BTreeMap<i64, StoredRow>,

    /// Uncommitted rows per open unit of work
    pending: HashMap<u64, Vec<StoredRow>>,

    next_log_id: i64,
    next_uow_id: u64,
}

impl State {
    fn ensure_active(&self, uow: Option<&UnitOfWork>, operation: &str) -> Result<()> {
        match uow {
            Some(u) if !self.pending.contains_key(&u.id()) => Err(AlertLogError::storage(
                operation,
                format!("unit of work {} is not active", u.id()),
            )),
            _ => Ok(()),
        }
    }

    fn subject_name(&self, subject: &SubjectId) -> String {
        let name = match subject {
            SubjectId::None => None,
            SubjectId::User(id) => self.users.get(id).cloned(),
            SubjectId::IntegrationKey(id) => self.integration_keys.get(id).map(|k| k.name.clone()),
            SubjectId::HeartbeatMonitor(id) => self.heartbeat_monitors.get(id).map(|h| h.name.clone()),
            SubjectId::Channel(id) => self.channels.get(id).map(|c| c.name.clone()),
        };
        name.unwrap_or_default()
    }

    fn to_log_row(&self, row: &StoredRow) -> LogRow {
        LogRow {
            id: row.id,
            target: row.target,
            timestamp: row.timestamp,
            event: row.event,
            message: row.message.clone(),
            subject: row.subject,
            subject_name: self.subject_name(&row.subject),
            classifier: row.classifier.clone(),
            meta: row.meta.clone(),
        }
    }

    fn stamp(&mut self, targets: &[LogTarget], template: &EntryTemplate) -> Vec<StoredRow> {
        let timestamp = Utc::now();
        targets
            .iter()
            .map(|target| {
                self.next_log_id += 1;
                StoredRow {
                    id: self.next_log_id,
                    target: *target,
                    timestamp,
                    event: template.event,
                    message: template.message.clone(),
                    subject: template.subject,
                    classifier: template.classifier.clone(),
                    meta: template.meta.clone(),
                }
            })
            .collect()
    }

    fn apply(&mut self, rows: Vec<StoredRow>) {
        for row in rows {
            match row.target {
                LogTarget::Alert(_) => {
                    self.alert_logs.insert(row.id, row);
                }
                LogTarget::EscalationPolicy(_) => {
                    self.escalation_policy_logs.insert(row.id, row);
                }
            }
        }
    }

    /// Stamp and write rows, either pending under `uow` or committed at once
    fn insert_rows(
        &mut self,
        uow: Option<&UnitOfWork>,
        targets: &[LogTarget],
        template: &EntryTemplate,
    ) -> u64 {
        let rows = self.stamp(targets, template);
        let count = rows.len() as u64;
        if let Some(u) = uow {
            if let Some(pending) = self.pending.get_mut(&u.id()) {
                pending.extend(rows);
                return count;
            }
        }
        self.apply(rows);
        count
    }
}

struct Inner {
    state: RwLock<State>,
}

impl Inner {
    fn read(&self, operation: &str) -> Result<RwLockReadGuard<'_, State>> {
        self.state
            .read()
            .map_err(|e| AlertLogError::storage(operation, format!("state lock poisoned: {}", e)))
    }

    fn write(&self, operation: &str) -> Result<RwLockWriteGuard<'_, State>> {
        self.state
            .write()
            .map_err(|e| AlertLogError::storage(operation, format!("state lock poisoned: {}", e)))
    }
}

impl UnitOfWorkFinalizer for Inner {
    fn discard(&self, id: u64) {
        if let Ok(mut state) = self.state.write() {
            state.pending.remove(&id);
        }
    }
}

/// In-memory provider for development and testing
#[derive(Clone)]
pub struct MemoryProvider {
    inner: Arc<Inner>,
}

impl Default for MemoryProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryProvider {
    /// Reject handles opened by another provider, then unfinished ones
    fn check_uow(&self, state: &State, uow: Option<&UnitOfWork>, operation: &str) -> Result<()> {
        if let Some(u) = uow {
            if !u.opened_by(&self.inner) {
                return Err(AlertLogError::storage(
                    operation,
                    format!("unit of work {} was opened by another provider", u.id()),
                ));
            }
        }
        state.ensure_active(uow, operation)
    }

    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                state: RwLock::new(State::default()),
            }),
        }
    }

    pub fn add_user(&self, id: Uuid, name: impl Into<String>) -> Result<()> {
        self.inner.write("add user")?.users.insert(id, name.into());
        Ok(())
    }

    pub fn remove_user(&self, id: Uuid) -> Result<()> {
        self.inner.write("remove user")?.users.remove(&id);
        Ok(())
    }

    pub fn add_integration_key(
        &self,
        id: Uuid,
        name: impl Into<String>,
        key_type: impl Into<String>,
    ) -> Result<()> {
        self.inner.write("add integration key")?.integration_keys.insert(
            id,
            IntegrationKeyRow {
                name: name.into(),
                key_type: key_type.into(),
            },
        );
        Ok(())
    }

    pub fn add_heartbeat_monitor(
        &self,
        id: Uuid,
        name: impl Into<String>,
        interval_minutes: i64,
    ) -> Result<()> {
        self.inner.write("add heartbeat monitor")?.heartbeat_monitors.insert(
            id,
            HeartbeatRow {
                name: name.into(),
                interval_minutes,
            },
        );
        Ok(())
    }

    pub fn add_notification_channel(
        &self,
        id: Uuid,
        name: impl Into<String>,
        dest_type: impl Into<String>,
    ) -> Result<()> {
        self.inner.write("add notification channel")?.channels.insert(
            id,
            ChannelRow {
                name: name.into(),
                dest_type: dest_type.into(),
            },
        );
        Ok(())
    }

    pub fn add_contact_method(&self, id: Uuid, dest_type: impl Into<String>) -> Result<()> {
        self.inner
            .write("add contact method")?
            .contact_methods
            .insert(id, dest_type.into());
        Ok(())
    }

    pub fn add_notification_callback(&self, id: Uuid, dest_type: impl Into<String>) -> Result<()> {
        self.inner
            .write("add notification callback")?
            .callbacks
            .insert(id, dest_type.into());
        Ok(())
    }

    pub fn add_escalation_policy(&self, id: Uuid, name: impl Into<String>) -> Result<()> {
        self.inner
            .write("add escalation policy")?
            .escalation_policies
            .insert(id, name.into());
        Ok(())
    }

    pub fn add_alert(&self, id: Uuid, service_id: Uuid, status: AlertStatus) -> Result<()> {
        self.inner
            .write("add alert")?
            .alerts
            .insert(id, AlertRow { service_id, status });
        Ok(())
    }

    pub fn set_alert_status(&self, id: Uuid, status: AlertStatus) -> Result<()> {
        let mut state = self.inner.write("set alert status")?;
        let alert = state
            .alerts
            .get_mut(&id)
            .ok_or_else(|| AlertLogError::storage("set alert status", format!("alert {} does not exist", id)))?;
        alert.status = status;
        Ok(())
    }

    /// Delete an alert and, by cascade, every log row recorded against it
    pub fn delete_alert(&self, id: Uuid) -> Result<usize> {
        let mut state = self.inner.write("delete alert")?;
        state.alerts.remove(&id);

        let target = LogTarget::Alert(id);
        let before = state.alert_logs.len();
        state.alert_logs.retain(|_, row| row.target != target);
        let removed = before - state.alert_logs.len();
        for rows in state.pending.values_mut() {
            rows.retain(|row| row.target != target);
        }

        tracing::debug!(alert_id = %id, removed, "Alert deleted, log rows cascaded");
        Ok(removed)
    }
}

#[async_trait]
impl LogProvider for MemoryProvider {
    fn name(&self) -> &str {
        "memory"
    }

    async fn begin(&self) -> Result<UnitOfWork> {
        let id = {
            let mut state = self.inner.write("begin")?;
            state.next_uow_id += 1;
            let id = state.next_uow_id;
            state.pending.insert(id, Vec::new());
            id
        };
        let finalizer: Arc<dyn UnitOfWorkFinalizer> = self.inner.clone();
        Ok(UnitOfWork::new(id, finalizer))
    }

    async fn commit(&self, uow: UnitOfWork) -> Result<()> {
        if !uow.opened_by(&self.inner) {
            return Err(AlertLogError::storage(
                "commit",
                format!("unit of work {} was opened by another provider", uow.id()),
            ));
        }
        let mut state = self.inner.write("commit")?;
        let id = uow.finish();
        let rows = state
            .pending
            .remove(&id)
            .ok_or_else(|| AlertLogError::storage("commit", format!("unit of work {} is not active", id)))?;
        let count = rows.len();
        state.apply(rows);
        tracing::debug!(uow = id, rows = count, "Unit of work committed");
        Ok(())
    }

    async fn rollback(&self, uow: UnitOfWork) -> Result<()> {
        if !uow.opened_by(&self.inner) {
            return Err(AlertLogError::storage(
                "rollback",
                format!("unit of work {} was opened by another provider", uow.id()),
            ));
        }
        let mut state = self.inner.write("rollback")?;
        let id = uow.finish();
        let rows = state
            .pending
            .remove(&id)
            .ok_or_else(|| AlertLogError::storage("rollback", format!("unit of work {} is not active", id)))?;
        tracing::debug!(uow = id, discarded = rows.len(), "Unit of work rolled back");
        Ok(())
    }

    async fn channel_destination_type(
        &self,
        uow: Option<&UnitOfWork>,
        channel_id: Uuid,
    ) -> Result<Option<String>> {
        let state = self.inner.read("lookup notification channel destination")?;
        self.check_uow(&state, uow, "lookup notification channel destination")?;
        Ok(state.channels.get(&channel_id).map(|c| c.dest_type.clone()))
    }

    async fn contact_method_destination_type(
        &self,
        uow: Option<&UnitOfWork>,
        contact_method_id: Uuid,
    ) -> Result<Option<String>> {
        let state = self.inner.read("lookup contact method destination")?;
        self.check_uow(&state, uow, "lookup contact method destination")?;
        Ok(state.contact_methods.get(&contact_method_id).cloned())
    }

    async fn callback_destination_type(
        &self,
        uow: Option<&UnitOfWork>,
        callback_id: Uuid,
    ) -> Result<Option<String>> {
        let state = self.inner.read("lookup notification callback destination")?;
        self.check_uow(&state, uow, "lookup notification callback destination")?;
        Ok(state.callbacks.get(&callback_id).cloned())
    }

    async fn heartbeat_interval_minutes(
        &self,
        uow: Option<&UnitOfWork>,
        monitor_id: Uuid,
    ) -> Result<Option<i64>> {
        let state = self.inner.read("lookup heartbeat interval")?;
        self.check_uow(&state, uow, "lookup heartbeat interval")?;
        Ok(state.heartbeat_monitors.get(&monitor_id).map(|h| h.interval_minutes))
    }

    async fn integration_key_type(
        &self,
        uow: Option<&UnitOfWork>,
        key_id: Uuid,
    ) -> Result<Option<String>> {
        let state = self.inner.read("lookup integration key type")?;
        self.check_uow(&state, uow, "lookup integration key type")?;
        Ok(state.integration_keys.get(&key_id).map(|k| k.key_type.clone()))
    }

    async fn insert_many(
        &self,
        uow: Option<&UnitOfWork>,
        alert_ids: &[Uuid],
        template: &EntryTemplate,
    ) -> Result<u64> {
        let mut state = self.inner.write("insert alert logs")?;
        self.check_uow(&state, uow, "insert alert logs")?;

        // Foreign key check for the whole batch before any row is stamped
        if let Some(missing) = alert_ids.iter().find(|id| !state.alerts.contains_key(id)) {
            return Err(AlertLogError::storage(
                "insert alert logs",
                format!("alert {} does not exist", missing),
            ));
        }

        let targets: Vec<LogTarget> = alert_ids.iter().map(|id| LogTarget::Alert(*id)).collect();
        Ok(state.insert_rows(uow, &targets, template))
    }

    async fn insert_service(
        &self,
        uow: Option<&UnitOfWork>,
        service_id: Uuid,
        template: &EntryTemplate,
    ) -> Result<u64> {
        let mut state = self.inner.write("insert service alert logs")?;
        self.check_uow(&state, uow, "insert service alert logs")?;

        let mut affected: Vec<Uuid> = state
            .alerts
            .iter()
            .filter(|(_, a)| a.service_id == service_id)
            .filter(|(_, a)| match template.event {
                EventType::Acknowledged => a.status == AlertStatus::Triggered,
                _ => a.status != AlertStatus::Closed,
            })
            .map(|(id, _)| *id)
            .collect();
        affected.sort();

        let targets: Vec<LogTarget> = affected.into_iter().map(LogTarget::Alert).collect();
        Ok(state.insert_rows(uow, &targets, template))
    }

    async fn insert_escalation_policy(
        &self,
        uow: Option<&UnitOfWork>,
        escalation_policy_id: Uuid,
        template: &EntryTemplate,
    ) -> Result<u64> {
        let mut state = self.inner.write("insert escalation policy log")?;
        self.check_uow(&state, uow, "insert escalation policy log")?;

        if !state.escalation_policies.contains_key(&escalation_policy_id) {
            return Err(AlertLogError::storage(
                "insert escalation policy log",
                format!("escalation policy {} does not exist", escalation_policy_id),
            ));
        }

        Ok(state.insert_rows(uow, &[LogTarget::EscalationPolicy(escalation_policy_id)], template))
    }

    async fn find_one(&self, log_id: i64) -> Result<Option<LogRow>> {
        let state = self.inner.read("find log entry")?;
        Ok(state.alert_logs.get(&log_id).map(|row| state.to_log_row(row)))
    }

    async fn find_all(&self, alert_id: Uuid) -> Result<Vec<LogRow>> {
        let state = self.inner.read("find alert log entries")?;
        let target = LogTarget::Alert(alert_id);
        Ok(state
            .alert_logs
            .values()
            .filter(|row| row.target == target)
            .map(|row| state.to_log_row(row))
            .collect())
    }

    async fn find_latest_by_type(
        &self,
        alert_id: Uuid,
        event: EventType,
    ) -> Result<Option<LogRow>> {
        let state = self.inner.read("find latest alert log entry")?;
        let target = LogTarget::Alert(alert_id);
        Ok(state
            .alert_logs
            .values()
            .rev()
            .find(|row| row.target == target && row.event == event)
            .map(|row| state.to_log_row(row)))
    }

    async fn find_all_by_escalation_policy(
        &self,
        escalation_policy_id: Uuid,
    ) -> Result<Vec<LogRow>> {
        let state = self.inner.read("find escalation policy log entries")?;
        let target = LogTarget::EscalationPolicy(escalation_policy_id);
        Ok(state
            .escalation_policy_logs
            .values()
            .filter(|row| row.target == target)
            .map(|row| state.to_log_row(row))
            .collect())
    }

    async fn info(&self) -> Result<ProviderInfo> {
        let state = self.inner.read("info")?;
        Ok(ProviderInfo {
            provider: "memory".to_string(),
            alert_entries: state.alert_logs.len() as u64,
            escalation_policy_entries: state.escalation_policy_logs.len() as u64,
            open_units_of_work: state.pending.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BatchScope;
    use crate::entry::Attribution;

    fn template(event: EventType) -> EntryTemplate {
        EntryTemplate::build(event, BatchScope::Alerts, Attribution::default(), None)
    }

    fn provider_with_alerts(n: usize) -> (MemoryProvider, Uuid, Vec<Uuid>) {
        let p = MemoryProvider::new();
        let svc = Uuid::new_v4();
        let ids: Vec<Uuid> = (0..n).map(|_| Uuid::new_v4()).collect();
        for id in &ids {
            p.add_alert(*id, svc, AlertStatus::Triggered).unwrap();
        }
        (p, svc, ids)
    }

    #[tokio::test]
    async fn test_insert_without_uow_is_immediately_visible() {
        let (p, _, ids) = provider_with_alerts(2);
        let n = p.insert_many(None, &ids, &template(EventType::Created)).await.unwrap();
        assert_eq!(n, 2);
        assert_eq!(p.find_all(ids[0]).await.unwrap().len(), 1);
        assert_eq!(p.find_all(ids[1]).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_pending_until_commit() {
        let (p, _, ids) = provider_with_alerts(1);
        let uow = p.begin().await.unwrap();
        p.insert_many(Some(&uow), &ids, &template(EventType::Created)).await.unwrap();
        assert!(p.find_all(ids[0]).await.unwrap().is_empty());

        p.commit(uow).await.unwrap();
        assert_eq!(p.find_all(ids[0]).await.unwrap().len(), 1);
        assert_eq!(p.info().await.unwrap().open_units_of_work, 0);
    }

    #[tokio::test]
    async fn test_rollback_and_drop_discard() {
        let (p, _, ids) = provider_with_alerts(1);

        let uow = p.begin().await.unwrap();
        p.insert_many(Some(&uow), &ids, &template(EventType::Created)).await.unwrap();
        p.rollback(uow).await.unwrap();

        {
            let uow = p.begin().await.unwrap();
            p.insert_many(Some(&uow), &ids, &template(EventType::Closed)).await.unwrap();
        }

        assert!(p.find_all(ids[0]).await.unwrap().is_empty());
        assert_eq!(p.info().await.unwrap().open_units_of_work, 0);
    }

    #[tokio::test]
    async fn test_finished_uow_is_rejected() {
        let (p, _, ids) = provider_with_alerts(1);
        let uow = p.begin().await.unwrap();
        let stale = UnitOfWork::new(uow.id(), p.inner.clone());
        p.rollback(uow).await.unwrap();

        let err = p
            .insert_many(Some(&stale), &ids, &template(EventType::Created))
            .await
            .unwrap_err();
        assert!(matches!(err, AlertLogError::Storage { .. }));
        assert!(p.commit(stale).await.is_err());
    }

    #[tokio::test]
    async fn test_uow_from_other_provider_is_rejected() {
        let (p, _, ids) = provider_with_alerts(1);
        let other = MemoryProvider::new();

        // Both providers have unit 1 open
        let mine = p.begin().await.unwrap();
        let foreign = other.begin().await.unwrap();
        assert_eq!(mine.id(), foreign.id());

        p.insert_many(Some(&mine), &ids, &template(EventType::Created)).await.unwrap();

        let err = p
            .insert_many(Some(&foreign), &ids, &template(EventType::Closed))
            .await
            .unwrap_err();
        assert!(matches!(err, AlertLogError::Storage { .. }));

        let err = p.commit(foreign).await.unwrap_err();
        assert!(matches!(err, AlertLogError::Storage { .. }));
        assert!(p.find_all(ids[0]).await.unwrap().is_empty());

        // The owner still decides the fate of its own unit
        p.rollback(mine).await.unwrap();
        assert!(p.find_all(ids[0]).await.unwrap().is_empty());
        assert_eq!(p.info().await.unwrap().open_units_of_work, 0);
        assert_eq!(other.info().await.unwrap().open_units_of_work, 0);
    }

    #[tokio::test]
    async fn test_foreign_key_failure_writes_nothing() {
        let (p, _, mut ids) = provider_with_alerts(2);
        ids.push(Uuid::new_v4());
        assert!(p.insert_many(None, &ids, &template(EventType::Created)).await.is_err());
        assert_eq!(p.info().await.unwrap().alert_entries, 0);
    }

    #[tokio::test]
    async fn test_service_scope_filters_by_status() {
        let (p, svc, ids) = provider_with_alerts(3);
        p.set_alert_status(ids[1], AlertStatus::Active).unwrap();
        p.set_alert_status(ids[2], AlertStatus::Closed).unwrap();
        p.add_alert(Uuid::new_v4(), Uuid::new_v4(), AlertStatus::Triggered).unwrap();

        assert_eq!(p.insert_service(None, svc, &template(EventType::Acknowledged)).await.unwrap(), 1);
        assert_eq!(p.insert_service(None, svc, &template(EventType::Closed)).await.unwrap(), 2);
        assert!(p.find_all(ids[2]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_latest_by_type_and_ids_monotonic() {
        let (p, _, ids) = provider_with_alerts(1);
        for _ in 0..3 {
            p.insert_many(None, &ids, &template(EventType::Closed)).await.unwrap();
            p.insert_many(None, &ids, &template(EventType::Created)).await.unwrap();
        }
        let all = p.find_all(ids[0]).await.unwrap();
        assert!(all.windows(2).all(|w| w[0].id < w[1].id));

        let latest = p.find_latest_by_type(ids[0], EventType::Closed).await.unwrap().unwrap();
        assert_eq!(latest.id, 5);
    }

    #[tokio::test]
    async fn test_delete_alert_cascades() {
        let (p, _, ids) = provider_with_alerts(2);
        p.insert_many(None, &ids, &template(EventType::Created)).await.unwrap();
        assert_eq!(p.delete_alert(ids[0]).unwrap(), 1);
        assert!(p.find_all(ids[0]).await.unwrap().is_empty());
        assert_eq!(p.find_all(ids[1]).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_subject_name_join_is_optional() {
        let (p, _, ids) = provider_with_alerts(1);
        let user = Uuid::new_v4();
        p.add_user(user, "Jane").unwrap();
        let t = EntryTemplate::build(
            EventType::Acknowledged,
            BatchScope::Alerts,
            Attribution::new(SubjectId::User(user), "Web"),
            None,
        );
        p.insert_many(None, &ids, &t).await.unwrap();
        assert_eq!(p.find_all(ids[0]).await.unwrap()[0].subject_name, "Jane");

        p.remove_user(user).unwrap();
        assert_eq!(p.find_all(ids[0]).await.unwrap()[0].subject_name, "");
    }

    #[tokio::test]
    async fn test_escalation_policy_rows_are_separate() {
        let (p, _, ids) = provider_with_alerts(1);
        let ep = Uuid::new_v4();
        p.add_escalation_policy(ep, "Primary").unwrap();
        p.insert_escalation_policy(None, ep, &template(EventType::PolicyUpdated)).await.unwrap();

        assert_eq!(p.find_all_by_escalation_policy(ep).await.unwrap().len(), 1);
        assert!(p.find_all(ids[0]).await.unwrap().is_empty());
        let info = p.info().await.unwrap();
        assert_eq!(info.escalation_policy_entries, 1);
        assert_eq!(info.alert_entries, 0);
    }
}
