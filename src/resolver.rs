//! Subject resolution — who caused a log entry, and how
//!
//! Maps the call-source descriptor of a `CallContext` to the subject an entry
//! is attributed to plus its base classifier text. Resolution is a total
//! match over `Source`; each arm performs only the lookups it needs, and any
//! failed lookup aborts the whole resolution with a `Lookup` error.

use crate::classifier::minutes;
use crate::destination::DestinationRegistry;
use crate::entry::{Attribution, SubjectId};
use crate::error::{parse_uuid, AlertLogError, Result};
use crate::provider::{LogProvider, UnitOfWork};
use crate::source::Source;
use crate::types::{EventType, IntegrationKeyType};
use async_trait::async_trait;
use uuid::Uuid;

/// Classifier for web-session actions
pub const WEB_CLASSIFIER: &str = "Web";
/// Classifier for "no notification sent" entries caused by a missing immediate rule
pub const NO_IMMEDIATE_RULE_CLASSIFIER: &str = "no immediate rule";
/// Classifier for heartbeat monitors recovering
pub const HEARTBEAT_HEALTHY_CLASSIFIER: &str = "healthy";

/// The id→type lookups subject resolution depends on
///
/// `Ok(None)` means the referenced row does not exist.
#[async_trait]
pub trait SubjectLookup: Send + Sync {
    async fn channel_destination_type(&self, channel_id: Uuid) -> Result<Option<String>>;

    async fn contact_method_destination_type(&self, contact_method_id: Uuid) -> Result<Option<String>>;

    async fn callback_destination_type(&self, callback_id: Uuid) -> Result<Option<String>>;

    async fn heartbeat_interval_minutes(&self, monitor_id: Uuid) -> Result<Option<i64>>;

    async fn integration_key_type(&self, key_id: Uuid) -> Result<Option<String>>;
}

/// `SubjectLookup` backed by a provider, bound to an optional unit of work
pub struct ProviderLookup<'a> {
    provider: &'a dyn LogProvider,
    uow: Option<&'a UnitOfWork>,
}

impl<'a> ProviderLookup<'a> {
    pub fn new(provider: &'a dyn LogProvider, uow: Option<&'a UnitOfWork>) -> Self {
        Self { provider, uow }
    }
}

#[async_trait]
impl SubjectLookup for ProviderLookup<'_> {
    async fn channel_destination_type(&self, channel_id: Uuid) -> Result<Option<String>> {
        self.provider.channel_destination_type(self.uow, channel_id).await
    }

    async fn contact_method_destination_type(&self, contact_method_id: Uuid) -> Result<Option<String>> {
        self.provider
            .contact_method_destination_type(self.uow, contact_method_id)
            .await
    }

    async fn callback_destination_type(&self, callback_id: Uuid) -> Result<Option<String>> {
        self.provider.callback_destination_type(self.uow, callback_id).await
    }

    async fn heartbeat_interval_minutes(&self, monitor_id: Uuid) -> Result<Option<i64>> {
        self.provider.heartbeat_interval_minutes(self.uow, monitor_id).await
    }

    async fn integration_key_type(&self, key_id: Uuid) -> Result<Option<String>> {
        self.provider.integration_key_type(self.uow, key_id).await
    }
}

/// Resolves a call source into an `Attribution`
pub struct SubjectResolver<'a> {
    registry: &'a dyn DestinationRegistry,
    lookup: &'a dyn SubjectLookup,
}

impl<'a> SubjectResolver<'a> {
    pub fn new(registry: &'a dyn DestinationRegistry, lookup: &'a dyn SubjectLookup) -> Self {
        Self { registry, lookup }
    }

    /// Resolve the subject and base classifier for `event`
    ///
    /// `user_id` is the acting user of the call; it is required for the
    /// user-attributed sources (web sessions, contact methods, callbacks).
    pub async fn resolve(
        &self,
        source: Option<&Source>,
        user_id: Option<Uuid>,
        event: EventType,
    ) -> Result<Attribution> {
        let source = match source {
            Some(s) => s,
            None => return Ok(Attribution::default()),
        };

        let attribution = match source {
            Source::NotificationChannel { channel_id } => {
                let id = source_id("notification channel", channel_id)?;
                let dest_type = required(
                    "lookup notification channel destination",
                    self.lookup.channel_destination_type(id).await,
                )?;
                let name = self
                    .destination_name("lookup notification channel destination type", &dest_type)
                    .await?;
                Attribution::new(SubjectId::Channel(id), name)
            }

            Source::AuthProvider { .. } => {
                let user = acting_user(user_id)?;
                Attribution::new(SubjectId::User(user), WEB_CLASSIFIER)
            }

            Source::ContactMethod { contact_method_id } => {
                let user = acting_user(user_id)?;
                if event == EventType::NoNotificationSent {
                    // Nothing was sent, so there is no contact method to describe
                    return Ok(Attribution::new(SubjectId::User(user), NO_IMMEDIATE_RULE_CLASSIFIER));
                }
                let id = source_id("contact method", contact_method_id)?;
                let dest_type = required(
                    "lookup contact method destination",
                    self.lookup.contact_method_destination_type(id).await,
                )?;
                let name = self
                    .destination_name("lookup contact method destination type", &dest_type)
                    .await?;
                Attribution::new(SubjectId::User(user), name)
            }

            Source::NotificationCallback { callback_id } => {
                let user = acting_user(user_id)?;
                let id = source_id("notification callback", callback_id)?;
                let dest_type = required(
                    "lookup notification callback destination",
                    self.lookup.callback_destination_type(id).await,
                )?;
                let name = self
                    .destination_name("lookup notification callback destination type", &dest_type)
                    .await?;
                Attribution::new(SubjectId::User(user), name)
            }

            Source::Heartbeat { monitor_id } => {
                let id = source_id("heartbeat monitor", monitor_id)?;
                let interval = required(
                    "lookup heartbeat monitor interval",
                    self.lookup.heartbeat_interval_minutes(id).await,
                )?;
                let classifier = match event {
                    EventType::Created => format!("expired after {}", minutes(interval)),
                    EventType::Closed => HEARTBEAT_HEALTHY_CLASSIFIER.to_string(),
                    _ => String::new(),
                };
                Attribution::new(SubjectId::HeartbeatMonitor(id), classifier)
            }

            Source::IntegrationKey { key_id } => {
                let id = source_id("integration key", key_id)?;
                let key_type = required(
                    "lookup integration key type",
                    self.lookup.integration_key_type(id).await,
                )?;
                let classifier = IntegrationKeyType::from(key_type.as_str()).classifier();
                Attribution::new(SubjectId::IntegrationKey(id), classifier)
            }
        };

        tracing::debug!(
            event = %event,
            subject_type = %attribution.subject.subject_type(),
            classifier = %attribution.base_classifier,
            "Subject resolved"
        );

        Ok(attribution)
    }

    async fn destination_name(&self, context: &str, dest_type: &str) -> Result<String> {
        self.registry
            .type_info(dest_type)
            .await
            .map(|info| info.name)
            .map_err(|e| AlertLogError::lookup(context, e))
    }
}

fn source_id(what: &str, raw: &str) -> Result<Uuid> {
    parse_uuid(&format!("{} ID", what), raw)
        .map_err(|e| AlertLogError::lookup(format!("parse {} ID", what), e))
}

fn acting_user(user_id: Option<Uuid>) -> Result<Uuid> {
    user_id.ok_or_else(|| {
        AlertLogError::lookup(
            "lookup acting user",
            AlertLogError::NotFound("user-attributed source without a user".to_string()),
        )
    })
}

fn required<T>(context: &str, found: Result<Option<T>>) -> Result<T> {
    match found {
        Ok(Some(v)) => Ok(v),
        Ok(None) => Err(AlertLogError::lookup(
            context,
            AlertLogError::NotFound("no matching row".to_string()),
        )),
        Err(e) => Err(AlertLogError::lookup(context, e)),
    }
}
