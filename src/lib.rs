//! # a3s-alertlog
//!
//! Append-only audit log of alert lifecycle events for the A3S ecosystem.
//!
//! ## Overview
//!
//! `a3s-alertlog` records who or what caused each alert event (creation,
//! escalation, acknowledgement, notification, closure, ...) and reads the
//! history back with human-readable descriptions. Storage is behind the
//! `LogProvider` trait; writes may join a caller-owned unit of work so an
//! entry commits or rolls back together with the state change it describes.
//!
//! ## Quick Start
//!
//! ```rust
//! use a3s_alertlog::{AlertStatus, CallContext, EventType, LogStore, Source};
//! use a3s_alertlog::{MemoryDestinationRegistry, MemoryProvider};
//! use std::sync::Arc;
//! use uuid::Uuid;
//!
//! # async fn example() -> a3s_alertlog::Result<()> {
//! let provider = MemoryProvider::default();
//! let alert_id = Uuid::new_v4();
//! let key_id = Uuid::new_v4();
//! provider.add_alert(alert_id, Uuid::new_v4(), AlertStatus::Triggered)?;
//! provider.add_integration_key(key_id, "Grafana prod", "grafana")?;
//!
//! let store = LogStore::new(
//!     provider,
//!     Arc::new(MemoryDestinationRegistry::with_builtin_types()),
//! );
//!
//! // An alert created through an integration key
//! let ctx = CallContext::service(Source::IntegrationKey { key_id: key_id.to_string() });
//! store.log_tx(&ctx, None, &alert_id.to_string(), EventType::Created, None).await?;
//!
//! for entry in store.find_all(&ctx, &alert_id.to_string()).await? {
//!     println!("{}", entry.describe()); // "Created via Grafana prod (Grafana)"
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - **LogStore** — authorization, validation, subject resolution, writes and reads
//! - **LogProvider** trait — storage backend with unit-of-work support
//! - **SubjectResolver** — maps a call source to the subject and classifier of an entry
//! - **DestinationRegistry** — destination type id to display name
//! - **DiagnosticSink** — receives failures absorbed by the best-effort API

pub mod classifier;
pub mod config;
pub mod destination;
pub mod diagnostics;
pub mod entry;
pub mod error;
pub mod provider;
pub mod resolver;
pub mod source;
pub mod store;
pub mod types;

// Re-export core types
pub use config::LogStoreConfig;
pub use destination::{DestinationRegistry, MemoryDestinationRegistry, TypeInfo};
pub use diagnostics::{DiagnosticSink, LogFailure, MemoryDiagnosticSink, TracingSink};
pub use entry::{Entry, Subject, SubjectId};
pub use error::{AlertLogError, Result};
pub use provider::{LogProvider, ProviderInfo, UnitOfWork};
pub use source::{AuthorizationGate, CallContext, Role, RoleGate, Source};
pub use store::LogStore;
pub use types::{
    AlertStatus, EscalationMetaData, EventType, IntegrationKeyType, NotificationMetaData,
    SubjectType,
};

// Re-export providers for convenience
pub use provider::memory::MemoryProvider;
