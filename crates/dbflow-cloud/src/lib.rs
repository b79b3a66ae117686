//! DBFlow reconciliation engine
//!
//! This crate drives provider-hosted managed resources toward their declared
//! state. Each pass observes the resource at the provider, late-initializes
//! unset parameters, maps the provider state onto a condition and issues at
//! most one create, update or delete.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                  Reconciler                      │
//! │          (one pass per resource name)            │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │                 dbflow-cloud                     │
//! │  ┌──────────────────────────────────────────┐   │
//! │  │             ExternalClient                │   │
//! │  │   observe / create / update / delete      │   │
//! │  └──────────────────────────────────────────┘   │
//! │  ┌──────────────┐  ┌──────────────┐            │
//! │  │  Late Init   │  │  Operations  │            │
//! │  └──────────────┘  └──────────────┘            │
//! └───────┬─────────────────┬───────────────────────┘
//!         │                 │
//! ┌───────▼───────┐ ┌───────▼───────┐
//! │ ProviderClient│ │ ResourceStore │
//! │ (per kind)    │ │ (file/memory) │
//! └───────────────┘ └───────────────┘
//! ```
//!
//! Resource kinds plug in through [`ResourceKind`]; see the `dbflow-mysql`
//! crate for the MySQL server kind.

pub mod action;
pub mod condition;
pub mod connect;
pub mod credential;
pub mod error;
pub mod external;
pub mod late_init;
pub mod operation;
pub mod provider;
pub mod reconciler;
pub mod resource;
pub mod store;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

// Re-exports
pub use action::{
    Action, ExternalCreation, ExternalDeletion, ExternalObservation, ExternalUpdate,
    ReconcileOutcome,
};
pub use condition::{Condition, ConditionRecord, condition_for};
pub use connect::{ClientFactory, Connector, SecretSource};
pub use credential::RandomPassword;
pub use error::{
    ConnectError, CredentialError, ProviderError, PublishError, ReconcileError, Result, Step,
    StoreError,
};
pub use external::ExternalClient;
pub use operation::{AsyncOperation, OperationProgress, OperationStatus};
pub use provider::{
    ConnectionDetailSink, CredentialGenerator, ProviderClient, ResourceKind, ResourceStore,
    UserVisibleState,
};
pub use reconciler::{Reconciler, RequeuePolicy};
pub use resource::{
    ConnectionDetails, ENDPOINT_KEY, ManagedResource, PASSWORD_KEY, ResourceMeta, ResourceSpec,
    ResourceStatus, USERNAME_KEY,
};
pub use store::FileResourceStore;
