//! MySQL server kind for dbflow
//!
//! This crate implements [`ResourceKind`](dbflow_cloud::ResourceKind) for
//! provider-hosted MySQL servers: parameters, the provider's server payload,
//! late initialization and drift detection.
//!
//! # Example
//!
//! ```ignore
//! use dbflow_cloud::{ExternalClient, FileResourceStore, RandomPassword, Reconciler};
//! use dbflow_mysql::MySqlServer;
//!
//! let store = FileResourceStore::<MySqlServer>::from_config(&config.store);
//! let credentials = RandomPassword::from_policy(&config.credentials);
//! let external = ExternalClient::new(client, credentials, store);
//! let reconciler = Reconciler::new(external, secrets);
//!
//! let outcome = reconciler.reconcile("orders-db").await?;
//! ```

pub mod error;
pub mod kind;
pub mod sku;
pub mod types;

pub use error::{MySqlError, Result};
pub use kind::MySqlServer;
pub use sku::{Sku, SkuTier};
pub use types::{
    EnabledState, MySqlServerObservation, MySqlServerParameters, Server, ServerForCreate,
    ServerProperties, ServerSku, ServerState, ServerStorageProfile, ServerUpdate, StorageProfile,
};
