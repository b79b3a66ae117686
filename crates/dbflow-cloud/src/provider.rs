//! Capability traits consumed by the reconciliation engine
//!
//! The engine never talks to a cloud API, a secret store or a database of
//! records directly. Everything it needs is expressed here as a trait so the
//! same state machine drives any resource kind behind any client.

use crate::error::{CredentialError, ProviderError, PublishError, StoreError};
use crate::operation::{AsyncOperation, OperationProgress};
use crate::resource::{ConnectionDetails, ManagedResource};
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use std::sync::Arc;

/// Provider-reported lifecycle state of a resource
pub trait UserVisibleState: Copy + Debug + PartialEq + Send + Sync {
    /// The resource is fully provisioned and serving
    fn is_ready(&self) -> bool;

    /// The provider is already tearing the resource down
    fn is_dropping(&self) -> bool;
}

/// Description of a kind of managed resource
///
/// Implementations are zero-sized markers; all behavior lives in associated
/// functions so kinds can be used purely at the type level.
pub trait ResourceKind: Clone + Debug + Default + PartialEq + Send + Sync + 'static {
    /// Human readable kind name used in errors and logs (e.g. "MySQLServer")
    const KIND: &'static str;

    /// Desired state declared by the user
    type Parameters: Clone
        + Debug
        + Default
        + PartialEq
        + Serialize
        + DeserializeOwned
        + Send
        + Sync;

    /// Provider-reported fields persisted in status
    type Observation: Clone
        + Debug
        + Default
        + PartialEq
        + Serialize
        + DeserializeOwned
        + Send
        + Sync;

    /// Raw provider response for a GET
    type Observed: Clone + Debug + Send + Sync;

    /// Provider lifecycle sentinel
    type State: UserVisibleState;

    /// Fill zero-valued parameters from the provider response. Fields the
    /// user has set must come back unchanged.
    fn late_initialize(params: &Self::Parameters, observed: &Self::Observed) -> Self::Parameters;

    /// Compare the provider-mutable subset of parameters against the provider
    fn is_up_to_date(params: &Self::Parameters, observed: &Self::Observed) -> bool;

    /// Project the provider response into the persisted observation
    fn observation(observed: &Self::Observed) -> Self::Observation;

    fn state(observation: &Self::Observation) -> Self::State;

    /// Address clients connect to
    fn endpoint(observation: &Self::Observation) -> String;

    fn admin_login(params: &Self::Parameters) -> &str;
}

/// Network client for one cloud provider and one resource kind
///
/// Every mutating call returns the handle of the long-running operation the
/// provider accepted.
#[async_trait]
pub trait ProviderClient<K: ResourceKind>: Send + Sync {
    async fn get(&self, resource: &ManagedResource<K>) -> Result<K::Observed, ProviderError>;

    /// Whether the resource name is already claimed, including by a create
    /// that has been accepted but is not yet visible through `get`
    async fn name_reserved(&self, resource: &ManagedResource<K>) -> Result<bool, ProviderError>;

    async fn create(
        &self,
        resource: &ManagedResource<K>,
        admin_password: &str,
    ) -> Result<AsyncOperation, ProviderError>;

    async fn update(&self, resource: &ManagedResource<K>) -> Result<AsyncOperation, ProviderError>;

    async fn delete(&self, resource: &ManagedResource<K>) -> Result<AsyncOperation, ProviderError>;

    async fn fetch_operation(
        &self,
        operation: &AsyncOperation,
    ) -> Result<OperationProgress, ProviderError>;
}

/// Source of fresh administrator credentials
pub trait CredentialGenerator: Send + Sync {
    fn generate(&self) -> Result<String, CredentialError>;
}

/// Persistence for managed resource records
///
/// `update` writes metadata and spec and leaves the stored status alone;
/// `update_status` writes only status. Both return the record as stored.
#[async_trait]
pub trait ResourceStore<K: ResourceKind>: Send + Sync {
    async fn get(&self, name: &str) -> Result<ManagedResource<K>, StoreError>;

    async fn update(&self, resource: &ManagedResource<K>) -> Result<ManagedResource<K>, StoreError>;

    async fn update_status(
        &self,
        resource: &ManagedResource<K>,
    ) -> Result<ManagedResource<K>, StoreError>;
}

/// Receiver of connection details, typically a secret publisher
#[async_trait]
pub trait ConnectionDetailSink: Send + Sync {
    async fn publish(
        &self,
        resource: &str,
        details: &ConnectionDetails,
    ) -> Result<(), PublishError>;
}

#[async_trait]
impl<K, T> ProviderClient<K> for Arc<T>
where
    K: ResourceKind,
    T: ProviderClient<K> + ?Sized,
{
    async fn get(&self, resource: &ManagedResource<K>) -> Result<K::Observed, ProviderError> {
        (**self).get(resource).await
    }

    async fn name_reserved(&self, resource: &ManagedResource<K>) -> Result<bool, ProviderError> {
        (**self).name_reserved(resource).await
    }

    async fn create(
        &self,
        resource: &ManagedResource<K>,
        admin_password: &str,
    ) -> Result<AsyncOperation, ProviderError> {
        (**self).create(resource, admin_password).await
    }

    async fn update(&self, resource: &ManagedResource<K>) -> Result<AsyncOperation, ProviderError> {
        (**self).update(resource).await
    }

    async fn delete(&self, resource: &ManagedResource<K>) -> Result<AsyncOperation, ProviderError> {
        (**self).delete(resource).await
    }

    async fn fetch_operation(
        &self,
        operation: &AsyncOperation,
    ) -> Result<OperationProgress, ProviderError> {
        (**self).fetch_operation(operation).await
    }
}

impl<T: CredentialGenerator + ?Sized> CredentialGenerator for Arc<T> {
    fn generate(&self) -> Result<String, CredentialError> {
        (**self).generate()
    }
}

#[async_trait]
impl<K, T> ResourceStore<K> for Arc<T>
where
    K: ResourceKind,
    T: ResourceStore<K> + ?Sized,
{
    async fn get(&self, name: &str) -> Result<ManagedResource<K>, StoreError> {
        (**self).get(name).await
    }

    async fn update(
        &self,
        resource: &ManagedResource<K>,
    ) -> Result<ManagedResource<K>, StoreError> {
        (**self).update(resource).await
    }

    async fn update_status(
        &self,
        resource: &ManagedResource<K>,
    ) -> Result<ManagedResource<K>, StoreError> {
        (**self).update_status(resource).await
    }
}

#[async_trait]
impl<T: ConnectionDetailSink + ?Sized> ConnectionDetailSink for Arc<T> {
    async fn publish(
        &self,
        resource: &str,
        details: &ConnectionDetails,
    ) -> Result<(), PublishError> {
        (**self).publish(resource, details).await
    }
}
