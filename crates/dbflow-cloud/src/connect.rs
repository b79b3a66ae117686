//! Provider connection
//!
//! Resolves the credentials a managed resource's provider reference points
//! at and turns them into a provider client. This happens before a pass
//! starts; the state machine only ever sees the resulting client.

use crate::error::ConnectError;
use crate::provider::{ProviderClient, ResourceKind};
use crate::resource::ManagedResource;
use async_trait::async_trait;
use dbflow_config::ProviderConfig;
use std::collections::BTreeMap;
use std::marker::PhantomData;

/// Read access to stored secrets
#[async_trait]
pub trait SecretSource: Send + Sync {
    async fn get_secret(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<BTreeMap<String, Vec<u8>>, ConnectError>;
}

/// Builds a provider client from raw credentials
pub trait ClientFactory<K: ResourceKind>: Send + Sync {
    type Client: ProviderClient<K>;

    fn new_client(&self, credentials: &[u8]) -> Result<Self::Client, crate::error::ProviderError>;
}

/// Turns a provider reference into a ready client
pub struct Connector<K, S, F> {
    providers: Vec<ProviderConfig>,
    secrets: S,
    factory: F,
    _kind: PhantomData<fn() -> K>,
}

impl<K, S, F> Connector<K, S, F>
where
    K: ResourceKind,
    S: SecretSource,
    F: ClientFactory<K>,
{
    pub fn new(providers: Vec<ProviderConfig>, secrets: S, factory: F) -> Self {
        Self {
            providers,
            secrets,
            factory,
            _kind: PhantomData,
        }
    }

    pub async fn connect(&self, resource: &ManagedResource<K>) -> Result<F::Client, ConnectError> {
        let provider_ref = &resource.metadata.provider_ref;
        let provider = self
            .providers
            .iter()
            .find(|p| &p.name == provider_ref)
            .ok_or_else(|| ConnectError::ProviderNotFound(provider_ref.clone()))?;

        let selector = provider
            .credentials_secret_ref
            .as_ref()
            .ok_or_else(|| ConnectError::SecretRefMissing(provider.name.clone()))?;

        let data = self
            .secrets
            .get_secret(&selector.namespace, &selector.name)
            .await?;

        // A missing key yields empty credentials; the factory decides whether
        // that is usable.
        let credentials = data.get(&selector.key).map(Vec::as_slice).unwrap_or_default();
        if credentials.is_empty() {
            tracing::warn!(
                "Secret {}/{} has no data under key {}",
                selector.namespace,
                selector.name,
                selector.key
            );
        }

        tracing::debug!(
            "Connecting {} {} through provider {}",
            K::KIND,
            resource.name(),
            provider.name
        );
        self.factory
            .new_client(credentials)
            .map_err(ConnectError::NewClient)
    }
}
