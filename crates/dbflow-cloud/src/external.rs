//! Reconciliation state machine
//!
//! `ExternalClient` implements the four operations a pass is made of:
//! observe, create, update and delete. It keeps no state of its own between
//! calls; everything it learns is written into the resource it is handed and
//! persisted through the [`ResourceStore`].
//!
//! ```text
//!  absent ──create──▶ name reserved ──▶ provisioning ──▶ ready | failed
//!                                                         │
//!                              ready ◀──── updating ◀─────┤
//!                                                         │
//!  absent ◀──────────────── dropping ◀────delete──────────┘
//! ```

use crate::action::{ExternalCreation, ExternalDeletion, ExternalObservation, ExternalUpdate};
use crate::condition::{Condition, condition_for};
use crate::error::{ReconcileError, Result};
use crate::late_init::late_initialize;
use crate::operation;
use crate::provider::{
    CredentialGenerator, ProviderClient, ResourceKind, ResourceStore, UserVisibleState,
};
use crate::resource::{
    ConnectionDetails, ENDPOINT_KEY, ManagedResource, PASSWORD_KEY, USERNAME_KEY,
};
use std::marker::PhantomData;

/// Drives one resource kind at one provider
pub struct ExternalClient<K, C, G, S> {
    client: C,
    credentials: G,
    store: S,
    _kind: PhantomData<fn() -> K>,
}

impl<K, C, G, S> ExternalClient<K, C, G, S>
where
    K: ResourceKind,
    C: ProviderClient<K>,
    G: CredentialGenerator,
    S: ResourceStore<K>,
{
    pub fn new(client: C, credentials: G, store: S) -> Self {
        Self {
            client,
            credentials,
            store,
            _kind: PhantomData,
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Compare the provider's view of the resource with the desired state
    ///
    /// A resource the provider reports missing still counts as existing when
    /// its name is reserved: creates are asynchronous and not idempotent, so
    /// a create that was accepted but is not yet visible must not be issued
    /// again.
    pub async fn observe(&self, resource: &mut ManagedResource<K>) -> Result<ExternalObservation> {
        let observed = match self.client.get(resource).await {
            Ok(observed) => observed,
            Err(err) if err.is_not_found() => {
                let reserved = self.client.name_reserved(resource).await.map_err(|source| {
                    ReconcileError::NameCheck {
                        kind: K::KIND,
                        source,
                    }
                })?;
                if reserved {
                    tracing::debug!(
                        "{} {} not visible yet but its name is taken, creation in flight",
                        K::KIND,
                        resource.external_name()
                    );
                    return Ok(ExternalObservation::pending_creation());
                }
                return Ok(ExternalObservation::absent());
            }
            Err(source) => {
                return Err(ReconcileError::Get {
                    kind: K::KIND,
                    source,
                });
            }
        };

        let (merged, changed) = late_initialize::<K>(resource.parameters(), &observed);
        if changed {
            resource.spec.for_provider = merged;
            // Spec and status are separate write paths. The spec write must
            // land first; the status write below carries the observation.
            let stored = self
                .store
                .update(resource)
                .await
                .map_err(|source| ReconcileError::Store {
                    name: resource.name().to_string(),
                    source,
                })?;
            resource.metadata = stored.metadata;
            resource.spec = stored.spec;
            tracing::debug!("Late initialized {} {}", K::KIND, resource.name());
        }

        resource.status.at_provider = K::observation(&observed);
        resource.status.last_operation =
            operation::refresh::<K, C>(&self.client, &resource.status.last_operation).await?;

        let condition = condition_for(resource.status.state());
        resource.status.set_condition(condition);
        if condition.is_ready() {
            resource.status.bindable = true;
        }

        let up_to_date = K::is_up_to_date(resource.parameters(), &observed);

        self.store
            .update_status(resource)
            .await
            .map_err(|source| ReconcileError::Store {
                name: resource.name().to_string(),
                source,
            })?;

        let connection_details = ConnectionDetails::new()
            .with(ENDPOINT_KEY, K::endpoint(&resource.status.at_provider))
            .with(
                USERNAME_KEY,
                format!(
                    "{}@{}",
                    K::admin_login(resource.parameters()),
                    resource.external_name()
                ),
            );

        Ok(ExternalObservation::existing(up_to_date, connection_details))
    }

    /// Create the resource with a freshly generated administrator password
    pub async fn create(&self, resource: &mut ManagedResource<K>) -> Result<ExternalCreation> {
        resource.status.set_condition(Condition::Creating);

        let password = self
            .credentials
            .generate()
            .map_err(ReconcileError::GenerateCredential)?;

        tracing::info!("Creating {} {}", K::KIND, resource.external_name());
        resource.status.last_operation = self
            .client
            .create(resource, &password)
            .await
            .map_err(|source| ReconcileError::Create {
                kind: K::KIND,
                source,
            })?;

        let connection_details = ConnectionDetails::new().with(PASSWORD_KEY, password);

        let tracking_error =
            match operation::refresh::<K, C>(&self.client, &resource.status.last_operation).await {
                Ok(op) => {
                    resource.status.last_operation = op;
                    None
                }
                Err(err) => Some(err),
            };

        Ok(ExternalCreation {
            connection_details,
            tracking_error,
        })
    }

    /// Push the desired parameters to the provider
    ///
    /// Deferred while the last operation is still in progress; providers
    /// reject concurrent mutations of one resource.
    pub async fn update(&self, resource: &mut ManagedResource<K>) -> Result<ExternalUpdate> {
        if resource.status.last_operation.is_pending() {
            tracing::debug!(
                "Deferring update of {} {}: {} operation in progress",
                K::KIND,
                resource.name(),
                resource.status.last_operation.method
            );
            return Ok(ExternalUpdate::Deferred);
        }

        tracing::info!("Updating {} {}", K::KIND, resource.external_name());
        resource.status.last_operation =
            self.client
                .update(resource)
                .await
                .map_err(|source| ReconcileError::Update {
                    kind: K::KIND,
                    source,
                })?;

        resource.status.last_operation =
            operation::refresh::<K, C>(&self.client, &resource.status.last_operation).await?;
        Ok(ExternalUpdate::Issued)
    }

    /// Delete the resource at the provider
    pub async fn delete(&self, resource: &mut ManagedResource<K>) -> Result<ExternalDeletion> {
        resource.status.set_condition(Condition::Deleting);

        if resource.status.state().is_dropping() {
            tracing::debug!(
                "{} {} is already being dropped",
                K::KIND,
                resource.external_name()
            );
            return Ok(ExternalDeletion::AlreadyDropping);
        }

        tracing::info!("Deleting {} {}", K::KIND, resource.external_name());
        let deletion = match self.client.delete(resource).await {
            Ok(op) => {
                resource.status.last_operation = op;
                ExternalDeletion::Issued
            }
            Err(err) if err.is_not_found() => ExternalDeletion::AlreadyGone,
            Err(source) => {
                return Err(ReconcileError::Delete {
                    kind: K::KIND,
                    source,
                });
            }
        };

        resource.status.last_operation =
            operation::refresh::<K, C>(&self.client, &resource.status.last_operation).await?;
        Ok(deletion)
    }
}
