//! One reconciliation pass
//!
//! The reconciler loads a managed resource, observes it, and issues at most
//! one corrective operation. Scheduling, concurrency and retries belong to
//! whoever calls [`Reconciler::reconcile`]; a failed pass is simply run again
//! later, using [`RequeuePolicy`] for the delay.

use crate::action::{Action, ExternalDeletion, ExternalUpdate, ReconcileOutcome};
use crate::error::{ReconcileError, Result};
use crate::external::ExternalClient;
use crate::provider::{
    ConnectionDetailSink, CredentialGenerator, ProviderClient, ResourceKind, ResourceStore,
};
use crate::resource::{ConnectionDetails, ManagedResource};
use dbflow_config::RequeueConfig;
use std::time::{Duration, Instant};

/// Backoff between failed passes of the same resource
#[derive(Debug, Clone)]
pub struct RequeuePolicy {
    /// Delay after the first failure
    pub initial_delay: Duration,

    /// Upper bound for any delay
    pub max_delay: Duration,

    /// Backoff multiplier
    pub multiplier: f64,
}

impl Default for RequeuePolicy {
    fn default() -> Self {
        Self::from(&RequeueConfig::default())
    }
}

impl From<&RequeueConfig> for RequeuePolicy {
    fn from(config: &RequeueConfig) -> Self {
        Self {
            initial_delay: config.initial_delay(),
            max_delay: config.max_delay(),
            multiplier: config.multiplier,
        }
    }
}

impl RequeuePolicy {
    /// Delay before retrying after `failures` consecutive failed passes
    pub fn delay_for(&self, failures: u32) -> Duration {
        if failures == 0 {
            return Duration::ZERO;
        }
        let exponent = i32::try_from(failures - 1).unwrap_or(i32::MAX);
        let factor = self.multiplier.powi(exponent);
        let delay = self.initial_delay.as_secs_f64() * factor;
        if !delay.is_finite() || delay >= self.max_delay.as_secs_f64() {
            self.max_delay
        } else if delay <= 0.0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(delay)
        }
    }
}

/// Runs reconciliation passes for one resource kind
pub struct Reconciler<K, C, G, S, P> {
    external: ExternalClient<K, C, G, S>,
    sink: P,
}

impl<K, C, G, S, P> Reconciler<K, C, G, S, P>
where
    K: ResourceKind,
    C: ProviderClient<K>,
    G: CredentialGenerator,
    S: ResourceStore<K>,
    P: ConnectionDetailSink,
{
    pub fn new(external: ExternalClient<K, C, G, S>, sink: P) -> Self {
        Self { external, sink }
    }

    pub fn external(&self) -> &ExternalClient<K, C, G, S> {
        &self.external
    }

    /// Run one pass for the resource called `name`
    ///
    /// On failure the error message is recorded in the resource status, the
    /// status is persisted on a best-effort basis and the error is returned
    /// unchanged.
    pub async fn reconcile(&self, name: &str) -> Result<ReconcileOutcome> {
        let start = Instant::now();
        let store = self.external.store();

        let mut resource = store
            .get(name)
            .await
            .map_err(|source| ReconcileError::Store {
                name: name.to_string(),
                source,
            })?;

        match self.run(&mut resource).await {
            Ok(action) => {
                let had_error = resource.status.sync_error.take().is_some();
                if action != Action::NoOp || had_error {
                    self.write_status(&resource).await?;
                }
                let outcome = ReconcileOutcome {
                    name: name.to_string(),
                    action,
                    duration_ms: start.elapsed().as_millis() as u64,
                };
                tracing::debug!(
                    "Reconciled {} {}: {} in {}ms",
                    K::KIND,
                    name,
                    outcome.action,
                    outcome.duration_ms
                );
                Ok(outcome)
            }
            Err(err) => {
                tracing::warn!(
                    "Reconcile of {} {} failed at {}: {}",
                    K::KIND,
                    name,
                    err.step(),
                    err
                );
                resource.status.sync_error = Some(err.to_string());
                if let Err(write_err) = self.write_status(&resource).await {
                    tracing::warn!("Could not record failure on {}: {}", name, write_err);
                }
                Err(err)
            }
        }
    }

    async fn run(&self, resource: &mut ManagedResource<K>) -> Result<Action> {
        let observation = self.external.observe(resource).await?;

        if resource.deletion_requested() {
            if !observation.resource_exists {
                return Ok(Action::NoOp);
            }
            let deletion = self.external.delete(resource).await?;
            if deletion == ExternalDeletion::AlreadyGone {
                tracing::debug!("{} {} was already gone", K::KIND, resource.name());
            }
            return Ok(Action::Delete);
        }

        self.publish(resource, &observation.connection_details).await?;

        if !observation.resource_exists {
            let creation = self.external.create(resource).await?;
            self.publish(resource, &creation.connection_details).await?;
            if let Some(err) = creation.tracking_error {
                return Err(err);
            }
            return Ok(Action::Create);
        }

        if !observation.resource_up_to_date {
            return match self.external.update(resource).await? {
                ExternalUpdate::Issued => Ok(Action::Update),
                ExternalUpdate::Deferred => Ok(Action::Wait),
            };
        }

        Ok(Action::NoOp)
    }

    async fn publish(
        &self,
        resource: &ManagedResource<K>,
        details: &ConnectionDetails,
    ) -> Result<()> {
        if details.is_empty() {
            return Ok(());
        }
        self.sink
            .publish(resource.name(), details)
            .await
            .map_err(ReconcileError::Publish)
    }

    async fn write_status(&self, resource: &ManagedResource<K>) -> Result<()> {
        self.external
            .store()
            .update_status(resource)
            .await
            .map(|_| ())
            .map_err(|source| ReconcileError::Store {
                name: resource.name().to_string(),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::Condition;
    use crate::error::{ProviderError, Step};
    use crate::operation::{AsyncOperation, OperationProgress};
    use crate::resource::{ENDPOINT_KEY, PASSWORD_KEY, USERNAME_KEY};
    use crate::testing::{
        CallKind, FakeProvider, MemorySink, MemoryStore, StaticCredential, Widget,
        WidgetObserved, WidgetParameters, WidgetState,
    };
    use std::sync::Arc;

    type TestReconciler = Reconciler<
        Widget,
        Arc<FakeProvider<Widget>>,
        Arc<StaticCredential>,
        Arc<MemoryStore<Widget>>,
        Arc<MemorySink>,
    >;

    struct Harness {
        provider: Arc<FakeProvider<Widget>>,
        credentials: Arc<StaticCredential>,
        store: Arc<MemoryStore<Widget>>,
        sink: Arc<MemorySink>,
        reconciler: TestReconciler,
    }

    fn harness() -> Harness {
        let provider = Arc::new(FakeProvider::new());
        let credentials = Arc::new(StaticCredential::new("hunter2hunter2"));
        let store = Arc::new(MemoryStore::new());
        let sink = Arc::new(MemorySink::new());
        let reconciler = Reconciler::new(
            ExternalClient::new(provider.clone(), credentials.clone(), store.clone()),
            sink.clone(),
        );
        store.insert(ManagedResource::new(
            "orders-db",
            "azure",
            WidgetParameters {
                admin_login: "dbadmin".to_string(),
                version: "8.0".to_string(),
                size: Some(100),
                location: "westeurope".to_string(),
            },
        ));
        Harness {
            provider,
            credentials,
            store,
            sink,
            reconciler,
        }
    }

    fn server(state: WidgetState) -> WidgetObserved {
        WidgetObserved {
            fqdn: "orders-db.mysql.example.net".to_string(),
            state,
            version: "8.0".to_string(),
            size: Some(100),
            location: "westeurope".to_string(),
        }
    }

    #[test]
    fn test_requeue_backoff() {
        let policy = RequeuePolicy {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        };
        assert_eq!(policy.delay_for(0), Duration::ZERO);
        assert_eq!(policy.delay_for(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for(3), Duration::from_secs(4));
        assert_eq!(policy.delay_for(10), Duration::from_secs(30));
        assert_eq!(policy.delay_for(u32::MAX), Duration::from_secs(30));
    }

    #[test]
    fn test_requeue_with_negative_multiplier_stays_in_range() {
        let policy = RequeuePolicy {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: -2.0,
        };
        assert_eq!(policy.delay_for(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for(2), Duration::ZERO);
        assert_eq!(policy.delay_for(3), Duration::from_secs(4));
        assert!(policy.delay_for(u32::MAX) <= policy.max_delay);
    }

    #[tokio::test]
    async fn test_creates_absent_resource() {
        let h = harness();

        let outcome = h.reconciler.reconcile("orders-db").await.unwrap();

        assert_eq!(outcome.action, Action::Create);
        assert_eq!(h.provider.count(CallKind::Create), 1);
        let stored = h.store.stored("orders-db").unwrap();
        assert_eq!(stored.status.condition(), Some(Condition::Creating));
        assert!(stored.status.last_operation.is_pending());
        assert_eq!(
            h.sink.secret("orders-db").get(PASSWORD_KEY),
            Some(&b"hunter2hunter2"[..])
        );
    }

    #[tokio::test]
    async fn test_create_happens_once_while_name_reserved() {
        let h = harness();

        h.reconciler.reconcile("orders-db").await.unwrap();
        for _ in 0..5 {
            let outcome = h.reconciler.reconcile("orders-db").await.unwrap();
            assert_eq!(outcome.action, Action::NoOp);
        }

        assert_eq!(h.provider.count(CallKind::Create), 1);
        assert_eq!(h.credentials.issued(), 1);
    }

    #[tokio::test]
    async fn test_ready_resource_publishes_endpoint() {
        let h = harness();
        h.provider.set_observed(server(WidgetState::Ready));

        let outcome = h.reconciler.reconcile("orders-db").await.unwrap();

        assert_eq!(outcome.action, Action::NoOp);
        let secret = h.sink.secret("orders-db");
        assert_eq!(
            secret.get(ENDPOINT_KEY),
            Some(&b"orders-db.mysql.example.net"[..])
        );
        assert_eq!(secret.get(USERNAME_KEY), Some(&b"dbadmin@orders-db"[..]));
        assert!(!secret.contains_key(PASSWORD_KEY));
        assert_eq!(h.provider.mutations(), 0);
    }

    #[tokio::test]
    async fn test_drift_triggers_update() {
        let h = harness();
        h.provider.set_observed(WidgetObserved {
            size: Some(50),
            ..server(WidgetState::Ready)
        });

        let outcome = h.reconciler.reconcile("orders-db").await.unwrap();

        assert_eq!(outcome.action, Action::Update);
        assert_eq!(h.provider.count(CallKind::Update), 1);
        // update never emits connection details beyond the observation
        assert!(h
            .sink
            .published()
            .iter()
            .all(|(_, d)| !d.contains_key(PASSWORD_KEY)));
    }

    #[tokio::test]
    async fn test_drift_waits_for_pending_operation() {
        let h = harness();
        let mut cr = h.store.stored("orders-db").unwrap();
        cr.status.last_operation = AsyncOperation::in_progress("PUT", "https://poll/create");
        h.store.insert(cr);
        h.provider.set_observed(WidgetObserved {
            size: Some(50),
            ..server(WidgetState::Provisioning)
        });

        let outcome = h.reconciler.reconcile("orders-db").await.unwrap();

        assert_eq!(outcome.action, Action::Wait);
        assert_eq!(h.provider.mutations(), 0);
    }

    #[tokio::test]
    async fn test_deletion_request() {
        let h = harness();
        let mut cr = h.store.stored("orders-db").unwrap();
        cr.request_deletion();
        h.store.insert(cr);
        h.provider.set_observed(server(WidgetState::Ready));

        let outcome = h.reconciler.reconcile("orders-db").await.unwrap();

        assert_eq!(outcome.action, Action::Delete);
        assert_eq!(h.provider.count(CallKind::Delete), 1);
        let stored = h.store.stored("orders-db").unwrap();
        assert_eq!(stored.status.condition(), Some(Condition::Deleting));
        assert_eq!(stored.status.last_operation.method, "DELETE");
    }

    #[tokio::test]
    async fn test_deletion_of_absent_resource_is_noop() {
        let h = harness();
        let mut cr = h.store.stored("orders-db").unwrap();
        cr.request_deletion();
        h.store.insert(cr);

        let outcome = h.reconciler.reconcile("orders-db").await.unwrap();

        assert_eq!(outcome.action, Action::NoOp);
        assert_eq!(h.provider.mutations(), 0);
    }

    #[tokio::test]
    async fn test_failure_recorded_in_status() {
        let h = harness();
        h.provider
            .fail(CallKind::Get, ProviderError::ApiError("503 Service Unavailable".to_string()));

        let err = h.reconciler.reconcile("orders-db").await.unwrap_err();

        assert_eq!(err.step(), Step::Get);
        let stored = h.store.stored("orders-db").unwrap();
        assert!(stored.status.sync_error.unwrap().contains("503"));
        // desired state survives the failure
        assert_eq!(stored.spec.for_provider.version, "8.0");

        h.provider.heal(CallKind::Get);
        h.provider.set_observed(server(WidgetState::Ready));
        h.reconciler.reconcile("orders-db").await.unwrap();
        assert!(h.store.stored("orders-db").unwrap().status.sync_error.is_none());
    }

    #[tokio::test]
    async fn test_tracking_failure_still_publishes_password() {
        let h = harness();
        h.provider
            .fail(CallKind::FetchOperation, ProviderError::ApiError("throttled".to_string()));

        let err = h.reconciler.reconcile("orders-db").await.unwrap_err();

        assert_eq!(err.step(), Step::OperationFetch);
        assert!(h.sink.secret("orders-db").contains_key(PASSWORD_KEY));
        let stored = h.store.stored("orders-db").unwrap();
        assert!(stored.status.last_operation.is_pending());
    }

    #[tokio::test]
    async fn test_status_write_failure_does_not_mask_error() {
        let h = harness();
        h.store.fail_status_writes(true);
        h.provider
            .fail(CallKind::Create, ProviderError::ApiError("quota".to_string()));

        let err = h.reconciler.reconcile("orders-db").await.unwrap_err();

        assert_eq!(err.step(), Step::Create);
    }

    #[tokio::test]
    async fn test_unknown_resource() {
        let h = harness();

        let err = h.reconciler.reconcile("missing").await.unwrap_err();

        assert_eq!(err.step(), Step::StoreWrite);
        assert!(h.provider.calls().is_empty());
    }

    #[tokio::test]
    async fn test_operation_completes_on_later_pass() {
        let h = harness();
        h.reconciler.reconcile("orders-db").await.unwrap();

        h.provider.set_observed(server(WidgetState::Ready));
        h.provider.set_operation_progress(OperationProgress::succeeded());
        h.reconciler.reconcile("orders-db").await.unwrap();

        let stored = h.store.stored("orders-db").unwrap();
        assert!(!stored.status.last_operation.is_pending());
        assert_eq!(stored.status.condition(), Some(Condition::Available));
        assert!(stored.status.bindable);
    }
}
