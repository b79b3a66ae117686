//! In-memory collaborators for tests
//!
//! Enabled for this crate's own tests and, through the `test-utils` feature,
//! for crates that implement a resource kind and want to drive the engine
//! without a cloud account.

use crate::connect::SecretSource;
use crate::error::{ConnectError, CredentialError, ProviderError, PublishError, StoreError};
use crate::late_init;
use crate::operation::{AsyncOperation, OperationProgress};
use crate::provider::{
    ConnectionDetailSink, CredentialGenerator, ProviderClient, ResourceKind, ResourceStore,
    UserVisibleState,
};
use crate::resource::{ConnectionDetails, ManagedResource};
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Minimal resource kind used by the engine's own tests
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Widget;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WidgetParameters {
    pub admin_login: String,
    pub version: String,
    pub size: Option<u32>,
    pub location: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WidgetObserved {
    pub fqdn: String,
    pub state: WidgetState,
    pub version: String,
    pub size: Option<u32>,
    pub location: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WidgetObservation {
    pub state: WidgetState,
    pub fqdn: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum WidgetState {
    #[default]
    Unknown,
    Provisioning,
    Ready,
    Dropping,
}

impl UserVisibleState for WidgetState {
    fn is_ready(&self) -> bool {
        *self == WidgetState::Ready
    }

    fn is_dropping(&self) -> bool {
        *self == WidgetState::Dropping
    }
}

impl ResourceKind for Widget {
    const KIND: &'static str = "Widget";

    type Parameters = WidgetParameters;
    type Observation = WidgetObservation;
    type Observed = WidgetObserved;
    type State = WidgetState;

    fn late_initialize(params: &WidgetParameters, observed: &WidgetObserved) -> WidgetParameters {
        WidgetParameters {
            version: late_init::value(&params.version, &observed.version),
            size: late_init::option(&params.size, &observed.size),
            ..params.clone()
        }
    }

    fn is_up_to_date(params: &WidgetParameters, observed: &WidgetObserved) -> bool {
        params.version == observed.version && params.size == observed.size
    }

    fn observation(observed: &WidgetObserved) -> WidgetObservation {
        WidgetObservation {
            state: observed.state,
            fqdn: observed.fqdn.clone(),
        }
    }

    fn state(observation: &WidgetObservation) -> WidgetState {
        observation.state
    }

    fn endpoint(observation: &WidgetObservation) -> String {
        observation.fqdn.clone()
    }

    fn admin_login(params: &WidgetParameters) -> &str {
        &params.admin_login
    }
}

/// A provider call as recorded by [`FakeProvider`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderCall {
    Get(String),
    NameReserved(String),
    Create { name: String, password: String },
    Update(String),
    Delete(String),
    FetchOperation(String),
}

impl ProviderCall {
    pub fn kind(&self) -> CallKind {
        match self {
            ProviderCall::Get(_) => CallKind::Get,
            ProviderCall::NameReserved(_) => CallKind::NameReserved,
            ProviderCall::Create { .. } => CallKind::Create,
            ProviderCall::Update(_) => CallKind::Update,
            ProviderCall::Delete(_) => CallKind::Delete,
            ProviderCall::FetchOperation(_) => CallKind::FetchOperation,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallKind {
    Get,
    NameReserved,
    Create,
    Update,
    Delete,
    FetchOperation,
}

struct FakeState<K: ResourceKind> {
    observed: Option<K::Observed>,
    name_reserved: bool,
    reserve_on_create: bool,
    progress: OperationProgress,
    failures: HashMap<CallKind, ProviderError>,
    calls: Vec<ProviderCall>,
}

/// Scriptable provider that records every call
///
/// Unless told otherwise `get` reports NotFound, names are free, an accepted
/// create reserves the name, and operations stay in progress.
pub struct FakeProvider<K: ResourceKind> {
    state: Mutex<FakeState<K>>,
}

impl<K: ResourceKind> Default for FakeProvider<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: ResourceKind> FakeProvider<K> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FakeState {
                observed: None,
                name_reserved: false,
                reserve_on_create: true,
                progress: OperationProgress::in_progress(),
                failures: HashMap::new(),
                calls: Vec::new(),
            }),
        }
    }

    /// Make the resource visible through `get`
    pub fn set_observed(&self, observed: K::Observed) {
        lock(&self.state).observed = Some(observed);
    }

    /// Make `get` report NotFound again
    pub fn clear_observed(&self) {
        lock(&self.state).observed = None;
    }

    pub fn set_name_reserved(&self, reserved: bool) {
        lock(&self.state).name_reserved = reserved;
    }

    /// Whether an accepted create reserves the name
    pub fn set_reserve_on_create(&self, reserve: bool) {
        lock(&self.state).reserve_on_create = reserve;
    }

    pub fn set_operation_progress(&self, progress: OperationProgress) {
        lock(&self.state).progress = progress;
    }

    /// Fail every call of `kind` with `error` until [`FakeProvider::heal`]
    pub fn fail(&self, kind: CallKind, error: ProviderError) {
        lock(&self.state).failures.insert(kind, error);
    }

    pub fn fail_fetch_operation(&self, error: ProviderError) {
        self.fail(CallKind::FetchOperation, error);
    }

    pub fn heal(&self, kind: CallKind) {
        lock(&self.state).failures.remove(&kind);
    }

    pub fn calls(&self) -> Vec<ProviderCall> {
        lock(&self.state).calls.clone()
    }

    pub fn count(&self, kind: CallKind) -> usize {
        lock(&self.state)
            .calls
            .iter()
            .filter(|c| c.kind() == kind)
            .count()
    }

    /// Number of calls that could change provider state
    pub fn mutations(&self) -> usize {
        self.count(CallKind::Create) + self.count(CallKind::Update) + self.count(CallKind::Delete)
    }

    fn record(&self, call: ProviderCall) -> Result<(), ProviderError> {
        let mut state = lock(&self.state);
        let kind = call.kind();
        state.calls.push(call);
        match state.failures.get(&kind) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl<K: ResourceKind> ProviderClient<K> for FakeProvider<K> {
    async fn get(&self, resource: &ManagedResource<K>) -> Result<K::Observed, ProviderError> {
        let name = resource.external_name().to_string();
        self.record(ProviderCall::Get(name.clone()))?;
        lock(&self.state)
            .observed
            .clone()
            .ok_or(ProviderError::NotFound(name))
    }

    async fn name_reserved(&self, resource: &ManagedResource<K>) -> Result<bool, ProviderError> {
        self.record(ProviderCall::NameReserved(
            resource.external_name().to_string(),
        ))?;
        Ok(lock(&self.state).name_reserved)
    }

    async fn create(
        &self,
        resource: &ManagedResource<K>,
        admin_password: &str,
    ) -> Result<AsyncOperation, ProviderError> {
        let name = resource.external_name().to_string();
        self.record(ProviderCall::Create {
            name: name.clone(),
            password: admin_password.to_string(),
        })?;
        let mut state = lock(&self.state);
        if state.reserve_on_create {
            state.name_reserved = true;
        }
        Ok(AsyncOperation::in_progress(
            "PUT",
            format!("https://poll/{}/create", name),
        ))
    }

    async fn update(&self, resource: &ManagedResource<K>) -> Result<AsyncOperation, ProviderError> {
        let name = resource.external_name().to_string();
        self.record(ProviderCall::Update(name.clone()))?;
        Ok(AsyncOperation::in_progress(
            "PATCH",
            format!("https://poll/{}/update", name),
        ))
    }

    async fn delete(&self, resource: &ManagedResource<K>) -> Result<AsyncOperation, ProviderError> {
        let name = resource.external_name().to_string();
        self.record(ProviderCall::Delete(name.clone()))?;
        Ok(AsyncOperation::in_progress(
            "DELETE",
            format!("https://poll/{}/delete", name),
        ))
    }

    async fn fetch_operation(
        &self,
        operation: &AsyncOperation,
    ) -> Result<OperationProgress, ProviderError> {
        self.record(ProviderCall::FetchOperation(operation.polling_url.clone()))?;
        Ok(lock(&self.state).progress.clone())
    }
}

/// Credential generator returning a fixed password, or a fixed error
pub struct StaticCredential {
    result: Result<String, CredentialError>,
    issued: Mutex<usize>,
}

impl StaticCredential {
    pub fn new(password: impl Into<String>) -> Self {
        Self {
            result: Ok(password.into()),
            issued: Mutex::new(0),
        }
    }

    pub fn failing(error: CredentialError) -> Self {
        Self {
            result: Err(error),
            issued: Mutex::new(0),
        }
    }

    /// How many passwords were handed out
    pub fn issued(&self) -> usize {
        *lock(&self.issued)
    }
}

impl CredentialGenerator for StaticCredential {
    fn generate(&self) -> Result<String, CredentialError> {
        let password = self.result.clone()?;
        *lock(&self.issued) += 1;
        Ok(password)
    }
}

/// A store write as recorded by [`MemoryStore`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreWrite {
    Spec(String),
    Status(String),
}

struct MemoryState<K: ResourceKind> {
    resources: HashMap<String, ManagedResource<K>>,
    writes: Vec<StoreWrite>,
    fail_status: bool,
}

/// Resource store with status-subresource semantics that records write order
pub struct MemoryStore<K: ResourceKind> {
    state: Mutex<MemoryState<K>>,
}

impl<K: ResourceKind> Default for MemoryStore<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: ResourceKind> MemoryStore<K> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryState {
                resources: HashMap::new(),
                writes: Vec::new(),
                fail_status: false,
            }),
        }
    }

    /// Seed a record without recording a write
    pub fn insert(&self, resource: ManagedResource<K>) {
        lock(&self.state)
            .resources
            .insert(resource.name().to_string(), resource);
    }

    pub fn stored(&self, name: &str) -> Option<ManagedResource<K>> {
        lock(&self.state).resources.get(name).cloned()
    }

    pub fn writes(&self) -> Vec<StoreWrite> {
        lock(&self.state).writes.clone()
    }

    pub fn clear_writes(&self) {
        lock(&self.state).writes.clear();
    }

    /// Make every status write fail
    pub fn fail_status_writes(&self, fail: bool) {
        lock(&self.state).fail_status = fail;
    }
}

#[async_trait]
impl<K: ResourceKind> ResourceStore<K> for MemoryStore<K> {
    async fn get(&self, name: &str) -> Result<ManagedResource<K>, StoreError> {
        lock(&self.state)
            .resources
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(name.to_string()))
    }

    async fn update(
        &self,
        resource: &ManagedResource<K>,
    ) -> Result<ManagedResource<K>, StoreError> {
        let mut state = lock(&self.state);
        let name = resource.name().to_string();
        let stored = state
            .resources
            .get_mut(&name)
            .ok_or_else(|| StoreError::NotFound(name.clone()))?;
        stored.metadata = resource.metadata.clone();
        stored.metadata.updated_at = Utc::now();
        stored.spec = resource.spec.clone();
        let stored = stored.clone();
        state.writes.push(StoreWrite::Spec(name));
        Ok(stored)
    }

    async fn update_status(
        &self,
        resource: &ManagedResource<K>,
    ) -> Result<ManagedResource<K>, StoreError> {
        let mut state = lock(&self.state);
        let name = resource.name().to_string();
        if state.fail_status {
            return Err(StoreError::StateError(format!(
                "status write rejected for {}",
                name
            )));
        }
        let stored = state
            .resources
            .get_mut(&name)
            .ok_or_else(|| StoreError::NotFound(name.clone()))?;
        stored.status = resource.status.clone();
        let stored = stored.clone();
        state.writes.push(StoreWrite::Status(name));
        Ok(stored)
    }
}

/// Connection detail sink that keeps everything it was given
#[derive(Default)]
pub struct MemorySink {
    published: Mutex<Vec<(String, ConnectionDetails)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every publish call in order
    pub fn published(&self) -> Vec<(String, ConnectionDetails)> {
        lock(&self.published).clone()
    }

    /// Details for `resource` merged the way a secret would accumulate them
    pub fn secret(&self, resource: &str) -> ConnectionDetails {
        let mut merged = ConnectionDetails::new();
        for (name, details) in lock(&self.published).iter() {
            if name == resource {
                merged.merge(details);
            }
        }
        merged
    }
}

#[async_trait]
impl ConnectionDetailSink for MemorySink {
    async fn publish(
        &self,
        resource: &str,
        details: &ConnectionDetails,
    ) -> Result<(), PublishError> {
        lock(&self.published).push((resource.to_string(), details.clone()));
        Ok(())
    }
}

/// Secret source backed by a map of `namespace/name` to secret data
#[derive(Default)]
pub struct MemorySecrets {
    secrets: HashMap<String, BTreeMap<String, Vec<u8>>>,
}

impl MemorySecrets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_secret(
        mut self,
        namespace: &str,
        name: &str,
        key: &str,
        value: impl Into<Vec<u8>>,
    ) -> Self {
        self.secrets
            .entry(format!("{}/{}", namespace, name))
            .or_default()
            .insert(key.to_string(), value.into());
        self
    }
}

#[async_trait]
impl SecretSource for MemorySecrets {
    async fn get_secret(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<BTreeMap<String, Vec<u8>>, ConnectError> {
        self.secrets
            .get(&format!("{}/{}", namespace, name))
            .cloned()
            .ok_or_else(|| ConnectError::SecretUnavailable {
                namespace: namespace.to_string(),
                name: name.to_string(),
                reason: "not found".to_string(),
            })
    }
}
