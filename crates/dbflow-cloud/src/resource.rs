//! Managed resource records
//!
//! A managed resource pairs the user's desired parameters with the status the
//! controller observed at the provider. The engine reads spec and writes
//! status; the record itself is owned by whoever schedules reconciliation.

use crate::condition::{Condition, ConditionRecord};
use crate::operation::AsyncOperation;
use crate::provider::ResourceKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Connection detail key for the server address
pub const ENDPOINT_KEY: &str = "endpoint";

/// Connection detail key for the login name
pub const USERNAME_KEY: &str = "username";

/// Connection detail key for the administrator password
pub const PASSWORD_KEY: &str = "password";

/// Metadata of a managed resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceMeta {
    /// Record name, unique per store
    pub name: String,

    /// Name of the resource at the provider when it differs from `name`
    #[serde(default)]
    pub external_name: Option<String>,

    /// Name of the provider configuration holding credentials
    pub provider_ref: String,

    /// Set once deletion of the provider-side resource has been requested
    #[serde(default)]
    pub deletion_requested_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

/// Desired state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct ResourceSpec<K: ResourceKind> {
    pub for_provider: K::Parameters,
}

/// Observed state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(bound = "", default)]
pub struct ResourceStatus<K: ResourceKind> {
    pub at_provider: K::Observation,

    pub last_operation: AsyncOperation,

    pub condition: Option<ConditionRecord>,

    /// The resource may be bound by consumers of its credentials
    pub bindable: bool,

    /// Failure message of the most recent pass, cleared on success
    pub sync_error: Option<String>,
}

impl<K: ResourceKind> ResourceStatus<K> {
    pub fn condition(&self) -> Option<Condition> {
        self.condition.as_ref().map(|c| c.condition)
    }

    /// Overwrite the current condition
    pub fn set_condition(&mut self, condition: Condition) {
        self.condition = Some(ConditionRecord::transition(
            self.condition.as_ref(),
            condition,
        ));
    }

    pub fn state(&self) -> K::State {
        K::state(&self.at_provider)
    }
}

/// A managed resource of kind `K`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct ManagedResource<K: ResourceKind> {
    pub metadata: ResourceMeta,
    pub spec: ResourceSpec<K>,
    #[serde(default)]
    pub status: ResourceStatus<K>,
}

impl<K: ResourceKind> ManagedResource<K> {
    pub fn new(
        name: impl Into<String>,
        provider_ref: impl Into<String>,
        for_provider: K::Parameters,
    ) -> Self {
        let now = Utc::now();
        Self {
            metadata: ResourceMeta {
                name: name.into(),
                external_name: None,
                provider_ref: provider_ref.into(),
                deletion_requested_at: None,
                created_at: now,
                updated_at: now,
            },
            spec: ResourceSpec { for_provider },
            status: ResourceStatus::default(),
        }
    }

    pub fn with_external_name(mut self, external_name: impl Into<String>) -> Self {
        self.metadata.external_name = Some(external_name.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// Name of the resource at the provider
    pub fn external_name(&self) -> &str {
        self.metadata
            .external_name
            .as_deref()
            .unwrap_or(&self.metadata.name)
    }

    pub fn parameters(&self) -> &K::Parameters {
        &self.spec.for_provider
    }

    pub fn request_deletion(&mut self) {
        if self.metadata.deletion_requested_at.is_none() {
            self.metadata.deletion_requested_at = Some(Utc::now());
        }
    }

    pub fn deletion_requested(&self) -> bool {
        self.metadata.deletion_requested_at.is_some()
    }
}

/// Credentials needed to connect to a provisioned resource
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionDetails(BTreeMap<String, Vec<u8>>);

impl ConnectionDetails {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Vec<u8>>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&[u8]> {
        self.0.get(key).map(Vec::as_slice)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Merge `other` into `self`, newer values winning
    pub fn merge(&mut self, other: &ConnectionDetails) {
        for (k, v) in &other.0 {
            self.0.insert(k.clone(), v.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Widget, WidgetParameters};

    #[test]
    fn test_external_name_defaults_to_name() {
        let resource =
            ManagedResource::<Widget>::new("orders-db", "azure", WidgetParameters::default());
        assert_eq!(resource.external_name(), "orders-db");

        let resource = resource.with_external_name("orders-db-7f3a");
        assert_eq!(resource.external_name(), "orders-db-7f3a");
        assert_eq!(resource.name(), "orders-db");
    }

    #[test]
    fn test_request_deletion_is_sticky() {
        let mut resource =
            ManagedResource::<Widget>::new("orders-db", "azure", WidgetParameters::default());
        assert!(!resource.deletion_requested());

        resource.request_deletion();
        let first = resource.metadata.deletion_requested_at;
        resource.request_deletion();

        assert!(resource.deletion_requested());
        assert_eq!(resource.metadata.deletion_requested_at, first);
    }

    #[test]
    fn test_status_survives_json() {
        let mut resource =
            ManagedResource::<Widget>::new("orders-db", "azure", WidgetParameters::default());
        resource.status.set_condition(Condition::Creating);
        resource.status.last_operation = AsyncOperation::in_progress("PUT", "https://poll/1");

        let json = serde_json::to_string(&resource).unwrap();
        let loaded: ManagedResource<Widget> = serde_json::from_str(&json).unwrap();

        assert_eq!(loaded, resource);
    }

    #[test]
    fn test_connection_details_merge() {
        let mut details = ConnectionDetails::new().with(ENDPOINT_KEY, "db.example.net");
        details.merge(&ConnectionDetails::new().with(PASSWORD_KEY, "s3cret"));

        assert_eq!(details.len(), 2);
        assert_eq!(details.get(ENDPOINT_KEY), Some(&b"db.example.net"[..]));
        assert!(details.contains_key(PASSWORD_KEY));
    }
}
