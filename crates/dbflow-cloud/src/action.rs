//! Outcomes of reconciliation operations

use crate::error::ReconcileError;
use crate::resource::ConnectionDetails;
use serde::{Deserialize, Serialize};

/// What a reconciliation pass did after observing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Create was issued
    Create,
    /// Update was issued
    Update,
    /// Delete was issued or was already in flight
    Delete,
    /// A change is needed but an earlier operation is still in progress
    Wait,
    /// Observed state matches desired state
    NoOp,
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::Create => write!(f, "create"),
            Action::Update => write!(f, "update"),
            Action::Delete => write!(f, "delete"),
            Action::Wait => write!(f, "wait"),
            Action::NoOp => write!(f, "no-op"),
        }
    }
}

/// Result of observing the provider
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExternalObservation {
    /// The resource exists or its creation has been accepted
    pub resource_exists: bool,

    /// Observed state matches desired state
    pub resource_up_to_date: bool,

    /// Endpoint and username; never the password
    pub connection_details: ConnectionDetails,
}

impl ExternalObservation {
    pub fn absent() -> Self {
        Self::default()
    }

    /// Creation accepted but not yet visible at the provider
    pub fn pending_creation() -> Self {
        Self {
            resource_exists: true,
            resource_up_to_date: true,
            connection_details: ConnectionDetails::new(),
        }
    }

    pub fn existing(up_to_date: bool, connection_details: ConnectionDetails) -> Self {
        Self {
            resource_exists: true,
            resource_up_to_date: up_to_date,
            connection_details,
        }
    }
}

/// Result of a create call accepted by the provider
#[derive(Debug)]
pub struct ExternalCreation {
    /// Contains the administrator password. This is the only place it is
    /// ever emitted.
    pub connection_details: ConnectionDetails,

    /// Set when the create was accepted but the operation handle could not be
    /// refreshed. The credentials above are still valid and must be published.
    pub tracking_error: Option<ReconcileError>,
}

/// Result of an update attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExternalUpdate {
    Issued,
    /// Skipped because the last operation is still in progress
    Deferred,
}

/// Result of a delete attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExternalDeletion {
    Issued,
    /// The provider was already dropping the resource
    AlreadyDropping,
    /// The provider no longer knows the resource
    AlreadyGone,
}

/// Result of one reconciliation pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileOutcome {
    /// Resource name
    pub name: String,

    pub action: Action,

    /// Total execution time in milliseconds
    pub duration_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_creation_blocks_create() {
        let obs = ExternalObservation::pending_creation();
        assert!(obs.resource_exists);
        assert!(obs.connection_details.is_empty());

        assert!(!ExternalObservation::absent().resource_exists);
    }

    #[test]
    fn test_action_display() {
        assert_eq!(Action::NoOp.to_string(), "no-op");
        assert_eq!(Action::Wait.to_string(), "wait");
    }
}
