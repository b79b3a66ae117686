//! Long-running provider operations
//!
//! Providers accept create/update/delete asynchronously and hand back a
//! polling reference. The handle is persisted in status and refreshed
//! opportunistically on every pass; nothing here waits or polls in a loop.

use crate::error::{ReconcileError, Result};
use crate::provider::{ProviderClient, ResourceKind};
use serde::{Deserialize, Serialize};

/// Status of a long-running operation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    #[default]
    None,
    InProgress,
    Succeeded,
    Failed,
}

impl OperationStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, OperationStatus::Succeeded | OperationStatus::Failed)
    }
}

impl std::fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperationStatus::None => write!(f, "none"),
            OperationStatus::InProgress => write!(f, "in_progress"),
            OperationStatus::Succeeded => write!(f, "succeeded"),
            OperationStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Persisted handle of the last mutating call accepted by the provider
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AsyncOperation {
    /// HTTP method or verb of the call that started the operation
    pub method: String,

    /// Provider polling reference; empty when there is nothing to track
    pub polling_url: String,

    pub status: OperationStatus,

    pub error_message: Option<String>,
}

impl AsyncOperation {
    pub fn in_progress(method: impl Into<String>, polling_url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            polling_url: polling_url.into(),
            status: OperationStatus::InProgress,
            error_message: None,
        }
    }

    /// A mutating call is outstanding
    pub fn is_pending(&self) -> bool {
        self.status == OperationStatus::InProgress
    }

    /// Whether a refresh would consult the provider
    pub fn needs_poll(&self) -> bool {
        !self.polling_url.is_empty() && !self.status.is_terminal()
    }

    /// Apply progress reported by the provider
    pub fn with_progress(mut self, progress: OperationProgress) -> Self {
        self.status = progress.status;
        self.error_message = progress.error_message;
        self
    }
}

/// Progress report returned by the provider's operation endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationProgress {
    pub status: OperationStatus,
    pub error_message: Option<String>,
}

impl OperationProgress {
    pub fn in_progress() -> Self {
        Self {
            status: OperationStatus::InProgress,
            error_message: None,
        }
    }

    pub fn succeeded() -> Self {
        Self {
            status: OperationStatus::Succeeded,
            error_message: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: OperationStatus::Failed,
            error_message: Some(message.into()),
        }
    }
}

/// Refresh an operation handle from the provider
///
/// Handles without a polling reference or already terminal are returned
/// unchanged without a provider call.
pub async fn refresh<K, C>(client: &C, operation: &AsyncOperation) -> Result<AsyncOperation>
where
    K: ResourceKind,
    C: ProviderClient<K> + ?Sized,
{
    if !operation.needs_poll() {
        return Ok(operation.clone());
    }

    let progress = client
        .fetch_operation(operation)
        .await
        .map_err(ReconcileError::FetchOperation)?;

    if progress.status != operation.status {
        tracing::debug!(
            "{} operation {} -> {}",
            operation.method,
            operation.status,
            progress.status
        );
    }

    Ok(operation.clone().with_progress(progress))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use crate::testing::{FakeProvider, Widget};

    #[tokio::test]
    async fn test_refresh_without_handle_is_noop() {
        let provider = FakeProvider::<Widget>::new();
        let op = AsyncOperation::default();

        let refreshed = refresh::<Widget, _>(&provider, &op).await.unwrap();

        assert_eq!(refreshed, op);
        assert!(provider.calls().is_empty());
    }

    #[tokio::test]
    async fn test_refresh_terminal_handle_is_noop() {
        let provider = FakeProvider::<Widget>::new();
        let op = AsyncOperation::in_progress("PUT", "https://poll/1")
            .with_progress(OperationProgress::succeeded());

        let refreshed = refresh::<Widget, _>(&provider, &op).await.unwrap();

        assert_eq!(refreshed.status, OperationStatus::Succeeded);
        assert!(provider.calls().is_empty());
    }

    #[tokio::test]
    async fn test_refresh_records_failure_detail() {
        let provider = FakeProvider::<Widget>::new();
        provider.set_operation_progress(OperationProgress::failed("storage quota exceeded"));
        let op = AsyncOperation::in_progress("PUT", "https://poll/1");

        let refreshed = refresh::<Widget, _>(&provider, &op).await.unwrap();

        assert_eq!(refreshed.status, OperationStatus::Failed);
        assert_eq!(
            refreshed.error_message.as_deref(),
            Some("storage quota exceeded")
        );
        assert_eq!(refreshed.polling_url, "https://poll/1");
    }

    #[tokio::test]
    async fn test_refresh_fetch_failure() {
        let provider = FakeProvider::<Widget>::new();
        provider.fail_fetch_operation(ProviderError::ApiError("throttled".to_string()));
        let op = AsyncOperation::in_progress("DELETE", "https://poll/2");

        let err = refresh::<Widget, _>(&provider, &op).await.unwrap_err();

        assert!(matches!(err, ReconcileError::FetchOperation(_)));
    }
}
