//! Reconciliation error types

use thiserror::Error;

/// Errors reported by a provider client
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// The provider has no such resource. Treated as a normal outcome by
    /// observe and delete.
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("API error: {0}")]
    ApiError(String),
}

impl ProviderError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ProviderError::NotFound(_))
    }
}

/// Resource store errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Managed resource not found: {0}")]
    NotFound(String),

    #[error("Managed resource already exists: {0}")]
    AlreadyExists(String),

    #[error("State file error: {0}")]
    StateError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Credential generation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CredentialError {
    #[error("Invalid credential policy: {0}")]
    InvalidPolicy(String),

    #[error("Credential source failed: {0}")]
    SourceFailed(String),
}

/// Connection detail publishing errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Secret publishing failed: {0}")]
pub struct PublishError(pub String);

/// Errors raised while resolving provider credentials into a client
#[derive(Error, Debug)]
pub enum ConnectError {
    #[error("cannot get provider: {0}")]
    ProviderNotFound(String),

    #[error("provider {0} does not have a secret reference")]
    SecretRefMissing(String),

    #[error("cannot get provider secret {namespace}/{name}: {reason}")]
    SecretUnavailable {
        namespace: String,
        name: String,
        reason: String,
    },

    #[error("cannot create new client: {0}")]
    NewClient(#[source] ProviderError),
}

/// The step of a reconciliation pass that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Get,
    NameCheck,
    Create,
    Update,
    Delete,
    OperationFetch,
    StoreWrite,
    GenerateCredential,
    Publish,
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Step::Get => write!(f, "get"),
            Step::NameCheck => write!(f, "name-check"),
            Step::Create => write!(f, "create"),
            Step::Update => write!(f, "update"),
            Step::Delete => write!(f, "delete"),
            Step::OperationFetch => write!(f, "operation-fetch"),
            Step::StoreWrite => write!(f, "store-write"),
            Step::GenerateCredential => write!(f, "generate-credential"),
            Step::Publish => write!(f, "publish"),
        }
    }
}

/// Failure of a reconciliation operation, tagged with the step that failed
#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error("cannot get {kind}: {source}")]
    Get {
        kind: &'static str,
        #[source]
        source: ProviderError,
    },

    #[error("cannot check {kind} name availability: {source}")]
    NameCheck {
        kind: &'static str,
        #[source]
        source: ProviderError,
    },

    #[error("cannot create {kind}: {source}")]
    Create {
        kind: &'static str,
        #[source]
        source: ProviderError,
    },

    #[error("cannot update {kind}: {source}")]
    Update {
        kind: &'static str,
        #[source]
        source: ProviderError,
    },

    #[error("cannot delete {kind}: {source}")]
    Delete {
        kind: &'static str,
        #[source]
        source: ProviderError,
    },

    #[error("cannot fetch last operation: {0}")]
    FetchOperation(#[source] ProviderError),

    #[error("cannot generate admin password: {0}")]
    GenerateCredential(#[source] CredentialError),

    #[error("cannot update managed resource {name}: {source}")]
    Store {
        name: String,
        #[source]
        source: StoreError,
    },

    #[error("cannot publish connection details: {0}")]
    Publish(#[source] PublishError),
}

impl ReconcileError {
    /// The step that produced this failure
    pub fn step(&self) -> Step {
        match self {
            ReconcileError::Get { .. } => Step::Get,
            ReconcileError::NameCheck { .. } => Step::NameCheck,
            ReconcileError::Create { .. } => Step::Create,
            ReconcileError::Update { .. } => Step::Update,
            ReconcileError::Delete { .. } => Step::Delete,
            ReconcileError::FetchOperation(_) => Step::OperationFetch,
            ReconcileError::GenerateCredential(_) => Step::GenerateCredential,
            ReconcileError::Store { .. } => Step::StoreWrite,
            ReconcileError::Publish(_) => Step::Publish,
        }
    }
}

pub type Result<T> = std::result::Result<T, ReconcileError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_names_failed_step() {
        let err = ReconcileError::Create {
            kind: "MySQLServer",
            source: ProviderError::ApiError("quota exceeded".to_string()),
        };
        assert_eq!(err.step(), Step::Create);
        assert_eq!(
            err.to_string(),
            "cannot create MySQLServer: API error: quota exceeded"
        );

        let err = ReconcileError::GenerateCredential(CredentialError::InvalidPolicy(
            "length must be positive".to_string(),
        ));
        assert_eq!(err.step(), Step::GenerateCredential);
        assert!(err.to_string().starts_with("cannot generate admin password"));
    }

    #[test]
    fn test_not_found_sentinel() {
        assert!(ProviderError::NotFound("db".to_string()).is_not_found());
        assert!(!ProviderError::ApiError("boom".to_string()).is_not_found());
    }
}
