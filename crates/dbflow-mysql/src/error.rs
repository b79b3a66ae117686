//! MySQL server kind error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MySqlError {
    #[error("Invalid SKU name: {0}")]
    InvalidSku(String),

    #[error("Invalid SKU tier: {0}")]
    InvalidTier(String),

    #[error("Invalid SKU capacity: {0}")]
    InvalidCapacity(String),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, MySqlError>;
