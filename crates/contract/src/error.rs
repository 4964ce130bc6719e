//! Error types for `ballast-contract`.

use thiserror::Error;

/// Errors raised while loading or validating a contract.
#[derive(Debug, Error)]
pub enum ContractError {
    /// The document deserialized but violates a load-time invariant.
    #[error("invalid contract '{contract}': {reason}")]
    Invalid { contract: String, reason: String },

    /// JSON parsing errors.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing errors.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Result type alias for contract loading and validation.
pub type Result<T> = std::result::Result<T, ContractError>;
