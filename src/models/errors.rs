//! Centralized Error Handling Module
//!
//! Every failure in the retrieval path flows through [`SnapshotError`].
//! Each variant carries a stable code for logs and API responses:
//! - TIMEOUT: an attempt exceeded its budget
//! - PROVIDER_FAILURE: network / HTTP / body decoding error from one upstream
//! - MAPPING_ERROR: upstream answered but the body cannot become a valid snapshot
//! - NO_DATA_AVAILABLE: every candidate failed and nothing is cached to derive from
//!
//! Only `NoDataAvailable` ever reaches the caller of the cache or mux,
//! plus `Internal` when a fetch task dies.
//! The others are recovered by the mux and kept as provenance attempts.

use thiserror::Error;

/// Error type for snapshot retrieval.
///
/// `Clone` so that one in-flight fetch result can be handed to every waiter.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SnapshotError {
    /// An attempt exceeded its time budget. The wrapped operation may still
    /// be running; only its result is discarded.
    #[error("Timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// Network error, non-2xx status or undecodable body from one upstream.
    #[error("Provider failure: {provider} - {message}")]
    ProviderFailure { provider: String, message: String },

    /// The upstream body was received but a required field is absent or invalid.
    #[error("Mapping error: {provider} - {message}")]
    MappingError { provider: String, message: String },

    /// Every candidate failed and there is no stored snapshot to fall back on.
    #[error("No data available for {address}")]
    NoDataAvailable { address: String },

    /// Configuration rejected at startup.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Background task panicked or was cancelled.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SnapshotError {
    /// Provider failure shorthand
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ProviderFailure {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Mapping error shorthand
    pub fn mapping(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MappingError {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Stable error code for logging/monitoring
    pub fn code(&self) -> &'static str {
        match self {
            Self::Timeout { .. } => "TIMEOUT",
            Self::ProviderFailure { .. } => "PROVIDER_FAILURE",
            Self::MappingError { .. } => "MAPPING_ERROR",
            Self::NoDataAvailable { .. } => "NO_DATA_AVAILABLE",
            Self::InvalidConfig(_) => "CFG_INVALID_VALUE",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// HTTP status code for API responses
    pub fn http_status(&self) -> u16 {
        match self {
            Self::NoDataAvailable { .. } => 404,
            Self::Timeout { .. } => 504,
            Self::ProviderFailure { .. } | Self::MappingError { .. } => 502,
            Self::InvalidConfig(_) | Self::Internal(_) => 500,
        }
    }

    /// Transient upstream errors worth another attempt.
    ///
    /// Mapping errors are deterministic for a given body, so they are not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::ProviderFailure { .. })
    }

    /// Adapter/schema bugs, logged louder than transient unavailability
    pub fn is_mapping(&self) -> bool {
        matches!(self, Self::MappingError { .. })
    }
}

/// Result alias used across the crate
pub type SnapshotResult<T> = Result<T, SnapshotError>;
