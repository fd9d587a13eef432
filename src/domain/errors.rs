//! Domain errors. Used by ports and use cases.
//!
//! Adapters map infrastructure errors into these.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Not connected to Telegram")]
    NotConnected,

    #[error("App not configured: {0}")]
    ConfigurationMissing(String),

    /// Login is in progress: a code or 2FA password must be submitted first.
    #[error("Verification required: submit the login code or 2FA password")]
    VerificationRequired,

    #[error("Verification failed: {0}")]
    Verification(String),

    /// FloodWait: caller may retry after `retry_after_secs` seconds.
    #[error("Rate limited: retry after {retry_after_secs} seconds")]
    RateLimited { retry_after_secs: u64 },

    #[error("Telegram error: {0}")]
    Upstream(String),

    #[error("Chat {0} not found")]
    NotFound(i64),

    #[error("Chat {0} already has a pending delete")]
    AlreadyPending(i64),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Export failed: {0}")]
    Export(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}
