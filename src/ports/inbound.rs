//! Inbound port. UI (adapter) calls into the application.

use crate::domain::DomainError;

/// Input port: a front-end (interactive menu or HTTP server) driving the use cases.
#[async_trait::async_trait]
pub trait InputPort: Send + Sync {
    /// Run until the user exits or the server shuts down.
    async fn run(&self) -> Result<(), DomainError>;
}
