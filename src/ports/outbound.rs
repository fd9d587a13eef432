//! Outbound ports. Application calls into infrastructure.
//!
//! Implemented by adapters.

use crate::domain::{AccountInfo, ConversationEntity, Credentials, DomainError, Message, SignInResult};
use std::sync::Arc;

/// Telegram dialogs as seen by the logged-in account.
#[async_trait::async_trait]
pub trait ConversationSource: Send + Sync {
    /// Fetch all dialogs. Entities are built fresh on every call.
    async fn list_dialogs(&self) -> Result<Vec<ConversationEntity>, DomainError>;

    /// Fetch up to `limit` most recent messages of a dialog, newest first.
    async fn get_recent_messages(
        &self,
        entity_id: i64,
        limit: usize,
    ) -> Result<Vec<Message>, DomainError>;

    /// Delete (leave) the dialog.
    ///
    /// # Errors
    /// `RateLimited` on flood wait, `NotFound` when the dialog is already gone.
    async fn delete_dialog(&self, entity_id: i64) -> Result<(), DomainError>;
}

/// Login / 2FA. Holds the intermediate tokens between steps.
#[async_trait::async_trait]
pub trait AuthPort: Send + Sync {
    async fn is_authenticated(&self) -> Result<bool, DomainError>;

    async fn request_login_code(&self, phone: &str) -> Result<(), DomainError>;

    async fn sign_in(&self, code: &str) -> Result<SignInResult, DomainError>;

    async fn check_password(&self, password: &[u8]) -> Result<(), DomainError>;

    /// Terminate the session on the server.
    async fn sign_out(&self) -> Result<(), DomainError>;

    async fn me(&self) -> Result<AccountInfo, DomainError>;
}

/// A live client: auth and dialogs share the same underlying session.
pub struct Connection {
    pub auth: Arc<dyn AuthPort>,
    pub source: Arc<dyn ConversationSource>,
}

/// Opens and closes client connections. One per phone number.
#[async_trait::async_trait]
pub trait Connector: Send + Sync {
    async fn open(&self, credentials: &Credentials, phone: &str)
    -> Result<Connection, DomainError>;

    /// Drop the network connection of the last opened client.
    async fn close(&self);

    /// Remove the stored session of `phone`.
    async fn forget_session(&self, phone: &str) -> Result<(), DomainError>;

    /// Remove every stored session.
    async fn forget_all_sessions(&self) -> Result<(), DomainError>;
}

/// Credential file (api_id, api_hash, phone).
#[async_trait::async_trait]
pub trait CredentialStore: Send + Sync {
    async fn load(&self) -> Result<Option<Credentials>, DomainError>;

    async fn save(&self, credentials: &Credentials) -> Result<(), DomainError>;

    async fn clear(&self) -> Result<(), DomainError>;
}
