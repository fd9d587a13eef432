//! Mock auth and connector. Pair with `MockConversationSource` for demo mode and tests.

use super::mock_source::MockConversationSource;
use crate::domain::{AccountInfo, Credentials, DomainError, SignInResult};
use crate::ports::{AuthPort, Connection, Connector};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::Mutex;
use tracing::info;

/// Accepts `code`; asks for `password` afterwards when one is set.
pub struct MockAuth {
    authorized: AtomicBool,
    code: String,
    password: Option<String>,
    phone: Mutex<Option<String>>,
    awaiting_password: AtomicBool,
}

impl MockAuth {
    pub fn new(code: &str, password: Option<&str>) -> Self {
        Self {
            authorized: AtomicBool::new(false),
            code: code.to_string(),
            password: password.map(String::from),
            phone: Mutex::new(None),
            awaiting_password: AtomicBool::new(false),
        }
    }

    /// Already logged in (session file present).
    pub fn authorized() -> Self {
        let auth = Self::new("", None);
        auth.authorized.store(true, Ordering::SeqCst);
        auth
    }
}

#[async_trait::async_trait]
impl AuthPort for MockAuth {
    async fn is_authenticated(&self) -> Result<bool, DomainError> {
        Ok(self.authorized.load(Ordering::SeqCst))
    }

    async fn request_login_code(&self, phone: &str) -> Result<(), DomainError> {
        info!(phone, "[MOCK] login code requested");
        *self.phone.lock().await = Some(phone.to_string());
        Ok(())
    }

    async fn sign_in(&self, code: &str) -> Result<SignInResult, DomainError> {
        if self.phone.lock().await.is_none() {
            return Err(DomainError::Verification(
                "request_login_code must be called before sign_in".into(),
            ));
        }
        if code != self.code {
            return Err(DomainError::Verification("Invalid login code".into()));
        }
        if self.password.is_some() {
            self.awaiting_password.store(true, Ordering::SeqCst);
            return Ok(SignInResult::PasswordRequired {
                hint: Some("mock hint".into()),
            });
        }
        self.authorized.store(true, Ordering::SeqCst);
        Ok(SignInResult::Success)
    }

    async fn check_password(&self, password: &[u8]) -> Result<(), DomainError> {
        if !self.awaiting_password.swap(false, Ordering::SeqCst) {
            return Err(DomainError::Verification(
                "sign_in must return PasswordRequired before check_password".into(),
            ));
        }
        match &self.password {
            Some(p) if p.as_bytes() == password => {
                self.authorized.store(true, Ordering::SeqCst);
                Ok(())
            }
            _ => {
                self.awaiting_password.store(true, Ordering::SeqCst);
                Err(DomainError::Verification("Invalid password".into()))
            }
        }
    }

    async fn sign_out(&self) -> Result<(), DomainError> {
        self.authorized.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn me(&self) -> Result<AccountInfo, DomainError> {
        Ok(AccountInfo {
            id: 1,
            username: Some("mock".into()),
            phone: self.phone.lock().await.clone(),
            first_name: "Mock".into(),
        })
    }
}

/// Hands out the same mock auth and source on every `open`.
pub struct MockConnector {
    auth: Arc<MockAuth>,
    source: Arc<MockConversationSource>,
    opened: AtomicUsize,
    closed: AtomicUsize,
    forgotten: std::sync::Mutex<Vec<String>>,
}

impl MockConnector {
    pub fn new(auth: Arc<MockAuth>, source: Arc<MockConversationSource>) -> Self {
        Self {
            auth,
            source,
            opened: AtomicUsize::new(0),
            closed: AtomicUsize::new(0),
            forgotten: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn demo() -> Self {
        Self::new(
            Arc::new(MockAuth::authorized()),
            Arc::new(MockConversationSource::demo()),
        )
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    /// Phones whose session was removed; `*` for "all".
    pub fn forgotten(&self) -> Vec<String> {
        self.forgotten
            .lock()
            .map(|v| v.clone())
            .unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl Connector for MockConnector {
    async fn open(
        &self,
        credentials: &Credentials,
        phone: &str,
    ) -> Result<Connection, DomainError> {
        info!(api_id = credentials.api_id, phone, "[MOCK] opening client");
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Connection {
            auth: Arc::clone(&self.auth) as Arc<dyn AuthPort>,
            source: Arc::clone(&self.source) as Arc<dyn crate::ports::ConversationSource>,
        })
    }

    async fn close(&self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }

    async fn forget_session(&self, phone: &str) -> Result<(), DomainError> {
        if let Ok(mut v) = self.forgotten.lock() {
            v.push(phone.to_string());
        }
        Ok(())
    }

    async fn forget_all_sessions(&self) -> Result<(), DomainError> {
        if let Ok(mut v) = self.forgotten.lock() {
            v.push("*".to_string());
        }
        Ok(())
    }
}
