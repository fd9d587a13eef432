//! Telegram session lifecycle: credentials, connect, code / 2FA, logout.
//!
//! One `SessionManager` per process. It owns the live connection and hands
//! out the (serialized) conversation source only while the session is Ready.

use crate::domain::{AccountInfo, Credentials, DomainError, SignInResult};
use crate::ports::{AuthPort, Connector, ConversationSource, CredentialStore};
use crate::usecases::serialized_source::SerializedSource;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Uninitialized,
    /// Code sent; waiting for the code or the 2FA password.
    Authenticating,
    Ready,
    /// Terminal. Set on shutdown.
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectStatus {
    Connected,
    CodeRequired,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum VerifyStatus {
    Connected,
    PasswordRequired { hint: Option<String> },
}

/// Where the bulk-delete coordinator gets its source at commit time.
#[async_trait::async_trait]
pub trait SourceProvider: Send + Sync {
    async fn source(&self) -> Result<Arc<dyn ConversationSource>, DomainError>;
}

/// Always returns the same source.
pub struct FixedSource(Arc<dyn ConversationSource>);

impl FixedSource {
    pub fn new(source: Arc<dyn ConversationSource>) -> Self {
        Self(source)
    }
}

#[async_trait::async_trait]
impl SourceProvider for FixedSource {
    async fn source(&self) -> Result<Arc<dyn ConversationSource>, DomainError> {
        Ok(Arc::clone(&self.0))
    }
}

struct Session {
    state: SessionState,
    phone: Option<String>,
    auth: Option<Arc<dyn AuthPort>>,
    source: Option<Arc<dyn ConversationSource>>,
    awaiting_password: bool,
}

impl Session {
    fn empty(state: SessionState) -> Self {
        Self {
            state,
            phone: None,
            auth: None,
            source: None,
            awaiting_password: false,
        }
    }
}

pub struct SessionManager {
    connector: Arc<dyn Connector>,
    store: Arc<dyn CredentialStore>,
    /// Used when the credential file is missing (env / config file).
    fallback: Option<Credentials>,
    session: Mutex<Session>,
}

impl SessionManager {
    pub fn new(connector: Arc<dyn Connector>, store: Arc<dyn CredentialStore>) -> Self {
        Self {
            connector,
            store,
            fallback: None,
            session: Mutex::new(Session::empty(SessionState::Uninitialized)),
        }
    }

    pub fn with_fallback(mut self, credentials: Option<Credentials>) -> Self {
        self.fallback = credentials;
        self
    }

    pub async fn state(&self) -> SessionState {
        self.session.lock().await.state
    }

    pub async fn is_ready(&self) -> bool {
        self.state().await == SessionState::Ready
    }

    /// Phone of the current session, or the saved one.
    pub async fn phone(&self) -> Option<String> {
        if let Some(p) = self.session.lock().await.phone.clone() {
            return Some(p);
        }
        self.stored_credentials().await.ok().flatten().and_then(|c| c.phone)
    }

    /// Saved credentials, falling back to the configured ones.
    pub async fn stored_credentials(&self) -> Result<Option<Credentials>, DomainError> {
        Ok(self.store.load().await?.or_else(|| self.fallback.clone()))
    }

    /// Save API credentials, keeping the saved phone.
    pub async fn save_credentials(&self, api_id: i32, api_hash: &str) -> Result<(), DomainError> {
        if api_id <= 0 || api_hash.trim().is_empty() {
            return Err(DomainError::InvalidRequest(
                "api_id and api_hash are required".into(),
            ));
        }
        let phone = self.store.load().await?.and_then(|c| c.phone);
        self.store
            .save(&Credentials {
                api_id,
                api_hash: api_hash.trim().to_string(),
                phone,
            })
            .await?;
        info!(api_id, "API credentials saved");
        Ok(())
    }

    /// Open a client for `phone` (or the saved phone). Sends a login code when
    /// the stored session is not authorized.
    ///
    /// # Errors
    /// `ConfigurationMissing` without API credentials, `InvalidRequest` without a phone.
    pub async fn connect(&self, phone: Option<&str>) -> Result<ConnectStatus, DomainError> {
        let credentials = self
            .stored_credentials()
            .await?
            .ok_or_else(|| DomainError::ConfigurationMissing("save API credentials first".into()))?;
        let phone = phone
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(String::from)
            .or_else(|| credentials.phone.clone())
            .ok_or_else(|| DomainError::InvalidRequest("phone number is required".into()))?;

        let mut session = self.session.lock().await;
        if session.state == SessionState::Closed {
            return Err(DomainError::NotConnected);
        }
        if session.state == SessionState::Ready && session.phone.as_deref() == Some(phone.as_str()) {
            return Ok(ConnectStatus::Connected);
        }
        if session.auth.is_some() {
            self.connector.close().await;
        }
        *session = Session::empty(SessionState::Uninitialized);

        let connection = self.connector.open(&credentials, &phone).await?;
        if connection.auth.is_authenticated().await? {
            info!(phone = %phone, "already authorized, connected");
            session.state = SessionState::Ready;
            session.phone = Some(phone.clone());
            session.auth = Some(connection.auth);
            session.source = Some(Arc::new(SerializedSource::new(connection.source)));
            drop(session);
            self.remember_phone(&credentials, Some(phone)).await;
            return Ok(ConnectStatus::Connected);
        }

        connection.auth.request_login_code(&phone).await?;
        info!(phone = %phone, "login code sent");
        session.state = SessionState::Authenticating;
        session.phone = Some(phone);
        session.auth = Some(connection.auth);
        session.source = Some(connection.source);
        Ok(ConnectStatus::CodeRequired)
    }

    /// Submit the login code and/or 2FA password. Both may be given at once.
    pub async fn verify(
        &self,
        code: Option<&str>,
        password: Option<&str>,
    ) -> Result<VerifyStatus, DomainError> {
        let mut session = self.session.lock().await;
        match session.state {
            SessionState::Ready => return Ok(VerifyStatus::Connected),
            SessionState::Authenticating => {}
            _ => return Err(DomainError::NotConnected),
        }
        let auth = session.auth.clone().ok_or(DomainError::NotConnected)?;

        if !session.awaiting_password {
            let code = code
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .ok_or(DomainError::VerificationRequired)?;
            match auth.sign_in(code).await? {
                SignInResult::Success => {}
                SignInResult::PasswordRequired { hint } => {
                    info!("2FA password required");
                    session.awaiting_password = true;
                    if password.is_none() {
                        return Ok(VerifyStatus::PasswordRequired { hint });
                    }
                }
            }
        }
        if session.awaiting_password {
            let password = password.ok_or(DomainError::VerificationRequired)?;
            auth.check_password(password.as_bytes()).await?;
            session.awaiting_password = false;
        }

        session.state = SessionState::Ready;
        if let Some(source) = session.source.take() {
            session.source = Some(Arc::new(SerializedSource::new(source)));
        }
        let phone = session.phone.clone();
        drop(session);
        info!(phone = phone.as_deref().unwrap_or(""), "signed in");
        if let Ok(Some(credentials)) = self.stored_credentials().await {
            self.remember_phone(&credentials, phone).await;
        }
        Ok(VerifyStatus::Connected)
    }

    /// Connect with the saved phone if its session is still authorized. Never sends a code.
    pub async fn auto_connect(&self) -> bool {
        let Ok(Some(credentials)) = self.stored_credentials().await else {
            return false;
        };
        let Some(phone) = credentials.phone.clone() else {
            return false;
        };
        info!(phone = %phone, "attempting auto-connect");
        let connection = match self.connector.open(&credentials, &phone).await {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "auto-connect failed");
                return false;
            }
        };
        match connection.auth.is_authenticated().await {
            Ok(true) => {
                let mut session = self.session.lock().await;
                session.state = SessionState::Ready;
                session.phone = Some(phone.clone());
                session.auth = Some(connection.auth);
                session.source = Some(Arc::new(SerializedSource::new(connection.source)));
                info!(phone = %phone, "auto-connected");
                true
            }
            Ok(false) => {
                warn!("auto-connect: saved session is not authorized");
                self.connector.close().await;
                false
            }
            Err(e) => {
                warn!(error = %e, "auto-connect failed");
                self.connector.close().await;
                false
            }
        }
    }

    pub async fn me(&self) -> Result<AccountInfo, DomainError> {
        let auth = {
            let session = self.session.lock().await;
            if session.state != SessionState::Ready {
                return Err(DomainError::NotConnected);
            }
            session.auth.clone().ok_or(DomainError::NotConnected)?
        };
        auth.me().await
    }

    /// Sign out, drop the session file and forget the saved phone (API keys stay).
    pub async fn logout(&self) -> Result<(), DomainError> {
        let (auth, phone) = self.take_session(SessionState::Uninitialized).await;
        if let Some(auth) = auth {
            if let Err(e) = auth.sign_out().await {
                warn!(error = %e, "sign out failed");
            }
            self.connector.close().await;
        }
        if let Some(phone) = phone {
            self.connector.forget_session(&phone).await?;
        }
        if let Some(credentials) = self.store.load().await? {
            self.remember_phone(&credentials, None).await;
        }
        info!("logged out");
        Ok(())
    }

    /// Logout plus removal of the credential file and every session file.
    pub async fn reset(&self) -> Result<(), DomainError> {
        let (auth, _) = self.take_session(SessionState::Uninitialized).await;
        if let Some(auth) = auth {
            match auth.is_authenticated().await {
                Ok(true) => {
                    if let Err(e) = auth.sign_out().await {
                        warn!(error = %e, "could not terminate session on server");
                    }
                }
                Ok(false) => {}
                Err(e) => warn!(error = %e, "could not terminate session on server"),
            }
            self.connector.close().await;
        }
        self.store.clear().await?;
        self.connector.forget_all_sessions().await?;
        info!("app reset");
        Ok(())
    }

    /// Drop the connection without signing out. The session file stays usable.
    pub async fn close(&self) {
        let (auth, _) = self.take_session(SessionState::Closed).await;
        if auth.is_some() {
            self.connector.close().await;
        }
    }

    async fn take_session(&self, next: SessionState) -> (Option<Arc<dyn AuthPort>>, Option<String>) {
        let mut session = self.session.lock().await;
        let old = std::mem::replace(&mut *session, Session::empty(next));
        (old.auth, old.phone)
    }

    async fn remember_phone(&self, credentials: &Credentials, phone: Option<String>) {
        if credentials.phone == phone {
            return;
        }
        let updated = Credentials {
            phone,
            ..credentials.clone()
        };
        if let Err(e) = self.store.save(&updated).await {
            warn!(error = %e, "could not save phone");
        }
    }
}

#[async_trait::async_trait]
impl SourceProvider for SessionManager {
    async fn source(&self) -> Result<Arc<dyn ConversationSource>, DomainError> {
        let session = self.session.lock().await;
        match (session.state, &session.source) {
            (SessionState::Ready, Some(source)) => Ok(Arc::clone(source)),
            _ => Err(DomainError::NotConnected),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::mock::{MockAuth, MockConnector, MockConversationSource};

    #[derive(Default)]
    struct MemoryStore(Mutex<Option<Credentials>>);

    #[async_trait::async_trait]
    impl CredentialStore for MemoryStore {
        async fn load(&self) -> Result<Option<Credentials>, DomainError> {
            Ok(self.0.lock().await.clone())
        }
        async fn save(&self, credentials: &Credentials) -> Result<(), DomainError> {
            *self.0.lock().await = Some(credentials.clone());
            Ok(())
        }
        async fn clear(&self) -> Result<(), DomainError> {
            *self.0.lock().await = None;
            Ok(())
        }
    }

    fn creds(phone: Option<&str>) -> Credentials {
        Credentials {
            api_id: 12345,
            api_hash: "hash".into(),
            phone: phone.map(String::from),
        }
    }

    async fn manager(auth: MockAuth, saved: Option<Credentials>) -> (SessionManager, Arc<MockConnector>, Arc<MemoryStore>) {
        let connector = Arc::new(MockConnector::new(
            Arc::new(auth),
            Arc::new(MockConversationSource::demo()),
        ));
        let store = Arc::new(MemoryStore::default());
        if let Some(c) = saved {
            store.save(&c).await.unwrap();
        }
        let mgr = SessionManager::new(connector.clone(), store.clone());
        (mgr, connector, store)
    }

    #[tokio::test]
    async fn source_requires_ready_session() {
        let (mgr, _, _) = manager(MockAuth::new("111", None), Some(creds(None))).await;
        assert_eq!(mgr.source().await.err(), Some(DomainError::NotConnected));
        assert_eq!(mgr.me().await.err(), Some(DomainError::NotConnected));
    }

    #[tokio::test]
    async fn connect_without_credentials_is_not_configured() {
        let (mgr, _, _) = manager(MockAuth::new("111", None), None).await;
        assert!(matches!(
            mgr.connect(Some("+100")).await,
            Err(DomainError::ConfigurationMissing(_))
        ));
    }

    #[tokio::test]
    async fn fallback_credentials_are_used() {
        let (mgr, _, _) = manager(MockAuth::authorized(), None).await;
        let mgr = mgr.with_fallback(Some(creds(Some("+100"))));
        assert_eq!(mgr.connect(None).await.unwrap(), ConnectStatus::Connected);
    }

    #[tokio::test]
    async fn code_flow_reaches_ready_and_saves_phone() {
        let (mgr, _, store) = manager(MockAuth::new("111", None), Some(creds(None))).await;
        assert_eq!(mgr.connect(Some("+100")).await.unwrap(), ConnectStatus::CodeRequired);
        assert_eq!(mgr.state().await, SessionState::Authenticating);
        assert_eq!(mgr.source().await.err(), Some(DomainError::NotConnected));

        assert!(matches!(mgr.verify(Some("000"), None).await, Err(DomainError::Verification(_))));
        assert_eq!(mgr.verify(None, None).await, Err(DomainError::VerificationRequired));
        assert_eq!(mgr.verify(Some("111"), None).await.unwrap(), VerifyStatus::Connected);
        assert!(mgr.is_ready().await);
        assert!(mgr.source().await.is_ok());
        assert_eq!(store.load().await.unwrap().unwrap().phone.as_deref(), Some("+100"));
    }

    #[tokio::test]
    async fn password_step_after_code() {
        let (mgr, _, _) = manager(MockAuth::new("111", Some("secret")), Some(creds(None))).await;
        mgr.connect(Some("+100")).await.unwrap();
        assert_eq!(
            mgr.verify(Some("111"), None).await.unwrap(),
            VerifyStatus::PasswordRequired {
                hint: Some("mock hint".into())
            }
        );
        assert!(matches!(
            mgr.verify(None, Some("nope")).await,
            Err(DomainError::Verification(_))
        ));
        assert_eq!(mgr.verify(None, Some("secret")).await.unwrap(), VerifyStatus::Connected);
        assert!(mgr.is_ready().await);
    }

    #[tokio::test]
    async fn code_and_password_in_one_call() {
        let (mgr, _, _) = manager(MockAuth::new("111", Some("secret")), Some(creds(None))).await;
        mgr.connect(Some("+100")).await.unwrap();
        assert_eq!(
            mgr.verify(Some("111"), Some("secret")).await.unwrap(),
            VerifyStatus::Connected
        );
    }

    #[tokio::test]
    async fn verify_without_connect_is_not_connected() {
        let (mgr, _, _) = manager(MockAuth::new("111", None), Some(creds(None))).await;
        assert_eq!(mgr.verify(Some("111"), None).await, Err(DomainError::NotConnected));
    }

    #[tokio::test]
    async fn auto_connect_only_with_authorized_saved_session() {
        let (mgr, connector, _) = manager(MockAuth::new("111", None), Some(creds(Some("+100")))).await;
        assert!(!mgr.auto_connect().await);
        assert_eq!(connector.closed(), 1);
        assert_eq!(mgr.state().await, SessionState::Uninitialized);

        let (mgr, _, _) = manager(MockAuth::authorized(), Some(creds(Some("+100")))).await;
        assert!(mgr.auto_connect().await);
        assert!(mgr.source().await.is_ok());

        let (mgr, connector, _) = manager(MockAuth::authorized(), Some(creds(None))).await;
        assert!(!mgr.auto_connect().await);
        assert_eq!(connector.opened(), 0);
    }

    #[tokio::test]
    async fn logout_keeps_api_keys_and_forgets_phone() {
        let (mgr, connector, store) = manager(MockAuth::authorized(), Some(creds(Some("+100")))).await;
        assert!(mgr.auto_connect().await);
        mgr.logout().await.unwrap();

        assert_eq!(mgr.state().await, SessionState::Uninitialized);
        assert_eq!(mgr.source().await.err(), Some(DomainError::NotConnected));
        assert_eq!(connector.forgotten(), vec!["+100".to_string()]);
        let saved = store.load().await.unwrap().unwrap();
        assert_eq!(saved.api_id, 12345);
        assert_eq!(saved.phone, None);
    }

    #[tokio::test]
    async fn reset_clears_everything() {
        let (mgr, connector, store) = manager(MockAuth::authorized(), Some(creds(Some("+100")))).await;
        mgr.connect(None).await.unwrap();
        mgr.reset().await.unwrap();
        assert!(store.load().await.unwrap().is_none());
        assert_eq!(connector.forgotten(), vec!["*".to_string()]);
    }

    #[tokio::test]
    async fn closed_session_refuses_connect() {
        let (mgr, _, _) = manager(MockAuth::authorized(), Some(creds(Some("+100")))).await;
        mgr.connect(None).await.unwrap();
        mgr.close().await;
        assert_eq!(mgr.state().await, SessionState::Closed);
        assert_eq!(mgr.connect(None).await, Err(DomainError::NotConnected));
    }

    #[tokio::test]
    async fn save_credentials_keeps_phone() {
        let (mgr, _, store) = manager(MockAuth::authorized(), Some(creds(Some("+100")))).await;
        mgr.save_credentials(999, " newhash ").await.unwrap();
        let saved = store.load().await.unwrap().unwrap();
        assert_eq!(saved.api_id, 999);
        assert_eq!(saved.api_hash, "newhash");
        assert_eq!(saved.phone.as_deref(), Some("+100"));
        assert!(matches!(
            mgr.save_credentials(0, "x").await,
            Err(DomainError::InvalidRequest(_))
        ));
    }
}
