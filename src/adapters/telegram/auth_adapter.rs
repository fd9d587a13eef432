//! Implements AuthPort using grammers Client.
//!
//! Stores the login token and password token between calls for the auth flow.

use crate::domain::{AccountInfo, DomainError, SignInResult};
use crate::ports::AuthPort;
use async_trait::async_trait;
use grammers_client::Client;
use grammers_client::client::{LoginToken, PasswordToken};
use tokio::sync::Mutex;

pub struct GrammersAuthAdapter {
    client: Client,
    api_hash: String,
    /// Token from request_login_code; kept until sign_in succeeds so a mistyped code can be retried.
    login_token: Mutex<Option<LoginToken>>,
    /// Token from sign_in(PasswordRequired); consumed by check_password.
    password_token: Mutex<Option<PasswordToken>>,
}

impl GrammersAuthAdapter {
    pub fn new(client: Client, api_hash: impl Into<String>) -> Self {
        Self {
            client,
            api_hash: api_hash.into(),
            login_token: Mutex::new(None),
            password_token: Mutex::new(None),
        }
    }
}

#[async_trait]
impl AuthPort for GrammersAuthAdapter {
    async fn is_authenticated(&self) -> Result<bool, DomainError> {
        self.client
            .is_authorized()
            .await
            .map_err(|e| DomainError::Upstream(e.to_string()))
    }

    async fn request_login_code(&self, phone: &str) -> Result<(), DomainError> {
        let token = self
            .client
            .request_login_code(phone, &self.api_hash)
            .await
            .map_err(|e| DomainError::Upstream(format!("request_login_code: {}", e)))?;
        *self.login_token.lock().await = Some(token);
        *self.password_token.lock().await = None;
        Ok(())
    }

    async fn sign_in(&self, code: &str) -> Result<SignInResult, DomainError> {
        let mut login = self.login_token.lock().await;
        let token = login.as_ref().ok_or_else(|| {
            DomainError::Verification("request_login_code must be called before sign_in".into())
        })?;
        match self.client.sign_in(token, code).await {
            Ok(_user) => {
                *login = None;
                Ok(SignInResult::Success)
            }
            Err(grammers_client::SignInError::PasswordRequired(pt)) => {
                *login = None;
                let hint = pt.hint().map(String::from);
                *self.password_token.lock().await = Some(pt);
                Ok(SignInResult::PasswordRequired { hint })
            }
            Err(grammers_client::SignInError::InvalidCode) => Err(DomainError::Verification(
                "Invalid login code".into(),
            )),
            Err(grammers_client::SignInError::SignUpRequired) => Err(DomainError::Verification(
                "Sign-up required. Create an account with the official Telegram app first.".into(),
            )),
            Err(e) => Err(DomainError::Verification(format!("sign in: {}", e))),
        }
    }

    async fn check_password(&self, password: &[u8]) -> Result<(), DomainError> {
        let pt = self.password_token.lock().await.take().ok_or_else(|| {
            DomainError::Verification(
                "Password step expired. Connect again to get a new code.".into(),
            )
        })?;
        self.client
            .check_password(pt, password)
            .await
            .map_err(|e| DomainError::Verification(format!("check_password: {}", e)))?;
        Ok(())
    }

    async fn sign_out(&self) -> Result<(), DomainError> {
        self.client
            .sign_out()
            .await
            .map(|_| ())
            .map_err(|e| DomainError::Upstream(format!("sign out: {}", e)))
    }

    async fn me(&self) -> Result<AccountInfo, DomainError> {
        let me = self
            .client
            .get_me()
            .await
            .map_err(|e| DomainError::Upstream(e.to_string()))?;
        Ok(AccountInfo {
            id: me.id().bot_api_dialog_id(),
            username: me.username().map(String::from),
            phone: me.phone().map(String::from),
            first_name: me.full_name(),
        })
    }
}
