//! Implements Connector: one grammers client per phone number.
//!
//! Auth adapter and conversation source share the same client (clones share
//! the connection). The sender pool runner is a tokio task; closing aborts it.

use crate::adapters::telegram::auth_adapter::GrammersAuthAdapter;
use crate::adapters::telegram::client::GrammersConversationSource;
use crate::adapters::telegram::session;
use crate::domain::{Credentials, DomainError};
use crate::ports::{AuthPort, Connection, Connector, ConversationSource};
use async_trait::async_trait;
use grammers_client::{Client, SenderPool};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{info, warn};

struct Live {
    phone: String,
    runner: JoinHandle<()>,
}

pub struct GrammersConnector {
    sessions_dir: PathBuf,
    live: Mutex<Option<Live>>,
}

impl GrammersConnector {
    pub fn new(sessions_dir: impl Into<PathBuf>) -> Self {
        Self {
            sessions_dir: sessions_dir.into(),
            live: Mutex::new(None),
        }
    }
}

#[async_trait]
impl Connector for GrammersConnector {
    async fn open(&self, credentials: &Credentials, phone: &str) -> Result<Connection, DomainError> {
        self.close().await;

        let path = session::session_path(&self.sessions_dir, phone);
        let storage = session::open_file_session(&path)
            .await
            .map_err(|e| DomainError::Storage(e.to_string()))?;
        let pool = SenderPool::new(Arc::new(storage), credentials.api_id);
        let client = Client::new(pool.handle.clone());
        let runner = pool.runner;
        let runner = tokio::spawn(async move {
            runner.run().await;
        });
        info!(path = %path.display(), "telegram client started");
        *self.live.lock().await = Some(Live {
            phone: phone.to_string(),
            runner,
        });

        let auth: Arc<dyn AuthPort> = Arc::new(GrammersAuthAdapter::new(
            client.clone(),
            credentials.api_hash.clone(),
        ));
        let source: Arc<dyn ConversationSource> = Arc::new(GrammersConversationSource::new(client));
        Ok(Connection { auth, source })
    }

    async fn close(&self) {
        if let Some(live) = self.live.lock().await.take() {
            live.runner.abort();
            info!(phone = %live.phone, "telegram client stopped");
        }
    }

    async fn forget_session(&self, phone: &str) -> Result<(), DomainError> {
        let path = session::session_path(&self.sessions_dir, phone);
        session::remove_session(&path)
            .await
            .map_err(|e| DomainError::Storage(format!("remove {}: {}", path.display(), e)))?;
        info!(path = %path.display(), "session file removed");
        Ok(())
    }

    async fn forget_all_sessions(&self) -> Result<(), DomainError> {
        match session::remove_all_sessions(&self.sessions_dir).await {
            Ok(n) => {
                info!(count = n, "session files removed");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "could not clean up session files");
                Err(DomainError::Storage(e.to_string()))
            }
        }
    }
}
