//! Chat listing, analysis and deletes on top of the current session.
//!
//! Holds the `ChatViews` both front-ends read from. Refresh replaces the
//! classification, analysis replaces the spam buckets, and the bulk-delete
//! coordinator takes entities out and puts them back.

use crate::domain::{
    CategorySet, CategoryStats, ChatRecord, ChatViews, ConversationEntity, DomainError,
    ExportCategory, SpamAnalysis, SpamBucket,
};
use crate::usecases::bulk_delete::{BulkDeleteCoordinator, DEFAULT_UNDO_DELAY};
use crate::usecases::classifier::classify;
use crate::usecases::session_manager::{SessionManager, SourceProvider};
use crate::usecases::spam_analyzer::{DEFAULT_PROBE_BUDGET, DEFAULT_PROBE_LIMIT, SpamAnalyzer};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::info;

#[derive(Debug, Clone, Copy)]
pub struct ChatSettings {
    pub probe_budget: usize,
    pub probe_limit: usize,
    pub track_only_incoming: bool,
    pub undo_delay: Duration,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            probe_budget: DEFAULT_PROBE_BUDGET,
            probe_limit: DEFAULT_PROBE_LIMIT,
            track_only_incoming: true,
            undo_delay: DEFAULT_UNDO_DELAY,
        }
    }
}

pub struct ChatService {
    session: Arc<SessionManager>,
    views: Arc<RwLock<ChatViews>>,
    coordinator: Arc<BulkDeleteCoordinator>,
    settings: ChatSettings,
    loaded: AtomicBool,
}

impl ChatService {
    pub fn new(session: Arc<SessionManager>, settings: ChatSettings) -> Self {
        let views = Arc::new(RwLock::new(ChatViews::default()));
        let coordinator = BulkDeleteCoordinator::new(
            Arc::clone(&session) as Arc<dyn SourceProvider>,
            Arc::clone(&views),
            settings.undo_delay,
        );
        Self {
            session,
            views,
            coordinator,
            settings,
            loaded: AtomicBool::new(false),
        }
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    pub fn coordinator(&self) -> &Arc<BulkDeleteCoordinator> {
        &self.coordinator
    }

    /// Re-list dialogs and reclassify. Drops the previous analysis; chats with a
    /// pending delete stay hidden.
    pub async fn refresh(&self) -> Result<CategoryStats, DomainError> {
        let source = self.session.source().await?;
        let dialogs = source.list_dialogs().await?;
        self.coordinator
            .replace_views(ChatViews::new(classify(&dialogs)))
            .await;
        let stats = self.views.read().await.categories.stats();
        self.loaded.store(true, Ordering::SeqCst);
        info!(
            total = stats.total,
            users = stats.users,
            groups = stats.groups,
            channels = stats.channels,
            "dialogs classified"
        );
        Ok(stats)
    }

    /// Current classification, listing dialogs on first use.
    pub async fn categories(&self) -> Result<CategorySet, DomainError> {
        self.ensure_loaded().await?;
        Ok(self.views.read().await.categories.clone())
    }

    pub async fn stats(&self) -> Result<CategoryStats, DomainError> {
        self.ensure_loaded().await?;
        Ok(self.views.read().await.categories.stats())
    }

    /// Last analysis result, if one has run since the last refresh.
    pub async fn analysis(&self) -> Option<SpamAnalysis> {
        self.views.read().await.analysis.clone()
    }

    pub async fn analyze(&self) -> Result<SpamAnalysis, DomainError> {
        self.analyze_with_progress(|_, _| {}).await
    }

    /// Run the spam analyzer over the current `users` bucket.
    pub async fn analyze_with_progress(
        &self,
        on_progress: impl FnMut(usize, usize) + Send,
    ) -> Result<SpamAnalysis, DomainError> {
        self.ensure_loaded().await?;
        let source = self.session.source().await?;
        let users = self.views.read().await.categories.users.clone();
        let analysis = SpamAnalyzer::new(source)
            .with_probe_budget(self.settings.probe_budget)
            .with_probe_limit(self.settings.probe_limit)
            .with_only_incoming(self.settings.track_only_incoming)
            .analyze_with_progress(&users, on_progress)
            .await;
        // Entities deleted (or scheduled) while probing must not come back.
        let mut analysis = analysis;
        let mut views = self.views.write().await;
        for bucket in SpamBucket::ALL {
            analysis
                .bucket_mut(bucket)
                .retain(|e| views.categories.locate(e.id()).is_some());
        }
        views.analysis = Some(analysis.clone());
        Ok(analysis)
    }

    /// Entities of an export category. Analysis buckets run the analyzer when needed.
    pub async fn entities(&self, category: ExportCategory) -> Result<Vec<ConversationEntity>, DomainError> {
        self.ensure_loaded().await?;
        if category.needs_analysis() && self.analysis().await.is_none() {
            self.analyze().await?;
        }
        let views = self.views.read().await;
        let entities = match category {
            ExportCategory::Groups => views.categories.groups().into_iter().cloned().collect(),
            ExportCategory::Category(c) => views.categories.bucket(c).to_vec(),
            ExportCategory::Analysis(b) => views
                .analysis
                .as_ref()
                .map(|a| a.bucket(b).to_vec())
                .unwrap_or_default(),
            ExportCategory::Spam => views
                .analysis
                .as_ref()
                .map(|a| a.spam().into_iter().cloned().collect())
                .unwrap_or_default(),
        };
        Ok(entities)
    }

    pub async fn records(&self, category: ExportCategory) -> Result<Vec<ChatRecord>, DomainError> {
        Ok(self
            .entities(category)
            .await?
            .iter()
            .map(ChatRecord::from)
            .collect())
    }

    /// Delete right away, without the undo window. A chat that is already gone counts as deleted.
    ///
    /// # Errors
    /// `RateLimited` is returned as is so the caller can show the wait.
    pub async fn delete_now(&self, id: i64) -> Result<(), DomainError> {
        let source = self.session.source().await?;
        match source.delete_dialog(id).await {
            Ok(()) | Err(DomainError::NotFound(_)) => {
                self.views.write().await.take(id);
                info!(id, "chat deleted");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Disarm pending deletes and forget the views. Called on logout and reset.
    pub async fn clear(&self) {
        self.coordinator.shutdown().await;
        *self.views.write().await = ChatViews::default();
        self.loaded.store(false, Ordering::SeqCst);
    }

    async fn ensure_loaded(&self) -> Result<(), DomainError> {
        if !self.loaded.load(Ordering::SeqCst) {
            self.refresh().await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::mock::{MockAuth, MockConnector, MockConversationSource};
    use crate::domain::{Category, Credentials};
    use crate::ports::CredentialStore;
    use tokio::sync::Mutex;

    struct FixedStore(Mutex<Option<Credentials>>);

    #[async_trait::async_trait]
    impl CredentialStore for FixedStore {
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

    async fn service() -> (ChatService, Arc<MockConversationSource>) {
        let source = Arc::new(MockConversationSource::demo());
        let connector = Arc::new(MockConnector::new(Arc::new(MockAuth::authorized()), source.clone()));
        let store = Arc::new(FixedStore(Mutex::new(Some(Credentials {
            api_id: 1,
            api_hash: "h".into(),
            phone: Some("+100".into()),
        }))));
        let session = Arc::new(SessionManager::new(connector, store));
        assert!(session.auto_connect().await);
        (ChatService::new(session, ChatSettings::default()), source)
    }

    #[tokio::test]
    async fn not_connected_fails_fast() {
        let source = Arc::new(MockConversationSource::demo());
        let connector = Arc::new(MockConnector::new(Arc::new(MockAuth::authorized()), source));
        let store = Arc::new(FixedStore(Mutex::new(None)));
        let svc = ChatService::new(Arc::new(SessionManager::new(connector, store)), ChatSettings::default());
        assert_eq!(svc.stats().await.err(), Some(DomainError::NotConnected));
        assert_eq!(svc.delete_now(1).await, Err(DomainError::NotConnected));
    }

    #[tokio::test(start_paused = true)]
    async fn stats_match_demo_account() {
        let (svc, _) = service().await;
        let stats = svc.stats().await.unwrap();
        assert_eq!(stats.users, 6);
        assert_eq!(stats.basic_groups, 1);
        assert_eq!(stats.supergroups, 1);
        assert_eq!(stats.groups, 2);
        assert_eq!(stats.channels, 1);
        assert_eq!(stats.total, 9);
    }

    #[tokio::test(start_paused = true)]
    async fn spam_category_runs_analysis_on_demand() {
        let (svc, source) = service().await;
        let spam: Vec<i64> = svc
            .entities(ExportCategory::Spam)
            .await
            .unwrap()
            .iter()
            .map(|e| e.id())
            .collect();
        // deleted, then the never-messaged stranger, then scam
        assert_eq!(spam, vec![102, 106, 104]);
        assert_eq!(source.probe_calls(), vec![101, 105, 106]);

        let analysis = svc.analysis().await.unwrap();
        assert_eq!(analysis.only_incoming.len(), 1);
        assert_eq!(analysis.active[0].id(), 101);
    }

    #[tokio::test(start_paused = true)]
    async fn delete_now_removes_from_views() {
        let (svc, source) = service().await;
        svc.delete_now(-201).await.unwrap();
        assert!(!source.contains(-201));
        assert!(svc.categories().await.unwrap().locate(-201).is_none());
        // already gone is still a success
        svc.delete_now(-201).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn delete_now_surfaces_rate_limit() {
        let (svc, source) = service().await;
        source.script_delete(101, Err(DomainError::RateLimited { retry_after_secs: 30 }));
        assert_eq!(
            svc.delete_now(101).await,
            Err(DomainError::RateLimited { retry_after_secs: 30 })
        );
        assert_eq!(svc.categories().await.unwrap().locate(101), Some(Category::Users));
    }

    #[tokio::test(start_paused = true)]
    async fn scheduled_delete_hides_then_commits() {
        let (svc, source) = service().await;
        svc.stats().await.unwrap();
        let handle = svc.coordinator().schedule(-1001401).await.unwrap();
        assert!(svc.records(ExportCategory::Category(Category::Channels)).await.unwrap().is_empty());
        assert!(handle.outcome().await.is_committed());
        assert!(!source.contains(-1001401));
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_keeps_pending_delete_hidden_until_commit() {
        let (svc, source) = service().await;
        assert_eq!(svc.refresh().await.unwrap().channels, 1);
        let handle = svc.coordinator().schedule(-1001401).await.unwrap();

        let stats = svc.refresh().await.unwrap();
        assert_eq!(stats.channels, 0);
        assert_eq!(svc.categories().await.unwrap().locate(-1001401), None);

        assert!(handle.outcome().await.is_committed());
        assert!(!source.contains(-1001401));
        assert_eq!(svc.categories().await.unwrap().locate(-1001401), None);
        assert_eq!(svc.refresh().await.unwrap().channels, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn clear_disarms_and_forgets() {
        let (svc, source) = service().await;
        svc.stats().await.unwrap();
        let _h = svc.coordinator().schedule(101).await.unwrap();
        svc.clear().await;
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(source.delete_calls().is_empty());
        assert!(svc.coordinator().pending().await.is_empty());
    }
}
