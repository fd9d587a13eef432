//! Spam analysis over the `users` bucket.
//!
//! Flags decide first (deleted > bot > scam > fake). Everyone else gets a
//! message-history probe, up to `probe_budget` probes per scan; users past the
//! budget are assumed active without a probe.

use crate::domain::{ConversationEntity, SpamAnalysis, SpamBucket};
use crate::ports::ConversationSource;
use std::sync::Arc;
use tracing::{debug, info};

pub const DEFAULT_PROBE_BUDGET: usize = 50;
pub const DEFAULT_PROBE_LIMIT: usize = 10;

pub struct SpamAnalyzer {
    source: Arc<dyn ConversationSource>,
    probe_budget: usize,
    probe_limit: usize,
    track_only_incoming: bool,
}

impl SpamAnalyzer {
    pub fn new(source: Arc<dyn ConversationSource>) -> Self {
        Self {
            source,
            probe_budget: DEFAULT_PROBE_BUDGET,
            probe_limit: DEFAULT_PROBE_LIMIT,
            track_only_incoming: true,
        }
    }

    pub fn with_probe_budget(mut self, budget: usize) -> Self {
        self.probe_budget = budget;
        self
    }

    /// Messages requested per probe. Clamped to at least one.
    pub fn with_probe_limit(mut self, limit: usize) -> Self {
        self.probe_limit = limit.max(1);
        self
    }

    /// When off, "only incoming" chats are counted as active.
    pub fn with_only_incoming(mut self, enabled: bool) -> Self {
        self.track_only_incoming = enabled;
        self
    }

    pub async fn analyze(&self, users: &[ConversationEntity]) -> SpamAnalysis {
        self.analyze_with_progress(users, |_, _| {}).await
    }

    /// Like [`analyze`](Self::analyze), reporting `(done, total)` after each user.
    pub async fn analyze_with_progress(
        &self,
        users: &[ConversationEntity],
        mut on_progress: impl FnMut(usize, usize) + Send,
    ) -> SpamAnalysis {
        let mut analysis = SpamAnalysis::default();
        let mut candidates = 0usize;
        let total = users.len();

        for (i, user) in users.iter().enumerate() {
            if let Some(bucket) = flag_bucket(user) {
                analysis.bucket_mut(bucket).push(user.clone());
            } else if user.is_person() {
                candidates += 1;
                let bucket = if candidates <= self.probe_budget {
                    analysis.probed += 1;
                    self.probe(user.id()).await
                } else {
                    SpamBucket::Active
                };
                analysis.bucket_mut(bucket).push(user.clone());
            } else {
                debug!(id = user.id(), "skipping non-person entity");
            }
            on_progress(i + 1, total);
        }

        info!(
            users = total,
            probed = analysis.probed,
            deleted = analysis.deleted.len(),
            no_messages = analysis.no_messages.len(),
            active = analysis.active.len(),
            "analyzed users"
        );
        analysis
    }

    /// Errors count as "no messages"; they never reach the caller.
    async fn probe(&self, id: i64) -> SpamBucket {
        match self.source.get_recent_messages(id, self.probe_limit).await {
            Ok(messages) if messages.is_empty() => SpamBucket::NoMessages,
            Ok(messages) => {
                if messages.iter().any(|m| m.outgoing) || !self.track_only_incoming {
                    SpamBucket::Active
                } else {
                    SpamBucket::OnlyIncoming
                }
            }
            Err(e) => {
                debug!(id, error = %e, "probe failed, counting as no messages");
                SpamBucket::NoMessages
            }
        }
    }
}

/// Flag buckets in priority order. `None` for unflagged persons and non-persons.
fn flag_bucket(entity: &ConversationEntity) -> Option<SpamBucket> {
    let ConversationEntity::Person {
        deleted,
        is_bot,
        is_scam,
        is_fake,
        ..
    } = entity
    else {
        return None;
    };
    if *deleted {
        Some(SpamBucket::Deleted)
    } else if *is_bot {
        Some(SpamBucket::Bots)
    } else if *is_scam {
        Some(SpamBucket::Scam)
    } else if *is_fake {
        Some(SpamBucket::Fake)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::mock::MockConversationSource;
    use crate::domain::Message;

    fn person(id: i64, deleted: bool, is_bot: bool, is_scam: bool, is_fake: bool) -> ConversationEntity {
        ConversationEntity::Person {
            id,
            display_name: format!("p{}", id),
            username: None,
            deleted,
            is_bot,
            is_scam,
            is_fake,
            is_verified: false,
        }
    }

    fn plain(id: i64) -> ConversationEntity {
        person(id, false, false, false, false)
    }

    fn message(chat_id: i64, outgoing: bool) -> Message {
        Message {
            id: 1,
            chat_id,
            date: 0,
            text: "hi".into(),
            outgoing,
        }
    }

    fn ids(v: &[ConversationEntity]) -> Vec<i64> {
        v.iter().map(|e| e.id()).collect()
    }

    #[tokio::test]
    async fn flag_priority_holds_for_every_combination() {
        let users: Vec<ConversationEntity> = (0..16)
            .map(|mask: i64| person(mask, mask & 1 != 0, mask & 2 != 0, mask & 4 != 0, mask & 8 != 0))
            .collect();
        let source = Arc::new(MockConversationSource::new(vec![]));
        let analysis = SpamAnalyzer::new(source.clone()).analyze(&users).await;

        for mask in 0..16i64 {
            let expected = if mask & 1 != 0 {
                SpamBucket::Deleted
            } else if mask & 2 != 0 {
                SpamBucket::Bots
            } else if mask & 4 != 0 {
                SpamBucket::Scam
            } else if mask & 8 != 0 {
                SpamBucket::Fake
            } else {
                SpamBucket::NoMessages
            };
            assert_eq!(analysis.locate(mask), Some(expected), "mask {:04b}", mask);
        }
        assert_eq!(analysis.total(), 16);
        // only the unflagged user was probed
        assert_eq!(source.probe_calls(), vec![0]);
    }

    #[tokio::test]
    async fn deleted_bot_lands_in_deleted() {
        let source = Arc::new(MockConversationSource::new(vec![]));
        let analysis = SpamAnalyzer::new(source)
            .analyze(&[person(1, true, true, false, false)])
            .await;
        assert_eq!(ids(&analysis.deleted), vec![1]);
        assert!(analysis.bots.is_empty());
    }

    #[tokio::test]
    async fn probe_budget_cutoff_defaults_to_active() {
        let users: Vec<ConversationEntity> = (1..=60).map(plain).collect();
        let source = Arc::new(MockConversationSource::new(vec![]));
        let analysis = SpamAnalyzer::new(source.clone())
            .with_probe_budget(50)
            .analyze(&users)
            .await;

        let probed = source.probe_calls();
        assert_eq!(probed.len(), 50);
        assert_eq!(probed, (1..=50).collect::<Vec<_>>());
        assert_eq!(analysis.probed, 50);
        assert_eq!(ids(&analysis.no_messages), (1..=50).collect::<Vec<_>>());
        assert_eq!(ids(&analysis.active), (51..=60).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn flagged_users_do_not_consume_budget() {
        let mut users = vec![person(1, true, false, false, false), person(2, false, true, false, false)];
        users.push(plain(3));
        users.push(plain(4));
        let source = Arc::new(MockConversationSource::new(vec![]));
        let analysis = SpamAnalyzer::new(source.clone())
            .with_probe_budget(1)
            .analyze(&users)
            .await;
        assert_eq!(source.probe_calls(), vec![3]);
        assert_eq!(ids(&analysis.no_messages), vec![3]);
        assert_eq!(ids(&analysis.active), vec![4]);
    }

    #[tokio::test]
    async fn scenario_deleted_and_two_empty_histories() {
        let users = vec![person(1, true, false, false, false), plain(2), plain(3)];
        let source = Arc::new(MockConversationSource::new(vec![]));
        let analysis = SpamAnalyzer::new(source)
            .with_probe_budget(10)
            .analyze(&users)
            .await;
        assert_eq!(ids(&analysis.deleted), vec![1]);
        assert_eq!(ids(&analysis.no_messages), vec![2, 3]);
        assert!(analysis.active.is_empty());
    }

    #[tokio::test]
    async fn history_decides_between_active_and_only_incoming() {
        let source = Arc::new(MockConversationSource::new(vec![]));
        source.set_history(1, vec![message(1, false), message(1, true)]);
        source.set_history(2, vec![message(2, false), message(2, false)]);
        source.fail_probe(3);

        let users = vec![plain(1), plain(2), plain(3)];
        let analysis = SpamAnalyzer::new(source.clone()).analyze(&users).await;
        assert_eq!(ids(&analysis.active), vec![1]);
        assert_eq!(ids(&analysis.only_incoming), vec![2]);
        assert_eq!(ids(&analysis.no_messages), vec![3]);

        let folded = SpamAnalyzer::new(source)
            .with_only_incoming(false)
            .analyze(&users)
            .await;
        assert_eq!(ids(&folded.active), vec![1, 2]);
        assert!(folded.only_incoming.is_empty());
    }

    #[tokio::test]
    async fn progress_reports_every_user() {
        let users: Vec<ConversationEntity> = (1..=4).map(plain).collect();
        let source = Arc::new(MockConversationSource::new(vec![]));
        let mut seen = Vec::new();
        SpamAnalyzer::new(source)
            .analyze_with_progress(&users, |done, total| seen.push((done, total)))
            .await;
        assert_eq!(seen, vec![(1, 4), (2, 4), (3, 4), (4, 4)]);
    }
}
