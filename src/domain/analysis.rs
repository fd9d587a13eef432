//! Spam analysis result: the `users` bucket split by risk.

use super::entities::ConversationEntity;
use serde::{Deserialize, Serialize};

/// Analysis buckets, in the priority order the analyzer checks them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpamBucket {
    Deleted,
    Bots,
    Scam,
    Fake,
    NoMessages,
    OnlyIncoming,
    Active,
}

impl SpamBucket {
    pub const ALL: [SpamBucket; 7] = [
        SpamBucket::Deleted,
        SpamBucket::Bots,
        SpamBucket::Scam,
        SpamBucket::Fake,
        SpamBucket::NoMessages,
        SpamBucket::OnlyIncoming,
        SpamBucket::Active,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SpamBucket::Deleted => "deleted",
            SpamBucket::Bots => "bots",
            SpamBucket::Scam => "scam",
            SpamBucket::Fake => "fake",
            SpamBucket::NoMessages => "no_messages",
            SpamBucket::OnlyIncoming => "only_incoming",
            SpamBucket::Active => "active",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpamAnalysis {
    pub deleted: Vec<ConversationEntity>,
    pub bots: Vec<ConversationEntity>,
    pub scam: Vec<ConversationEntity>,
    pub fake: Vec<ConversationEntity>,
    pub no_messages: Vec<ConversationEntity>,
    pub only_incoming: Vec<ConversationEntity>,
    pub active: Vec<ConversationEntity>,
    /// Number of message-history probes performed.
    pub probed: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SpamCounts {
    pub deleted: usize,
    pub bots: usize,
    pub scam: usize,
    pub fake: usize,
    pub no_messages: usize,
    pub only_incoming: usize,
    pub active: usize,
    pub probed: usize,
}

impl SpamAnalysis {
    pub fn bucket(&self, bucket: SpamBucket) -> &Vec<ConversationEntity> {
        match bucket {
            SpamBucket::Deleted => &self.deleted,
            SpamBucket::Bots => &self.bots,
            SpamBucket::Scam => &self.scam,
            SpamBucket::Fake => &self.fake,
            SpamBucket::NoMessages => &self.no_messages,
            SpamBucket::OnlyIncoming => &self.only_incoming,
            SpamBucket::Active => &self.active,
        }
    }

    pub fn bucket_mut(&mut self, bucket: SpamBucket) -> &mut Vec<ConversationEntity> {
        match bucket {
            SpamBucket::Deleted => &mut self.deleted,
            SpamBucket::Bots => &mut self.bots,
            SpamBucket::Scam => &mut self.scam,
            SpamBucket::Fake => &mut self.fake,
            SpamBucket::NoMessages => &mut self.no_messages,
            SpamBucket::OnlyIncoming => &mut self.only_incoming,
            SpamBucket::Active => &mut self.active,
        }
    }

    pub fn locate(&self, id: i64) -> Option<SpamBucket> {
        SpamBucket::ALL
            .into_iter()
            .find(|b| self.bucket(*b).iter().any(|e| e.id() == id))
    }

    pub fn total(&self) -> usize {
        SpamBucket::ALL.iter().map(|b| self.bucket(*b).len()).sum()
    }

    /// Candidates for removal: deleted accounts, empty chats, scam and fake.
    pub fn spam(&self) -> Vec<&ConversationEntity> {
        self.deleted
            .iter()
            .chain(&self.no_messages)
            .chain(&self.scam)
            .chain(&self.fake)
            .collect()
    }

    pub fn counts(&self) -> SpamCounts {
        SpamCounts {
            deleted: self.deleted.len(),
            bots: self.bots.len(),
            scam: self.scam.len(),
            fake: self.fake.len(),
            no_messages: self.no_messages.len(),
            only_incoming: self.only_incoming.len(),
            active: self.active.len(),
            probed: self.probed,
        }
    }
}
