//! Category partition produced by the classifier.

use super::entities::ConversationEntity;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The disjoint buckets of a [`CategorySet`]. `groups` is derived and has no variant here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Users,
    BasicGroups,
    Supergroups,
    Channels,
    Unknown,
}

/// Partition of a dialog listing. Every entity sits in exactly one bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategorySet {
    pub users: Vec<ConversationEntity>,
    pub basic_groups: Vec<ConversationEntity>,
    pub supergroups: Vec<ConversationEntity>,
    pub channels: Vec<ConversationEntity>,
    pub unknown: Vec<ConversationEntity>,
}

/// Bucket sizes. `total` does not count the derived `groups` a second time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CategoryStats {
    pub groups: usize,
    pub supergroups: usize,
    pub basic_groups: usize,
    pub channels: usize,
    pub users: usize,
    pub unknown: usize,
    pub total: usize,
}

impl CategorySet {
    pub fn bucket(&self, category: Category) -> &Vec<ConversationEntity> {
        match category {
            Category::Users => &self.users,
            Category::BasicGroups => &self.basic_groups,
            Category::Supergroups => &self.supergroups,
            Category::Channels => &self.channels,
            Category::Unknown => &self.unknown,
        }
    }

    pub fn bucket_mut(&mut self, category: Category) -> &mut Vec<ConversationEntity> {
        match category {
            Category::Users => &mut self.users,
            Category::BasicGroups => &mut self.basic_groups,
            Category::Supergroups => &mut self.supergroups,
            Category::Channels => &mut self.channels,
            Category::Unknown => &mut self.unknown,
        }
    }

    /// Basic groups followed by supergroups.
    pub fn groups(&self) -> Vec<&ConversationEntity> {
        self.basic_groups.iter().chain(&self.supergroups).collect()
    }

    pub fn total(&self) -> usize {
        self.users.len()
            + self.basic_groups.len()
            + self.supergroups.len()
            + self.channels.len()
            + self.unknown.len()
    }

    pub fn stats(&self) -> CategoryStats {
        CategoryStats {
            groups: self.basic_groups.len() + self.supergroups.len(),
            supergroups: self.supergroups.len(),
            basic_groups: self.basic_groups.len(),
            channels: self.channels.len(),
            users: self.users.len(),
            unknown: self.unknown.len(),
            total: self.total(),
        }
    }

    /// All entities, in bucket order.
    pub fn iter(&self) -> impl Iterator<Item = &ConversationEntity> {
        self.users
            .iter()
            .chain(&self.basic_groups)
            .chain(&self.supergroups)
            .chain(&self.channels)
            .chain(&self.unknown)
    }

    /// Bucket currently holding `id`, if any.
    pub fn locate(&self, id: i64) -> Option<Category> {
        [
            Category::Users,
            Category::BasicGroups,
            Category::Supergroups,
            Category::Channels,
            Category::Unknown,
        ]
        .into_iter()
        .find(|c| self.bucket(*c).iter().any(|e| e.id() == id))
    }
}

/// Everything that can be exported or bulk-deleted by name: a category,
/// the derived `groups`, an analysis bucket, or the combined `spam` list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExportCategory {
    Groups,
    Category(Category),
    Analysis(super::analysis::SpamBucket),
    /// deleted + no_messages + scam + fake
    Spam,
}

impl ExportCategory {
    pub const ALL: [ExportCategory; 14] = {
        use super::analysis::SpamBucket as B;
        [
            ExportCategory::Groups,
            ExportCategory::Category(Category::Supergroups),
            ExportCategory::Category(Category::BasicGroups),
            ExportCategory::Category(Category::Channels),
            ExportCategory::Category(Category::Users),
            ExportCategory::Category(Category::Unknown),
            ExportCategory::Analysis(B::Deleted),
            ExportCategory::Analysis(B::Bots),
            ExportCategory::Analysis(B::Scam),
            ExportCategory::Analysis(B::Fake),
            ExportCategory::Analysis(B::NoMessages),
            ExportCategory::Analysis(B::OnlyIncoming),
            ExportCategory::Analysis(B::Active),
            ExportCategory::Spam,
        ]
    };

    pub fn name(self) -> &'static str {
        match self {
            ExportCategory::Groups => "groups",
            ExportCategory::Category(c) => match c {
                Category::Users => "users",
                Category::BasicGroups => "basic_groups",
                Category::Supergroups => "supergroups",
                Category::Channels => "channels",
                Category::Unknown => "unknown",
            },
            ExportCategory::Analysis(b) => b.name(),
            ExportCategory::Spam => "spam",
        }
    }

    /// Needs a spam analysis before it can be resolved.
    pub fn needs_analysis(self) -> bool {
        matches!(self, ExportCategory::Analysis(_) | ExportCategory::Spam)
    }
}

impl fmt::Display for ExportCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ExportCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.name() == s)
            .ok_or_else(|| format!("unknown category '{}'", s))
    }
}
