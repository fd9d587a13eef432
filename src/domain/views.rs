//! What the user currently sees: the last classification and, if run, the last analysis.
//!
//! Optimistic deletes take entities out of here and put them back on undo or failure.

use super::analysis::{SpamAnalysis, SpamBucket};
use super::categories::{Category, CategorySet};
use super::entities::ConversationEntity;
use serde::Serialize;

/// Every view an entity was removed from. Restoring puts it back into all of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Origin {
    pub category: Option<Category>,
    pub spam_bucket: Option<SpamBucket>,
}

#[derive(Debug, Clone, Default)]
pub struct ChatViews {
    pub categories: CategorySet,
    pub analysis: Option<SpamAnalysis>,
}

impl ChatViews {
    pub fn new(categories: CategorySet) -> Self {
        Self {
            categories,
            analysis: None,
        }
    }

    pub fn find(&self, id: i64) -> Option<&ConversationEntity> {
        self.categories.iter().find(|e| e.id() == id).or_else(|| {
            self.analysis.as_ref().and_then(|a| {
                SpamBucket::ALL
                    .iter()
                    .flat_map(|b| a.bucket(*b))
                    .find(|e| e.id() == id)
            })
        })
    }

    /// Remove `id` from every view holding it. `None` when no view has it.
    pub fn take(&mut self, id: i64) -> Option<(ConversationEntity, Origin)> {
        let mut snapshot = None;

        let category = self.categories.locate(id);
        if let Some(c) = category {
            let bucket = self.categories.bucket_mut(c);
            if let Some(pos) = bucket.iter().position(|e| e.id() == id) {
                snapshot = Some(bucket.remove(pos));
            }
        }

        let mut spam_bucket = None;
        if let Some(analysis) = self.analysis.as_mut() {
            spam_bucket = analysis.locate(id);
            if let Some(b) = spam_bucket {
                let bucket = analysis.bucket_mut(b);
                if let Some(pos) = bucket.iter().position(|e| e.id() == id) {
                    let removed = bucket.remove(pos);
                    snapshot.get_or_insert(removed);
                }
            }
        }

        snapshot.map(|e| {
            (
                e,
                Origin {
                    category,
                    spam_bucket,
                },
            )
        })
    }

    /// Put a snapshot back. Skips views that were replaced by a refresh
    /// (no analysis any more) and never duplicates an id already present.
    pub fn restore(&mut self, entity: ConversationEntity, origin: Origin) {
        let id = entity.id();
        if let Some(c) = origin.category {
            if self.categories.locate(id).is_none() {
                self.categories.bucket_mut(c).push(entity.clone());
            }
        }
        if let (Some(b), Some(analysis)) = (origin.spam_bucket, self.analysis.as_mut()) {
            if analysis.locate(id).is_none() {
                analysis.bucket_mut(b).push(entity);
            }
        }
    }
}
