//! Flat record used for listings and exports.

use super::entities::ConversationEntity;
use serde::{Deserialize, Serialize};

/// One row per dialog. Flags that don't apply to the kind are `false`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRecord {
    pub id: i64,
    #[serde(rename = "type")]
    pub chat_type: String,
    pub title: String,
    pub username: Option<String>,
    pub members: Option<i32>,
    #[serde(default)]
    pub is_deleted: bool,
    #[serde(default)]
    pub is_bot: bool,
    #[serde(default)]
    pub is_scam: bool,
    #[serde(default)]
    pub is_fake: bool,
    #[serde(default)]
    pub is_verified: bool,
}

impl From<&ConversationEntity> for ChatRecord {
    fn from(entity: &ConversationEntity) -> Self {
        let mut record = ChatRecord {
            id: entity.id(),
            chat_type: entity.kind().label().to_string(),
            title: entity.display_name().to_string(),
            username: entity.username().map(String::from),
            members: entity.member_count(),
            is_deleted: false,
            is_bot: false,
            is_scam: false,
            is_fake: false,
            is_verified: false,
        };
        match entity {
            ConversationEntity::Person {
                deleted,
                is_bot,
                is_scam,
                is_fake,
                is_verified,
                ..
            } => {
                record.is_deleted = *deleted;
                record.is_bot = *is_bot;
                record.is_scam = *is_scam;
                record.is_fake = *is_fake;
                record.is_verified = *is_verified;
            }
            ConversationEntity::BroadcastChannel { is_verified, .. }
            | ConversationEntity::Supergroup { is_verified, .. } => {
                record.is_verified = *is_verified;
            }
            ConversationEntity::BasicGroup { .. } | ConversationEntity::Unknown { .. } => {}
        }
        record
    }
}
