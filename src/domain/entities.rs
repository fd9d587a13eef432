//! Domain entities. Pure data structures for the core business.
//!
//! No Telegram/IO types here — these are mapped from adapters.

use serde::{Deserialize, Serialize};

/// A single dialog as seen by the account: a person, a group or a channel.
///
/// Each variant only carries the attributes Telegram defines for it; the
/// risk flags exist on persons only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConversationEntity {
    Person {
        id: i64,
        display_name: String,
        username: Option<String>,
        deleted: bool,
        is_bot: bool,
        is_scam: bool,
        is_fake: bool,
        is_verified: bool,
    },
    BasicGroup {
        id: i64,
        title: String,
        member_count: Option<i32>,
    },
    BroadcastChannel {
        id: i64,
        title: String,
        username: Option<String>,
        member_count: Option<i32>,
        is_verified: bool,
    },
    Supergroup {
        id: i64,
        title: String,
        username: Option<String>,
        member_count: Option<i32>,
        is_verified: bool,
    },
    Unknown {
        id: i64,
        display_name: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Person,
    BasicGroup,
    BroadcastChannel,
    Supergroup,
    Unknown,
}

impl EntityKind {
    /// Short type label used in listings and exports (`user`, `group`, ...).
    pub fn label(self) -> &'static str {
        match self {
            EntityKind::Person => "user",
            EntityKind::BasicGroup => "group",
            EntityKind::BroadcastChannel => "channel",
            EntityKind::Supergroup => "supergroup",
            EntityKind::Unknown => "unknown",
        }
    }
}

impl ConversationEntity {
    pub fn id(&self) -> i64 {
        match self {
            ConversationEntity::Person { id, .. }
            | ConversationEntity::BasicGroup { id, .. }
            | ConversationEntity::BroadcastChannel { id, .. }
            | ConversationEntity::Supergroup { id, .. }
            | ConversationEntity::Unknown { id, .. } => *id,
        }
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            ConversationEntity::Person { .. } => EntityKind::Person,
            ConversationEntity::BasicGroup { .. } => EntityKind::BasicGroup,
            ConversationEntity::BroadcastChannel { .. } => EntityKind::BroadcastChannel,
            ConversationEntity::Supergroup { .. } => EntityKind::Supergroup,
            ConversationEntity::Unknown { .. } => EntityKind::Unknown,
        }
    }

    /// Person name or chat title.
    pub fn display_name(&self) -> &str {
        match self {
            ConversationEntity::Person { display_name, .. }
            | ConversationEntity::Unknown { display_name, .. } => display_name,
            ConversationEntity::BasicGroup { title, .. }
            | ConversationEntity::BroadcastChannel { title, .. }
            | ConversationEntity::Supergroup { title, .. } => title,
        }
    }

    pub fn username(&self) -> Option<&str> {
        match self {
            ConversationEntity::Person { username, .. }
            | ConversationEntity::BroadcastChannel { username, .. }
            | ConversationEntity::Supergroup { username, .. } => username.as_deref(),
            ConversationEntity::BasicGroup { .. } | ConversationEntity::Unknown { .. } => None,
        }
    }

    /// Participant count. Groups and channels only.
    pub fn member_count(&self) -> Option<i32> {
        match self {
            ConversationEntity::BasicGroup { member_count, .. }
            | ConversationEntity::BroadcastChannel { member_count, .. }
            | ConversationEntity::Supergroup { member_count, .. } => *member_count,
            ConversationEntity::Person { .. } | ConversationEntity::Unknown { .. } => None,
        }
    }

    pub fn is_person(&self) -> bool {
        matches!(self, ConversationEntity::Person { .. })
    }
}

/// A single message from a dialog. Only what the spam analyzer needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: i32,
    pub chat_id: i64,
    pub date: i64,
    pub text: String,
    /// Sent by the account owner.
    pub outgoing: bool,
}

/// Result of submitting a login code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignInResult {
    Success,
    /// 2FA enabled; `check_password` must follow.
    PasswordRequired { hint: Option<String> },
}

/// The logged-in account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountInfo {
    pub id: i64,
    pub username: Option<String>,
    pub phone: Option<String>,
    pub first_name: String,
}

/// Telegram API credentials plus the phone of the last authorized account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(deserialize_with = "de_api_id")]
    pub api_id: i32,
    pub api_hash: String,
    #[serde(default)]
    pub phone: Option<String>,
}

/// Credential files written by hand (or by older tools) keep `api_id` as a string.
fn de_api_id<'de, D>(deserializer: D) -> Result<i32, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumOrStr {
        Num(i32),
        Str(String),
    }

    match NumOrStr::deserialize(deserializer)? {
        NumOrStr::Num(n) => Ok(n),
        NumOrStr::Str(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}
