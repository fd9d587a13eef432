//! Map grammers types to domain entities.
//!
//! Dialog peers become `ConversationEntity`; raw history messages become `Message`.

use crate::domain::{ConversationEntity, DomainError, Message};
use grammers_client::InvocationError;
use grammers_client::peer::Peer;
use grammers_client::tl;

/// RPC errors meaning the dialog no longer exists for this account.
const GONE_ERRORS: [&str; 6] = [
    "PEER_ID_INVALID",
    "CHANNEL_INVALID",
    "CHANNEL_PRIVATE",
    "CHAT_ID_INVALID",
    "USER_ID_INVALID",
    "INPUT_USER_DEACTIVATED",
];

/// Map a dialog peer to the domain entity.
///
/// * `Peer::User` → Person, with the account flags.
/// * `Peer::Group` → Supergroup when megagroup, else BasicGroup.
/// * `Peer::Channel` → BroadcastChannel.
///
/// Member counts are not part of the dialog listing and stay `None`.
pub fn entity_from_peer(peer: &Peer) -> ConversationEntity {
    let id = peer.id().bot_api_dialog_id();
    let name = peer.name().map(String::from);
    let username = peer.username().map(String::from);
    match peer {
        Peer::User(u) => {
            let deleted = u.deleted();
            ConversationEntity::Person {
                id,
                display_name: name
                    .filter(|n| !n.trim().is_empty())
                    .unwrap_or_else(|| {
                        if deleted {
                            "Deleted Account".to_string()
                        } else {
                            "Unknown".to_string()
                        }
                    }),
                username,
                deleted,
                is_bot: u.is_bot(),
                is_scam: u.scam(),
                is_fake: u.fake(),
                is_verified: u.verified(),
            }
        }
        Peer::Group(g) => {
            let title = name.unwrap_or_else(|| id.to_string());
            if g.is_megagroup() {
                ConversationEntity::Supergroup {
                    id,
                    title,
                    username,
                    member_count: None,
                    is_verified: false,
                }
            } else {
                ConversationEntity::BasicGroup {
                    id,
                    title,
                    member_count: None,
                }
            }
        }
        Peer::Channel(_) => ConversationEntity::BroadcastChannel {
            id,
            title: name.unwrap_or_else(|| id.to_string()),
            username,
            member_count: None,
            is_verified: false,
        },
    }
}

/// Map a raw history message. Service messages ("joined Telegram", calls) count
/// as history too; empty placeholders are dropped.
pub fn message_from_raw(msg: &tl::enums::Message, chat_id: i64) -> Option<Message> {
    match msg {
        tl::enums::Message::Empty(_) => None,
        tl::enums::Message::Message(m) => Some(Message {
            id: m.id,
            chat_id,
            date: m.date as i64,
            text: m.message.clone(),
            outgoing: m.out,
        }),
        tl::enums::Message::Service(m) => Some(Message {
            id: m.id,
            chat_id,
            date: m.date as i64,
            text: String::new(),
            outgoing: m.out,
        }),
    }
}

/// Map a grammers invocation error. FloodWait (420) carries the wait in seconds.
pub fn map_invocation_error(err: InvocationError, chat_id: i64) -> DomainError {
    match err {
        InvocationError::Rpc(rpc) if rpc.code == 420 => DomainError::RateLimited {
            retry_after_secs: rpc.value.map(u64::from).unwrap_or(60),
        },
        InvocationError::Rpc(rpc) if GONE_ERRORS.contains(&rpc.name.as_str()) => {
            DomainError::NotFound(chat_id)
        }
        e => DomainError::Upstream(e.to_string()),
    }
}
