//! In-memory conversation source for demo mode and tests.
//!
//! Dialogs, message histories and delete responses are scripted up front;
//! every call is counted so tests can assert on what the core did.

use crate::domain::{ConversationEntity, DomainError, Message};
use crate::ports::ConversationSource;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::info;

type DeleteHook = Box<dyn Fn(i64) + Send + Sync>;

/// Mock conversation source.
///
/// Deleting a dialog removes it from later listings unless a scripted
/// failure is queued for that id.
#[derive(Default)]
pub struct MockConversationSource {
    dialogs: Mutex<Vec<ConversationEntity>>,
    histories: Mutex<HashMap<i64, Vec<Message>>>,
    failing_probes: Mutex<HashSet<i64>>,
    delete_script: Mutex<HashMap<i64, VecDeque<Result<(), DomainError>>>>,
    probe_calls: Mutex<Vec<i64>>,
    delete_calls: Mutex<Vec<i64>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    on_delete: Mutex<Option<DeleteHook>>,
    /// Simulated network latency.
    delay_ms: u64,
}

impl MockConversationSource {
    pub fn new(dialogs: Vec<ConversationEntity>) -> Self {
        Self {
            dialogs: Mutex::new(dialogs),
            ..Default::default()
        }
    }

    /// Same as `new`, with simulated latency on every call.
    pub fn with_delay(dialogs: Vec<ConversationEntity>, delay_ms: u64) -> Self {
        Self {
            dialogs: Mutex::new(dialogs),
            delay_ms,
            ..Default::default()
        }
    }

    /// A small account with one of everything, used by `TG_SWEEP_DEMO`.
    pub fn demo() -> Self {
        let person = |id: i64, name: &str, deleted, is_bot, is_scam, is_fake| {
            ConversationEntity::Person {
                id,
                display_name: name.to_string(),
                username: None,
                deleted,
                is_bot,
                is_scam,
                is_fake,
                is_verified: false,
            }
        };
        let source = Self::with_delay(
            vec![
                person(101, "Alice", false, false, false, false),
                person(102, "Deleted Account", true, false, false, false),
                person(103, "Helper Bot", false, true, false, false),
                person(104, "Crypto Giveaway", false, false, true, false),
                person(105, "Bob", false, false, false, false),
                person(106, "Stranger", false, false, false, false),
                ConversationEntity::BasicGroup {
                    id: -201,
                    title: "Family".into(),
                    member_count: Some(6),
                },
                ConversationEntity::Supergroup {
                    id: -1001301,
                    title: "Rust Users".into(),
                    username: Some("rustusers".into()),
                    member_count: Some(15000),
                    is_verified: false,
                },
                ConversationEntity::BroadcastChannel {
                    id: -1001401,
                    title: "Daily News".into(),
                    username: Some("dailynews".into()),
                    member_count: Some(250000),
                    is_verified: true,
                },
            ],
            50,
        );
        source.set_history(101, vec![msg(101, 1, true), msg(101, 2, false)]);
        source.set_history(105, vec![msg(105, 1, false)]);
        source
    }

    pub fn set_history(&self, entity_id: i64, messages: Vec<Message>) {
        lock(&self.histories).insert(entity_id, messages);
    }

    /// Make `get_recent_messages` fail for `entity_id`.
    pub fn fail_probe(&self, entity_id: i64) {
        lock(&self.failing_probes).insert(entity_id);
    }

    /// Queue a response for the next `delete_dialog(entity_id)` call.
    pub fn script_delete(&self, entity_id: i64, response: Result<(), DomainError>) {
        lock(&self.delete_script)
            .entry(entity_id)
            .or_default()
            .push_back(response);
    }

    /// Called with the id after every delete attempt (successful or not).
    pub fn on_delete(&self, hook: impl Fn(i64) + Send + Sync + 'static) {
        *lock(&self.on_delete) = Some(Box::new(hook));
    }

    pub fn probe_calls(&self) -> Vec<i64> {
        lock(&self.probe_calls).clone()
    }

    pub fn delete_calls(&self) -> Vec<i64> {
        lock(&self.delete_calls).clone()
    }

    /// Highest number of calls that were running at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn contains(&self, entity_id: i64) -> bool {
        lock(&self.dialogs).iter().any(|e| e.id() == entity_id)
    }

    async fn simulate_call(&self) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if self.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl ConversationSource for MockConversationSource {
    async fn list_dialogs(&self) -> Result<Vec<ConversationEntity>, DomainError> {
        self.simulate_call().await;
        let dialogs = lock(&self.dialogs).clone();
        info!(count = dialogs.len(), "[MOCK] listed dialogs");
        Ok(dialogs)
    }

    async fn get_recent_messages(
        &self,
        entity_id: i64,
        limit: usize,
    ) -> Result<Vec<Message>, DomainError> {
        lock(&self.probe_calls).push(entity_id);
        self.simulate_call().await;
        if lock(&self.failing_probes).contains(&entity_id) {
            return Err(DomainError::Upstream(format!(
                "[MOCK] history unavailable for {}",
                entity_id
            )));
        }
        Ok(lock(&self.histories)
            .get(&entity_id)
            .map(|h| h.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn delete_dialog(&self, entity_id: i64) -> Result<(), DomainError> {
        lock(&self.delete_calls).push(entity_id);
        self.simulate_call().await;
        let scripted = lock(&self.delete_script)
            .get_mut(&entity_id)
            .and_then(VecDeque::pop_front);
        let result = match scripted {
            Some(r) => r,
            None => {
                let mut dialogs = lock(&self.dialogs);
                match dialogs.iter().position(|e| e.id() == entity_id) {
                    Some(pos) => {
                        dialogs.remove(pos);
                        Ok(())
                    }
                    None => Err(DomainError::NotFound(entity_id)),
                }
            }
        };
        if let Some(hook) = lock(&self.on_delete).as_ref() {
            hook(entity_id);
        }
        result
    }
}

fn msg(chat_id: i64, id: i32, outgoing: bool) -> Message {
    Message {
        id,
        chat_id,
        date: 1_704_067_200 + i64::from(id),
        text: format!("message {}", id),
        outgoing,
    }
}

/// The mock never holds a lock across an await, so poisoning only follows a test panic.
fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}
