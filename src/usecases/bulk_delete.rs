//! Optimistic deletes with undo.
//!
//! Scheduling a delete takes the chat out of the views right away and arms a
//! timer. Until the timer fires the delete can be undone and nothing has been
//! sent to Telegram. When it fires the delete is committed through the source;
//! a flood wait gets exactly one retry after the signalled delay, any other
//! failure puts the chat back where it was.
//!
//! A batch shares one timer and one "undo all". Its items are committed one at
//! a time; cancelling a running batch stops before the next item and restores
//! whatever was not attempted yet.

use crate::domain::{ChatViews, ConversationEntity, DomainError, Origin};
use crate::ports::ConversationSource;
use crate::usecases::session_manager::SourceProvider;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, RwLock, oneshot};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub const DEFAULT_UNDO_DELAY: Duration = Duration::from_secs(10);

/// Failure notices kept for the UI to pick up.
const MAX_FAILURE_NOTICES: usize = 50;

/// Finished batch reports kept for `batch_report`; the oldest batch goes first.
const MAX_BATCH_REPORTS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteState {
    /// Timer running; undo still possible.
    Armed,
    /// Delete request in flight.
    Committing,
    /// Flood wait; sleeping before the single retry.
    Retrying,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DeleteOutcome {
    Committed,
    /// The dialog was already gone at commit time. Same end state as `Committed`.
    NotFound { id: i64 },
    Undone,
    /// Batch cancelled before this item was sent; restored.
    Cancelled,
    /// Restored after the delete failed.
    DeleteFailed { reason: String },
}

impl DeleteOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, DeleteOutcome::Committed | DeleteOutcome::NotFound { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemOutcome {
    pub id: i64,
    pub title: String,
    #[serde(flatten)]
    pub outcome: DeleteOutcome,
}

/// Result of a batch. `failed` items were restored after a failed delete;
/// `rolled_back` items were restored without being sent (undo or cancel).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub batch_id: u64,
    pub committed: usize,
    pub failed: usize,
    pub rolled_back: usize,
    pub items: Vec<ItemOutcome>,
}

impl BatchReport {
    fn new(batch_id: u64) -> Self {
        Self {
            batch_id,
            ..Default::default()
        }
    }

    fn record(&mut self, id: i64, title: String, outcome: DeleteOutcome) {
        match &outcome {
            DeleteOutcome::Committed | DeleteOutcome::NotFound { .. } => self.committed += 1,
            DeleteOutcome::DeleteFailed { .. } => self.failed += 1,
            DeleteOutcome::Undone | DeleteOutcome::Cancelled => self.rolled_back += 1,
        }
        self.items.push(ItemOutcome { id, title, outcome });
    }

    fn merge(&mut self, items: Vec<ItemOutcome>) {
        for item in items {
            self.record(item.id, item.title, item.outcome);
        }
    }

    /// Human-readable failure lines (`'title': reason`).
    pub fn errors(&self) -> Vec<String> {
        self.items
            .iter()
            .filter_map(|i| match &i.outcome {
                DeleteOutcome::DeleteFailed { reason } => Some(format!("'{}': {}", i.title, reason)),
                _ => None,
            })
            .collect()
    }
}

/// One scheduled delete as shown to the UI.
#[derive(Debug, Clone, Serialize)]
pub struct PendingSummary {
    pub id: i64,
    pub title: String,
    pub state: DeleteState,
    pub batch_id: Option<u64>,
    pub origin: Origin,
    pub remaining_secs: u64,
}

/// A commit that failed and was rolled back.
#[derive(Debug, Clone, Serialize)]
pub struct FailureNotice {
    pub id: i64,
    pub title: String,
    pub reason: String,
}

struct PendingDelete {
    snapshot: ConversationEntity,
    origin: Origin,
    scheduled_commit_at: Instant,
    state: DeleteState,
    batch: Option<u64>,
    /// Timer token; shared by all items of a batch.
    cancel: CancellationToken,
    outcome_tx: Option<oneshot::Sender<DeleteOutcome>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BatchState {
    Armed,
    Committing,
}

struct Batch {
    ids: Vec<i64>,
    state: BatchState,
    timer: CancellationToken,
    stop: CancellationToken,
    report_tx: Option<oneshot::Sender<BatchReport>>,
    /// Items settled outside the commit loop (single undo, shutdown).
    resolved: Vec<ItemOutcome>,
}

#[derive(Default)]
struct Inner {
    pending: HashMap<i64, PendingDelete>,
    batches: HashMap<u64, Batch>,
    reports: HashMap<u64, BatchReport>,
    failures: Vec<FailureNotice>,
}

impl Inner {
    fn keep_report(&mut self, report: BatchReport) {
        self.reports.insert(report.batch_id, report);
        if self.reports.len() > MAX_BATCH_REPORTS {
            // batch ids only grow
            if let Some(oldest) = self.reports.keys().min().copied() {
                self.reports.remove(&oldest);
            }
        }
    }
}

/// Returned by [`BulkDeleteCoordinator::schedule`].
pub struct PendingHandle {
    pub entity_id: i64,
    outcome: oneshot::Receiver<DeleteOutcome>,
}

impl PendingHandle {
    /// Wait for the final outcome (commit, undo or rollback).
    pub async fn outcome(self) -> DeleteOutcome {
        self.outcome.await.unwrap_or(DeleteOutcome::Cancelled)
    }
}

/// Returned by [`BulkDeleteCoordinator::schedule_batch`].
pub struct BatchHandle {
    pub batch_id: u64,
    pub scheduled: Vec<i64>,
    /// Requested ids that were not in any view or already pending.
    pub skipped: Vec<i64>,
    stop: CancellationToken,
    report: oneshot::Receiver<BatchReport>,
}

impl BatchHandle {
    /// Token that stops a running commit before its next item.
    pub fn stop_token(&self) -> CancellationToken {
        self.stop.clone()
    }

    pub async fn report(self) -> BatchReport {
        let batch_id = self.batch_id;
        self.report
            .await
            .unwrap_or_else(|_| BatchReport::new(batch_id))
    }
}

/// Owns every pending delete of the session. The only writer of these records.
pub struct BulkDeleteCoordinator {
    provider: Arc<dyn SourceProvider>,
    views: Arc<RwLock<ChatViews>>,
    delay: Duration,
    inner: Mutex<Inner>,
    next_batch: AtomicU64,
}

impl BulkDeleteCoordinator {
    pub fn new(
        provider: Arc<dyn SourceProvider>,
        views: Arc<RwLock<ChatViews>>,
        delay: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            provider,
            views,
            delay,
            inner: Mutex::new(Inner::default()),
            next_batch: AtomicU64::new(1),
        })
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Hide `id` from the views and arm its commit timer.
    ///
    /// # Errors
    /// `AlreadyPending` if a delete is already scheduled, `NotFound` if no view holds the chat.
    pub async fn schedule(self: &Arc<Self>, id: i64) -> Result<PendingHandle, DomainError> {
        let (tx, rx) = oneshot::channel();
        let cancel = CancellationToken::new();
        {
            let mut inner = self.inner.lock().await;
            if inner.pending.contains_key(&id) {
                return Err(DomainError::AlreadyPending(id));
            }
            let (snapshot, origin) = self
                .views
                .write()
                .await
                .take(id)
                .ok_or(DomainError::NotFound(id))?;
            info!(id, title = snapshot.display_name(), delay_secs = self.delay.as_secs(), "delete scheduled");
            inner.pending.insert(
                id,
                PendingDelete {
                    snapshot,
                    origin,
                    scheduled_commit_at: Instant::now() + self.delay,
                    state: DeleteState::Armed,
                    batch: None,
                    cancel: cancel.clone(),
                    outcome_tx: Some(tx),
                },
            );
        }

        let this = Arc::clone(self);
        let delay = self.delay;
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    this.fire_single(id).await;
                }
            }
        });

        Ok(PendingHandle {
            entity_id: id,
            outcome: rx,
        })
    }

    /// Schedule several deletes under one timer. Ids that can't be scheduled are skipped.
    ///
    /// # Errors
    /// `InvalidRequest` when none of the ids could be scheduled.
    pub async fn schedule_batch(self: &Arc<Self>, ids: &[i64]) -> Result<BatchHandle, DomainError> {
        let batch_id = self.next_batch.fetch_add(1, Ordering::SeqCst);
        let timer = CancellationToken::new();
        let stop = CancellationToken::new();
        let (report_tx, report_rx) = oneshot::channel();
        let mut scheduled = Vec::new();
        let mut skipped = Vec::new();

        {
            let mut inner = self.inner.lock().await;
            let mut views = self.views.write().await;
            let commit_at = Instant::now() + self.delay;
            for &id in ids {
                if inner.pending.contains_key(&id) || scheduled.contains(&id) {
                    skipped.push(id);
                    continue;
                }
                let Some((snapshot, origin)) = views.take(id) else {
                    skipped.push(id);
                    continue;
                };
                inner.pending.insert(
                    id,
                    PendingDelete {
                        snapshot,
                        origin,
                        scheduled_commit_at: commit_at,
                        state: DeleteState::Armed,
                        batch: Some(batch_id),
                        cancel: timer.clone(),
                        outcome_tx: None,
                    },
                );
                scheduled.push(id);
            }
            if scheduled.is_empty() {
                return Err(DomainError::InvalidRequest(
                    "none of the selected chats can be deleted".into(),
                ));
            }
            inner.batches.insert(
                batch_id,
                Batch {
                    ids: scheduled.clone(),
                    state: BatchState::Armed,
                    timer: timer.clone(),
                    stop: stop.clone(),
                    report_tx: Some(report_tx),
                    resolved: Vec::new(),
                },
            );
        }
        info!(batch_id, count = scheduled.len(), skipped = skipped.len(), "batch delete scheduled");

        let this = Arc::clone(self);
        let delay = self.delay;
        tokio::spawn(async move {
            tokio::select! {
                _ = timer.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    this.commit_batch(batch_id).await;
                }
            }
        });

        Ok(BatchHandle {
            batch_id,
            scheduled,
            skipped,
            stop,
            report: report_rx,
        })
    }

    /// Cancel a delete that has not been sent yet and restore the chat.
    /// Returns `false` (and does nothing) once the commit has started or finished.
    pub async fn undo(&self, id: i64) -> bool {
        let mut inner = self.inner.lock().await;
        let armed = inner
            .pending
            .get(&id)
            .is_some_and(|r| r.state == DeleteState::Armed);
        if !armed {
            debug!(id, "undo ignored: nothing armed");
            return false;
        }
        let Some(mut record) = inner.pending.remove(&id) else {
            return false;
        };
        match record.batch {
            Some(batch_id) => {
                let title = record.snapshot.display_name().to_string();
                let now_empty = inner.batches.get_mut(&batch_id).is_some_and(|b| {
                    b.ids.retain(|i| *i != id);
                    b.resolved.push(ItemOutcome {
                        id,
                        title,
                        outcome: DeleteOutcome::Undone,
                    });
                    b.ids.is_empty()
                });
                if now_empty {
                    if let Some(mut batch) = inner.batches.remove(&batch_id) {
                        batch.timer.cancel();
                        let mut report = BatchReport::new(batch_id);
                        report.merge(std::mem::take(&mut batch.resolved));
                        if let Some(tx) = batch.report_tx.take() {
                            let _ = tx.send(report.clone());
                        }
                        inner.keep_report(report);
                    }
                }
            }
            None => record.cancel.cancel(),
        }
        info!(id, "delete undone");
        self.views.write().await.restore(record.snapshot, record.origin);
        if let Some(tx) = record.outcome_tx.take() {
            let _ = tx.send(DeleteOutcome::Undone);
        }
        true
    }

    /// "Undo all" for a batch whose timer has not fired yet.
    pub async fn undo_batch(&self, batch_id: u64) -> bool {
        let mut inner = self.inner.lock().await;
        if !inner
            .batches
            .get(&batch_id)
            .is_some_and(|b| b.state == BatchState::Armed)
        {
            return false;
        }
        let Some(mut batch) = inner.batches.remove(&batch_id) else {
            return false;
        };
        batch.timer.cancel();

        let mut report = BatchReport::new(batch_id);
        let mut views = self.views.write().await;
        for id in &batch.ids {
            if let Some(record) = inner.pending.remove(id) {
                report.record(*id, record.snapshot.display_name().to_string(), DeleteOutcome::Undone);
                views.restore(record.snapshot, record.origin);
            }
        }
        drop(views);
        report.merge(std::mem::take(&mut batch.resolved));
        info!(batch_id, restored = report.rolled_back, "batch undone");
        if let Some(tx) = batch.report_tx.take() {
            let _ = tx.send(report.clone());
        }
        inner.keep_report(report);
        true
    }

    /// Stop a batch. Before its timer fires this is "undo all"; during the
    /// commit it stops before the next item. `false` if the batch is finished or unknown.
    pub async fn cancel_batch(&self, batch_id: u64) -> bool {
        let state = {
            let inner = self.inner.lock().await;
            inner.batches.get(&batch_id).map(|b| (b.state, b.stop.clone()))
        };
        match state {
            Some((BatchState::Armed, _)) => self.undo_batch(batch_id).await,
            Some((BatchState::Committing, stop)) => {
                info!(batch_id, "batch cancel requested");
                stop.cancel();
                true
            }
            None => false,
        }
    }

    /// Install a fresh listing. Chats with a pending delete stay hidden.
    pub async fn replace_views(&self, mut fresh: ChatViews) {
        let inner = self.inner.lock().await;
        for id in inner.pending.keys() {
            fresh.take(*id);
        }
        *self.views.write().await = fresh;
    }

    /// Report of a finished (or undone) batch. Only the most recent batches are kept.
    pub async fn batch_report(&self, batch_id: u64) -> Option<BatchReport> {
        self.inner.lock().await.reports.get(&batch_id).cloned()
    }

    /// True while the batch is armed or committing.
    pub async fn batch_running(&self, batch_id: u64) -> bool {
        self.inner.lock().await.batches.contains_key(&batch_id)
    }

    pub async fn pending(&self) -> Vec<PendingSummary> {
        let inner = self.inner.lock().await;
        let now = Instant::now();
        let mut out: Vec<PendingSummary> = inner
            .pending
            .iter()
            .map(|(id, r)| PendingSummary {
                id: *id,
                title: r.snapshot.display_name().to_string(),
                state: r.state,
                batch_id: r.batch,
                origin: r.origin,
                remaining_secs: r.scheduled_commit_at.saturating_duration_since(now).as_secs(),
            })
            .collect();
        out.sort_by_key(|p| p.id);
        out
    }

    /// Failures since the last call.
    pub async fn take_failures(&self) -> Vec<FailureNotice> {
        std::mem::take(&mut self.inner.lock().await.failures)
    }

    /// Disarm everything not yet sent and stop running batches. Nothing survives a restart,
    /// so this is what logout and shutdown call.
    pub async fn shutdown(&self) {
        let mut inner = self.inner.lock().await;
        for batch in inner.batches.values() {
            batch.timer.cancel();
            batch.stop.cancel();
        }
        // Armed batches never reach commit_batch, so report them here.
        let armed_batches: Vec<u64> = inner
            .batches
            .iter()
            .filter(|(_, b)| b.state == BatchState::Armed)
            .map(|(id, _)| *id)
            .collect();
        for batch_id in armed_batches {
            let Some(mut batch) = inner.batches.remove(&batch_id) else {
                continue;
            };
            let mut report = BatchReport::new(batch_id);
            for id in &batch.ids {
                if let Some(record) = inner.pending.get(id) {
                    report.record(*id, record.snapshot.display_name().to_string(), DeleteOutcome::Cancelled);
                }
            }
            report.merge(std::mem::take(&mut batch.resolved));
            if let Some(tx) = batch.report_tx.take() {
                let _ = tx.send(report.clone());
            }
            inner.keep_report(report);
        }
        let armed: Vec<i64> = inner
            .pending
            .iter()
            .filter(|(_, r)| r.state == DeleteState::Armed)
            .map(|(id, _)| *id)
            .collect();
        let mut views = self.views.write().await;
        for id in &armed {
            if let Some(mut record) = inner.pending.remove(id) {
                record.cancel.cancel();
                if let Some(tx) = record.outcome_tx.take() {
                    let _ = tx.send(DeleteOutcome::Cancelled);
                }
                // Not yet reached by a running batch; its report picks this up.
                if let Some(batch_id) = record.batch {
                    if let Some(batch) = inner.batches.get_mut(&batch_id) {
                        batch.resolved.push(ItemOutcome {
                            id: *id,
                            title: record.snapshot.display_name().to_string(),
                            outcome: DeleteOutcome::Cancelled,
                        });
                    }
                }
                views.restore(record.snapshot, record.origin);
            }
        }
        if !armed.is_empty() {
            info!(count = armed.len(), "pending deletes disarmed");
        }
    }

    async fn fire_single(self: &Arc<Self>, id: i64) {
        {
            let mut inner = self.inner.lock().await;
            match inner.pending.get_mut(&id) {
                Some(r) if r.state == DeleteState::Armed && r.batch.is_none() => {
                    r.state = DeleteState::Committing;
                }
                _ => return,
            }
        }
        self.commit_one(id).await;
    }

    async fn commit_batch(self: &Arc<Self>, batch_id: u64) {
        let (ids, stop) = {
            let mut inner = self.inner.lock().await;
            match inner.batches.get_mut(&batch_id) {
                Some(b) if b.state == BatchState::Armed => {
                    b.state = BatchState::Committing;
                    (b.ids.clone(), b.stop.clone())
                }
                _ => return,
            }
        };
        info!(batch_id, count = ids.len(), "committing batch");

        let mut report = BatchReport::new(batch_id);
        for id in ids {
            if stop.is_cancelled() {
                if let Some((title, outcome)) = self.finish(id, DeleteOutcome::Cancelled).await {
                    report.record(id, title, outcome);
                }
                continue;
            }
            let title = {
                let mut inner = self.inner.lock().await;
                match inner.pending.get_mut(&id) {
                    Some(r) if r.state == DeleteState::Armed => {
                        r.state = DeleteState::Committing;
                        r.snapshot.display_name().to_string()
                    }
                    // undone individually
                    _ => continue,
                }
            };
            let outcome = self.commit_one(id).await;
            report.record(id, title, outcome);
        }

        let mut inner = self.inner.lock().await;
        let report_tx = inner.batches.remove(&batch_id).and_then(|mut batch| {
            report.merge(std::mem::take(&mut batch.resolved));
            batch.report_tx.take()
        });
        info!(
            batch_id,
            committed = report.committed,
            failed = report.failed,
            rolled_back = report.rolled_back,
            "batch finished"
        );
        if let Some(tx) = report_tx {
            let _ = tx.send(report.clone());
        }
        inner.keep_report(report);
    }

    /// Send the delete for a record already marked `Committing`.
    async fn commit_one(&self, id: i64) -> DeleteOutcome {
        let source: Arc<dyn ConversationSource> = match self.provider.source().await {
            Ok(s) => s,
            Err(e) => {
                return self
                    .finish_outcome(id, DeleteOutcome::DeleteFailed { reason: e.to_string() })
                    .await;
            }
        };

        let mut retried = false;
        let outcome = loop {
            match source.delete_dialog(id).await {
                Ok(()) => break DeleteOutcome::Committed,
                Err(DomainError::NotFound(_)) => break DeleteOutcome::NotFound { id },
                Err(DomainError::RateLimited { retry_after_secs }) if !retried => {
                    retried = true;
                    warn!(id, retry_after_secs, "delete rate limited, retrying once");
                    self.set_state(id, DeleteState::Retrying).await;
                    tokio::time::sleep(Duration::from_secs(retry_after_secs)).await;
                    self.set_state(id, DeleteState::Committing).await;
                }
                Err(DomainError::RateLimited { retry_after_secs }) => {
                    break DeleteOutcome::DeleteFailed {
                        reason: format!(
                            "still rate limited after retry; wait {} seconds and try again",
                            retry_after_secs
                        ),
                    };
                }
                Err(e) => break DeleteOutcome::DeleteFailed { reason: e.to_string() },
            }
        };
        self.finish_outcome(id, outcome).await
    }

    async fn finish_outcome(&self, id: i64, outcome: DeleteOutcome) -> DeleteOutcome {
        self.finish(id, outcome.clone())
            .await
            .map(|(_, o)| o)
            .unwrap_or(outcome)
    }

    /// Drop the record; restore the snapshot unless the delete went through.
    async fn finish(&self, id: i64, outcome: DeleteOutcome) -> Option<(String, DeleteOutcome)> {
        let mut inner = self.inner.lock().await;
        let mut record = inner.pending.remove(&id)?;
        let title = record.snapshot.display_name().to_string();

        if outcome.is_committed() {
            // A listing installed while the delete was in flight may still hold it.
            self.views.write().await.take(id);
            info!(id, title = %title, "delete committed");
        } else {
            if let DeleteOutcome::DeleteFailed { reason } = &outcome {
                warn!(id, title = %title, reason = %reason, "delete failed, restoring chat");
                inner.failures.push(FailureNotice {
                    id,
                    title: title.clone(),
                    reason: reason.clone(),
                });
                if inner.failures.len() > MAX_FAILURE_NOTICES {
                    inner.failures.remove(0);
                }
            }
            self.views.write().await.restore(record.snapshot, record.origin);
        }
        if let Some(tx) = record.outcome_tx.take() {
            let _ = tx.send(outcome.clone());
        }
        Some((title, outcome))
    }

    async fn set_state(&self, id: i64, state: DeleteState) {
        if let Some(r) = self.inner.lock().await.pending.get_mut(&id) {
            r.state = state;
        }
    }
}
