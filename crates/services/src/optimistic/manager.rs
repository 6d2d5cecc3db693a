use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::watch;
use tokio::time::sleep;
use uuid::Uuid;

use crate::error::OperationError;
use crate::optimistic::retry::{CancelToken, RetryPolicy};
use crate::optimistic::state::{SessionState, StatePatch};

/// Submits one patch to the backend; on success returns the server's own
/// follow-up patch (authoritative counters, corrected positions).
pub type SubmitFn = Arc<
    dyn Fn(StatePatch) -> Pin<Box<dyn Future<Output = Result<StatePatch, OperationError>> + Send>>
        + Send
        + Sync,
>;

/// Lifecycle of a pending update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateStatus {
    /// Submission in progress.
    Pending,
    /// A failed attempt is waiting out its backoff delay.
    Retrying,
    /// Waiting for connectivity.
    Queued,
    /// Retry budget exhausted; waiting for a recovery decision.
    Failed,
}

/// Result of a submission attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitStatus {
    Confirmed { retries: u32 },
    Queued,
    Failed,
    Reverted,
}

/// What the user can do about updates that could not be confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryAction {
    Retry { update_id: Uuid },
    Dismiss { update_id: Uuid },
    RevertAll,
}

/// One optimistic update: the patch shown to the user before the backend
/// confirmed it.
#[derive(Clone)]
pub struct OptimisticUpdate {
    id: Uuid,
    kind: String,
    patch: StatePatch,
    status: UpdateStatus,
    retry_count: u32,
    error_message: Option<String>,
    cancel: CancelToken,
}

impl OptimisticUpdate {
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    #[must_use]
    pub fn patch(&self) -> &StatePatch {
        &self.patch
    }

    #[must_use]
    pub fn status(&self) -> UpdateStatus {
        self.status
    }

    #[must_use]
    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }
}

/// Applies updates to the visible state immediately and reconciles them with
/// the backend in the background of the user's attention.
///
/// The confirmed state is the only thing ever mutated destructively; the
/// visible state is always `confirmed + pending patches in submission order`,
/// so reverting an update is just dropping its patch.
pub struct OptimisticManager {
    confirmed: SessionState,
    pending: Vec<OptimisticUpdate>,
    online: watch::Receiver<bool>,
    policy: RetryPolicy,
    submit_fn: SubmitFn,
}

impl OptimisticManager {
    #[must_use]
    pub fn new(
        confirmed: SessionState,
        online: watch::Receiver<bool>,
        submit_fn: SubmitFn,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            confirmed,
            pending: Vec::new(),
            online,
            policy,
            submit_fn,
        }
    }

    #[must_use]
    pub fn is_online(&self) -> bool {
        *self.online.borrow()
    }

    /// The state the user sees: confirmed state plus every pending patch.
    #[must_use]
    pub fn visible_state(&self) -> SessionState {
        let mut state = self.confirmed.clone();
        for update in &self.pending {
            state.apply(&update.patch);
        }
        state
    }

    /// The last backend-confirmed state.
    #[must_use]
    pub fn confirmed_state(&self) -> &SessionState {
        &self.confirmed
    }

    #[must_use]
    pub fn pending_updates(&self) -> &[OptimisticUpdate] {
        &self.pending
    }

    /// Apply `patch` to the visible state and reconcile with the backend.
    ///
    /// Offline, the update is queued for [`handle_reconnect`]. Online, the
    /// submission retries with exponential backoff until it is confirmed, the
    /// budget runs out, or `cancel` fires (which reverts the patch).
    ///
    /// [`handle_reconnect`]: OptimisticManager::handle_reconnect
    pub async fn submit(
        &mut self,
        kind: impl Into<String>,
        patch: StatePatch,
        cancel: CancelToken,
    ) -> (Uuid, SubmitStatus) {
        let id = Uuid::new_v4();
        self.pending.push(OptimisticUpdate {
            id,
            kind: kind.into(),
            patch,
            status: UpdateStatus::Pending,
            retry_count: 0,
            error_message: None,
            cancel,
        });

        if !self.is_online() {
            if let Some(update) = self.find_mut(id) {
                update.status = UpdateStatus::Queued;
            }
            return (id, SubmitStatus::Queued);
        }
        let status = self.attempt(id).await;
        (id, status)
    }

    /// Manually retry a failed or queued update with a fresh retry budget.
    pub async fn retry(&mut self, id: Uuid) -> SubmitStatus {
        let Some(update) = self.find_mut(id) else {
            return SubmitStatus::Reverted;
        };
        update.retry_count = 0;
        update.error_message = None;
        if !self.is_online() {
            if let Some(update) = self.find_mut(id) {
                update.status = UpdateStatus::Queued;
            }
            return SubmitStatus::Queued;
        }
        self.attempt(id).await
    }

    /// Drop one update, removing its patch from the visible state.
    pub fn dismiss(&mut self, id: Uuid) -> bool {
        let before = self.pending.len();
        if let Some(update) = self.find(id) {
            update.cancel.cancel();
        }
        self.pending.retain(|u| u.id != id);
        self.pending.len() != before
    }

    /// Drop every pending update, restoring the confirmed state.
    pub fn revert_all(&mut self) {
        for update in &self.pending {
            update.cancel.cancel();
        }
        self.pending.clear();
    }

    /// Choices to surface for updates stuck in [`UpdateStatus::Failed`].
    #[must_use]
    pub fn recovery_actions(&self) -> Vec<RecoveryAction> {
        let mut actions = Vec::new();
        for update in self.pending.iter().filter(|u| u.status == UpdateStatus::Failed) {
            actions.push(RecoveryAction::Retry { update_id: update.id });
            actions.push(RecoveryAction::Dismiss { update_id: update.id });
        }
        if !actions.is_empty() {
            actions.push(RecoveryAction::RevertAll);
        }
        actions
    }

    /// Flush queued and failed updates after connectivity returns. Returns
    /// the number of updates that got confirmed.
    pub async fn handle_reconnect(&mut self) -> usize {
        if !self.is_online() {
            return 0;
        }
        let ids: Vec<Uuid> = self
            .pending
            .iter()
            .filter(|u| matches!(u.status, UpdateStatus::Queued | UpdateStatus::Failed))
            .map(|u| u.id)
            .collect();
        let mut confirmed = 0;
        for id in ids {
            if let Some(update) = self.find_mut(id) {
                update.status = UpdateStatus::Pending;
                update.retry_count = 0;
            }
            if matches!(self.attempt(id).await, SubmitStatus::Confirmed { .. }) {
                confirmed += 1;
            }
        }
        confirmed
    }

    async fn attempt(&mut self, id: Uuid) -> SubmitStatus {
        loop {
            let Some(update) = self.find(id) else {
                return SubmitStatus::Reverted;
            };
            let (patch, retry_count, cancel) =
                (update.patch.clone(), update.retry_count, update.cancel.clone());
            if cancel.is_cancelled() {
                self.pending.retain(|u| u.id != id);
                return SubmitStatus::Reverted;
            }

            let submit_fn = Arc::clone(&self.submit_fn);
            let result = submit_fn(patch).await;
            match result {
                Ok(server_patch) => {
                    self.confirm(id, &server_patch);
                    return SubmitStatus::Confirmed {
                        retries: retry_count,
                    };
                }
                Err(err) => {
                    if retry_count >= self.policy.max_retries {
                        tracing::warn!(
                            update_id = %id,
                            kind = err.kind.as_str(),
                            error = %err,
                            "update failed permanently"
                        );
                        if let Some(update) = self.find_mut(id) {
                            update.status = UpdateStatus::Failed;
                            update.error_message = Some(err.to_string());
                        }
                        return SubmitStatus::Failed;
                    }
                    let delay = self.policy.delay_for(retry_count);
                    if let Some(update) = self.find_mut(id) {
                        update.status = UpdateStatus::Retrying;
                        update.retry_count += 1;
                        update.error_message = Some(err.to_string());
                    }
                    tokio::select! {
                        () = cancel.cancelled() => {
                            self.pending.retain(|u| u.id != id);
                            return SubmitStatus::Reverted;
                        }
                        () = sleep(delay) => {}
                    }
                }
            }
        }
    }

    /// Fold a confirmed update (then the server's follow-up) into the
    /// confirmed state and drop it from the pending list.
    fn confirm(&mut self, id: Uuid, server_patch: &StatePatch) {
        if let Some(index) = self.pending.iter().position(|u| u.id == id) {
            let update = self.pending.remove(index);
            self.confirmed.apply(&update.patch);
            self.confirmed.apply(server_patch);
        }
    }

    fn find(&self, id: Uuid) -> Option<&OptimisticUpdate> {
        self.pending.iter().find(|u| u.id == id)
    }

    fn find_mut(&mut self, id: Uuid) -> Option<&mut OptimisticUpdate> {
        self.pending.iter_mut().find(|u| u.id == id)
    }
}
