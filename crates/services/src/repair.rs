//! Commits computed repair actions through the position store.

use std::sync::Arc;

use coach_core::model::{Position, Program, UserId, UserProgress};
use coach_core::validation::{self, ProgressValidation, RepairAction};
use storage::{PositionPatch, ProgressRepository};

/// A repair that was actually written to the position store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedRepair {
    pub position: Position,
    pub description: String,
}

/// Validates progress and executes auto-repairable actions.
#[derive(Clone)]
pub struct RepairService {
    progress: Arc<dyn ProgressRepository>,
}

impl RepairService {
    #[must_use]
    pub fn new(progress: Arc<dyn ProgressRepository>) -> Self {
        Self { progress }
    }

    /// User-facing validation with repair planning. Pure; nothing is written.
    #[must_use]
    pub fn validate(
        &self,
        program: Option<&Program>,
        progress: &UserProgress,
    ) -> ProgressValidation {
        validation::validate_user_progress(program, progress)
    }

    /// Commit a repair action's target position.
    ///
    /// Returns `None` when the action carries no target (user must choose a
    /// new program) or when the commit itself fails. A failed commit is
    /// logged and swallowed: the caller reports the *original* validation
    /// problem, and no second repair is attempted.
    pub async fn apply(&self, user: UserId, action: &RepairAction) -> Option<AppliedRepair> {
        let target = action.target()?;
        let patch = PositionPatch::move_to(target.milestone as i32, target.day as i32);
        match self.progress.update_position(user, patch).await {
            Ok(()) => Some(AppliedRepair {
                position: target,
                description: action.description().to_owned(),
            }),
            Err(err) => {
                tracing::warn!(user = %user, error = %err, "repair commit failed; reporting original fault");
                None
            }
        }
    }
}
