use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::ids::{ProgramId, UserId};
use crate::model::program::Program;

/// A validated (milestone, day) coordinate within a program.
///
/// `Position` is only produced after bounds checks; raw, possibly-corrupt
/// coordinates live in [`UserProgress`] as signed integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub milestone: u32,
    pub day: u32,
}

impl Position {
    #[must_use]
    pub fn new(milestone: u32, day: u32) -> Self {
        Self { milestone, day }
    }

    /// Start of a program.
    #[must_use]
    pub fn start() -> Self {
        Self {
            milestone: 0,
            day: 0,
        }
    }
}

/// A user's current position pointer into a program.
///
/// This is the persisted record shape. Indices are signed: values outside the
/// program's bounds (including negatives) are *corruption states* that the
/// validation engine diagnoses and repairs, never a parse failure. The single
/// in-bounds exception is `current_milestone_index == milestone_count`, the
/// sentinel for "program completed".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProgress {
    pub user_id: UserId,
    pub current_program_id: Option<ProgramId>,
    pub current_milestone_index: i32,
    pub current_day_index: i32,
    pub total_workouts_completed: u32,
    pub last_workout_date: Option<DateTime<Utc>>,
}

impl UserProgress {
    /// Fresh progress record with no assigned program.
    #[must_use]
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            current_program_id: None,
            current_milestone_index: 0,
            current_day_index: 0,
            total_workouts_completed: 0,
            last_workout_date: None,
        }
    }

    /// Progress positioned at the start of the given program.
    #[must_use]
    pub fn assigned(user_id: UserId, program_id: ProgramId) -> Self {
        Self {
            current_program_id: Some(program_id),
            ..Self::new(user_id)
        }
    }

    /// Returns the position as validated coordinates when both indices are
    /// non-negative. Does not check program bounds.
    #[must_use]
    pub fn position(&self) -> Option<Position> {
        let milestone = u32::try_from(self.current_milestone_index).ok()?;
        let day = u32::try_from(self.current_day_index).ok()?;
        Some(Position { milestone, day })
    }

    /// True when the milestone index sits at the completion sentinel for
    /// `program`.
    #[must_use]
    pub fn has_completed(&self, program: &Program) -> bool {
        self.current_milestone_index >= 0
            && self.current_milestone_index as u32 >= program.milestone_count()
    }
}
