use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{ExerciseId, ProgramId, UserId};
use crate::model::program::{MAX_REPS, MAX_SETS, MAX_WEIGHT_KG};

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum CompletionError {
    #[error("completed sets must be between 1 and {MAX_SETS}, got {0}")]
    SetsOutOfRange(u32),

    #[error("completed reps must be between 1 and {MAX_REPS}, got {0}")]
    RepsOutOfRange(u32),

    #[error("completed weight must be between 0 and {MAX_WEIGHT_KG} kg, got {0}")]
    WeightOutOfRange(f64),

    #[error("notes cannot exceed {0} characters")]
    NotesTooLong(usize),
}

/// Maximum length of a free-form completion note.
pub const MAX_NOTES_LEN: usize = 2_000;

/// Composite key identifying "the latest" completion for one exercise at one
/// curriculum position. A later submission with an identical key updates the
/// stored record instead of duplicating it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CompletionKey {
    pub user_id: UserId,
    pub exercise_id: ExerciseId,
    pub program_id: ProgramId,
    pub milestone_index: u32,
    pub day_index: u32,
}

/// What the user actually performed for one exercise slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseCompletion {
    key: CompletionKey,
    sets: u32,
    reps: u32,
    weight_kg: Option<f64>,
    duration_secs: Option<u32>,
    distance_m: Option<u32>,
    notes: Option<String>,
    completed_at: DateTime<Utc>,
}

impl ExerciseCompletion {
    /// Creates a validated completion record.
    ///
    /// # Errors
    ///
    /// Returns `CompletionError` if a recorded value is outside the same
    /// bounds the curriculum targets use.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        key: CompletionKey,
        sets: u32,
        reps: u32,
        weight_kg: Option<f64>,
        duration_secs: Option<u32>,
        distance_m: Option<u32>,
        notes: Option<String>,
        completed_at: DateTime<Utc>,
    ) -> Result<Self, CompletionError> {
        if sets == 0 || sets > MAX_SETS {
            return Err(CompletionError::SetsOutOfRange(sets));
        }
        if reps == 0 || reps > MAX_REPS {
            return Err(CompletionError::RepsOutOfRange(reps));
        }
        if let Some(w) = weight_kg {
            if !(0.0..=MAX_WEIGHT_KG).contains(&w) {
                return Err(CompletionError::WeightOutOfRange(w));
            }
        }
        if let Some(n) = &notes {
            if n.chars().count() > MAX_NOTES_LEN {
                return Err(CompletionError::NotesTooLong(MAX_NOTES_LEN));
            }
        }
        Ok(Self {
            key,
            sets,
            reps,
            weight_kg,
            duration_secs,
            distance_m,
            notes,
            completed_at,
        })
    }

    #[must_use]
    pub fn key(&self) -> CompletionKey {
        self.key
    }

    #[must_use]
    pub fn sets(&self) -> u32 {
        self.sets
    }

    #[must_use]
    pub fn reps(&self) -> u32 {
        self.reps
    }

    #[must_use]
    pub fn weight_kg(&self) -> Option<f64> {
        self.weight_kg
    }

    #[must_use]
    pub fn duration_secs(&self) -> Option<u32> {
        self.duration_secs
    }

    #[must_use]
    pub fn distance_m(&self) -> Option<u32> {
        self.distance_m
    }

    #[must_use]
    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    #[must_use]
    pub fn completed_at(&self) -> DateTime<Utc> {
        self.completed_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    fn key() -> CompletionKey {
        CompletionKey {
            user_id: UserId::new(1),
            exercise_id: ExerciseId::new(2),
            program_id: ProgramId::new(3),
            milestone_index: 0,
            day_index: 1,
        }
    }

    #[test]
    fn completion_validates_bounds() {
        let ok = ExerciseCompletion::new(
            key(),
            3,
            12,
            Some(40.0),
            None,
            None,
            Some("felt strong".into()),
            fixed_now(),
        );
        assert!(ok.is_ok());

        let err =
            ExerciseCompletion::new(key(), 100, 12, None, None, None, None, fixed_now())
                .unwrap_err();
        assert_eq!(err, CompletionError::SetsOutOfRange(100));
    }

    #[test]
    fn oversized_notes_are_rejected() {
        let notes = "x".repeat(MAX_NOTES_LEN + 1);
        let err = ExerciseCompletion::new(key(), 3, 10, None, None, None, Some(notes), fixed_now())
            .unwrap_err();
        assert_eq!(err, CompletionError::NotesTooLong(MAX_NOTES_LEN));
    }
}
