use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use coach_core::model::{ExerciseId, Position};
use serde::{Deserialize, Serialize};

/// Per-exercise counters accumulated during a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExerciseProgress {
    pub sets_completed: u32,
    pub reps_completed: u32,
    pub updated_at: DateTime<Utc>,
}

/// Snapshot of the client-visible session.
///
/// The manager keeps one confirmed `SessionState` and derives the visible
/// state by replaying pending patches over it, so dismissing or reverting an
/// update never needs an inverse operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub position: Position,
    pub position_updated_at: DateTime<Utc>,
    pub exercise_progress: BTreeMap<ExerciseId, ExerciseProgress>,
    pub completed_exercises: BTreeSet<ExerciseId>,
    pub total_workouts_completed: u32,
    pub session_timer_secs: u32,
}

impl SessionState {
    #[must_use]
    pub fn new(position: Position, at: DateTime<Utc>) -> Self {
        Self {
            position,
            position_updated_at: at,
            exercise_progress: BTreeMap::new(),
            completed_exercises: BTreeSet::new(),
            total_workouts_completed: 0,
            session_timer_secs: 0,
        }
    }

    /// Merge a patch into this state. Fields absent from the patch are left
    /// untouched.
    pub fn apply(&mut self, patch: &StatePatch) {
        if let Some((position, at)) = patch.position {
            self.position = position;
            self.position_updated_at = at;
        }
        for (id, progress) in &patch.exercise_progress {
            self.exercise_progress.insert(*id, *progress);
        }
        self.completed_exercises
            .extend(patch.completed_exercises.iter().copied());
        if let Some(total) = patch.total_workouts_completed {
            self.total_workouts_completed = total;
        }
        if let Some(timer) = patch.session_timer_secs {
            self.session_timer_secs = timer;
        }
    }

    /// The state with `patch` applied, leaving `self` alone.
    #[must_use]
    pub fn with_patch(&self, patch: &StatePatch) -> Self {
        let mut next = self.clone();
        next.apply(patch);
        next
    }
}

/// A partial change to a [`SessionState`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatePatch {
    pub position: Option<(Position, DateTime<Utc>)>,
    pub exercise_progress: BTreeMap<ExerciseId, ExerciseProgress>,
    pub completed_exercises: BTreeSet<ExerciseId>,
    pub total_workouts_completed: Option<u32>,
    pub session_timer_secs: Option<u32>,
}

impl StatePatch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_position(mut self, position: Position, at: DateTime<Utc>) -> Self {
        self.position = Some((position, at));
        self
    }

    #[must_use]
    pub fn with_exercise_progress(
        mut self,
        exercise: ExerciseId,
        progress: ExerciseProgress,
    ) -> Self {
        self.exercise_progress.insert(exercise, progress);
        self
    }

    #[must_use]
    pub fn with_completed(mut self, exercise: ExerciseId) -> Self {
        self.completed_exercises.insert(exercise);
        self
    }

    #[must_use]
    pub fn with_total_workouts(mut self, total: u32) -> Self {
        self.total_workouts_completed = Some(total);
        self
    }

    #[must_use]
    pub fn with_session_timer(mut self, secs: u32) -> Self {
        self.session_timer_secs = Some(secs);
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.position.is_none()
            && self.exercise_progress.is_empty()
            && self.completed_exercises.is_empty()
            && self.total_workouts_completed.is_none()
            && self.session_timer_secs.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coach_core::time::fixed_now;

    #[test]
    fn apply_merges_without_clobbering_unrelated_fields() {
        let mut state = SessionState::new(Position::start(), fixed_now());
        state.session_timer_secs = 90;

        let patch = StatePatch::new()
            .with_exercise_progress(
                ExerciseId::new(7),
                ExerciseProgress {
                    sets_completed: 2,
                    reps_completed: 20,
                    updated_at: fixed_now(),
                },
            )
            .with_completed(ExerciseId::new(3));
        state.apply(&patch);

        assert_eq!(state.session_timer_secs, 90);
        assert_eq!(
            state.exercise_progress[&ExerciseId::new(7)].sets_completed,
            2
        );
        assert!(state.completed_exercises.contains(&ExerciseId::new(3)));
        assert_eq!(state.position, Position::start());
    }

    #[test]
    fn replaying_patches_in_order_is_deterministic() {
        let base = SessionState::new(Position::start(), fixed_now());
        let first = StatePatch::new().with_session_timer(30);
        let second = StatePatch::new()
            .with_session_timer(60)
            .with_position(Position::new(0, 1), fixed_now());

        let folded = base.with_patch(&first).with_patch(&second);
        assert_eq!(folded.session_timer_secs, 60);
        assert_eq!(folded.position, Position::new(0, 1));
    }

    #[test]
    fn patch_survives_serialization() {
        let patch = StatePatch::new()
            .with_session_timer(42)
            .with_completed(ExerciseId::new(5))
            .with_position(Position::new(1, 2), fixed_now());
        let json = serde_json::to_string(&patch).unwrap();
        let back: StatePatch = serde_json::from_str(&json).unwrap();
        assert_eq!(back, patch);
    }

    #[test]
    fn empty_patch_is_detected() {
        assert!(StatePatch::new().is_empty());
        assert!(!StatePatch::new().with_session_timer(0).is_empty());
    }
}
