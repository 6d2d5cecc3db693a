use chrono::{DateTime, Utc};
use coach_core::model::{Position, Workout};

use crate::advancement::engine::{self, ExerciseStep};

/// In-memory stepper for one workout day.
///
/// Tracks where the user is inside the day's exercise list without touching
/// storage; callers persist completions and the day advance through
/// [`AdvancementService`](crate::AdvancementService) as each step lands.
#[derive(Debug, Clone)]
pub struct WorkoutSession {
    position: Position,
    workout: Workout,
    current_exercise: u32,
    exercises_completed: u32,
    started_at: DateTime<Utc>,
    finished: bool,
}

impl WorkoutSession {
    #[must_use]
    pub fn start(position: Position, workout: Workout, started_at: DateTime<Utc>) -> Self {
        Self {
            position,
            workout,
            current_exercise: 0,
            exercises_completed: 0,
            started_at,
            finished: false,
        }
    }

    #[must_use]
    pub fn position(&self) -> Position {
        self.position
    }

    #[must_use]
    pub fn workout(&self) -> &Workout {
        &self.workout
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Index of the exercise the user is on, or `None` once the day is done.
    #[must_use]
    pub fn current_exercise_index(&self) -> Option<u32> {
        if self.finished {
            None
        } else {
            Some(self.current_exercise)
        }
    }

    #[must_use]
    pub fn exercises_completed(&self) -> u32 {
        self.exercises_completed
    }

    /// Completed AMRAP rounds, derived from the step count. Zero for linear
    /// days and for duration-only AMRAP days.
    #[must_use]
    pub fn rounds_completed(&self) -> u32 {
        if self.workout.is_amrap() && self.workout.slot_count() > 0 {
            self.exercises_completed / self.workout.slot_count()
        } else {
            0
        }
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Mark the current exercise done and move the cursor.
    ///
    /// `time_remaining_secs` is the caller-tracked AMRAP budget; pass `None`
    /// for linear days. Completing an already-finished session is a no-op
    /// that reports the day as done.
    pub fn complete_current(&mut self, time_remaining_secs: Option<i64>) -> ExerciseStep {
        if self.finished {
            return ExerciseStep {
                next_exercise_index: None,
                day_completed: true,
                round_completed: false,
                amrap_time_expired: false,
            };
        }

        let step = engine::exercise_step(&self.workout, self.current_exercise, time_remaining_secs);
        if !step.amrap_time_expired {
            self.exercises_completed += 1;
        }
        match step.next_exercise_index {
            Some(next) => self.current_exercise = next,
            None => self.finished = true,
        }
        step
    }

    /// End an AMRAP session because its time budget ran out.
    pub fn expire(&mut self) {
        self.finished = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coach_core::model::{ExerciseId, ExerciseSlot, ExerciseTarget};
    use coach_core::time::fixed_now;

    fn slots(count: u64) -> Vec<ExerciseSlot> {
        (1..=count)
            .map(|id| {
                ExerciseSlot::new(
                    ExerciseId::new(id),
                    ExerciseTarget::new(3, 12, None, None, None).unwrap(),
                )
            })
            .collect()
    }

    #[test]
    fn linear_session_walks_to_done() {
        let workout = Workout::linear(slots(3)).unwrap();
        let mut session = WorkoutSession::start(Position::start(), workout, fixed_now());

        assert_eq!(session.current_exercise_index(), Some(0));
        session.complete_current(None);
        session.complete_current(None);
        assert_eq!(session.current_exercise_index(), Some(2));

        let step = session.complete_current(None);
        assert!(step.day_completed);
        assert!(session.is_finished());
        assert_eq!(session.current_exercise_index(), None);
        assert_eq!(session.exercises_completed(), 3);
    }

    #[test]
    fn amrap_session_counts_rounds_across_wraps() {
        let workout = Workout::amrap(slots(2), 600).unwrap();
        let mut session = WorkoutSession::start(Position::start(), workout, fixed_now());

        session.complete_current(Some(500));
        let step = session.complete_current(Some(400));
        assert!(step.round_completed);
        assert_eq!(session.rounds_completed(), 1);
        assert_eq!(session.current_exercise_index(), Some(0));

        session.complete_current(Some(300));
        session.complete_current(Some(200));
        assert_eq!(session.rounds_completed(), 2);
    }

    #[test]
    fn amrap_session_ends_when_time_runs_out() {
        let workout = Workout::amrap(slots(2), 600).unwrap();
        let mut session = WorkoutSession::start(Position::start(), workout, fixed_now());

        session.complete_current(Some(10));
        let step = session.complete_current(Some(0));
        assert!(step.amrap_time_expired);
        assert!(step.day_completed);
        assert!(session.is_finished());
        // the expired step did not count as a completed exercise
        assert_eq!(session.exercises_completed(), 1);
    }

    #[test]
    fn finished_session_is_a_no_op() {
        let workout = Workout::linear(slots(1)).unwrap();
        let mut session = WorkoutSession::start(Position::start(), workout, fixed_now());

        assert!(session.complete_current(None).day_completed);
        let again = session.complete_current(None);
        assert!(again.day_completed);
        assert_eq!(session.exercises_completed(), 1);
    }
}
