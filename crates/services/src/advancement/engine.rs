//! Pure transition functions. These assume an already-validated position;
//! gating against corrupt state happens in the service layer.

use coach_core::model::{Position, Program, Workout};

/// Result of advancing one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayAdvance {
    pub next: Position,
    /// The move left the previous milestone behind.
    pub milestone_completed: bool,
    /// The move reached the terminal completion sentinel.
    pub program_completed: bool,
}

/// Computes the position after finishing the day at `pos`.
///
/// Stays within the milestone while days remain; otherwise moves to day 0 of
/// the next milestone, or to the completion sentinel
/// `(milestone_count, 0)` when there is no next milestone.
#[must_use]
pub fn next_day_position(program: &Program, pos: Position) -> DayAdvance {
    let days_in_milestone = program.milestone(pos.milestone).map_or(0, |m| m.day_count());

    let next_day = pos.day + 1;
    if next_day < days_in_milestone {
        return DayAdvance {
            next: Position::new(pos.milestone, next_day),
            milestone_completed: false,
            program_completed: false,
        };
    }

    let next_milestone = pos.milestone + 1;
    DayAdvance {
        next: Position::new(next_milestone, 0),
        milestone_completed: true,
        program_completed: next_milestone >= program.milestone_count(),
    }
}

/// Outcome of completing one exercise within a day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExerciseStep {
    /// Index of the next exercise to perform, or `None` when the day is done.
    pub next_exercise_index: Option<u32>,
    pub day_completed: bool,
    /// AMRAP only: the exercise list wrapped back to the start.
    pub round_completed: bool,
    /// AMRAP only: the time budget ran out.
    pub amrap_time_expired: bool,
}

/// Computes what follows the exercise at `current_index`.
///
/// Linear workouts finish after their last exercise. AMRAP workouts cycle:
/// reaching the last exercise wraps to index 0 and reports a completed round,
/// and the day only finishes when the externally-tracked time budget
/// (`amrap_time_remaining_secs`) is exhausted. A missing budget on an AMRAP
/// day is treated as exhausted.
#[must_use]
pub fn exercise_step(
    workout: &Workout,
    current_index: u32,
    amrap_time_remaining_secs: Option<i64>,
) -> ExerciseStep {
    let count = workout.slot_count();

    if workout.is_amrap() {
        if amrap_time_remaining_secs.unwrap_or(0) <= 0 {
            return ExerciseStep {
                next_exercise_index: None,
                day_completed: true,
                round_completed: false,
                amrap_time_expired: true,
            };
        }
        if count == 0 || current_index + 1 >= count {
            // wrap: round counter is derived by the caller, never stored
            return ExerciseStep {
                next_exercise_index: Some(0),
                day_completed: false,
                round_completed: true,
                amrap_time_expired: false,
            };
        }
        return ExerciseStep {
            next_exercise_index: Some(current_index + 1),
            day_completed: false,
            round_completed: false,
            amrap_time_expired: false,
        };
    }

    if current_index + 1 >= count {
        ExerciseStep {
            next_exercise_index: None,
            day_completed: true,
            round_completed: false,
            amrap_time_expired: false,
        }
    } else {
        ExerciseStep {
            next_exercise_index: Some(current_index + 1),
            day_completed: false,
            round_completed: false,
            amrap_time_expired: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coach_core::analytics::absolute_day_position;
    use coach_core::model::{
        Day, ExerciseId, ExerciseSlot, ExerciseTarget, Milestone, Program, ProgramId,
    };

    fn workout_day() -> Day {
        let slot = ExerciseSlot::new(
            ExerciseId::new(1),
            ExerciseTarget::new(3, 10, None, None, None).unwrap(),
        );
        Day::Workout(Workout::linear(vec![slot]).unwrap())
    }

    fn program_with_days(days_per_milestone: &[usize]) -> Program {
        let milestones = days_per_milestone
            .iter()
            .enumerate()
            .map(|(i, count)| {
                Milestone::new(format!("Milestone {i}"), vec![workout_day(); *count]).unwrap()
            })
            .collect();
        Program::new(ProgramId::new(1), "Test Program", true, milestones).unwrap()
    }

    fn linear_workout(slots: usize) -> Workout {
        let slot = ExerciseSlot::new(
            ExerciseId::new(1),
            ExerciseTarget::new(3, 10, None, None, None).unwrap(),
        );
        Workout::linear(vec![slot; slots]).unwrap()
    }

    fn amrap_workout(slots: usize, duration_secs: u32) -> Workout {
        let slot = ExerciseSlot::new(
            ExerciseId::new(1),
            ExerciseTarget::new(3, 10, None, None, None).unwrap(),
        );
        Workout::amrap(vec![slot; slots], duration_secs).unwrap()
    }

    #[test]
    fn day_advance_crosses_milestone_boundary() {
        let program = program_with_days(&[3, 4]);

        let step = next_day_position(&program, Position::new(0, 2));
        assert_eq!(step.next, Position::new(1, 0));
        assert!(step.milestone_completed);
        assert!(!step.program_completed);
    }

    #[test]
    fn day_advance_reaches_terminal_sentinel() {
        let program = program_with_days(&[3, 4]);

        let step = next_day_position(&program, Position::new(1, 3));
        assert_eq!(step.next, Position::new(2, 0));
        assert!(step.milestone_completed);
        assert!(step.program_completed);
    }

    #[test]
    fn day_advance_stays_in_milestone() {
        let program = program_with_days(&[3, 4]);

        let step = next_day_position(&program, Position::new(1, 1));
        assert_eq!(step.next, Position::new(1, 2));
        assert!(!step.milestone_completed);
    }

    #[test]
    fn day_advance_never_decreases_absolute_position() {
        let program = program_with_days(&[3, 4]);
        let mut pos = Position::start();
        let mut last_abs = absolute_day_position(&program, pos.milestone, pos.day);

        for _ in 0..7 {
            pos = next_day_position(&program, pos).next;
            let abs = absolute_day_position(&program, pos.milestone, pos.day);
            assert!(abs > last_abs);
            last_abs = abs;
        }
        assert_eq!(pos, Position::new(2, 0));
    }

    #[test]
    fn linear_step_advances_then_finishes() {
        let workout = linear_workout(3);

        let mid = exercise_step(&workout, 0, None);
        assert_eq!(mid.next_exercise_index, Some(1));
        assert!(!mid.day_completed);

        let last = exercise_step(&workout, 2, None);
        assert_eq!(last.next_exercise_index, None);
        assert!(last.day_completed);
        assert!(!last.round_completed);
    }

    #[test]
    fn amrap_wraps_into_a_new_round() {
        // 3 exercises, on the last one, 50s still on the clock
        let workout = amrap_workout(3, 600);

        let step = exercise_step(&workout, 2, Some(50));
        assert_eq!(step.next_exercise_index, Some(0));
        assert!(step.round_completed);
        assert!(!step.day_completed);
        assert!(!step.amrap_time_expired);
    }

    #[test]
    fn amrap_expires_regardless_of_exercise_position() {
        let workout = amrap_workout(3, 600);

        let step = exercise_step(&workout, 1, Some(0));
        assert!(step.amrap_time_expired);
        assert!(step.day_completed);
        assert_eq!(step.next_exercise_index, None);

        let negative = exercise_step(&workout, 0, Some(-5));
        assert!(negative.amrap_time_expired);
    }

    #[test]
    fn amrap_without_budget_is_treated_as_expired() {
        let workout = amrap_workout(3, 600);
        let step = exercise_step(&workout, 0, None);
        assert!(step.amrap_time_expired);
        assert!(step.day_completed);
    }

    #[test]
    fn amrap_mid_round_advances_linearly() {
        let workout = amrap_workout(3, 600);
        let step = exercise_step(&workout, 0, Some(120));
        assert_eq!(step.next_exercise_index, Some(1));
        assert!(!step.round_completed);
    }
}
