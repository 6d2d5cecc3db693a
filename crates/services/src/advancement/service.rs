use std::sync::Arc;

use coach_core::Clock;
use coach_core::model::{
    CompletionKey, Day, ExerciseCompletion, ExerciseId, Position, Program, UserId, UserProgress,
};
use storage::{
    CompletionRepository, PositionPatch, ProgramRepository, ProgressRepository, StorageError,
};

use crate::advancement::engine::{self, ExerciseStep};
use crate::error::{ErrorKind, OperationError};
use crate::repair::RepairService;

/// Result of a committed position transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdvanceOutcome {
    /// The committed position (the completion sentinel when the program is
    /// done).
    pub position: Position,
    pub milestone_completed: bool,
    pub program_completed: bool,
}

/// What the user performed for the exercise being completed.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionResult {
    pub sets: u32,
    pub reps: u32,
    pub weight_kg: Option<f64>,
    pub duration_secs: Option<u32>,
    pub distance_m: Option<u32>,
    pub notes: Option<String>,
}

/// Input to [`AdvancementService::complete_exercise_and_advance`].
#[derive(Debug, Clone, PartialEq)]
pub struct CompleteExerciseInput {
    pub exercise_id: ExerciseId,
    /// Index of the exercise within the current workout day.
    pub exercise_index: u32,
    pub result: CompletionResult,
    /// Remaining AMRAP time budget, tracked by the caller. Ignored for
    /// linear days.
    pub amrap_time_remaining_secs: Option<i64>,
}

/// Result of completing one exercise, with the follow-on day advance when the
/// day finished.
#[derive(Debug, Clone, PartialEq)]
pub struct CompleteExerciseOutcome {
    pub step: ExerciseStep,
    pub advance: Option<AdvanceOutcome>,
}

/// Moves a user's position through a program, gated by validation.
///
/// Every transition validates the stored position first. A corrupted position
/// is auto-repaired when possible and the operation returns a non-success
/// result describing the correction — advancement never builds on top of a
/// corrupt position, and a repair that was committed stays durable even when
/// the rest of the operation fails.
#[derive(Clone)]
pub struct AdvancementService {
    clock: Clock,
    programs: Arc<dyn ProgramRepository>,
    progress: Arc<dyn ProgressRepository>,
    completions: Arc<dyn CompletionRepository>,
    repair: RepairService,
}

impl AdvancementService {
    #[must_use]
    pub fn new(
        clock: Clock,
        programs: Arc<dyn ProgramRepository>,
        progress: Arc<dyn ProgressRepository>,
        completions: Arc<dyn CompletionRepository>,
    ) -> Self {
        let repair = RepairService::new(Arc::clone(&progress));
        Self {
            clock,
            programs,
            progress,
            completions,
            repair,
        }
    }

    /// Load the user's progress record and its program, if it still resolves.
    async fn load(
        &self,
        user: UserId,
    ) -> Result<(Option<Program>, UserProgress), OperationError> {
        let record = match self.progress.get_progress(user).await {
            Ok(record) => record,
            Err(StorageError::NotFound) => return Err(OperationError::no_active_program()),
            Err(other) => return Err(other.into()),
        };
        let Some(program_id) = record.current_program_id else {
            return Err(OperationError::no_active_program());
        };
        let program = match self.programs.get_published_program(program_id).await {
            Ok(program) => Some(program),
            // unresolved program is a diagnosable consistency state, not a
            // hard failure here
            Err(StorageError::NotFound) => None,
            Err(other) => return Err(other.into()),
        };
        Ok((program, record))
    }

    /// Validate the stored position before a natural advancement.
    ///
    /// On a consistency fault this attempts the computed repair and always
    /// returns a non-success result describing what happened; the caller's
    /// transition is aborted either way.
    async fn gate(
        &self,
        user: UserId,
        program: Option<&Program>,
        record: &UserProgress,
    ) -> Result<Position, OperationError> {
        let validation = self.repair.validate(program, record);
        if validation.is_valid {
            return record.position().ok_or_else(|| {
                OperationError::new(
                    ErrorKind::CorruptedProgress,
                    "Your saved position got corrupted.",
                )
            });
        }

        let kind = validation
            .primary_fault()
            .map_or(ErrorKind::CorruptedProgress, |f| f.kind.into());
        let message = validation
            .primary_fault()
            .map_or_else(String::new, |f| f.message.clone());

        let mut error = OperationError::new(kind, message);
        if let Some(action) = validation.repair {
            if validation.can_be_repaired {
                if let Some(applied) = self.repair.apply(user, &action).await {
                    error.message =
                        format!("{} {}", error.message, applied.description);
                }
                // a failed repair commit was already logged; the original
                // fault is what the caller sees
            }
            error = error.with_repair(action);
        }
        Err(error)
    }

    /// Advance one day, rolling into the next milestone or the terminal
    /// completion state as needed.
    ///
    /// # Errors
    ///
    /// Returns a consistency-kind error (after attempting repair) for corrupt
    /// positions, a validation error when the program is already completed,
    /// or a system error if the commit fails.
    pub async fn advance_to_next_day(&self, user: UserId) -> Result<AdvanceOutcome, OperationError> {
        let (program, record) = self.load(user).await?;
        let position = self.gate(user, program.as_ref(), &record).await?;
        let Some(program) = program else {
            // gate rejects an unresolved program before we get here
            return Err(OperationError::system("program disappeared mid-operation"));
        };

        if record.has_completed(&program) {
            return Err(OperationError::validation(
                "You have already completed this program.",
            ));
        }

        let finished_workout = program
            .milestone(position.milestone)
            .and_then(|m| m.day(position.day))
            .is_some_and(Day::is_workout);

        let advance = engine::next_day_position(&program, position);
        let patch = if finished_workout {
            PositionPatch::move_to_after_workout(
                advance.next.milestone as i32,
                advance.next.day as i32,
                self.clock.now(),
            )
        } else {
            PositionPatch::move_to(advance.next.milestone as i32, advance.next.day as i32)
        };
        self.progress.update_position(user, patch).await?;

        Ok(AdvanceOutcome {
            position: advance.next,
            milestone_completed: advance.milestone_completed,
            program_completed: advance.program_completed,
        })
    }

    /// Skip directly to day 0 of the next milestone.
    ///
    /// # Errors
    ///
    /// Returns a validation-kind error when already on the final milestone —
    /// a user-facing boundary, not a fault — in addition to the errors
    /// `advance_to_next_day` can produce.
    pub async fn advance_to_next_milestone(
        &self,
        user: UserId,
    ) -> Result<AdvanceOutcome, OperationError> {
        let (program, record) = self.load(user).await?;
        let position = self.gate(user, program.as_ref(), &record).await?;
        let Some(program) = program else {
            return Err(OperationError::system("program disappeared mid-operation"));
        };

        if record.has_completed(&program) {
            return Err(OperationError::validation(
                "You have already completed this program.",
            ));
        }
        let next_milestone = position.milestone + 1;
        if next_milestone >= program.milestone_count() {
            return Err(OperationError::validation(
                "You are already on the final milestone.",
            ));
        }

        self.progress
            .update_position(user, PositionPatch::move_to(next_milestone as i32, 0))
            .await?;

        Ok(AdvanceOutcome {
            position: Position::new(next_milestone, 0),
            milestone_completed: true,
            program_completed: false,
        })
    }

    /// Jump to an explicit position.
    ///
    /// Direct sets are stricter than natural advancement: the *target* is
    /// validated against the curriculum and, when invalid, the repair
    /// instructions come back as guidance in the error — nothing is
    /// auto-applied.
    ///
    /// # Errors
    ///
    /// Returns the validation outcome (with repair guidance) for invalid
    /// targets, or a system error if the commit fails.
    pub async fn set_progress(
        &self,
        user: UserId,
        milestone: u32,
        day: u32,
    ) -> Result<AdvanceOutcome, OperationError> {
        let (program, record) = self.load(user).await?;

        let mut candidate = record.clone();
        candidate.current_milestone_index = milestone as i32;
        candidate.current_day_index = day as i32;

        let validation = self.repair.validate(program.as_ref(), &candidate);
        if !validation.is_valid {
            let kind = validation
                .primary_fault()
                .map_or(ErrorKind::Validation, |f| f.kind.into());
            let message = validation.primary_fault().map_or_else(
                || "That position is not valid for this program.".to_owned(),
                |f| f.message.clone(),
            );
            let mut error = OperationError::new(kind, message);
            if let Some(action) = validation.repair {
                error = error.with_repair(action);
            }
            return Err(error);
        }
        let Some(program) = program else {
            return Err(OperationError::system("program disappeared mid-operation"));
        };

        self.progress
            .update_position(user, PositionPatch::move_to(milestone as i32, day as i32))
            .await?;

        let program_completed = milestone >= program.milestone_count();
        Ok(AdvanceOutcome {
            position: Position::new(milestone, day),
            milestone_completed: program_completed,
            program_completed,
        })
    }

    /// Record one exercise completion and advance within (or out of) the day.
    ///
    /// The day advance, when the step finishes the day, is committed first;
    /// the completion upsert follows. If the upsert then fails, the committed
    /// advance is rolled back best-effort so the user is not pushed past work
    /// that was never recorded.
    ///
    /// # Errors
    ///
    /// Returns validation errors for rest days, bad exercise indices or
    /// out-of-bounds results, consistency errors (after attempted repair) for
    /// corrupt positions, and system errors for collaborator failures.
    pub async fn complete_exercise_and_advance(
        &self,
        user: UserId,
        input: CompleteExerciseInput,
    ) -> Result<CompleteExerciseOutcome, OperationError> {
        let (program, record) = self.load(user).await?;
        let position = self.gate(user, program.as_ref(), &record).await?;
        let Some(program) = program else {
            return Err(OperationError::system("program disappeared mid-operation"));
        };

        if record.has_completed(&program) {
            return Err(OperationError::validation(
                "You have already completed this program.",
            ));
        }

        let Some(workout) = program
            .milestone(position.milestone)
            .and_then(|m| m.day(position.day))
            .and_then(Day::workout)
        else {
            return Err(OperationError::validation(
                "Today is a rest day; there is nothing to complete.",
            ));
        };
        if workout.slot_count() > 0 && input.exercise_index >= workout.slot_count() {
            return Err(OperationError::validation(format!(
                "Exercise {} does not exist in today's workout.",
                input.exercise_index
            )));
        }

        let step = engine::exercise_step(
            workout,
            input.exercise_index,
            input.amrap_time_remaining_secs,
        );

        let key = CompletionKey {
            user_id: user,
            exercise_id: input.exercise_id,
            program_id: program.id(),
            milestone_index: position.milestone,
            day_index: position.day,
        };
        let completion = ExerciseCompletion::new(
            key,
            input.result.sets,
            input.result.reps,
            input.result.weight_kg,
            input.result.duration_secs,
            input.result.distance_m,
            input.result.notes,
            self.clock.now(),
        )
        .map_err(|err| OperationError::validation(err.to_string()))?;

        let advance = if step.day_completed {
            let advance = engine::next_day_position(&program, position);
            let patch = PositionPatch::move_to_after_workout(
                advance.next.milestone as i32,
                advance.next.day as i32,
                self.clock.now(),
            );
            self.progress.update_position(user, patch).await?;
            Some(AdvanceOutcome {
                position: advance.next,
                milestone_completed: advance.milestone_completed,
                program_completed: advance.program_completed,
            })
        } else {
            None
        };

        if let Err(err) = self.completions.upsert_completion(&completion).await {
            if advance.is_some() {
                let rollback =
                    PositionPatch::move_to(position.milestone as i32, position.day as i32);
                if let Err(rollback_err) = self.progress.update_position(user, rollback).await {
                    // never rethrown: a failed rollback must not cascade
                    tracing::warn!(
                        user = %user,
                        error = %rollback_err,
                        "position rollback failed after completion write error"
                    );
                }
            }
            return Err(OperationError::system(format!(
                "could not record the exercise completion: {err}"
            )));
        }

        Ok(CompleteExerciseOutcome { step, advance })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coach_core::model::{
        ExerciseSlot, ExerciseTarget, Milestone, ProgramId, UserProgress, Workout,
    };
    use coach_core::time::fixed_clock;
    use coach_core::validation::RepairAction;
    use storage::InMemoryRepository;

    fn workout_day(slots: usize) -> Day {
        let slot = ExerciseSlot::new(
            ExerciseId::new(1),
            ExerciseTarget::new(3, 10, None, None, None).unwrap(),
        );
        Day::Workout(Workout::linear(vec![slot; slots]).unwrap())
    }

    fn sample_program() -> Program {
        Program::new(
            ProgramId::new(1),
            "Base Strength",
            true,
            vec![
                Milestone::new("Foundation", vec![workout_day(2); 3]).unwrap(),
                Milestone::new("Build", vec![workout_day(2); 4]).unwrap(),
            ],
        )
        .unwrap()
    }

    fn service_with(repo: &InMemoryRepository) -> AdvancementService {
        AdvancementService::new(
            fixed_clock(),
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
        )
    }

    async fn seed(repo: &InMemoryRepository, milestone: i32, day: i32) -> UserId {
        let user = UserId::new(1);
        repo.put_program(sample_program());
        let mut record = UserProgress::assigned(user, ProgramId::new(1));
        record.current_milestone_index = milestone;
        record.current_day_index = day;
        repo.upsert_progress(&record).await.unwrap();
        user
    }

    #[tokio::test]
    async fn advance_day_crosses_into_next_milestone() {
        let repo = InMemoryRepository::new();
        let user = seed(&repo, 0, 2).await;
        let service = service_with(&repo);

        let outcome = service.advance_to_next_day(user).await.unwrap();
        assert_eq!(outcome.position, Position::new(1, 0));
        assert!(outcome.milestone_completed);
        assert!(!outcome.program_completed);

        let stored = repo.get_progress(user).await.unwrap();
        assert_eq!(stored.current_milestone_index, 1);
        assert_eq!(stored.current_day_index, 0);
        // finished day was a workout
        assert_eq!(stored.total_workouts_completed, 1);
    }

    #[tokio::test]
    async fn advance_day_reaches_terminal_state() {
        let repo = InMemoryRepository::new();
        let user = seed(&repo, 1, 3).await;
        let service = service_with(&repo);

        let outcome = service.advance_to_next_day(user).await.unwrap();
        assert_eq!(outcome.position, Position::new(2, 0));
        assert!(outcome.program_completed);

        // a second advance from the sentinel is a user-facing boundary
        let err = service.advance_to_next_day(user).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
    }

    #[tokio::test]
    async fn advance_day_repairs_corrupt_position_and_reports() {
        let repo = InMemoryRepository::new();
        let user = seed(&repo, 0, 10).await;
        let service = service_with(&repo);

        let err = service.advance_to_next_day(user).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::DayIndexInvalid);
        assert!(matches!(
            err.repair,
            Some(RepairAction::AdjustToValidPosition { milestone: 0, day: 2, .. })
        ));

        // the repair was committed; position no longer corrupt
        let stored = repo.get_progress(user).await.unwrap();
        assert_eq!(stored.current_milestone_index, 0);
        assert_eq!(stored.current_day_index, 2);

        // and the next natural advance succeeds
        assert!(service.advance_to_next_day(user).await.is_ok());
    }

    #[tokio::test]
    async fn advance_day_with_deleted_program_requires_new_program() {
        let repo = InMemoryRepository::new();
        let user = seed(&repo, 0, 0).await;
        repo.remove_program(ProgramId::new(1));
        let service = service_with(&repo);

        let err = service.advance_to_next_day(user).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::ProgramStructureChanged);
        assert!(matches!(err.repair, Some(RepairAction::AssignNewProgram { .. })));
    }

    #[tokio::test]
    async fn advance_milestone_fails_on_final_milestone() {
        let repo = InMemoryRepository::new();
        let user = seed(&repo, 1, 0).await;
        let service = service_with(&repo);

        let err = service.advance_to_next_milestone(user).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
        assert!(err.message.contains("final milestone"));
    }

    #[tokio::test]
    async fn advance_milestone_jumps_to_day_zero() {
        let repo = InMemoryRepository::new();
        let user = seed(&repo, 0, 1).await;
        let service = service_with(&repo);

        let outcome = service.advance_to_next_milestone(user).await.unwrap();
        assert_eq!(outcome.position, Position::new(1, 0));
    }

    #[tokio::test]
    async fn set_progress_rejects_invalid_target_with_guidance() {
        let repo = InMemoryRepository::new();
        let user = seed(&repo, 0, 0).await;
        let service = service_with(&repo);

        let err = service.set_progress(user, 0, 10).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::DayIndexInvalid);
        // guidance only: the stored position is untouched
        assert!(err.repair.is_some());
        let stored = repo.get_progress(user).await.unwrap();
        assert_eq!(stored.current_day_index, 0);
    }

    #[tokio::test]
    async fn set_progress_commits_valid_target() {
        let repo = InMemoryRepository::new();
        let user = seed(&repo, 0, 0).await;
        let service = service_with(&repo);

        let outcome = service.set_progress(user, 1, 2).await.unwrap();
        assert_eq!(outcome.position, Position::new(1, 2));

        let stored = repo.get_progress(user).await.unwrap();
        assert_eq!(stored.current_milestone_index, 1);
        assert_eq!(stored.current_day_index, 2);
    }

    fn completion_input(index: u32) -> CompleteExerciseInput {
        CompleteExerciseInput {
            exercise_id: ExerciseId::new(1),
            exercise_index: index,
            result: CompletionResult {
                sets: 3,
                reps: 10,
                weight_kg: Some(40.0),
                duration_secs: None,
                distance_m: None,
                notes: None,
            },
            amrap_time_remaining_secs: None,
        }
    }

    #[tokio::test]
    async fn completing_mid_day_exercise_does_not_advance() {
        let repo = InMemoryRepository::new();
        let user = seed(&repo, 0, 0).await;
        let service = service_with(&repo);

        let outcome = service
            .complete_exercise_and_advance(user, completion_input(0))
            .await
            .unwrap();
        assert_eq!(outcome.step.next_exercise_index, Some(1));
        assert!(outcome.advance.is_none());

        let stored = repo.get_progress(user).await.unwrap();
        assert_eq!(stored.current_day_index, 0);
    }

    #[tokio::test]
    async fn completing_last_exercise_advances_the_day() {
        let repo = InMemoryRepository::new();
        let user = seed(&repo, 0, 0).await;
        let service = service_with(&repo);

        let outcome = service
            .complete_exercise_and_advance(user, completion_input(1))
            .await
            .unwrap();
        assert!(outcome.step.day_completed);
        let advance = outcome.advance.unwrap();
        assert_eq!(advance.position, Position::new(0, 1));

        let stored = repo.get_progress(user).await.unwrap();
        assert_eq!(stored.current_day_index, 1);
        assert_eq!(stored.total_workouts_completed, 1);
    }

    #[tokio::test]
    async fn out_of_range_exercise_index_is_a_validation_error() {
        let repo = InMemoryRepository::new();
        let user = seed(&repo, 0, 0).await;
        let service = service_with(&repo);

        let err = service
            .complete_exercise_and_advance(user, completion_input(5))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
    }
}
