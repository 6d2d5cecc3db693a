use std::sync::Arc;

use chrono::{DateTime, Utc};
use coach_core::analytics::{self, ProgramAnalytics, ProgramProgress};
use coach_core::model::{Day, Program, ProgramId, UserId, UserProgress};
use coach_core::validation::ProgressValidation;
use storage::{
    CompletionRepository, ProgramRepository, ProgressRepository, Storage, StorageError,
};
use tokio::sync::watch;

use crate::Clock;
use crate::advancement::{AdvancementService, WorkoutSession};
use crate::error::{ErrorKind, OperationError};
use crate::optimistic::{OptimisticManager, RetryPolicy, SessionState, SubmitFn};
use crate::repair::RepairService;
use crate::sync::ConflictResolver;

/// Assembles the progress-tracking services over one storage backend.
#[derive(Clone)]
pub struct ProgressServices {
    clock: Clock,
    advancement: Arc<AdvancementService>,
    repair: Arc<RepairService>,
    programs: Arc<dyn ProgramRepository>,
    progress: Arc<dyn ProgressRepository>,
    completions: Arc<dyn CompletionRepository>,
}

impl ProgressServices {
    #[must_use]
    pub fn new(clock: Clock, storage: Storage) -> Self {
        let advancement = Arc::new(AdvancementService::new(
            clock,
            Arc::clone(&storage.programs),
            Arc::clone(&storage.progress),
            Arc::clone(&storage.completions),
        ));
        let repair = Arc::new(RepairService::new(Arc::clone(&storage.progress)));
        Self {
            clock,
            advancement,
            repair,
            programs: storage.programs,
            progress: storage.progress,
            completions: storage.completions,
        }
    }

    /// Build services over volatile in-memory storage.
    #[must_use]
    pub fn in_memory(clock: Clock) -> Self {
        Self::new(clock, Storage::in_memory())
    }

    #[must_use]
    pub fn clock(&self) -> Clock {
        self.clock
    }

    #[must_use]
    pub fn advancement(&self) -> Arc<AdvancementService> {
        Arc::clone(&self.advancement)
    }

    #[must_use]
    pub fn repair(&self) -> Arc<RepairService> {
        Arc::clone(&self.repair)
    }

    #[must_use]
    pub fn completions(&self) -> Arc<dyn CompletionRepository> {
        Arc::clone(&self.completions)
    }

    /// Put a user at the start of a published program.
    ///
    /// # Errors
    ///
    /// `NotFound` when the program does not exist or is unpublished,
    /// `AlreadyAssigned` when the user is already on that program, or a
    /// system error for storage failures.
    pub async fn assign_program(
        &self,
        user: UserId,
        program_id: ProgramId,
    ) -> Result<UserProgress, OperationError> {
        let program = match self.programs.get_published_program(program_id).await {
            Ok(program) => program,
            Err(StorageError::NotFound) => {
                return Err(OperationError::new(
                    ErrorKind::NotFound,
                    "That program does not exist.",
                ));
            }
            Err(other) => return Err(other.into()),
        };

        match self.progress.get_progress(user).await {
            Ok(existing) if existing.current_program_id == Some(program.id()) => {
                return Err(OperationError::new(
                    ErrorKind::AlreadyAssigned,
                    "You are already following this program.",
                ));
            }
            Ok(_) | Err(StorageError::NotFound) => {}
            Err(other) => return Err(other.into()),
        }

        let record = UserProgress::assigned(user, program.id());
        self.progress.upsert_progress(&record).await?;
        Ok(record)
    }

    /// Validate a user's stored position without mutating anything.
    ///
    /// # Errors
    ///
    /// Returns an error only when the user has no progress record at all or
    /// storage fails; consistency faults come back inside the validation.
    pub async fn validate_progress(
        &self,
        user: UserId,
    ) -> Result<ProgressValidation, OperationError> {
        let (program, record) = self.load(user).await?;
        Ok(self.repair.validate(program.as_ref(), &record))
    }

    /// Overall completion for the user's active program.
    ///
    /// # Errors
    ///
    /// `NoActiveProgram` without an assignment, `ProgramStructureChanged`
    /// when the program no longer resolves, or a system error.
    pub async fn program_progress(&self, user: UserId) -> Result<ProgramProgress, OperationError> {
        let (program, record) = self.load(user).await?;
        let program = program.ok_or_else(|| {
            OperationError::new(
                ErrorKind::ProgramStructureChanged,
                "Your program is no longer available.",
            )
        })?;
        Ok(analytics::program_progress(&program, &record))
    }

    /// Full analytics snapshot for the user's active program.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`program_progress`](Self::program_progress).
    pub async fn program_analytics(
        &self,
        user: UserId,
        start_date: Option<DateTime<Utc>>,
    ) -> Result<ProgramAnalytics, OperationError> {
        let (program, record) = self.load(user).await?;
        let program = program.ok_or_else(|| {
            OperationError::new(
                ErrorKind::ProgramStructureChanged,
                "Your program is no longer available.",
            )
        })?;
        Ok(analytics::program_analytics(&program, &record, start_date))
    }

    /// Begin an in-memory session for the user's current workout day.
    ///
    /// # Errors
    ///
    /// A validation error when today is a rest day or the position is not a
    /// real day, plus the usual load failures.
    pub async fn start_session(&self, user: UserId) -> Result<WorkoutSession, OperationError> {
        let (program, record) = self.load(user).await?;
        let program = program.ok_or_else(|| {
            OperationError::new(
                ErrorKind::ProgramStructureChanged,
                "Your program is no longer available.",
            )
        })?;
        let position = record.position().ok_or_else(|| {
            OperationError::new(
                ErrorKind::CorruptedProgress,
                "Your saved position got corrupted.",
            )
        })?;
        let workout = program
            .milestone(position.milestone)
            .and_then(|m| m.day(position.day))
            .and_then(Day::workout)
            .ok_or_else(|| {
                OperationError::validation("Today is a rest day; there is no session to start.")
            })?;
        Ok(WorkoutSession::start(
            position,
            workout.clone(),
            self.clock.now(),
        ))
    }

    /// Build an optimistic update manager for one client session.
    #[must_use]
    pub fn optimistic_session(
        &self,
        confirmed: SessionState,
        online: watch::Receiver<bool>,
        submit_fn: SubmitFn,
        policy: RetryPolicy,
    ) -> OptimisticManager {
        OptimisticManager::new(confirmed, online, submit_fn, policy)
    }

    /// Build a conflict resolver for reconciling two session snapshots.
    #[must_use]
    pub fn conflict_resolver(&self) -> ConflictResolver {
        ConflictResolver::new()
    }

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
            Err(StorageError::NotFound) => None,
            Err(other) => return Err(other.into()),
        };
        Ok((program, record))
    }
}
