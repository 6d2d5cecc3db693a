use async_trait::async_trait;
use chrono::{DateTime, Utc};
use coach_core::model::{
    CompletionKey, ExerciseCompletion, Program, ProgramId, UserId, UserProgress,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Partial position update. `None` fields are left untouched; the whole patch
/// is applied atomically in one call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PositionPatch {
    pub milestone: Option<i32>,
    pub day: Option<i32>,
    /// When set, bumps the workout counter and stamps the last workout date
    /// as part of the same atomic write.
    pub workout_completed_at: Option<DateTime<Utc>>,
}

impl PositionPatch {
    /// Patch moving the user to `(milestone, day)`.
    #[must_use]
    pub fn move_to(milestone: i32, day: i32) -> Self {
        Self {
            milestone: Some(milestone),
            day: Some(day),
            workout_completed_at: None,
        }
    }

    /// Same move, also recording a completed workout.
    #[must_use]
    pub fn move_to_after_workout(milestone: i32, day: i32, at: DateTime<Utc>) -> Self {
        Self {
            milestone: Some(milestone),
            day: Some(day),
            workout_completed_at: Some(at),
        }
    }
}

/// Curriculum reader. End-user flows resolve published programs only.
#[async_trait]
pub trait ProgramRepository: Send + Sync {
    /// Fetch a program by ID regardless of publication state.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn get_program(&self, id: ProgramId) -> Result<Program, StorageError>;

    /// Fetch a program by ID, treating unpublished programs as missing.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing or unpublished.
    async fn get_published_program(&self, id: ProgramId) -> Result<Program, StorageError> {
        let program = self.get_program(id).await?;
        if program.is_published() {
            Ok(program)
        } else {
            Err(StorageError::NotFound)
        }
    }
}

/// Position store for user progress records. `update_position` is assumed
/// atomic per call.
#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// Fetch a user's progress record.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the user has no record.
    async fn get_progress(&self, user: UserId) -> Result<UserProgress, StorageError>;

    /// Persist or replace a user's progress record.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be stored.
    async fn upsert_progress(&self, progress: &UserProgress) -> Result<(), StorageError>;

    /// Apply a partial position update to an existing record.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the user has no record, or other
    /// storage errors.
    async fn update_position(&self, user: UserId, patch: PositionPatch)
    -> Result<(), StorageError>;
}

/// Completion store. One record is "the latest" per composite key: an upsert
/// with an identical key replaces the stored record and keeps its ID.
#[async_trait]
pub trait CompletionRepository: Send + Sync {
    /// Insert or update the completion for its key, returning the record ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be stored.
    async fn upsert_completion(&self, completion: &ExerciseCompletion)
    -> Result<i64, StorageError>;

    /// Fetch the latest completion for a key.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if no completion exists for the key.
    async fn get_completion(&self, key: &CompletionKey) -> Result<ExerciseCompletion, StorageError>;

    /// All completions a user has recorded for one day of one program.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failure. An empty day yields an
    /// empty list, not `NotFound`.
    async fn completions_for_day(
        &self,
        user: UserId,
        program: ProgramId,
        milestone_index: u32,
        day_index: u32,
    ) -> Result<Vec<ExerciseCompletion>, StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    programs: Arc<Mutex<HashMap<ProgramId, Program>>>,
    progress: Arc<Mutex<HashMap<UserId, UserProgress>>>,
    completions: Arc<Mutex<HashMap<CompletionKey, (i64, ExerciseCompletion)>>>,
    next_completion_id: Arc<Mutex<i64>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a program, replacing any existing one with the same ID.
    pub fn put_program(&self, program: Program) {
        if let Ok(mut guard) = self.programs.lock() {
            guard.insert(program.id(), program);
        }
    }

    /// Remove a program, simulating curriculum deletion underneath a user.
    pub fn remove_program(&self, id: ProgramId) {
        if let Ok(mut guard) = self.programs.lock() {
            guard.remove(&id);
        }
    }
}

#[async_trait]
impl ProgramRepository for InMemoryRepository {
    async fn get_program(&self, id: ProgramId) -> Result<Program, StorageError> {
        let guard = self
            .programs
            .lock()
            .map_err(|e| StorageError::Unavailable(e.to_string()))?;
        guard.get(&id).cloned().ok_or(StorageError::NotFound)
    }
}

#[async_trait]
impl ProgressRepository for InMemoryRepository {
    async fn get_progress(&self, user: UserId) -> Result<UserProgress, StorageError> {
        let guard = self
            .progress
            .lock()
            .map_err(|e| StorageError::Unavailable(e.to_string()))?;
        guard.get(&user).cloned().ok_or(StorageError::NotFound)
    }

    async fn upsert_progress(&self, progress: &UserProgress) -> Result<(), StorageError> {
        let mut guard = self
            .progress
            .lock()
            .map_err(|e| StorageError::Unavailable(e.to_string()))?;
        guard.insert(progress.user_id, progress.clone());
        Ok(())
    }

    async fn update_position(
        &self,
        user: UserId,
        patch: PositionPatch,
    ) -> Result<(), StorageError> {
        let mut guard = self
            .progress
            .lock()
            .map_err(|e| StorageError::Unavailable(e.to_string()))?;
        let record = guard.get_mut(&user).ok_or(StorageError::NotFound)?;
        if let Some(milestone) = patch.milestone {
            record.current_milestone_index = milestone;
        }
        if let Some(day) = patch.day {
            record.current_day_index = day;
        }
        if let Some(at) = patch.workout_completed_at {
            record.total_workouts_completed += 1;
            record.last_workout_date = Some(at);
        }
        Ok(())
    }
}

#[async_trait]
impl CompletionRepository for InMemoryRepository {
    async fn upsert_completion(
        &self,
        completion: &ExerciseCompletion,
    ) -> Result<i64, StorageError> {
        let mut guard = self
            .completions
            .lock()
            .map_err(|e| StorageError::Unavailable(e.to_string()))?;
        let key = completion.key();
        if let Some((id, stored)) = guard.get_mut(&key) {
            *stored = completion.clone();
            return Ok(*id);
        }
        let mut counter = self
            .next_completion_id
            .lock()
            .map_err(|e| StorageError::Unavailable(e.to_string()))?;
        *counter += 1;
        let id = *counter;
        guard.insert(key, (id, completion.clone()));
        Ok(id)
    }

    async fn get_completion(
        &self,
        key: &CompletionKey,
    ) -> Result<ExerciseCompletion, StorageError> {
        let guard = self
            .completions
            .lock()
            .map_err(|e| StorageError::Unavailable(e.to_string()))?;
        guard
            .get(key)
            .map(|(_, c)| c.clone())
            .ok_or(StorageError::NotFound)
    }

    async fn completions_for_day(
        &self,
        user: UserId,
        program: ProgramId,
        milestone_index: u32,
        day_index: u32,
    ) -> Result<Vec<ExerciseCompletion>, StorageError> {
        let guard = self
            .completions
            .lock()
            .map_err(|e| StorageError::Unavailable(e.to_string()))?;
        let mut found: Vec<_> = guard
            .values()
            .filter(|(_, c)| {
                let key = c.key();
                key.user_id == user
                    && key.program_id == program
                    && key.milestone_index == milestone_index
                    && key.day_index == day_index
            })
            .map(|(_, c)| c.clone())
            .collect();
        found.sort_by_key(|c| c.key().exercise_id);
        Ok(found)
    }
}

/// Aggregates the collaborator contracts behind trait objects for easy
/// backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub programs: Arc<dyn ProgramRepository>,
    pub progress: Arc<dyn ProgressRepository>,
    pub completions: Arc<dyn CompletionRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_in_memory(InMemoryRepository::new())
    }

    /// Wrap an existing in-memory repository, sharing its contents.
    #[must_use]
    pub fn from_in_memory(repo: InMemoryRepository) -> Self {
        let programs: Arc<dyn ProgramRepository> = Arc::new(repo.clone());
        let progress: Arc<dyn ProgressRepository> = Arc::new(repo.clone());
        let completions: Arc<dyn CompletionRepository> = Arc::new(repo);
        Self {
            programs,
            progress,
            completions,
        }
    }
}
