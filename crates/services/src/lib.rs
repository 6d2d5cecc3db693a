#![forbid(unsafe_code)]

pub mod advancement;
pub mod context;
pub mod error;
pub mod optimistic;
pub mod repair;
pub mod sync;

pub use coach_core::Clock;

pub use advancement::{
    AdvanceOutcome, AdvancementService, CompleteExerciseInput, CompleteExerciseOutcome,
    CompletionResult, ExerciseStep, WorkoutSession,
};
pub use context::ProgressServices;
pub use error::{ErrorKind, OperationError};
pub use optimistic::{
    CancelToken, OptimisticManager, RecoveryAction, RetryPolicy, SessionState, StatePatch,
    SubmitStatus, UpdateStatus,
};
pub use repair::{AppliedRepair, RepairService};
pub use sync::{Conflict, ConflictField, ConflictResolver, ConflictWinner, ResolutionStrategy};
