//! Optimistic session updates with retry, offline queueing, and recovery.

mod manager;
mod retry;
mod state;

pub use manager::{
    OptimisticManager, OptimisticUpdate, RecoveryAction, SubmitFn, SubmitStatus, UpdateStatus,
};
pub use retry::{CancelToken, RetryPolicy};
pub use state::{ExerciseProgress, SessionState, StatePatch};
