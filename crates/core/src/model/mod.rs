mod completion;
mod ids;
mod program;
mod progress;

pub use completion::{CompletionError, CompletionKey, ExerciseCompletion, MAX_NOTES_LEN};
pub use ids::{ExerciseId, ProgramId, UserId};
pub use program::{
    Day, ExerciseSlot, ExerciseTarget, Milestone, Program, ProgramError, TargetError, Workout,
    WorkoutFormat, MAX_DISTANCE_M, MAX_DURATION_SECS, MAX_REPS, MAX_SETS, MAX_WEIGHT_KG,
};
pub use progress::{Position, UserProgress};
