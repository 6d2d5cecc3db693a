//! Advancement state machine: how a position moves forward one day,
//! milestone or exercise at a time.

mod engine;
mod service;
mod workout;

pub use engine::{DayAdvance, ExerciseStep, exercise_step, next_day_position};
pub use service::{
    AdvanceOutcome, AdvancementService, CompleteExerciseInput, CompleteExerciseOutcome,
    CompletionResult,
};
pub use workout::WorkoutSession;
