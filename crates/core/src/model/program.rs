use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{ExerciseId, ProgramId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProgramError {
    #[error("program name cannot be empty")]
    EmptyName,

    #[error("milestone name cannot be empty")]
    EmptyMilestoneName,

    #[error("workout day needs at least one exercise slot")]
    WorkoutWithoutExercises,

    #[error("AMRAP duration must be > 0 seconds")]
    InvalidAmrapDuration,
}

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum TargetError {
    #[error("sets must be between 1 and {MAX_SETS}, got {0}")]
    SetsOutOfRange(u32),

    #[error("reps must be between 1 and {MAX_REPS}, got {0}")]
    RepsOutOfRange(u32),

    #[error("weight must be between 0 and {MAX_WEIGHT_KG} kg, got {0}")]
    WeightOutOfRange(f64),

    #[error("duration must be at most {MAX_DURATION_SECS} seconds, got {0}")]
    DurationOutOfRange(u32),

    #[error("distance must be at most {MAX_DISTANCE_M} meters, got {0}")]
    DistanceOutOfRange(u32),
}

//
// ─── TARGET BOUNDS ─────────────────────────────────────────────────────────────
//

/// Upper bound for target sets per exercise.
pub const MAX_SETS: u32 = 99;
/// Upper bound for target reps per set.
pub const MAX_REPS: u32 = 999;
/// Upper bound for target weight in kilograms.
pub const MAX_WEIGHT_KG: f64 = 1000.0;
/// Upper bound for timed targets (24 hours).
pub const MAX_DURATION_SECS: u32 = 86_400;
/// Upper bound for distance targets (1000 km).
pub const MAX_DISTANCE_M: u32 = 1_000_000;

/// Prescribed work for one exercise slot.
///
/// Bounds are enforced at construction so downstream code never sees an
/// out-of-range prescription.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseTarget {
    sets: u32,
    reps: u32,
    weight_kg: Option<f64>,
    duration_secs: Option<u32>,
    distance_m: Option<u32>,
}

impl ExerciseTarget {
    /// Creates a validated target.
    ///
    /// # Errors
    ///
    /// Returns `TargetError` if any field is outside its documented range.
    pub fn new(
        sets: u32,
        reps: u32,
        weight_kg: Option<f64>,
        duration_secs: Option<u32>,
        distance_m: Option<u32>,
    ) -> Result<Self, TargetError> {
        if sets == 0 || sets > MAX_SETS {
            return Err(TargetError::SetsOutOfRange(sets));
        }
        if reps == 0 || reps > MAX_REPS {
            return Err(TargetError::RepsOutOfRange(reps));
        }
        if let Some(w) = weight_kg {
            if !(0.0..=MAX_WEIGHT_KG).contains(&w) {
                return Err(TargetError::WeightOutOfRange(w));
            }
        }
        if let Some(d) = duration_secs {
            if d > MAX_DURATION_SECS {
                return Err(TargetError::DurationOutOfRange(d));
            }
        }
        if let Some(d) = distance_m {
            if d > MAX_DISTANCE_M {
                return Err(TargetError::DistanceOutOfRange(d));
            }
        }
        Ok(Self {
            sets,
            reps,
            weight_kg,
            duration_secs,
            distance_m,
        })
    }

    #[must_use]
    pub fn sets(&self) -> u32 {
        self.sets
    }

    #[must_use]
    pub fn reps(&self) -> u32 {
        self.reps
    }

    #[must_use]
    pub fn weight_kg(&self) -> Option<f64> {
        self.weight_kg
    }

    #[must_use]
    pub fn duration_secs(&self) -> Option<u32> {
        self.duration_secs
    }

    #[must_use]
    pub fn distance_m(&self) -> Option<u32> {
        self.distance_m
    }
}

/// One exercise within a workout day, with its prescription.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseSlot {
    exercise_id: ExerciseId,
    target: ExerciseTarget,
}

impl ExerciseSlot {
    #[must_use]
    pub fn new(exercise_id: ExerciseId, target: ExerciseTarget) -> Self {
        Self {
            exercise_id,
            target,
        }
    }

    #[must_use]
    pub fn exercise_id(&self) -> ExerciseId {
        self.exercise_id
    }

    #[must_use]
    pub fn target(&self) -> &ExerciseTarget {
        &self.target
    }
}

//
// ─── DAYS ──────────────────────────────────────────────────────────────────────
//

/// Progression mode for a workout day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum WorkoutFormat {
    /// Fixed exercise list, performed once in order.
    Linear,
    /// As many rounds as possible within the time budget; the exercise list
    /// cycles and there is no fixed round count.
    Amrap { duration_secs: u32 },
}

/// Exercises prescribed for a single workout day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workout {
    slots: Vec<ExerciseSlot>,
    format: WorkoutFormat,
}

impl Workout {
    /// Creates a linear workout.
    ///
    /// # Errors
    ///
    /// Returns `ProgramError::WorkoutWithoutExercises` if `slots` is empty.
    pub fn linear(slots: Vec<ExerciseSlot>) -> Result<Self, ProgramError> {
        if slots.is_empty() {
            return Err(ProgramError::WorkoutWithoutExercises);
        }
        Ok(Self {
            slots,
            format: WorkoutFormat::Linear,
        })
    }

    /// Creates an AMRAP workout. An empty slot list is allowed: duration-only
    /// AMRAP days exist in authored content.
    ///
    /// # Errors
    ///
    /// Returns `ProgramError::InvalidAmrapDuration` if `duration_secs` is zero.
    pub fn amrap(slots: Vec<ExerciseSlot>, duration_secs: u32) -> Result<Self, ProgramError> {
        if duration_secs == 0 {
            return Err(ProgramError::InvalidAmrapDuration);
        }
        Ok(Self {
            slots,
            format: WorkoutFormat::Amrap { duration_secs },
        })
    }

    #[must_use]
    pub fn slots(&self) -> &[ExerciseSlot] {
        &self.slots
    }

    #[must_use]
    pub fn slot_count(&self) -> u32 {
        u32::try_from(self.slots.len()).unwrap_or(u32::MAX)
    }

    #[must_use]
    pub fn format(&self) -> WorkoutFormat {
        self.format
    }

    #[must_use]
    pub fn is_amrap(&self) -> bool {
        matches!(self.format, WorkoutFormat::Amrap { .. })
    }
}

/// A single scheduled day within a milestone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Day {
    Rest,
    Workout(Workout),
}

impl Day {
    #[must_use]
    pub fn is_workout(&self) -> bool {
        matches!(self, Day::Workout(_))
    }

    #[must_use]
    pub fn workout(&self) -> Option<&Workout> {
        match self {
            Day::Workout(w) => Some(w),
            Day::Rest => None,
        }
    }
}

//
// ─── MILESTONES & PROGRAMS ─────────────────────────────────────────────────────
//

/// A phase of a program: an ordered list of days.
///
/// A milestone with zero days is representable on purpose. Authored content
/// can reach that state and the validation engine diagnoses it as a warning
/// rather than refusing to load the program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Milestone {
    name: String,
    days: Vec<Day>,
}

impl Milestone {
    /// Creates a milestone.
    ///
    /// # Errors
    ///
    /// Returns `ProgramError::EmptyMilestoneName` if the name is blank.
    pub fn new(name: impl Into<String>, days: Vec<Day>) -> Result<Self, ProgramError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ProgramError::EmptyMilestoneName);
        }
        Ok(Self { name, days })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn days(&self) -> &[Day] {
        &self.days
    }

    #[must_use]
    pub fn day_count(&self) -> u32 {
        u32::try_from(self.days.len()).unwrap_or(u32::MAX)
    }

    #[must_use]
    pub fn day(&self, index: u32) -> Option<&Day> {
        self.days.get(index as usize)
    }
}

/// Top-level curriculum: an ordered list of milestones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    id: ProgramId,
    name: String,
    is_published: bool,
    milestones: Vec<Milestone>,
}

impl Program {
    /// Creates a program.
    ///
    /// # Errors
    ///
    /// Returns `ProgramError::EmptyName` if the name is blank.
    pub fn new(
        id: ProgramId,
        name: impl Into<String>,
        is_published: bool,
        milestones: Vec<Milestone>,
    ) -> Result<Self, ProgramError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ProgramError::EmptyName);
        }
        Ok(Self {
            id,
            name,
            is_published,
            milestones,
        })
    }

    #[must_use]
    pub fn id(&self) -> ProgramId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn is_published(&self) -> bool {
        self.is_published
    }

    #[must_use]
    pub fn milestones(&self) -> &[Milestone] {
        &self.milestones
    }

    #[must_use]
    pub fn milestone_count(&self) -> u32 {
        u32::try_from(self.milestones.len()).unwrap_or(u32::MAX)
    }

    #[must_use]
    pub fn milestone(&self, index: u32) -> Option<&Milestone> {
        self.milestones.get(index as usize)
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
