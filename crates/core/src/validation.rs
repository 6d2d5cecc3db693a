//! Consistency validation and repair planning for user progress.
//!
//! The curriculum can change underneath a user (milestones removed, days
//! trimmed, the program unpublished or deleted). A stored position that no
//! longer fits the curriculum is a *corruption state*, not a crash: the
//! checks here diagnose it and compute a single safe corrective action.

use serde::{Deserialize, Serialize};

use crate::model::{Position, Program, UserProgress};

//
// ─── STRUCTURAL CONSISTENCY ────────────────────────────────────────────────────
//

/// Outcome of the low-level consistency checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsistencyReport {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ConsistencyReport {
    fn from_parts(errors: Vec<String>, warnings: Vec<String>) -> Self {
        Self {
            is_valid: errors.is_empty(),
            errors,
            warnings,
        }
    }
}

/// Runs every structural check and accumulates the findings.
///
/// `program` is `None` when the referenced program could not be resolved;
/// that yields a single "program not found" error and skips the structural
/// checks, since there is no structure to check against. All other checks run
/// unconditionally and accumulate.
#[must_use]
pub fn check_consistency(program: Option<&Program>, progress: &UserProgress) -> ConsistencyReport {
    let Some(program) = program else {
        return ConsistencyReport::from_parts(vec!["program not found".into()], Vec::new());
    };

    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    let milestone_index = progress.current_milestone_index;
    let day_index = progress.current_day_index;
    let milestone_count = i64::from(program.milestone_count());

    if milestone_index < 0 {
        errors.push(format!("milestone index {milestone_index} is negative"));
    }
    if day_index < 0 {
        errors.push(format!("day index {day_index} is negative"));
    }
    if program.milestone_count() == 0 {
        errors.push("program has no milestones".into());
    }
    // `milestone_index == milestone_count` is the completion sentinel; only
    // strictly beyond it is an error.
    if i64::from(milestone_index) > milestone_count {
        errors.push(format!(
            "milestone index {milestone_index} exceeds program milestones ({milestone_count})"
        ));
    }

    if milestone_index >= 0 {
        if let Some(milestone) = program.milestone(milestone_index as u32) {
            if milestone.day_count() == 0 {
                warnings.push(format!("milestone {milestone_index} has no days defined"));
            } else if day_index >= 0 && day_index as u32 >= milestone.day_count() {
                errors.push(format!(
                    "day index {day_index} exceeds milestone days ({})",
                    milestone.day_count()
                ));
            }
        }
    }

    if !program.is_published() {
        warnings.push("program is not published".into());
    }

    ConsistencyReport::from_parts(errors, warnings)
}

//
// ─── REPAIR PLANNING ───────────────────────────────────────────────────────────
//

/// A computed corrective position change. Ephemeral: these are executed or
/// shown to the user, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RepairAction {
    AdjustToValidPosition {
        milestone: u32,
        day: u32,
        description: String,
    },
    ResetToStart {
        description: String,
    },
    AssignNewProgram {
        description: String,
    },
}

impl RepairAction {
    /// Position the action would move the user to, when it carries one.
    #[must_use]
    pub fn target(&self) -> Option<Position> {
        match self {
            RepairAction::AdjustToValidPosition { milestone, day, .. } => {
                Some(Position::new(*milestone, *day))
            }
            RepairAction::ResetToStart { .. } => Some(Position::start()),
            RepairAction::AssignNewProgram { .. } => None,
        }
    }

    #[must_use]
    pub fn description(&self) -> &str {
        match self {
            RepairAction::AdjustToValidPosition { description, .. }
            | RepairAction::ResetToStart { description }
            | RepairAction::AssignNewProgram { description } => description,
        }
    }

    /// Whether the action can be committed without user involvement.
    #[must_use]
    pub fn can_auto_repair(&self) -> bool {
        !matches!(self, RepairAction::AssignNewProgram { .. })
    }
}

/// Machine-readable classification of a progress fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultKind {
    CorruptedProgress,
    MilestoneIndexInvalid,
    DayIndexInvalid,
    ProgramStructureChanged,
}

/// One user-facing validation finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressFault {
    pub kind: FaultKind,
    /// Plain-language description, safe to show to the user.
    pub message: String,
    pub suggested_action: String,
    pub can_auto_repair: bool,
}

/// Result of the user-facing validation pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressValidation {
    pub is_valid: bool,
    pub faults: Vec<ProgressFault>,
    pub can_be_repaired: bool,
    /// The single primary repair strategy for this validation, when invalid.
    pub repair: Option<RepairAction>,
}

impl ProgressValidation {
    fn valid() -> Self {
        Self {
            is_valid: true,
            faults: Vec::new(),
            can_be_repaired: false,
            repair: None,
        }
    }

    /// First fault, for callers that report a single headline problem.
    #[must_use]
    pub fn primary_fault(&self) -> Option<&ProgressFault> {
        self.faults.first()
    }
}

/// True when `(milestone, day)` addresses a real day of `program`.
#[must_use]
pub fn is_valid_position(program: &Program, position: Position) -> bool {
    program
        .milestone(position.milestone)
        .is_some_and(|m| position.day < m.day_count())
}

/// User-facing validation with repair planning.
///
/// Exactly one primary repair strategy is computed per call, in priority
/// order: unresolvable program → pick a new program; day overflow inside a
/// valid milestone → clamp to that milestone's last day (never silently jump
/// milestones when only the day is wrong); milestone overflow → last day of
/// the last milestone; anything else (negative or otherwise unrecoverable) →
/// reset to the start. A computed target that fails its own validity re-check
/// falls back to the start.
#[must_use]
pub fn validate_user_progress(
    program: Option<&Program>,
    progress: &UserProgress,
) -> ProgressValidation {
    let Some(program) = program else {
        let repair = RepairAction::AssignNewProgram {
            description: "Choose a new program to continue training".into(),
        };
        return ProgressValidation {
            is_valid: false,
            faults: vec![ProgressFault {
                kind: FaultKind::ProgramStructureChanged,
                message: "Your program is no longer available.".into(),
                suggested_action: "Pick a new program to keep going.".into(),
                can_auto_repair: false,
            }],
            can_be_repaired: false,
            repair: Some(repair),
        };
    };

    let milestone_index = progress.current_milestone_index;
    let day_index = progress.current_day_index;
    let milestone_count = program.milestone_count();

    let mut faults = Vec::new();

    let negative = milestone_index < 0 || day_index < 0;
    if negative {
        faults.push(ProgressFault {
            kind: FaultKind::CorruptedProgress,
            message: "Your saved position got corrupted.".into(),
            suggested_action: "Restart from the beginning of the program.".into(),
            can_auto_repair: true,
        });
    }

    let milestone_overflow =
        milestone_index >= 0 && milestone_index as u32 > milestone_count;
    if milestone_overflow {
        faults.push(ProgressFault {
            kind: FaultKind::MilestoneIndexInvalid,
            message: "Your saved milestone no longer exists in this program.".into(),
            suggested_action: "Move to the last milestone of the program.".into(),
            can_auto_repair: true,
        });
    }

    let mut day_overflow_in_valid_milestone = None;
    if !negative && (milestone_index as u32) < milestone_count {
        if let Some(milestone) = program.milestone(milestone_index as u32) {
            if day_index as u32 >= milestone.day_count() {
                day_overflow_in_valid_milestone = Some(milestone.day_count());
                faults.push(ProgressFault {
                    kind: FaultKind::DayIndexInvalid,
                    message: "Your saved day no longer exists in this milestone.".into(),
                    suggested_action: "Move to the last day of the current milestone.".into(),
                    can_auto_repair: true,
                });
            }
        }
    }

    if faults.is_empty() {
        return ProgressValidation::valid();
    }

    let candidate = if let Some(day_count) = day_overflow_in_valid_milestone {
        // clamp within the same milestone; a zero-day milestone has no valid
        // day and falls through to the start fallback below
        day_count.checked_sub(1).map(|day| RepairAction::AdjustToValidPosition {
            milestone: milestone_index as u32,
            day,
            description: "Adjusted to the last day of your current milestone".into(),
        })
    } else if milestone_overflow && milestone_count > 0 {
        let last = milestone_count - 1;
        program.milestone(last).map(|m| RepairAction::AdjustToValidPosition {
            milestone: last,
            day: m.day_count().saturating_sub(1),
            description: "Adjusted to the last day of the program".into(),
        })
    } else {
        Some(RepairAction::ResetToStart {
            description: "Reset progress to beginning".into(),
        })
    };

    // re-check the computed target; a bad target (e.g. the last milestone has
    // zero days) falls back to the origin
    let repair = match candidate {
        Some(action)
            if action
                .target()
                .is_none_or(|t| is_valid_position(program, t)) =>
        {
            action
        }
        _ => RepairAction::ResetToStart {
            description: "Reset progress to beginning (fallback)".into(),
        },
    };

    ProgressValidation {
        is_valid: false,
        can_be_repaired: repair.can_auto_repair(),
        repair: Some(repair),
        faults,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        Day, ExerciseId, ExerciseSlot, ExerciseTarget, Milestone, Program, ProgramId, UserId,
        Workout,
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

    fn progress_at(milestone: i32, day: i32) -> UserProgress {
        let mut progress = UserProgress::assigned(UserId::new(1), ProgramId::new(1));
        progress.current_milestone_index = milestone;
        progress.current_day_index = day;
        progress
    }

    #[test]
    fn consistency_missing_program_is_a_single_error() {
        let report = check_consistency(None, &progress_at(0, 0));
        assert!(!report.is_valid);
        assert_eq!(report.errors, vec!["program not found".to_string()]);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn consistency_accumulates_all_errors() {
        let program = program_with_days(&[3]);
        let report = check_consistency(Some(&program), &progress_at(-1, -2));
        assert!(!report.is_valid);
        assert_eq!(report.errors.len(), 2);
    }

    #[test]
    fn consistency_sentinel_position_is_valid() {
        let program = program_with_days(&[3, 2]);
        let report = check_consistency(Some(&program), &progress_at(2, 0));
        assert!(report.is_valid);
    }

    #[test]
    fn consistency_beyond_sentinel_is_an_error() {
        let program = program_with_days(&[3, 2]);
        let report = check_consistency(Some(&program), &progress_at(3, 0));
        assert!(!report.is_valid);
        assert!(report.errors[0].contains("exceeds program milestones"));
    }

    #[test]
    fn consistency_zero_day_milestone_is_a_warning() {
        let program = Program::new(
            ProgramId::new(1),
            "Sparse",
            true,
            vec![Milestone::new("Empty", Vec::new()).unwrap()],
        )
        .unwrap();
        let report = check_consistency(Some(&program), &progress_at(0, 0));
        assert!(report.is_valid);
        assert_eq!(report.warnings, vec!["milestone 0 has no days defined".to_string()]);
    }

    #[test]
    fn consistency_unpublished_program_warns_without_invalidating() {
        let program = Program::new(
            ProgramId::new(1),
            "Draft",
            false,
            vec![Milestone::new("M", vec![workout_day()]).unwrap()],
        )
        .unwrap();
        let report = check_consistency(Some(&program), &progress_at(0, 0));
        assert!(report.is_valid);
        assert_eq!(report.warnings, vec!["program is not published".to_string()]);
    }

    #[test]
    fn day_overflow_clamps_to_same_milestone() {
        // position (0,10) on a 3-day milestone
        let program = program_with_days(&[3, 4]);
        let validation = validate_user_progress(Some(&program), &progress_at(0, 10));

        assert!(!validation.is_valid);
        assert_eq!(validation.faults[0].kind, FaultKind::DayIndexInvalid);
        assert!(validation.can_be_repaired);
        assert_eq!(
            validation.repair.unwrap().target(),
            Some(Position::new(0, 2))
        );
    }

    #[test]
    fn milestone_overflow_targets_last_day_of_last_milestone() {
        // position (10,0) on a 2-milestone program
        let program = program_with_days(&[3, 4]);
        let validation = validate_user_progress(Some(&program), &progress_at(10, 0));

        assert_eq!(validation.faults[0].kind, FaultKind::MilestoneIndexInvalid);
        assert_eq!(
            validation.repair.unwrap().target(),
            Some(Position::new(1, 3))
        );
    }

    #[test]
    fn negative_indices_reset_to_start() {
        let program = program_with_days(&[3, 4]);
        let validation = validate_user_progress(Some(&program), &progress_at(-1, -1));

        assert_eq!(validation.faults[0].kind, FaultKind::CorruptedProgress);
        assert!(validation.can_be_repaired);
        let repair = validation.repair.unwrap();
        assert!(matches!(repair, RepairAction::ResetToStart { .. }));
        assert_eq!(repair.target(), Some(Position::start()));
    }

    #[test]
    fn unresolved_program_requires_user_choice() {
        let validation = validate_user_progress(None, &progress_at(0, 0));
        assert!(!validation.is_valid);
        assert!(!validation.can_be_repaired);
        assert_eq!(
            validation.faults[0].kind,
            FaultKind::ProgramStructureChanged
        );
        assert!(matches!(
            validation.repair,
            Some(RepairAction::AssignNewProgram { .. })
        ));
    }

    #[test]
    fn invalid_computed_target_falls_back_to_start() {
        // last milestone has zero days, so the milestone-overflow target is
        // itself invalid
        let program = Program::new(
            ProgramId::new(1),
            "Trailing Empty",
            true,
            vec![
                Milestone::new("Full", vec![workout_day()]).unwrap(),
                Milestone::new("Empty", Vec::new()).unwrap(),
            ],
        )
        .unwrap();
        let validation = validate_user_progress(Some(&program), &progress_at(5, 0));

        let repair = validation.repair.unwrap();
        assert_eq!(repair.description(), "Reset progress to beginning (fallback)");
        assert_eq!(repair.target(), Some(Position::start()));
    }

    #[test]
    fn sentinel_position_is_valid_for_user_validation() {
        let program = program_with_days(&[3, 4]);
        let validation = validate_user_progress(Some(&program), &progress_at(2, 0));
        assert!(validation.is_valid);
        assert!(validation.repair.is_none());
    }

    #[test]
    fn repair_target_is_idempotent() {
        // applying the action's target and re-validating yields a valid
        // position whose repair would be a no-op
        let program = program_with_days(&[3, 4]);
        let first = validate_user_progress(Some(&program), &progress_at(0, 10));
        let target = first.repair.unwrap().target().unwrap();

        let repaired = progress_at(target.milestone as i32, target.day as i32);
        let second = validate_user_progress(Some(&program), &repaired);
        assert!(second.is_valid);
    }

    #[test]
    fn repair_action_serializes_with_snake_case_tag() {
        let action = RepairAction::AdjustToValidPosition {
            milestone: 1,
            day: 3,
            description: "Adjusted".into(),
        };
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["type"], "adjust_to_valid_position");
        assert_eq!(json["milestone"], 1);
    }
}
