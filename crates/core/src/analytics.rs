//! Pure calculators over a curriculum snapshot and a position.
//!
//! Everything here is deterministic, allocation-light and O(total days).
//! Inputs are never mutated; out-of-contract positions are handled
//! defensively (clamped or reported) rather than panicking.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{Program, UserProgress};

/// Total number of days across all milestones.
#[must_use]
pub fn total_days(program: &Program) -> u32 {
    program.milestones().iter().map(|m| m.day_count()).sum()
}

/// Total number of workout days across all milestones.
#[must_use]
pub fn total_workout_days(program: &Program) -> u32 {
    program
        .milestones()
        .iter()
        .flat_map(|m| m.days())
        .filter(|d| d.is_workout())
        .count() as u32
}

/// Total number of rest days across all milestones.
#[must_use]
pub fn total_rest_days(program: &Program) -> u32 {
    total_days(program) - total_workout_days(program)
}

/// Signed count of days strictly before the given raw position.
///
/// Negative day indices produce negative counts; a milestone index beyond the
/// program counts every day. Callers that want a sane number must validate
/// first — the signed result is what lets `program_progress` surface
/// anomalies instead of hiding them.
fn days_before(program: &Program, milestone_index: i64, day_index: i64) -> i64 {
    let full: i64 = program
        .milestones()
        .iter()
        .take(milestone_index.clamp(0, program.milestones().len() as i64) as usize)
        .map(|m| i64::from(m.day_count()))
        .sum();
    full + day_index
}

/// 1-based ordinal of the day at `(milestone_index, day_index)` within the
/// whole program. Returns 0 for a program with no days.
#[must_use]
pub fn absolute_day_position(program: &Program, milestone_index: u32, day_index: u32) -> u32 {
    if total_days(program) == 0 {
        return 0;
    }
    let before = days_before(program, i64::from(milestone_index), i64::from(day_index));
    u32::try_from(before + 1).unwrap_or(0)
}

/// Workout/rest split of the days strictly before a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DayTypeCounts {
    pub workout: u32,
    pub rest: u32,
}

/// Counts workout and rest days strictly before `(milestone_index, day_index)`.
///
/// Analytics only; advancement never gates on these counts.
#[must_use]
pub fn completed_days_by_type(
    program: &Program,
    milestone_index: u32,
    day_index: u32,
) -> DayTypeCounts {
    let mut counts = DayTypeCounts::default();
    for (mi, milestone) in program.milestones().iter().enumerate() {
        let mi = mi as u32;
        if mi > milestone_index {
            break;
        }
        let take = if mi < milestone_index {
            milestone.days().len()
        } else {
            (day_index as usize).min(milestone.days().len())
        };
        for day in &milestone.days()[..take] {
            if day.is_workout() {
                counts.workout += 1;
            } else {
                counts.rest += 1;
            }
        }
    }
    counts
}

/// Completion within a single milestone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MilestoneProgress {
    /// Milestone the figures refer to; clamped to the last real milestone
    /// when the supplied index overflows.
    pub milestone_index: u32,
    pub days_completed: u32,
    pub total_days: u32,
    /// Rounded percentage, 0–100.
    pub percent: u32,
    pub is_current_milestone_complete: bool,
}

/// Completion percentage within the milestone addressed by the position.
///
/// Defensive by contract: never panics on out-of-range input. A milestone
/// index at or beyond the program (the completion sentinel included) clamps
/// to the last real milestone and reports it complete; an empty program
/// reports zero days and complete.
#[must_use]
pub fn milestone_progress(
    program: &Program,
    milestone_index: u32,
    day_index: u32,
) -> MilestoneProgress {
    let count = program.milestone_count();
    if count == 0 {
        return MilestoneProgress {
            milestone_index: 0,
            days_completed: 0,
            total_days: 0,
            percent: 100,
            is_current_milestone_complete: true,
        };
    }

    let overflowed = milestone_index >= count;
    let clamped = if overflowed { count - 1 } else { milestone_index };
    let total = program.milestone(clamped).map_or(0, |m| m.day_count());

    let complete = overflowed || total == 0 || day_index + 1 >= total;
    let days_completed = if complete {
        total
    } else {
        day_index.min(total)
    };
    let percent = if complete || total == 0 {
        100
    } else {
        (u64::from(days_completed) * 100 + u64::from(total) / 2) / u64::from(total)
    } as u32;

    MilestoneProgress {
        milestone_index: clamped,
        days_completed,
        total_days: total,
        percent,
        is_current_milestone_complete: complete,
    }
}

/// Overall completion across the program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramProgress {
    /// Rounded percentage. Deliberately unclamped: positions outside the
    /// program's bounds yield values above 100 or below 0 so callers can
    /// detect anomalies instead of seeing a silently sanitized figure.
    pub percent: i64,
    pub days_completed: i64,
    pub total_days: u32,
    pub is_complete: bool,
}

/// Overall program completion for the raw position in `progress`.
#[must_use]
pub fn program_progress(program: &Program, progress: &UserProgress) -> ProgramProgress {
    let total = total_days(program);
    let is_complete = progress.current_milestone_index >= 0
        && progress.current_milestone_index as u32 >= program.milestone_count();
    let completed = days_before(
        program,
        i64::from(progress.current_milestone_index),
        i64::from(progress.current_day_index),
    );
    let percent = if total == 0 {
        if is_complete { 100 } else { 0 }
    } else {
        round_div(completed * 100, i64::from(total))
    };

    ProgramProgress {
        percent,
        days_completed: completed,
        total_days: total,
        is_complete,
    }
}

/// Derived program figures for dashboards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgramAnalytics {
    pub overall: ProgramProgress,
    pub current_milestone: MilestoneProgress,
    pub workout_days_completed: u32,
    pub rest_days_completed: u32,
    pub workout_days_remaining: u32,
    pub rest_days_remaining: u32,
    /// `start_date + total_days` calendar days; `None` without a start date.
    pub estimated_completion: Option<DateTime<Utc>>,
}

/// Full analytics snapshot for a user's position within a program.
///
/// Day-type counts clamp the raw position to the program's bounds; the
/// overall percentage stays unclamped (see [`ProgramProgress::percent`]).
#[must_use]
pub fn program_analytics(
    program: &Program,
    progress: &UserProgress,
    start_date: Option<DateTime<Utc>>,
) -> ProgramAnalytics {
    let overall = program_progress(program, progress);
    let milestone_index = progress.current_milestone_index.max(0) as u32;
    let day_index = progress.current_day_index.max(0) as u32;

    let completed = completed_days_by_type(program, milestone_index, day_index);
    let workout_total = total_workout_days(program);
    let rest_total = total_rest_days(program);

    ProgramAnalytics {
        overall,
        current_milestone: milestone_progress(program, milestone_index, day_index),
        workout_days_completed: completed.workout,
        rest_days_completed: completed.rest,
        workout_days_remaining: workout_total.saturating_sub(completed.workout),
        rest_days_remaining: rest_total.saturating_sub(completed.rest),
        estimated_completion: start_date
            .map(|start| start + Duration::days(i64::from(total_days(program)))),
    }
}

/// Round-half-up division for signed percentages.
fn round_div(numerator: i64, denominator: i64) -> i64 {
    let half = denominator / 2;
    if numerator >= 0 {
        (numerator + half) / denominator
    } else {
        (numerator - half) / denominator
    }
}
