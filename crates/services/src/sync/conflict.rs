use coach_core::model::ExerciseId;
use uuid::Uuid;

use crate::optimistic::{ExerciseProgress, SessionState, StatePatch};

/// Which part of the session two replicas disagree on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictField {
    Position,
    ExerciseProgress(ExerciseId),
    CompletedExercises,
    TotalWorkoutsCompleted,
    SessionTimer,
}

/// How a conflicting field gets reconciled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionStrategy {
    /// Take the larger value on each counter. Workout effort only ever
    /// accumulates, so the higher number is the truer one.
    MergeHigher,
    /// Take the side with the later timestamp; ties keep the local side.
    LastWriterWins,
    /// Neither side is safely mergeable; the user picks.
    UserDecides,
}

/// The user's pick for a [`ResolutionStrategy::UserDecides`] conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictWinner {
    Local,
    Remote,
}

/// One detected disagreement, with its resolution once known.
#[derive(Debug, Clone)]
pub struct Conflict {
    id: Uuid,
    field: ConflictField,
    strategy: ResolutionStrategy,
    local: StatePatch,
    remote: StatePatch,
    resolved: Option<StatePatch>,
}

impl Conflict {
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    #[must_use]
    pub fn field(&self) -> ConflictField {
        self.field
    }

    #[must_use]
    pub fn strategy(&self) -> ResolutionStrategy {
        self.strategy
    }

    #[must_use]
    pub fn local(&self) -> &StatePatch {
        &self.local
    }

    #[must_use]
    pub fn remote(&self) -> &StatePatch {
        &self.remote
    }

    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.resolved.is_some()
    }
}

/// Detects field-level conflicts between two session snapshots and builds the
/// patch that reconciles them.
///
/// Automatic strategies resolve at detection time; `UserDecides` conflicts
/// block [`resolution_patch`](ConflictResolver::resolution_patch) until the
/// user picks a side.
#[derive(Debug, Default)]
pub struct ConflictResolver {
    conflicts: Vec<Conflict>,
    /// Remote-side data that merges without conflict (entries the local
    /// replica never saw).
    baseline: StatePatch,
}

impl ConflictResolver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn conflicts(&self) -> &[Conflict] {
        &self.conflicts
    }

    #[must_use]
    pub fn unresolved(&self) -> Vec<&Conflict> {
        self.conflicts.iter().filter(|c| !c.is_resolved()).collect()
    }

    #[must_use]
    pub fn has_conflicts(&self) -> bool {
        !self.conflicts.is_empty()
    }

    /// Compare two snapshots and register a conflict per differing field.
    /// Previously detected conflicts are discarded.
    pub fn detect(&mut self, local: &SessionState, remote: &SessionState) -> &[Conflict] {
        self.conflicts.clear();
        self.baseline = StatePatch::new();

        if local.position != remote.position {
            let winner = if remote.position_updated_at > local.position_updated_at {
                StatePatch::new().with_position(remote.position, remote.position_updated_at)
            } else {
                // ties keep the local side
                StatePatch::new().with_position(local.position, local.position_updated_at)
            };
            self.conflicts.push(Conflict {
                id: Uuid::new_v4(),
                field: ConflictField::Position,
                strategy: ResolutionStrategy::LastWriterWins,
                local: StatePatch::new().with_position(local.position, local.position_updated_at),
                remote: StatePatch::new()
                    .with_position(remote.position, remote.position_updated_at),
                resolved: Some(winner),
            });
        }

        for (id, theirs) in &remote.exercise_progress {
            match local.exercise_progress.get(id) {
                None => {
                    self.baseline = std::mem::take(&mut self.baseline)
                        .with_exercise_progress(*id, *theirs);
                }
                Some(ours) if ours != theirs => {
                    let merged = ExerciseProgress {
                        sets_completed: ours.sets_completed.max(theirs.sets_completed),
                        reps_completed: ours.reps_completed.max(theirs.reps_completed),
                        updated_at: ours.updated_at.max(theirs.updated_at),
                    };
                    self.conflicts.push(Conflict {
                        id: Uuid::new_v4(),
                        field: ConflictField::ExerciseProgress(*id),
                        strategy: ResolutionStrategy::MergeHigher,
                        local: StatePatch::new().with_exercise_progress(*id, *ours),
                        remote: StatePatch::new().with_exercise_progress(*id, *theirs),
                        resolved: Some(StatePatch::new().with_exercise_progress(*id, merged)),
                    });
                }
                Some(_) => {}
            }
        }

        if local.completed_exercises != remote.completed_exercises {
            let mut union = StatePatch::new();
            for id in local
                .completed_exercises
                .union(&remote.completed_exercises)
            {
                union = union.with_completed(*id);
            }
            let mut local_patch = StatePatch::new();
            for id in &local.completed_exercises {
                local_patch = local_patch.with_completed(*id);
            }
            let mut remote_patch = StatePatch::new();
            for id in &remote.completed_exercises {
                remote_patch = remote_patch.with_completed(*id);
            }
            self.conflicts.push(Conflict {
                id: Uuid::new_v4(),
                field: ConflictField::CompletedExercises,
                strategy: ResolutionStrategy::MergeHigher,
                local: local_patch,
                remote: remote_patch,
                resolved: Some(union),
            });
        }

        if local.total_workouts_completed != remote.total_workouts_completed {
            let higher = local
                .total_workouts_completed
                .max(remote.total_workouts_completed);
            self.conflicts.push(Conflict {
                id: Uuid::new_v4(),
                field: ConflictField::TotalWorkoutsCompleted,
                strategy: ResolutionStrategy::MergeHigher,
                local: StatePatch::new().with_total_workouts(local.total_workouts_completed),
                remote: StatePatch::new().with_total_workouts(remote.total_workouts_completed),
                resolved: Some(StatePatch::new().with_total_workouts(higher)),
            });
        }

        if local.session_timer_secs != remote.session_timer_secs {
            // elapsed time is not monotonic across devices; only the user
            // knows which session is the real one
            self.conflicts.push(Conflict {
                id: Uuid::new_v4(),
                field: ConflictField::SessionTimer,
                strategy: ResolutionStrategy::UserDecides,
                local: StatePatch::new().with_session_timer(local.session_timer_secs),
                remote: StatePatch::new().with_session_timer(remote.session_timer_secs),
                resolved: None,
            });
        }

        &self.conflicts
    }

    /// Settle a `UserDecides` conflict. Returns false for unknown ids.
    pub fn resolve_user_choice(&mut self, id: Uuid, winner: ConflictWinner) -> bool {
        let Some(conflict) = self.conflicts.iter_mut().find(|c| c.id == id) else {
            return false;
        };
        conflict.resolved = Some(match winner {
            ConflictWinner::Local => conflict.local.clone(),
            ConflictWinner::Remote => conflict.remote.clone(),
        });
        true
    }

    /// The single patch that reconciles both replicas, or `None` while any
    /// conflict still awaits a user decision.
    #[must_use]
    pub fn resolution_patch(&self) -> Option<StatePatch> {
        let mut patch = self.baseline.clone();
        for conflict in &self.conflicts {
            let resolved = conflict.resolved.as_ref()?;
            if let Some(position) = resolved.position {
                patch.position = Some(position);
            }
            for (id, progress) in &resolved.exercise_progress {
                patch.exercise_progress.insert(*id, *progress);
            }
            patch
                .completed_exercises
                .extend(resolved.completed_exercises.iter().copied());
            if let Some(total) = resolved.total_workouts_completed {
                patch.total_workouts_completed = Some(total);
            }
            if let Some(timer) = resolved.session_timer_secs {
                patch.session_timer_secs = Some(timer);
            }
        }
        Some(patch)
    }

    /// Drop settled conflicts, keeping the ones still awaiting a decision.
    pub fn clear_resolved(&mut self) {
        self.conflicts.retain(|c| !c.is_resolved());
        self.baseline = StatePatch::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use coach_core::model::Position;
    use coach_core::time::fixed_now;

    fn snapshot() -> SessionState {
        SessionState::new(Position::start(), fixed_now())
    }

    fn progress(sets: u32, reps: u32) -> ExerciseProgress {
        ExerciseProgress {
            sets_completed: sets,
            reps_completed: reps,
            updated_at: fixed_now(),
        }
    }

    #[test]
    fn identical_snapshots_yield_no_conflicts() {
        let mut resolver = ConflictResolver::new();
        resolver.detect(&snapshot(), &snapshot());
        assert!(!resolver.has_conflicts());
        assert_eq!(resolver.resolution_patch(), Some(StatePatch::new()));
    }

    #[test]
    fn exercise_progress_merges_higher_per_counter() {
        let id = ExerciseId::new(4);
        let mut local = snapshot();
        local.exercise_progress.insert(id, progress(3, 15));
        let mut remote = snapshot();
        remote.exercise_progress.insert(id, progress(2, 24));

        let mut resolver = ConflictResolver::new();
        resolver.detect(&local, &remote);

        let patch = resolver.resolution_patch().unwrap();
        let merged = patch.exercise_progress[&id];
        assert_eq!(merged.sets_completed, 3);
        assert_eq!(merged.reps_completed, 24);
    }

    #[test]
    fn position_takes_the_later_writer_and_ties_stay_local() {
        let mut local = snapshot();
        local.position = Position::new(1, 0);
        let mut remote = snapshot();
        remote.position = Position::new(1, 2);
        remote.position_updated_at = fixed_now() + Duration::minutes(5);

        let mut resolver = ConflictResolver::new();
        resolver.detect(&local, &remote);
        let patch = resolver.resolution_patch().unwrap();
        assert_eq!(patch.position.unwrap().0, Position::new(1, 2));

        // same timestamps: local wins
        remote.position_updated_at = local.position_updated_at;
        resolver.detect(&local, &remote);
        let patch = resolver.resolution_patch().unwrap();
        assert_eq!(patch.position.unwrap().0, Position::new(1, 0));
    }

    #[test]
    fn completed_exercises_union_both_sides() {
        let mut local = snapshot();
        local.completed_exercises.insert(ExerciseId::new(1));
        let mut remote = snapshot();
        remote.completed_exercises.insert(ExerciseId::new(2));

        let mut resolver = ConflictResolver::new();
        resolver.detect(&local, &remote);
        let patch = resolver.resolution_patch().unwrap();
        assert!(patch.completed_exercises.contains(&ExerciseId::new(1)));
        assert!(patch.completed_exercises.contains(&ExerciseId::new(2)));
    }

    #[test]
    fn session_timer_waits_for_the_user() {
        let mut local = snapshot();
        local.session_timer_secs = 300;
        let mut remote = snapshot();
        remote.session_timer_secs = 120;

        let mut resolver = ConflictResolver::new();
        resolver.detect(&local, &remote);
        assert_eq!(resolver.resolution_patch(), None);
        assert_eq!(resolver.unresolved().len(), 1);

        let id = resolver.unresolved()[0].id();
        assert!(resolver.resolve_user_choice(id, ConflictWinner::Remote));
        let patch = resolver.resolution_patch().unwrap();
        assert_eq!(patch.session_timer_secs, Some(120));
    }

    #[test]
    fn clear_resolved_keeps_open_decisions() {
        let mut local = snapshot();
        local.session_timer_secs = 300;
        local.total_workouts_completed = 9;
        let mut remote = snapshot();
        remote.session_timer_secs = 120;
        remote.total_workouts_completed = 11;

        let mut resolver = ConflictResolver::new();
        resolver.detect(&local, &remote);
        assert_eq!(resolver.conflicts().len(), 2);

        resolver.clear_resolved();
        assert_eq!(resolver.conflicts().len(), 1);
        assert_eq!(
            resolver.conflicts()[0].field(),
            ConflictField::SessionTimer
        );
    }

    #[test]
    fn remote_only_entries_merge_without_a_conflict() {
        let local = snapshot();
        let mut remote = snapshot();
        remote
            .exercise_progress
            .insert(ExerciseId::new(9), progress(1, 8));

        let mut resolver = ConflictResolver::new();
        resolver.detect(&local, &remote);
        assert!(!resolver.has_conflicts());
        let patch = resolver.resolution_patch().unwrap();
        assert!(patch.exercise_progress.contains_key(&ExerciseId::new(9)));
    }
}
