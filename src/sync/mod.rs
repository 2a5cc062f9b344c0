//! Plan state and routine synchronization

mod controller;
mod debounce;

use thiserror::Error;

use crate::plan::{Plan, PlanError};
use crate::repository::{RepositoryError, Routine, RoutineId};

pub use controller::PlanController;
pub use debounce::Debouncer;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("not signed in")]
    Unauthenticated,

    #[error("invalid change: {0}")]
    Validation(#[from] PlanError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Outcome of the latest routine write
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SyncStatus {
    #[default]
    Idle,
    /// A write is waiting for the debounce window
    Pending,
    Saved {
        routine_id: RoutineId,
    },
    Failed {
        routine_id: RoutineId,
        error: String,
    },
}

/// The plan every read and mutation targets: the current routine's when
/// signed in with a routine selected, the ephemeral one otherwise.
pub fn resolve_active_plan<'a>(authenticated: bool, ephemeral: &'a Plan, current: Option<&'a Routine>) -> &'a Plan {
    match current {
        Some(routine) if authenticated => &routine.plan,
        _ => ephemeral,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{MuscleGroup, Weekday};
    use chrono::Utc;

    fn routine_with(plan: Plan) -> Routine {
        Routine {
            id: 1,
            name: "Mi Rutina".to_string(),
            description: String::new(),
            plan,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_resolve_active_plan() {
        let mut remote = Plan::empty();
        remote.schedule.days.insert(MuscleGroup::Hombros, vec![Weekday::Martes]);
        let routine = routine_with(remote.clone());
        let ephemeral = Plan::empty();

        assert_eq!(resolve_active_plan(true, &ephemeral, Some(&routine)), &remote);
        assert_eq!(resolve_active_plan(false, &ephemeral, Some(&routine)), &ephemeral);
        assert_eq!(resolve_active_plan(true, &ephemeral, None), &ephemeral);
    }
}
