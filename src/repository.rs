//! Routine repository - per-owner routines and workout history

use async_trait::async_trait;
use chrono::{DateTime, Duration, Local, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::plan::{CustomDetails, Plan, Schedule, Selections};
use crate::session::WorkoutSession;

pub type RoutineId = i64;

pub const DEFAULT_ROUTINE_NAME: &str = "Mi Rutina";

/// A named, persisted plan
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Routine {
    pub id: RoutineId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(flatten)]
    pub plan: Plan,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields for a routine about to be created; unset ones take the defaults
#[derive(Debug, Clone, Default)]
pub struct NewRoutine {
    pub name: Option<String>,
    pub description: Option<String>,
    pub plan: Plan,
    pub is_active: Option<bool>,
}

impl NewRoutine {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or(DEFAULT_ROUTINE_NAME)
    }

    pub fn description(&self) -> &str {
        self.description.as_deref().unwrap_or("")
    }

    pub fn is_active(&self) -> bool {
        self.is_active.unwrap_or(true)
    }
}

/// One field replacement; `updatedAt` is bumped by the store
#[derive(Debug, Clone, PartialEq)]
pub enum RoutineUpdate {
    SetSchedule(Schedule),
    SetSelectedExercises(Selections),
    SetCustomDetails(CustomDetails),
    Rename(String),
    SetDescription(String),
    SetActive(bool),
}

impl RoutineUpdate {
    /// The three updates that carry a whole plan
    pub fn full_plan(plan: &Plan) -> Vec<RoutineUpdate> {
        vec![
            RoutineUpdate::SetSchedule(plan.schedule.clone()),
            RoutineUpdate::SetSelectedExercises(plan.selected_exercises.clone()),
            RoutineUpdate::SetCustomDetails(plan.custom_details.clone()),
        ]
    }

    /// Apply to a cached copy
    pub fn apply(&self, routine: &mut Routine) {
        match self {
            RoutineUpdate::SetSchedule(s) => routine.plan.schedule = s.clone(),
            RoutineUpdate::SetSelectedExercises(s) => routine.plan.selected_exercises = s.clone(),
            RoutineUpdate::SetCustomDetails(d) => routine.plan.custom_details = d.clone(),
            RoutineUpdate::Rename(name) => routine.name = name.clone(),
            RoutineUpdate::SetDescription(text) => routine.description = text.clone(),
            RoutineUpdate::SetActive(active) => routine.is_active = *active,
        }
    }
}

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("routine {id} not found")]
    NotFound { id: RoutineId },

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("backend error: {0}")]
    Backend(String),
}

/// Storage for routines and history, scoped by owner
#[async_trait]
pub trait RoutineRepository: Send + Sync {
    /// All routines of `owner`, most recently updated first
    async fn list(&self, owner: &str) -> Result<Vec<Routine>, RepositoryError>;

    async fn get(&self, owner: &str, id: RoutineId) -> Result<Routine, RepositoryError>;

    async fn create(&self, owner: &str, routine: NewRoutine) -> Result<Routine, RepositoryError>;

    /// Fails with `NotFound` when the routine does not exist
    async fn update(&self, owner: &str, id: RoutineId, updates: &[RoutineUpdate]) -> Result<(), RepositoryError>;

    /// Deleting a missing routine is not an error
    async fn delete(&self, owner: &str, id: RoutineId) -> Result<(), RepositoryError>;

    async fn append_history(&self, owner: &str, session: &WorkoutSession) -> Result<(), RepositoryError>;

    /// Newest first
    async fn list_history(&self, owner: &str) -> Result<Vec<WorkoutSession>, RepositoryError>;

    /// Whether a session exists within the local calendar day `day`
    async fn exists_history_for_date(&self, owner: &str, day: NaiveDate) -> Result<bool, RepositoryError>;
}

/// `[start, next start)` of a local calendar day, in UTC
pub fn day_bounds(day: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = local_midnight(day);
    let end = day
        .succ_opt()
        .map(local_midnight)
        .unwrap_or_else(|| start + Duration::days(1));
    (start, end)
}

fn local_midnight(day: NaiveDate) -> DateTime<Utc> {
    let naive = day.and_time(chrono::NaiveTime::MIN);
    match Local.from_local_datetime(&naive) {
        chrono::LocalResult::Single(t) => t.with_timezone(&Utc),
        chrono::LocalResult::Ambiguous(earliest, _) => earliest.with_timezone(&Utc),
        // midnight skipped by a DST jump
        chrono::LocalResult::None => Utc.from_utc_datetime(&naive),
    }
}

#[cfg(test)]
pub(crate) mod memory {
    //! Recording in-memory repository for controller tests

    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    use super::*;

    #[derive(Default)]
    pub struct MemoryRepository {
        routines: Mutex<Vec<(String, Routine)>>,
        history: Mutex<Vec<(String, WorkoutSession)>>,
        updates: Mutex<Vec<(RoutineId, Vec<RoutineUpdate>)>>,
        next_id: Mutex<RoutineId>,
        fail_updates: AtomicBool,
        update_delay: Mutex<Option<Duration>>,
    }

    impl MemoryRepository {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn fail_updates(&self, fail: bool) {
            self.fail_updates.store(fail, Ordering::SeqCst);
        }

        /// Make every `update` take `delay` before it lands
        pub fn slow_updates(&self, delay: Duration) {
            *self.update_delay.lock().unwrap() = Some(delay);
        }

        /// Every `update` call received, in order
        pub fn updates(&self) -> Vec<(RoutineId, Vec<RoutineUpdate>)> {
            self.updates.lock().unwrap().clone()
        }

        pub fn stored(&self, id: RoutineId) -> Option<Routine> {
            self.routines
                .lock()
                .unwrap()
                .iter()
                .find(|(_, r)| r.id == id)
                .map(|(_, r)| r.clone())
        }
    }

    #[async_trait]
    impl RoutineRepository for MemoryRepository {
        async fn list(&self, owner: &str) -> Result<Vec<Routine>, RepositoryError> {
            let mut list: Vec<Routine> = self
                .routines
                .lock()
                .unwrap()
                .iter()
                .filter(|(o, _)| o == owner)
                .map(|(_, r)| r.clone())
                .collect();
            list.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(b.id.cmp(&a.id)));
            Ok(list)
        }

        async fn get(&self, owner: &str, id: RoutineId) -> Result<Routine, RepositoryError> {
            self.routines
                .lock()
                .unwrap()
                .iter()
                .find(|(o, r)| o == owner && r.id == id)
                .map(|(_, r)| r.clone())
                .ok_or(RepositoryError::NotFound { id })
        }

        async fn create(&self, owner: &str, routine: NewRoutine) -> Result<Routine, RepositoryError> {
            let id = {
                let mut next = self.next_id.lock().unwrap();
                *next += 1;
                *next
            };
            let now = Utc::now();
            let created = Routine {
                id,
                name: routine.name().to_string(),
                description: routine.description().to_string(),
                plan: routine.plan.clone(),
                is_active: routine.is_active(),
                created_at: now,
                updated_at: now,
            };
            self.routines
                .lock()
                .unwrap()
                .push((owner.to_string(), created.clone()));
            Ok(created)
        }

        async fn update(&self, owner: &str, id: RoutineId, updates: &[RoutineUpdate]) -> Result<(), RepositoryError> {
            let delay = *self.update_delay.lock().unwrap();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            self.updates.lock().unwrap().push((id, updates.to_vec()));
            if self.fail_updates.load(Ordering::SeqCst) {
                return Err(RepositoryError::Backend("write refused".to_string()));
            }
            let mut routines = self.routines.lock().unwrap();
            let (_, routine) = routines
                .iter_mut()
                .find(|(o, r)| o == owner && r.id == id)
                .ok_or(RepositoryError::NotFound { id })?;
            for update in updates {
                update.apply(routine);
            }
            routine.updated_at = Utc::now();
            Ok(())
        }

        async fn delete(&self, owner: &str, id: RoutineId) -> Result<(), RepositoryError> {
            self.routines
                .lock()
                .unwrap()
                .retain(|(o, r)| !(o == owner && r.id == id));
            Ok(())
        }

        async fn append_history(&self, owner: &str, session: &WorkoutSession) -> Result<(), RepositoryError> {
            self.history
                .lock()
                .unwrap()
                .push((owner.to_string(), session.clone()));
            Ok(())
        }

        async fn list_history(&self, owner: &str) -> Result<Vec<WorkoutSession>, RepositoryError> {
            let mut list: Vec<WorkoutSession> = self
                .history
                .lock()
                .unwrap()
                .iter()
                .filter(|(o, _)| o == owner)
                .map(|(_, s)| s.clone())
                .collect();
            list.sort_by(|a, b| b.date.cmp(&a.date));
            Ok(list)
        }

        async fn exists_history_for_date(&self, owner: &str, day: NaiveDate) -> Result<bool, RepositoryError> {
            let (start, end) = day_bounds(day);
            Ok(self
                .history
                .lock()
                .unwrap()
                .iter()
                .any(|(o, s)| o == owner && s.date >= start && s.date < end))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{MuscleGroup, Weekday};

    #[test]
    fn test_new_routine_defaults() {
        let new = NewRoutine::default();
        assert_eq!(new.name(), "Mi Rutina");
        assert_eq!(new.description(), "");
        assert!(new.is_active());
        assert!(new.plan.is_empty());
    }

    #[test]
    fn test_day_bounds_span_one_day() {
        let day = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        let (start, end) = day_bounds(day);
        assert!(start < end);
        assert_eq!(start.with_timezone(&Local).date_naive(), day);
        assert_eq!(end.with_timezone(&Local).date_naive(), day.succ_opt().unwrap());
    }

    #[test]
    fn test_full_plan_updates() {
        let mut plan = Plan::empty();
        plan.schedule.days.insert(MuscleGroup::Pecho, vec![Weekday::Lunes]);
        let updates = RoutineUpdate::full_plan(&plan);
        assert_eq!(updates.len(), 3);
        assert_eq!(updates[0], RoutineUpdate::SetSchedule(plan.schedule.clone()));
    }

    #[test]
    fn test_routine_document_shape() {
        let now = Utc::now();
        let mut plan = Plan::empty();
        plan.selected_exercises
            .insert(MuscleGroup::Biceps, vec!["Curl martillo".to_string()]);
        let routine = Routine {
            id: 7,
            name: "Fuerza".to_string(),
            description: String::new(),
            plan,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        let value = serde_json::to_value(&routine).unwrap();
        assert_eq!(value["isActive"], true);
        assert_eq!(value["selectedExercises"]["biceps"][0], "Curl martillo");
        assert!(value["schedule"]["days"].is_object());
        assert!(value.get("plan").is_none());

        let back: Routine = serde_json::from_value(value).unwrap();
        assert_eq!(back, routine);
    }

    #[test]
    fn test_apply_rename_and_active() {
        let now = Utc::now();
        let mut routine = Routine {
            id: 1,
            name: "A".to_string(),
            description: String::new(),
            plan: Plan::empty(),
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        RoutineUpdate::Rename("B".to_string()).apply(&mut routine);
        RoutineUpdate::SetActive(false).apply(&mut routine);
        RoutineUpdate::SetDescription("notas".to_string()).apply(&mut routine);
        assert_eq!(routine.name, "B");
        assert!(!routine.is_active);
        assert_eq!(routine.description, "notas");
    }
}
