//! Session aggregator - what to train today, and how much of it got done

pub mod details;

use std::collections::HashSet;

use chrono::{DateTime, Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::catalog::{ExerciseCatalog, ExerciseMeta, GroupCatalog};
use crate::plan::{MuscleGroup, Plan, Weekday};
use crate::repository::{RepositoryError, RoutineRepository};

pub use details::{DisplayDetail, RecordedLoad};

/// One exercise to perform in a session
#[derive(Debug, Clone, PartialEq)]
pub struct SessionExercise {
    pub name: String,
    pub group: MuscleGroup,
    pub detail: DisplayDetail,
    pub load: RecordedLoad,
    pub video_url: Option<String>,
}

impl SessionExercise {
    fn new(group: MuscleGroup, meta: &ExerciseMeta, plan: &Plan) -> Self {
        let custom = plan.detail_for(group, &meta.nombre);
        Self {
            name: meta.nombre.clone(),
            group,
            detail: DisplayDetail::resolve(custom, &meta.detalles),
            load: RecordedLoad::resolve(custom, &meta.detalles),
            video_url: meta.video_url.clone(),
        }
    }

    /// Completion key, only stable within one session
    pub fn key(&self) -> String {
        completion_key(self.group, &self.name)
    }
}

pub fn completion_key(group: MuscleGroup, exercise: &str) -> String {
    format!("{}-{}", group.display_name(), exercise)
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubgroupSession {
    pub name: String,
    pub exercises: Vec<SessionExercise>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEntries {
    Flat(Vec<SessionExercise>),
    Nested(Vec<SubgroupSession>),
}

/// Today's work for one muscle group
#[derive(Debug, Clone, PartialEq)]
pub struct GroupSession {
    pub group: MuscleGroup,
    pub entries: SessionEntries,
}

impl GroupSession {
    pub fn display_name(&self) -> &'static str {
        self.group.display_name()
    }

    pub fn exercises(&self) -> Vec<&SessionExercise> {
        match &self.entries {
            SessionEntries::Flat(list) => list.iter().collect(),
            SessionEntries::Nested(subs) => subs.iter().flat_map(|s| s.exercises.iter()).collect(),
        }
    }

    pub fn len(&self) -> usize {
        match &self.entries {
            SessionEntries::Flat(list) => list.len(),
            SessionEntries::Nested(subs) => subs.iter().map(|s| s.exercises.len()).sum(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Groups scheduled on `day` that have a selection, filtered against the
/// catalog in catalog order. Groups with nothing selected are skipped.
pub fn today(plan: &Plan, day: Weekday, catalog: &ExerciseCatalog) -> Vec<GroupSession> {
    let mut sessions = Vec::new();

    for group in plan.groups_on(day) {
        let selected = plan.exercises_for(group);
        if selected.is_empty() {
            continue;
        }
        let Some(entry) = catalog.group(group) else {
            warn!("No catalog entry for scheduled group {}", group);
            continue;
        };
        let picked = |meta: &&ExerciseMeta| selected.contains(&meta.nombre);

        let entries = match entry {
            GroupCatalog::Nested { subgrupos } => SessionEntries::Nested(
                subgrupos
                    .iter()
                    .map(|sg| SubgroupSession {
                        name: sg.nombre.clone(),
                        exercises: sg
                            .ejercicios
                            .iter()
                            .filter(picked)
                            .map(|meta| SessionExercise::new(group, meta, plan))
                            .collect(),
                    })
                    .filter(|sg| !sg.exercises.is_empty())
                    .collect(),
            ),
            GroupCatalog::Flat { imagenes, .. } => SessionEntries::Flat(
                imagenes
                    .iter()
                    .filter(picked)
                    .map(|meta| SessionExercise::new(group, meta, plan))
                    .collect(),
            ),
        };

        sessions.push(GroupSession { group, entries });
    }

    sessions
}

/// Rounded share of completed exercises; 0 when there is nothing to do
pub fn progress_percentage(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let pct = (100.0 * completed as f64 / total as f64).round();
    pct.clamp(0.0, 100.0) as u8
}

/// Groups training on each schedulable weekday; empty means rest day
pub fn weekly_summary(plan: &Plan) -> Vec<(Weekday, Vec<&'static str>)> {
    Weekday::schedulable()
        .iter()
        .map(|day| {
            let groups = plan
                .groups_on(*day)
                .into_iter()
                .map(|g| g.display_name())
                .collect();
            (*day, groups)
        })
        .collect()
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Completado,
    Incompleto,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Completado => "completado",
            SessionStatus::Incompleto => "incompleto",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExerciseRecord {
    pub name: String,
    pub group: MuscleGroup,
    pub completed: bool,
    pub series: u32,
    pub reps: u32,
    pub peso: f64,
}

/// Immutable record of one training session
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkoutSession {
    pub date: DateTime<Utc>,
    pub day_name: Weekday,
    pub total_exercises: usize,
    pub completed_count: usize,
    pub progress_percentage: u8,
    pub status: SessionStatus,
    pub exercises: Vec<ExerciseRecord>,
}

/// Completion state of the session in progress
#[derive(Debug, Clone)]
pub struct WorkoutTracker {
    day: Weekday,
    groups: Vec<GroupSession>,
    completed: HashSet<String>,
}

impl WorkoutTracker {
    pub fn new(plan: &Plan, day: Weekday, catalog: &ExerciseCatalog) -> Self {
        Self {
            day,
            groups: today(plan, day, catalog),
            completed: HashSet::new(),
        }
    }

    pub fn day(&self) -> Weekday {
        self.day
    }

    pub fn groups(&self) -> &[GroupSession] {
        &self.groups
    }

    pub fn exercises(&self) -> Vec<&SessionExercise> {
        self.groups.iter().flat_map(|g| g.exercises()).collect()
    }

    /// Flip completion of an exercise. Unknown keys are ignored and return false.
    pub fn toggle(&mut self, key: &str) -> bool {
        if !self.exercises().iter().any(|e| e.key() == key) {
            return false;
        }
        if !self.completed.remove(key) {
            self.completed.insert(key.to_string());
        }
        true
    }

    pub fn is_completed(&self, key: &str) -> bool {
        self.completed.contains(key)
    }

    pub fn total_exercises(&self) -> usize {
        self.groups.iter().map(GroupSession::len).sum()
    }

    pub fn completed_count(&self) -> usize {
        self.completed.len()
    }

    pub fn progress_percentage(&self) -> u8 {
        progress_percentage(self.completed_count(), self.total_exercises())
    }

    /// Snapshot the session as a record. The tracker keeps going.
    pub fn finalize(&self, date: DateTime<Utc>) -> WorkoutSession {
        let exercises: Vec<ExerciseRecord> = self
            .exercises()
            .into_iter()
            .map(|e| ExerciseRecord {
                name: e.name.clone(),
                group: e.group,
                completed: self.is_completed(&e.key()),
                series: e.load.series,
                reps: e.load.reps,
                peso: e.load.peso,
            })
            .collect();

        let progress = self.progress_percentage();
        WorkoutSession {
            date,
            day_name: self.day,
            total_exercises: self.total_exercises(),
            completed_count: self.completed_count(),
            progress_percentage: progress,
            status: if progress == 100 {
                SessionStatus::Completado
            } else {
                SessionStatus::Incompleto
            },
            exercises,
        }
    }
}

/// Whether a second session on the same day may be saved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicatePolicy {
    RejectSameDay,
    Allow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved,
    AlreadySavedToday,
}

/// Append a session to the owner's history.
///
/// The same-day check is a plain read before the write; two saves racing on
/// the same day can both land.
pub async fn record_session<R: RoutineRepository + ?Sized>(
    repo: &R,
    owner: &str,
    session: &WorkoutSession,
    policy: DuplicatePolicy,
) -> Result<SaveOutcome, RepositoryError> {
    if policy == DuplicatePolicy::RejectSameDay {
        let day: NaiveDate = session.date.with_timezone(&Local).date_naive();
        if repo.exists_history_for_date(owner, day).await? {
            info!("Session for {} already saved, skipping", day);
            return Ok(SaveOutcome::AlreadySavedToday);
        }
    }
    repo.append_history(owner, session).await?;
    info!(
        "Saved session: {} {}/{} ({}%)",
        session.day_name, session.completed_count, session.total_exercises, session.progress_percentage
    );
    Ok(SaveOutcome::Saved)
}
