//! Plan controller - owns the active plan and keeps the current routine in sync

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::debounce::Debouncer;
use super::{SyncError, SyncStatus, resolve_active_plan};
use crate::config::SyncConfig;
use crate::plan::{Mutation, Plan};
use crate::repository::{NewRoutine, RepositoryError, Routine, RoutineId, RoutineRepository, RoutineUpdate};
use crate::session::{DuplicatePolicy, SaveOutcome, WorkoutSession, record_session};

/// A full-plan write for one routine, detached from the controller
struct PlanWrite<R: RoutineRepository + ?Sized> {
    repo: Arc<R>,
    owner: String,
    routine_id: RoutineId,
    updates: Vec<RoutineUpdate>,
    status: Arc<watch::Sender<SyncStatus>>,
}

impl<R: RoutineRepository + ?Sized> PlanWrite<R> {
    async fn execute(self) -> Result<(), RepositoryError> {
        let result = self.repo.update(&self.owner, self.routine_id, &self.updates).await;
        match &result {
            Ok(()) => {
                debug!("Routine {} saved", self.routine_id);
                self.status.send_replace(SyncStatus::Saved {
                    routine_id: self.routine_id,
                });
            }
            Err(e) => {
                error!("Saving routine {} failed: {}", self.routine_id, e);
                self.status.send_replace(SyncStatus::Failed {
                    routine_id: self.routine_id,
                    error: e.to_string(),
                });
            }
        }
        result
    }
}

/// Holds the ephemeral plan, the signed-in owner's routines and the current
/// routine. Mutations to the current routine are written back after a quiet
/// period.
pub struct PlanController<R: RoutineRepository + ?Sized + 'static> {
    repo: Arc<R>,
    owner: Option<String>,
    ephemeral: Plan,
    routines: Vec<Routine>,
    current: Option<Routine>,
    debouncer: Debouncer,
    status: Arc<watch::Sender<SyncStatus>>,
}

impl<R: RoutineRepository + ?Sized + 'static> PlanController<R> {
    pub fn new(repo: Arc<R>, config: &SyncConfig) -> Self {
        let (status, _) = watch::channel(SyncStatus::Idle);
        Self {
            repo,
            owner: None,
            ephemeral: Plan::empty(),
            routines: Vec::new(),
            current: None,
            debouncer: Debouncer::new(config.debounce),
            status: Arc::new(status),
        }
    }

    /// Start from a plan, e.g. one decoded from a share link
    pub fn with_ephemeral(mut self, plan: Plan) -> Self {
        self.ephemeral = plan;
        self
    }

    pub fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.owner.is_some()
    }

    pub fn active_plan(&self) -> &Plan {
        resolve_active_plan(self.is_authenticated(), &self.ephemeral, self.current.as_ref())
    }

    /// Whether mutations land on a stored routine
    pub fn is_remote_active(&self) -> bool {
        self.is_authenticated() && self.current.is_some()
    }

    pub fn routines(&self) -> &[Routine] {
        &self.routines
    }

    pub fn current_routine(&self) -> Option<&Routine> {
        self.current.as_ref()
    }

    pub fn sync_status(&self) -> watch::Receiver<SyncStatus> {
        self.status.subscribe()
    }

    fn require_owner(&self) -> Result<String, SyncError> {
        self.owner.clone().ok_or(SyncError::Unauthenticated)
    }

    /// Load the owner's routines and pick a current one if none is set.
    /// The ephemeral plan is left as it was; nothing is merged.
    pub async fn sign_in(&mut self, owner: impl Into<String>) -> Result<(), SyncError> {
        let owner = owner.into();
        if self.owner.as_deref() != Some(owner.as_str()) {
            self.discard_pending(format_args!("signing in as {}", owner));
            self.current = None;
        }

        let routines = self.repo.list(&owner).await?;
        info!("Signed in as {} ({} routines)", owner, routines.len());

        if self.current.is_none() {
            self.current = routines
                .iter()
                .find(|r| r.is_active)
                .or_else(|| routines.first())
                .cloned();
            if let Some(routine) = &self.current {
                debug!("Current routine {} ({})", routine.id, routine.name);
            }
        }
        self.routines = routines;
        self.owner = Some(owner);
        Ok(())
    }

    /// Forget the owner's state and reset the ephemeral plan.
    /// A write still waiting for its window is dropped.
    pub fn sign_out(&mut self) {
        self.discard_pending(format_args!("on sign-out"));
        self.owner = None;
        self.routines.clear();
        self.current = None;
        self.ephemeral = Plan::empty();
        self.status.send_replace(SyncStatus::Idle);
        info!("Signed out");
    }

    /// Validate and apply a change to the active plan. On a stored routine the
    /// full plan is written once the debounce window passes quietly.
    pub fn mutate(&mut self, mutation: Mutation) -> Result<(), SyncError> {
        let next = self.active_plan().apply(&mutation)?;
        debug!("Applied {:?}", mutation);

        if !self.is_remote_active() {
            self.ephemeral = next;
            return Ok(());
        }

        if let Some(routine) = self.current.as_mut() {
            routine.plan = next;
            let id = routine.id;
            let plan = routine.plan.clone();
            if let Some(cached) = self.routines.iter_mut().find(|r| r.id == id) {
                cached.plan = plan;
            }
        }
        self.schedule_write()
    }

    fn pending_write(&self) -> Result<Option<PlanWrite<R>>, SyncError> {
        let owner = self.require_owner()?;
        Ok(self.current.as_ref().map(|routine| PlanWrite {
            repo: Arc::clone(&self.repo),
            owner,
            routine_id: routine.id,
            updates: RoutineUpdate::full_plan(&routine.plan),
            status: Arc::clone(&self.status),
        }))
    }

    fn schedule_write(&mut self) -> Result<(), SyncError> {
        let Some(write) = self.pending_write()? else {
            return Ok(());
        };
        self.status.send_replace(SyncStatus::Pending);
        self.debouncer.schedule(async move {
            // failures are published on the status channel
            let _ = write.execute().await;
        });
        Ok(())
    }

    /// Drop a write still waiting for its window
    fn discard_pending(&mut self, context: std::fmt::Arguments<'_>) {
        if self.debouncer.cancel() {
            warn!("Discarding unsaved routine changes {}", context);
            self.status.send_replace(SyncStatus::Idle);
        }
    }

    /// Write a pending change now instead of waiting for the window, or wait
    /// for a write that already started
    pub async fn flush(&mut self) -> Result<(), SyncError> {
        if self.debouncer.cancel() {
            if let Some(write) = self.pending_write()? {
                write.execute().await?;
            }
        } else {
            self.debouncer.settle().await;
        }
        Ok(())
    }

    /// Make a stored routine current. A pending write for the previous one is
    /// dropped.
    pub async fn load_routine(&mut self, id: RoutineId) -> Result<&Routine, SyncError> {
        let owner = self.require_owner()?;
        self.discard_pending(format_args!("while switching to routine {}", id));

        let routine = self.repo.get(&owner, id).await?;
        info!("Loaded routine {} ({})", routine.id, routine.name);
        match self.routines.iter_mut().find(|r| r.id == id) {
            Some(cached) => *cached = routine.clone(),
            None => self.routines.insert(0, routine.clone()),
        }
        Ok(&*self.current.insert(routine))
    }

    /// Store a new routine and make it current
    pub async fn create_routine(&mut self, routine: NewRoutine) -> Result<&Routine, SyncError> {
        let owner = self.require_owner()?;
        self.discard_pending(format_args!("while creating a routine"));

        let created = self.repo.create(&owner, routine).await?;
        self.routines.insert(0, created.clone());
        Ok(&*self.current.insert(created))
    }

    async fn update_routine(&mut self, id: RoutineId, updates: Vec<RoutineUpdate>) -> Result<(), SyncError> {
        let owner = self.require_owner()?;
        self.repo.update(&owner, id, &updates).await?;

        for update in &updates {
            if let Some(cached) = self.routines.iter_mut().find(|r| r.id == id) {
                update.apply(cached);
            }
            if let Some(current) = self.current.as_mut().filter(|r| r.id == id) {
                update.apply(current);
            }
        }
        Ok(())
    }

    pub async fn rename_routine(&mut self, id: RoutineId, name: impl Into<String>) -> Result<(), SyncError> {
        self.update_routine(id, vec![RoutineUpdate::Rename(name.into())]).await
    }

    pub async fn describe_routine(&mut self, id: RoutineId, description: impl Into<String>) -> Result<(), SyncError> {
        self.update_routine(id, vec![RoutineUpdate::SetDescription(description.into())])
            .await
    }

    /// Remove a routine; the current pointer is cleared if it pointed there
    pub async fn delete_routine(&mut self, id: RoutineId) -> Result<(), SyncError> {
        let owner = self.require_owner()?;
        let is_current = self.current.as_ref().is_some_and(|r| r.id == id);
        if is_current {
            self.discard_pending(format_args!("of deleted routine {}", id));
        }

        self.repo.delete(&owner, id).await?;
        info!("Deleted routine {}", id);
        self.routines.retain(|r| r.id != id);
        if is_current {
            self.current = None;
        }
        Ok(())
    }

    /// Flag `id` active and every other cached routine inactive
    pub async fn set_active_routine(&mut self, id: RoutineId) -> Result<(), SyncError> {
        let owner = self.require_owner()?;
        for routine in &self.routines {
            let active = routine.id == id;
            self.repo
                .update(&owner, routine.id, &[RoutineUpdate::SetActive(active)])
                .await?;
        }

        for routine in self.routines.iter_mut() {
            routine.is_active = routine.id == id;
        }
        if let Some(current) = self.current.as_mut() {
            current.is_active = current.id == id;
        }
        info!("Routine {} is now active", id);
        Ok(())
    }

    /// Append a finished session to the owner's history
    pub async fn save_session(
        &self,
        session: &WorkoutSession,
        policy: DuplicatePolicy,
    ) -> Result<SaveOutcome, SyncError> {
        let owner = self.require_owner()?;
        Ok(record_session(self.repo.as_ref(), &owner, session, policy).await?)
    }

    pub async fn history(&self) -> Result<Vec<WorkoutSession>, SyncError> {
        let owner = self.require_owner()?;
        Ok(self.repo.list_history(&owner).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use chrono::Utc;

    use crate::plan::{DetailField, MuscleGroup, PlanError, Weekday};
    use crate::repository::memory::MemoryRepository;
    use crate::session::{SessionStatus, WorkoutSession};

    const WINDOW: Duration = Duration::from_millis(1000);

    fn controller(repo: &Arc<MemoryRepository>) -> PlanController<MemoryRepository> {
        PlanController::new(Arc::clone(repo), &SyncConfig { debounce: WINDOW })
    }

    async fn signed_in(repo: &Arc<MemoryRepository>) -> (PlanController<MemoryRepository>, RoutineId) {
        let routine = repo.create("ana", NewRoutine::default()).await.unwrap();
        let mut ctl = controller(repo);
        ctl.sign_in("ana").await.unwrap();
        (ctl, routine.id)
    }

    fn toggle_day(group: MuscleGroup, day: Weekday) -> Mutation {
        Mutation::ToggleScheduleDay { group, day }
    }

    #[tokio::test(start_paused = true)]
    async fn test_ephemeral_mutations_never_write() {
        let repo = Arc::new(MemoryRepository::new());
        let mut ctl = controller(&repo);
        ctl.mutate(toggle_day(MuscleGroup::Pecho, Weekday::Lunes)).unwrap();

        tokio::time::sleep(WINDOW * 2).await;
        assert!(repo.updates().is_empty());
        assert_eq!(ctl.active_plan().days_for(MuscleGroup::Pecho), [Weekday::Lunes]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_coalesces_into_one_write() {
        let repo = Arc::new(MemoryRepository::new());
        let (mut ctl, id) = signed_in(&repo).await;

        for day in Weekday::schedulable().iter().take(5) {
            ctl.mutate(toggle_day(MuscleGroup::Espalda, *day)).unwrap();
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
        assert!(repo.updates().is_empty());
        assert_eq!(*ctl.sync_status().borrow(), SyncStatus::Pending);

        tokio::time::sleep(WINDOW).await;
        let updates = repo.updates();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].0, id);
        assert_eq!(updates[0].1, RoutineUpdate::full_plan(ctl.active_plan()));
        assert_eq!(ctl.active_plan().days_for(MuscleGroup::Espalda).len(), 5);
        assert_eq!(*ctl.sync_status().borrow(), SyncStatus::Saved { routine_id: id });
        assert_eq!(repo.stored(id).unwrap().plan, *ctl.active_plan());
    }

    #[tokio::test(start_paused = true)]
    async fn test_switching_routine_cancels_pending_write() {
        let repo = Arc::new(MemoryRepository::new());
        let other = repo.create("ana", NewRoutine::named("Otra")).await.unwrap();
        let (mut ctl, _) = signed_in(&repo).await;

        ctl.mutate(toggle_day(MuscleGroup::Pecho, Weekday::Lunes)).unwrap();
        ctl.load_routine(other.id).await.unwrap();
        tokio::time::sleep(WINDOW * 2).await;

        assert!(repo.updates().is_empty());
        assert_eq!(ctl.current_routine().unwrap().id, other.id);
        assert!(ctl.active_plan().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sign_out_resets_and_cancels() {
        let repo = Arc::new(MemoryRepository::new());
        let (mut ctl, _) = signed_in(&repo).await;
        ctl.mutate(toggle_day(MuscleGroup::Pecho, Weekday::Lunes)).unwrap();

        ctl.sign_out();
        tokio::time::sleep(WINDOW * 2).await;
        assert!(repo.updates().is_empty());
        assert!(!ctl.is_authenticated());
        assert!(ctl.routines().is_empty());
        assert!(ctl.current_routine().is_none());
        assert_eq!(*ctl.active_plan(), Plan::empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sign_out_clears_ephemeral_plan() {
        let repo = Arc::new(MemoryRepository::new());
        let mut ctl = controller(&repo);
        ctl.mutate(Mutation::ToggleRoutineType("fuerza".into())).unwrap();
        assert!(!ctl.active_plan().is_empty());
        ctl.sign_out();
        assert!(ctl.active_plan().is_empty());
    }

    #[tokio::test]
    async fn test_sign_in_prefers_active_routine() {
        let repo = Arc::new(MemoryRepository::new());
        let flagged = repo.create("ana", NewRoutine::named("Activa")).await.unwrap();
        repo.create(
            "ana",
            NewRoutine {
                is_active: Some(false),
                ..NewRoutine::named("Nueva")
            },
        )
        .await
        .unwrap();

        let mut ctl = controller(&repo);
        ctl.sign_in("ana").await.unwrap();
        assert_eq!(ctl.routines().len(), 2);
        assert_eq!(ctl.current_routine().unwrap().id, flagged.id);
        assert!(ctl.is_remote_active());
    }

    #[tokio::test]
    async fn test_sign_in_without_routines_stays_local() {
        let repo = Arc::new(MemoryRepository::new());
        let mut plan = Plan::empty();
        plan.schedule.types.push("cardio".into());
        let mut ctl = controller(&repo).with_ephemeral(plan.clone());

        ctl.sign_in("ana").await.unwrap();
        assert!(ctl.is_authenticated());
        assert!(!ctl.is_remote_active());
        assert_eq!(*ctl.active_plan(), plan);
    }

    #[tokio::test]
    async fn test_invalid_mutation_leaves_plan_unchanged() {
        let repo = Arc::new(MemoryRepository::new());
        let mut ctl = controller(&repo);
        ctl.mutate(toggle_day(MuscleGroup::Pecho, Weekday::Lunes)).unwrap();
        let before = ctl.active_plan().clone();

        let err = ctl
            .mutate(toggle_day(MuscleGroup::Pecho, Weekday::Domingo))
            .unwrap_err();
        assert!(matches!(err, SyncError::Validation(PlanError::UnschedulableDay(_))));

        let err = ctl
            .mutate(Mutation::SetExerciseDetail {
                group: MuscleGroup::Pecho,
                name: "Press banca con barra".into(),
                field: DetailField::Peso,
                value: Some(-5.0),
            })
            .unwrap_err();
        assert!(matches!(err, SyncError::Validation(_)));
        assert_eq!(*ctl.active_plan(), before);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_write_keeps_local_state() {
        let repo = Arc::new(MemoryRepository::new());
        let (mut ctl, id) = signed_in(&repo).await;
        repo.fail_updates(true);

        ctl.mutate(toggle_day(MuscleGroup::Biceps, Weekday::Viernes)).unwrap();
        tokio::time::sleep(WINDOW * 2).await;

        assert_eq!(repo.updates().len(), 1);
        assert!(matches!(
            *ctl.sync_status().borrow(),
            SyncStatus::Failed { routine_id, .. } if routine_id == id
        ));
        assert_eq!(ctl.active_plan().days_for(MuscleGroup::Biceps), [Weekday::Viernes]);
        assert!(repo.stored(id).unwrap().plan.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_writes_immediately() {
        let repo = Arc::new(MemoryRepository::new());
        let (mut ctl, id) = signed_in(&repo).await;

        ctl.mutate(toggle_day(MuscleGroup::Triceps, Weekday::Martes)).unwrap();
        ctl.flush().await.unwrap();
        assert_eq!(repo.updates().len(), 1);
        assert_eq!(repo.stored(id).unwrap().plan, *ctl.active_plan());

        // nothing left to fire
        tokio::time::sleep(WINDOW * 2).await;
        assert_eq!(repo.updates().len(), 1);

        ctl.flush().await.unwrap();
        assert_eq!(repo.updates().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_waits_for_write_in_flight() {
        let repo = Arc::new(MemoryRepository::new());
        let (mut ctl, id) = signed_in(&repo).await;
        repo.slow_updates(Duration::from_millis(500));

        ctl.mutate(toggle_day(MuscleGroup::Hombros, Weekday::Jueves)).unwrap();
        tokio::time::sleep(WINDOW + Duration::from_millis(100)).await;
        assert!(repo.updates().is_empty());

        ctl.flush().await.unwrap();
        assert_eq!(repo.updates().len(), 1);
        assert_eq!(repo.stored(id).unwrap().plan, *ctl.active_plan());
        assert_eq!(*ctl.sync_status().borrow(), SyncStatus::Saved { routine_id: id });
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_pending_write_resets_status() {
        let repo = Arc::new(MemoryRepository::new());
        let (mut ctl, first) = signed_in(&repo).await;

        ctl.mutate(toggle_day(MuscleGroup::Pecho, Weekday::Lunes)).unwrap();
        assert_eq!(*ctl.sync_status().borrow(), SyncStatus::Pending);
        ctl.create_routine(NewRoutine::named("Fuerza")).await.unwrap();
        assert_eq!(*ctl.sync_status().borrow(), SyncStatus::Idle);

        ctl.mutate(toggle_day(MuscleGroup::Pecho, Weekday::Martes)).unwrap();
        let current = ctl.current_routine().unwrap().id;
        ctl.delete_routine(current).await.unwrap();
        assert_eq!(*ctl.sync_status().borrow(), SyncStatus::Idle);

        ctl.load_routine(first).await.unwrap();
        ctl.mutate(toggle_day(MuscleGroup::Pecho, Weekday::Miercoles)).unwrap();
        ctl.sign_in("bea").await.unwrap();
        assert_eq!(*ctl.sync_status().borrow(), SyncStatus::Idle);

        tokio::time::sleep(WINDOW * 2).await;
        assert!(repo.updates().is_empty());
        assert!(repo.stored(first).unwrap().plan.is_empty());
    }

    #[tokio::test]
    async fn test_create_makes_current_and_delete_clears_it() {
        let repo = Arc::new(MemoryRepository::new());
        let (mut ctl, first) = signed_in(&repo).await;

        let created = ctl.create_routine(NewRoutine::named("Fuerza")).await.unwrap().id;
        assert_eq!(ctl.current_routine().unwrap().id, created);
        assert_eq!(ctl.routines()[0].id, created);

        ctl.delete_routine(first).await.unwrap();
        assert_eq!(ctl.current_routine().unwrap().id, created);

        ctl.delete_routine(created).await.unwrap();
        assert!(ctl.current_routine().is_none());
        assert!(ctl.routines().is_empty());
        assert!(!ctl.is_remote_active());
    }

    #[tokio::test]
    async fn test_set_active_is_exclusive() {
        let repo = Arc::new(MemoryRepository::new());
        let (mut ctl, first) = signed_in(&repo).await;
        let second = ctl.create_routine(NewRoutine::named("B")).await.unwrap().id;

        ctl.set_active_routine(second).await.unwrap();
        for routine in ctl.routines() {
            assert_eq!(routine.is_active, routine.id == second);
        }
        assert!(!repo.stored(first).unwrap().is_active);
        assert!(repo.stored(second).unwrap().is_active);
    }

    #[tokio::test]
    async fn test_rename_updates_cache() {
        let repo = Arc::new(MemoryRepository::new());
        let (mut ctl, id) = signed_in(&repo).await;
        ctl.rename_routine(id, "Hipertrofia").await.unwrap();
        assert_eq!(ctl.current_routine().unwrap().name, "Hipertrofia");
        assert_eq!(ctl.routines()[0].name, "Hipertrofia");
        assert_eq!(repo.stored(id).unwrap().name, "Hipertrofia");
    }

    #[tokio::test]
    async fn test_routine_ops_require_owner() {
        let repo = Arc::new(MemoryRepository::new());
        let mut ctl = controller(&repo);
        assert!(matches!(
            ctl.create_routine(NewRoutine::default()).await,
            Err(SyncError::Unauthenticated)
        ));
        assert!(matches!(ctl.load_routine(1).await, Err(SyncError::Unauthenticated)));
    }

    #[tokio::test]
    async fn test_save_session_rejects_second_same_day() {
        let repo = Arc::new(MemoryRepository::new());
        let (ctl, _) = signed_in(&repo).await;
        let session = WorkoutSession {
            date: Utc::now(),
            day_name: Weekday::Lunes,
            total_exercises: 0,
            completed_count: 0,
            progress_percentage: 0,
            status: SessionStatus::Incompleto,
            exercises: vec![],
        };

        let first = ctl.save_session(&session, DuplicatePolicy::RejectSameDay).await.unwrap();
        let second = ctl.save_session(&session, DuplicatePolicy::RejectSameDay).await.unwrap();
        let forced = ctl.save_session(&session, DuplicatePolicy::Allow).await.unwrap();
        assert_eq!(first, SaveOutcome::Saved);
        assert_eq!(second, SaveOutcome::AlreadySavedToday);
        assert_eq!(forced, SaveOutcome::Saved);
        assert_eq!(ctl.history().await.unwrap().len(), 2);
    }
}
