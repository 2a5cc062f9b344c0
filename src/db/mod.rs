//! Database module - SQLite storage for routines and workout history

use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::plan::{Plan, Weekday};
use crate::repository::{NewRoutine, RepositoryError, Routine, RoutineId, RoutineRepository, RoutineUpdate, day_bounds};
use crate::session::{SessionStatus, WorkoutSession};

/// SQLite-backed routine repository
pub struct SqliteRepository {
    conn: Mutex<Connection>,
}

impl SqliteRepository {
    /// Open or create database
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        info!("Opened database {}", path.display());
        Self::with_connection(conn)
    }

    pub fn in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        init_schema(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }
}

/// Initialize database schema
fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS routines (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            owner_id TEXT NOT NULL,
            name TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            schedule TEXT NOT NULL,
            selected_exercises TEXT NOT NULL,
            custom_details TEXT NOT NULL,
            is_active INTEGER NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS workout_history (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            owner_id TEXT NOT NULL,
            date TEXT NOT NULL,
            day_name TEXT NOT NULL,
            total_exercises INTEGER NOT NULL,
            completed_count INTEGER NOT NULL,
            progress_percentage INTEGER NOT NULL,
            status TEXT NOT NULL,
            exercises TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_history_owner_date ON workout_history (owner_id, date)",
        [],
    )?;

    Ok(())
}

/// Timestamps are stored as fixed-width UTC text so they sort as strings
fn timestamp(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_timestamp(text: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(text)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Backend(format!("bad timestamp {:?}: {}", text, e)))
}

const ROUTINE_COLUMNS: &str =
    "id, name, description, schedule, selected_exercises, custom_details, is_active, created_at, updated_at";

/// Raw routine columns, decoded after the statement is done
struct RoutineRow {
    id: RoutineId,
    name: String,
    description: String,
    schedule: String,
    selected_exercises: String,
    custom_details: String,
    is_active: bool,
    created_at: String,
    updated_at: String,
}

impl RoutineRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            description: row.get(2)?,
            schedule: row.get(3)?,
            selected_exercises: row.get(4)?,
            custom_details: row.get(5)?,
            is_active: row.get(6)?,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }

    fn into_routine(self) -> Result<Routine, RepositoryError> {
        Ok(Routine {
            id: self.id,
            name: self.name,
            description: self.description,
            plan: Plan {
                schedule: serde_json::from_str(&self.schedule)?,
                selected_exercises: serde_json::from_str(&self.selected_exercises)?,
                custom_details: serde_json::from_str(&self.custom_details)?,
            },
            is_active: self.is_active,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
        })
    }
}

struct HistoryRow {
    date: String,
    day_name: String,
    total_exercises: i64,
    completed_count: i64,
    progress_percentage: i64,
    status: String,
    exercises: String,
}

impl HistoryRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            date: row.get(0)?,
            day_name: row.get(1)?,
            total_exercises: row.get(2)?,
            completed_count: row.get(3)?,
            progress_percentage: row.get(4)?,
            status: row.get(5)?,
            exercises: row.get(6)?,
        })
    }

    fn into_session(self) -> Result<WorkoutSession, RepositoryError> {
        let day_name: Weekday = self
            .day_name
            .parse()
            .map_err(|e| RepositoryError::Backend(format!("bad day name: {}", e)))?;
        let status: SessionStatus = serde_json::from_value(serde_json::Value::String(self.status))?;
        Ok(WorkoutSession {
            date: parse_timestamp(&self.date)?,
            day_name,
            total_exercises: self.total_exercises as usize,
            completed_count: self.completed_count as usize,
            progress_percentage: self.progress_percentage.clamp(0, 100) as u8,
            status,
            exercises: serde_json::from_str(&self.exercises)?,
        })
    }
}

#[async_trait]
impl RoutineRepository for SqliteRepository {
    async fn list(&self, owner: &str) -> Result<Vec<Routine>, RepositoryError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM routines WHERE owner_id = ?1 ORDER BY updated_at DESC, id DESC",
            ROUTINE_COLUMNS
        ))?;
        let rows = stmt
            .query_map(params![owner], RoutineRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(RoutineRow::into_routine).collect()
    }

    async fn get(&self, owner: &str, id: RoutineId) -> Result<Routine, RepositoryError> {
        let conn = self.conn.lock().await;
        let row = conn
            .query_row(
                &format!("SELECT {} FROM routines WHERE owner_id = ?1 AND id = ?2", ROUTINE_COLUMNS),
                params![owner, id],
                RoutineRow::from_row,
            )
            .optional()?;
        match row {
            Some(row) => row.into_routine(),
            None => Err(RepositoryError::NotFound { id }),
        }
    }

    async fn create(&self, owner: &str, routine: NewRoutine) -> Result<Routine, RepositoryError> {
        let now = Utc::now();
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO routines (owner_id, name, description, schedule, selected_exercises, custom_details, is_active, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
            params![
                owner,
                routine.name(),
                routine.description(),
                serde_json::to_string(&routine.plan.schedule)?,
                serde_json::to_string(&routine.plan.selected_exercises)?,
                serde_json::to_string(&routine.plan.custom_details)?,
                routine.is_active(),
                timestamp(&now),
            ],
        )?;
        let id = conn.last_insert_rowid();
        info!("Created routine {} ({:?}) for {}", id, routine.name(), owner);

        // read back so the timestamps match what later reads return
        let row = conn.query_row(
            &format!("SELECT {} FROM routines WHERE id = ?1", ROUTINE_COLUMNS),
            params![id],
            RoutineRow::from_row,
        )?;
        row.into_routine()
    }

    async fn update(&self, owner: &str, id: RoutineId, updates: &[RoutineUpdate]) -> Result<(), RepositoryError> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;

        let touched = tx.execute(
            "UPDATE routines SET updated_at = ?1 WHERE owner_id = ?2 AND id = ?3",
            params![timestamp(&Utc::now()), owner, id],
        )?;
        if touched == 0 {
            return Err(RepositoryError::NotFound { id });
        }

        for update in updates {
            let (column, value): (&str, rusqlite::types::Value) = match update {
                RoutineUpdate::SetSchedule(s) => ("schedule", serde_json::to_string(s)?.into()),
                RoutineUpdate::SetSelectedExercises(s) => ("selected_exercises", serde_json::to_string(s)?.into()),
                RoutineUpdate::SetCustomDetails(d) => ("custom_details", serde_json::to_string(d)?.into()),
                RoutineUpdate::Rename(name) => ("name", name.clone().into()),
                RoutineUpdate::SetDescription(text) => ("description", text.clone().into()),
                RoutineUpdate::SetActive(active) => ("is_active", i64::from(*active).into()),
            };
            tx.execute(
                &format!("UPDATE routines SET {} = ?1 WHERE id = ?2", column),
                params![value, id],
            )?;
        }

        tx.commit()?;
        debug!("Updated routine {} ({} fields)", id, updates.len());
        Ok(())
    }

    async fn delete(&self, owner: &str, id: RoutineId) -> Result<(), RepositoryError> {
        let conn = self.conn.lock().await;
        let removed = conn.execute(
            "DELETE FROM routines WHERE owner_id = ?1 AND id = ?2",
            params![owner, id],
        )?;
        debug!("Deleted routine {} ({} rows)", id, removed);
        Ok(())
    }

    async fn append_history(&self, owner: &str, session: &WorkoutSession) -> Result<(), RepositoryError> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO workout_history (owner_id, date, day_name, total_exercises, completed_count, progress_percentage, status, exercises)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                owner,
                timestamp(&session.date),
                session.day_name.name(),
                session.total_exercises as i64,
                session.completed_count as i64,
                session.progress_percentage,
                session.status.as_str(),
                serde_json::to_string(&session.exercises)?,
            ],
        )?;
        Ok(())
    }

    async fn list_history(&self, owner: &str) -> Result<Vec<WorkoutSession>, RepositoryError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT date, day_name, total_exercises, completed_count, progress_percentage, status, exercises
             FROM workout_history WHERE owner_id = ?1 ORDER BY date DESC, id DESC",
        )?;
        let rows = stmt
            .query_map(params![owner], HistoryRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(HistoryRow::into_session).collect()
    }

    async fn exists_history_for_date(&self, owner: &str, day: NaiveDate) -> Result<bool, RepositoryError> {
        let (start, end) = day_bounds(day);
        let conn = self.conn.lock().await;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM workout_history WHERE owner_id = ?1 AND date >= ?2 AND date < ?3",
            params![owner, timestamp(&start), timestamp(&end)],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }
}
