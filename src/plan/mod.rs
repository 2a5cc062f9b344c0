//! Plan model - schedule, exercise selections and per-exercise overrides

pub mod mutation;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use mutation::{DetailField, Mutation};

/// Muscle groups a plan can schedule
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MuscleGroup {
    Pecho,
    Espalda,
    Hombros,
    Biceps,
    Triceps,
    Piernas,
    Abdominales,
}

impl MuscleGroup {
    pub fn slug(&self) -> &'static str {
        match self {
            MuscleGroup::Pecho => "pecho",
            MuscleGroup::Espalda => "espalda",
            MuscleGroup::Hombros => "hombros",
            MuscleGroup::Biceps => "biceps",
            MuscleGroup::Triceps => "triceps",
            MuscleGroup::Piernas => "piernas",
            MuscleGroup::Abdominales => "abdominales",
        }
    }

    /// Title-cased slug, used in headings and completion keys
    pub fn display_name(&self) -> &'static str {
        match self {
            MuscleGroup::Pecho => "Pecho",
            MuscleGroup::Espalda => "Espalda",
            MuscleGroup::Hombros => "Hombros",
            MuscleGroup::Biceps => "Biceps",
            MuscleGroup::Triceps => "Triceps",
            MuscleGroup::Piernas => "Piernas",
            MuscleGroup::Abdominales => "Abdominales",
        }
    }

    /// All muscle groups for iteration
    pub fn all() -> &'static [MuscleGroup] {
        &[
            MuscleGroup::Pecho,
            MuscleGroup::Espalda,
            MuscleGroup::Hombros,
            MuscleGroup::Biceps,
            MuscleGroup::Triceps,
            MuscleGroup::Piernas,
            MuscleGroup::Abdominales,
        ]
    }

    pub fn from_slug(slug: &str) -> Result<Self, PlanError> {
        let wanted = slug.trim().to_lowercase();
        MuscleGroup::all()
            .iter()
            .copied()
            .find(|g| g.slug() == wanted)
            .ok_or_else(|| PlanError::UnknownGroup(slug.to_string()))
    }
}

impl fmt::Display for MuscleGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for MuscleGroup {
    type Err = PlanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MuscleGroup::from_slug(s)
    }
}

/// Day of the week, named the way plans store them
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Weekday {
    Lunes,
    Martes,
    #[serde(rename = "Miércoles")]
    Miercoles,
    Jueves,
    Viernes,
    #[serde(rename = "Sábado")]
    Sabado,
    Domingo,
}

impl Weekday {
    pub fn name(&self) -> &'static str {
        match self {
            Weekday::Lunes => "Lunes",
            Weekday::Martes => "Martes",
            Weekday::Miercoles => "Miércoles",
            Weekday::Jueves => "Jueves",
            Weekday::Viernes => "Viernes",
            Weekday::Sabado => "Sábado",
            Weekday::Domingo => "Domingo",
        }
    }

    /// Training days a schedule may contain (Sunday is never scheduled)
    pub fn schedulable() -> &'static [Weekday] {
        &[
            Weekday::Lunes,
            Weekday::Martes,
            Weekday::Miercoles,
            Weekday::Jueves,
            Weekday::Viernes,
            Weekday::Sabado,
        ]
    }

    pub fn is_schedulable(&self) -> bool {
        *self != Weekday::Domingo
    }

    pub fn from_chrono(day: chrono::Weekday) -> Self {
        match day {
            chrono::Weekday::Mon => Weekday::Lunes,
            chrono::Weekday::Tue => Weekday::Martes,
            chrono::Weekday::Wed => Weekday::Miercoles,
            chrono::Weekday::Thu => Weekday::Jueves,
            chrono::Weekday::Fri => Weekday::Viernes,
            chrono::Weekday::Sat => Weekday::Sabado,
            chrono::Weekday::Sun => Weekday::Domingo,
        }
    }

    /// Weekday of the local calendar date
    pub fn today() -> Self {
        use chrono::Datelike;
        Weekday::from_chrono(chrono::Local::now().weekday())
    }
}

impl fmt::Display for Weekday {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Weekday {
    type Err = PlanError;

    /// Accepts the stored name, with or without accents, in any case
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let folded: String = s
            .trim()
            .to_lowercase()
            .chars()
            .map(|c| match c {
                'á' => 'a',
                'é' => 'e',
                _ => c,
            })
            .collect();
        let day = match folded.as_str() {
            "lunes" => Weekday::Lunes,
            "martes" => Weekday::Martes,
            "miercoles" => Weekday::Miercoles,
            "jueves" => Weekday::Jueves,
            "viernes" => Weekday::Viernes,
            "sabado" => Weekday::Sabado,
            "domingo" => Weekday::Domingo,
            _ => return Err(PlanError::UnknownWeekday(s.to_string())),
        };
        Ok(day)
    }
}

/// Sparse per-exercise override
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct ExerciseDetail {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub series: Option<u32>,
    #[serde(default, alias = "repeticiones", skip_serializing_if = "Option::is_none")]
    pub reps: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peso: Option<f64>,
}

impl ExerciseDetail {
    pub fn new(series: u32, reps: u32, peso: f64) -> Self {
        Self {
            series: Some(series),
            reps: Some(reps),
            peso: Some(peso),
        }
    }

    /// True when at least one field overrides the catalog
    pub fn has_override(&self) -> bool {
        self.series.is_some() || self.reps.is_some() || self.peso.is_some()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Schedule {
    pub days: BTreeMap<MuscleGroup, Vec<Weekday>>,
    pub types: Vec<String>,
}

pub type Selections = BTreeMap<MuscleGroup, Vec<String>>;
pub type CustomDetails = BTreeMap<MuscleGroup, BTreeMap<String, ExerciseDetail>>;

/// The schedule/selection/detail triple describing a workout program.
///
/// Empty sequences are never stored: a group whose days or exercises run out
/// is removed from the map, so an absent key and an empty list are the same.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    pub schedule: Schedule,
    pub selected_exercises: Selections,
    pub custom_details: CustomDetails,
}

impl Plan {
    /// The canonical empty plan
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::empty()
    }

    pub fn days_for(&self, group: MuscleGroup) -> &[Weekday] {
        self.schedule.days.get(&group).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn exercises_for(&self, group: MuscleGroup) -> &[String] {
        self.selected_exercises
            .get(&group)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn detail_for(&self, group: MuscleGroup, exercise: &str) -> Option<&ExerciseDetail> {
        self.custom_details.get(&group)?.get(exercise)
    }

    pub fn trains_on(&self, group: MuscleGroup, day: Weekday) -> bool {
        self.days_for(group).contains(&day)
    }

    /// Groups scheduled on `day`, in group order
    pub fn groups_on(&self, day: Weekday) -> Vec<MuscleGroup> {
        self.schedule
            .days
            .iter()
            .filter(|(_, days)| days.contains(&day))
            .map(|(group, _)| *group)
            .collect()
    }

    pub fn total_selected(&self) -> usize {
        self.selected_exercises.values().map(Vec::len).sum()
    }

    /// Apply a mutation, producing a new plan
    pub fn apply(&self, mutation: &Mutation) -> Result<Plan, PlanError> {
        mutation.validate()?;
        Ok(mutation.apply_to(self))
    }
}

/// Malformed plan input, rejected before any state changes
#[derive(Debug, Clone, Error, PartialEq)]
pub enum PlanError {
    #[error("unknown muscle group: {0}")]
    UnknownGroup(String),

    #[error("unknown weekday: {0}")]
    UnknownWeekday(String),

    #[error("{0} cannot be scheduled")]
    UnschedulableDay(Weekday),

    #[error("day {0} listed more than once")]
    DuplicateDay(Weekday),

    #[error("exercise name must not be empty")]
    EmptyExerciseName,

    #[error("routine type must not be empty")]
    EmptyRoutineType,

    #[error("invalid value {value} for {field}")]
    InvalidDetail { field: DetailField, value: f64 },

    #[error("cannot train {0} days a week")]
    InvalidDayCount(usize),

    #[error("expected {expected} training days, got {got}")]
    DayCountMismatch { expected: usize, got: usize },
}
