//! Plan mutations - every change to a plan goes through one of these

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ExerciseDetail, MuscleGroup, Plan, PlanError, Weekday};

/// Field of an exercise override
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DetailField {
    Series,
    Reps,
    Peso,
}

impl fmt::Display for DetailField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DetailField::Series => "series",
            DetailField::Reps => "reps",
            DetailField::Peso => "peso",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    ToggleScheduleDay { group: MuscleGroup, day: Weekday },
    ToggleRoutineType(String),
    /// Bulk replace of one group's days (planner form)
    SetScheduleDays { group: MuscleGroup, days: Vec<Weekday> },
    ToggleExercise { group: MuscleGroup, name: String },
    ClearGroup(MuscleGroup),
    /// `None` clears the field
    SetExerciseDetail {
        group: MuscleGroup,
        name: String,
        field: DetailField,
        value: Option<f64>,
    },
    /// Replace days, selections and details with a generated plan.
    /// Routine types are kept.
    ApplyTemplate(Plan),
}

impl Mutation {
    pub fn validate(&self) -> Result<(), PlanError> {
        match self {
            Mutation::ToggleScheduleDay { day, .. } => check_schedulable(*day),
            Mutation::ToggleRoutineType(kind) => {
                if kind.trim().is_empty() {
                    return Err(PlanError::EmptyRoutineType);
                }
                Ok(())
            }
            Mutation::SetScheduleDays { days, .. } => check_day_set(days),
            Mutation::ToggleExercise { name, .. } => check_name(name),
            Mutation::ClearGroup(_) => Ok(()),
            Mutation::SetExerciseDetail {
                name, field, value, ..
            } => {
                check_name(name)?;
                match value {
                    Some(v) => check_detail_value(*field, *v),
                    None => Ok(()),
                }
            }
            Mutation::ApplyTemplate(plan) => {
                for days in plan.schedule.days.values() {
                    check_day_set(days)?;
                }
                Ok(())
            }
        }
    }

    /// Produce the mutated plan. Callers validate first.
    pub(crate) fn apply_to(&self, plan: &Plan) -> Plan {
        let mut next = plan.clone();
        match self {
            Mutation::ToggleScheduleDay { group, day } => {
                let days = next.schedule.days.entry(*group).or_default();
                toggle(days, *day);
                if days.is_empty() {
                    next.schedule.days.remove(group);
                }
            }
            Mutation::ToggleRoutineType(kind) => {
                toggle(&mut next.schedule.types, kind.trim().to_string());
            }
            Mutation::SetScheduleDays { group, days } => {
                if days.is_empty() {
                    next.schedule.days.remove(group);
                } else {
                    next.schedule.days.insert(*group, days.clone());
                }
            }
            Mutation::ToggleExercise { group, name } => {
                let names = next.selected_exercises.entry(*group).or_default();
                toggle(names, name.clone());
                if names.is_empty() {
                    next.selected_exercises.remove(group);
                }
            }
            Mutation::ClearGroup(group) => {
                next.selected_exercises.remove(group);
            }
            Mutation::SetExerciseDetail {
                group,
                name,
                field,
                value,
            } => {
                let details = next.custom_details.entry(*group).or_default();
                let detail = details.entry(name.clone()).or_default();
                set_field(detail, *field, *value);
                if !detail.has_override() {
                    details.remove(name);
                }
                if details.is_empty() {
                    next.custom_details.remove(group);
                }
            }
            Mutation::ApplyTemplate(generated) => {
                next.schedule.days = generated.schedule.days.clone();
                next.selected_exercises = generated.selected_exercises.clone();
                next.custom_details = generated.custom_details.clone();
            }
        }
        debug!(?self, "plan mutated");
        next
    }
}

fn toggle<T: PartialEq>(items: &mut Vec<T>, item: T) {
    if let Some(pos) = items.iter().position(|existing| *existing == item) {
        items.remove(pos);
    } else {
        items.push(item);
    }
}

fn set_field(detail: &mut ExerciseDetail, field: DetailField, value: Option<f64>) {
    match field {
        DetailField::Series => detail.series = value.map(|v| v as u32),
        DetailField::Reps => detail.reps = value.map(|v| v as u32),
        DetailField::Peso => detail.peso = value,
    }
}

fn check_schedulable(day: Weekday) -> Result<(), PlanError> {
    if !day.is_schedulable() {
        return Err(PlanError::UnschedulableDay(day));
    }
    Ok(())
}

fn check_day_set(days: &[Weekday]) -> Result<(), PlanError> {
    for (i, day) in days.iter().enumerate() {
        check_schedulable(*day)?;
        if days[..i].contains(day) {
            return Err(PlanError::DuplicateDay(*day));
        }
    }
    Ok(())
}

fn check_name(name: &str) -> Result<(), PlanError> {
    if name.trim().is_empty() {
        return Err(PlanError::EmptyExerciseName);
    }
    Ok(())
}

// series and reps are whole counts, peso any non-negative number
fn check_detail_value(field: DetailField, value: f64) -> Result<(), PlanError> {
    let whole = value.fract() == 0.0 && value <= u32::MAX as f64;
    let valid = value.is_finite()
        && value >= 0.0
        && (field == DetailField::Peso || whole);
    if !valid {
        return Err(PlanError::InvalidDetail { field, value });
    }
    Ok(())
}
