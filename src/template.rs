//! Template generator - turns "N days a week on these weekdays" into a plan

use std::fmt;

use tracing::{debug, warn};

use crate::catalog::{RoutineCatalog, Section};
use crate::plan::{MuscleGroup, Plan, PlanError, Weekday};

use MuscleGroup::*;

const FULL_BODY: &[MuscleGroup] = &[Pecho, Espalda, Hombros, Biceps, Triceps, Piernas];
const TORSO: &[MuscleGroup] = &[Pecho, Espalda, Hombros, Biceps, Triceps];
const PIERNA: &[MuscleGroup] = &[Piernas, Abdominales];
const PUSH: &[MuscleGroup] = &[Pecho, Hombros, Triceps];
const PULL: &[MuscleGroup] = &[Espalda, Biceps];
const LEGS: &[MuscleGroup] = &[Piernas, Abdominales];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Template {
    FullBody,
    TorsoPierna,
    PushPullLegs,
}

impl Template {
    /// Recommended split for a weekly day count
    pub fn for_day_count(days: usize) -> Self {
        match days {
            0..=2 => Template::FullBody,
            3 => Template::TorsoPierna,
            _ => Template::PushPullLegs,
        }
    }

    /// Name used as the predefined catalog key
    pub fn name(&self) -> &'static str {
        match self {
            Template::FullBody => "Full Body",
            Template::TorsoPierna => "Torso-Pierna",
            Template::PushPullLegs => "Push-Pull-Legs",
        }
    }

    /// Catalog sections, in application order. `None` means the flat list.
    fn sections(&self) -> &'static [Option<&'static str>] {
        match self {
            Template::FullBody => &[None],
            Template::TorsoPierna => &[Some("torso"), Some("pierna")],
            Template::PushPullLegs => &[Some("push"), Some("pull"), Some("legs")],
        }
    }

    /// Muscle groups trained on the day at `index` of the chosen days
    pub fn groups_for(&self, index: usize) -> &'static [MuscleGroup] {
        match self {
            Template::FullBody => FULL_BODY,
            Template::TorsoPierna => {
                if index % 2 == 0 {
                    TORSO
                } else {
                    PIERNA
                }
            }
            Template::PushPullLegs => [PUSH, PULL, LEGS][index % 3],
        }
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A checked "days per week + which weekdays" choice
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateRequest {
    days: Vec<Weekday>,
}

impl TemplateRequest {
    /// `days` keeps the order the user picked them in; it drives the rotation
    pub fn new(days_per_week: usize, days: Vec<Weekday>) -> Result<Self, PlanError> {
        for (i, day) in days.iter().enumerate() {
            if !day.is_schedulable() {
                return Err(PlanError::UnschedulableDay(*day));
            }
            if days[..i].contains(day) {
                return Err(PlanError::DuplicateDay(*day));
            }
        }
        if days_per_week == 0 || days_per_week > Weekday::schedulable().len() {
            return Err(PlanError::InvalidDayCount(days_per_week));
        }
        if days.len() != days_per_week {
            return Err(PlanError::DayCountMismatch {
                expected: days_per_week,
                got: days.len(),
            });
        }
        Ok(Self { days })
    }

    pub fn template(&self) -> Template {
        Template::for_day_count(self.days.len())
    }

    pub fn days(&self) -> &[Weekday] {
        &self.days
    }
}

/// Build the full replacement plan for a request. Pure.
pub fn generate(request: &TemplateRequest, catalog: &RoutineCatalog) -> Plan {
    let template = request.template();
    let mut plan = Plan::empty();

    for (index, day) in request.days().iter().enumerate() {
        for group in template.groups_for(index) {
            plan.schedule.days.entry(*group).or_default().push(*day);
        }
    }

    let Some(def) = catalog.template(template.name()) else {
        warn!("No predefined exercises for template {}", template);
        return plan;
    };

    for section in template.sections() {
        let groups = match section {
            None => def.exercises.as_ref(),
            Some(name) => def.section(name),
        };
        match groups {
            Some(groups) => prefill(&mut plan, groups, &def.default_weights),
            None => warn!("Template {} has no section {:?}", template, section),
        }
    }

    debug!(
        template = template.name(),
        days = request.days().len(),
        exercises = plan.total_selected(),
        "generated plan"
    );
    plan
}

fn prefill(plan: &mut Plan, groups: &Section, weights: &crate::plan::CustomDetails) {
    for (group, exercises) in groups {
        let names = exercises.flatten();
        if let Some(defaults) = weights.get(group) {
            for name in &names {
                if let Some(detail) = defaults.get(name) {
                    plan.custom_details
                        .entry(*group)
                        .or_default()
                        .insert(name.clone(), *detail);
                }
            }
        }
        if names.is_empty() {
            plan.selected_exercises.remove(group);
        } else {
            plan.selected_exercises.insert(*group, names);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::ExerciseDetail;
    use Weekday::*;

    fn catalog() -> RoutineCatalog {
        RoutineCatalog::builtin().unwrap()
    }

    fn request(days: &[Weekday]) -> TemplateRequest {
        TemplateRequest::new(days.len(), days.to_vec()).unwrap()
    }

    fn groups_on(plan: &Plan, day: Weekday) -> Vec<MuscleGroup> {
        plan.groups_on(day)
    }

    #[test]
    fn test_template_by_day_count() {
        assert_eq!(Template::for_day_count(1), Template::FullBody);
        assert_eq!(Template::for_day_count(2), Template::FullBody);
        assert_eq!(Template::for_day_count(3), Template::TorsoPierna);
        assert_eq!(Template::for_day_count(4), Template::PushPullLegs);
        assert_eq!(Template::for_day_count(5), Template::PushPullLegs);
        assert_eq!(Template::for_day_count(6), Template::PushPullLegs);
    }

    #[test]
    fn test_request_validation() {
        assert_eq!(
            TemplateRequest::new(2, vec![Lunes, Domingo]),
            Err(PlanError::UnschedulableDay(Domingo))
        );
        assert_eq!(
            TemplateRequest::new(2, vec![Lunes, Lunes]),
            Err(PlanError::DuplicateDay(Lunes))
        );
        assert_eq!(
            TemplateRequest::new(3, vec![Lunes, Martes]),
            Err(PlanError::DayCountMismatch {
                expected: 3,
                got: 2
            })
        );
        assert_eq!(TemplateRequest::new(0, vec![]), Err(PlanError::InvalidDayCount(0)));
    }

    #[test]
    fn test_full_body_every_day_all_groups() {
        let plan = generate(&request(&[Martes, Jueves]), &catalog());
        for day in [Martes, Jueves] {
            assert_eq!(groups_on(&plan, day), FULL_BODY.to_vec());
        }
        assert!(!plan.schedule.days.contains_key(&Abdominales));
        assert_eq!(
            plan.exercises_for(Piernas),
            ["Sentadilla con barra", "Peso muerto rumano", "Hip thrust con barra"]
        );
    }

    #[test]
    fn test_torso_pierna_alternates_by_pick_order() {
        let plan = generate(&request(&[Lunes, Miercoles, Viernes]), &catalog());
        assert_eq!(groups_on(&plan, Lunes), TORSO.to_vec());
        assert_eq!(groups_on(&plan, Miercoles), PIERNA.to_vec());
        assert_eq!(groups_on(&plan, Viernes), TORSO.to_vec());

        // pick order, not calendar order, decides the parity
        let plan = generate(&request(&[Viernes, Lunes, Miercoles]), &catalog());
        assert_eq!(groups_on(&plan, Lunes), PIERNA.to_vec());
        assert_eq!(groups_on(&plan, Viernes), TORSO.to_vec());
    }

    #[test]
    fn test_ppl_six_days() {
        let days = [Lunes, Martes, Miercoles, Jueves, Viernes, Sabado];
        let plan = generate(&request(&days), &catalog());

        let expected = [PUSH, PULL, LEGS, PUSH, PULL, LEGS];
        for (day, groups) in days.iter().zip(expected) {
            let mut want = groups.to_vec();
            want.sort();
            assert_eq!(groups_on(&plan, *day), want, "{}", day);
        }
        assert_eq!(plan.days_for(Pecho), [Lunes, Jueves]);
        assert_eq!(plan.days_for(Espalda), [Martes, Viernes]);
        assert_eq!(plan.days_for(Abdominales), [Miercoles, Sabado]);
    }

    #[test]
    fn test_ppl_four_days_wraps() {
        let plan = generate(&request(&[Lunes, Martes, Jueves, Viernes]), &catalog());
        assert_eq!(plan.days_for(Pecho), [Lunes, Viernes]);
        assert_eq!(plan.days_for(Biceps), [Martes]);
        assert_eq!(plan.days_for(Piernas), [Jueves]);
    }

    #[test]
    fn test_ppl_prefills_all_sections_and_weights() {
        let plan = generate(&request(&[Lunes, Martes, Miercoles, Jueves]), &catalog());
        for group in MuscleGroup::all() {
            assert!(!plan.exercises_for(*group).is_empty(), "{}", group);
        }
        assert_eq!(
            &plan.exercises_for(Piernas)[..3],
            ["Sentadilla con barra", "Prensa de piernas", "Extensiones de cuádriceps"]
        );
        assert_eq!(
            plan.detail_for(Pecho, "Press banca con barra"),
            Some(&ExerciseDetail::new(4, 6, 60.0))
        );
        // weights only for listed exercises
        assert!(plan.detail_for(Pecho, "Aperturas en polea").is_none());
    }

    #[test]
    fn test_generation_is_deterministic() {
        let req = request(&[Lunes, Miercoles, Viernes]);
        assert_eq!(generate(&req, &catalog()), generate(&req, &catalog()));
    }

    #[test]
    fn test_missing_template_still_schedules() {
        let empty: RoutineCatalog = serde_json::from_str("{}").unwrap();
        let plan = generate(&request(&[Lunes]), &empty);
        assert_eq!(groups_on(&plan, Lunes), FULL_BODY.to_vec());
        assert!(plan.selected_exercises.is_empty());
    }
}
