//! Exercise catalogs - base de ejercicios y rutinas predefinidas
//!
//! Both catalogs are read-only inputs. Built-in copies live in `data/` and are
//! embedded at compile time; either can be replaced by a JSON file of the
//! same shape.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

use crate::plan::{CustomDetails, MuscleGroup};

const BUILTIN_EXERCISES: &str = include_str!("../data/ejercicios.json");
const BUILTIN_ROUTINES: &str = include_str!("../data/rutinas_predefinidas.json");

/// One catalog exercise
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExerciseMeta {
    pub nombre: String,
    #[serde(default)]
    pub detalles: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Subgroup {
    pub nombre: String,
    pub ejercicios: Vec<ExerciseMeta>,
}

/// Catalog entry for a muscle group, flat or split into sub-groups (legs)
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum GroupCatalog {
    Nested {
        subgrupos: Vec<Subgroup>,
    },
    Flat {
        #[serde(default)]
        ejercicios: Vec<String>,
        imagenes: Vec<ExerciseMeta>,
    },
}

impl GroupCatalog {
    /// Every exercise in catalog order, sub-groups concatenated
    pub fn exercises(&self) -> Vec<&ExerciseMeta> {
        match self {
            GroupCatalog::Nested { subgrupos } => subgrupos
                .iter()
                .flat_map(|sg| sg.ejercicios.iter())
                .collect(),
            GroupCatalog::Flat { imagenes, .. } => imagenes.iter().collect(),
        }
    }

    pub fn find(&self, name: &str) -> Option<&ExerciseMeta> {
        self.exercises().into_iter().find(|e| e.nombre == name)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(transparent)]
pub struct ExerciseCatalog {
    groups: BTreeMap<MuscleGroup, GroupCatalog>,
}

impl ExerciseCatalog {
    pub fn builtin() -> Result<Self> {
        serde_json::from_str(BUILTIN_EXERCISES).context("built-in exercise catalog is malformed")
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading exercise catalog {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("parsing exercise catalog {}", path.display()))
    }

    /// File override if given, built-in data otherwise
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::from_path(p),
            None => Self::builtin(),
        }
    }

    pub fn group(&self, group: MuscleGroup) -> Option<&GroupCatalog> {
        self.groups.get(&group)
    }

    pub fn find(&self, group: MuscleGroup, name: &str) -> Option<&ExerciseMeta> {
        self.group(group)?.find(name)
    }
}

/// Exercises a template lists for one group
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum GroupExercises {
    List(Vec<String>),
    Nested(SubLists),
}

impl GroupExercises {
    /// Sub-lists concatenated in catalog order
    pub fn flatten(&self) -> Vec<String> {
        match self {
            GroupExercises::List(names) => names.clone(),
            GroupExercises::Nested(subs) => subs
                .0
                .iter()
                .flat_map(|(_, names)| names.iter().cloned())
                .collect(),
        }
    }
}

/// Named sub-lists, kept in document order
#[derive(Debug, Clone, PartialEq)]
pub struct SubLists(pub Vec<(String, Vec<String>)>);

impl<'de> Deserialize<'de> for SubLists {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SubListsVisitor;

        impl<'de> Visitor<'de> for SubListsVisitor {
            type Value = SubLists;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of sub-group name to exercise names")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<SubLists, A::Error> {
                let mut entries = Vec::new();
                while let Some((name, names)) = map.next_entry::<String, Vec<String>>()? {
                    entries.push((name, names));
                }
                Ok(SubLists(entries))
            }
        }

        deserializer.deserialize_map(SubListsVisitor)
    }
}

pub type Section = BTreeMap<MuscleGroup, GroupExercises>;

/// A predefined routine: flat `exercises`, or named sections
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateDef {
    #[serde(default)]
    pub exercises: Option<Section>,
    #[serde(default)]
    pub default_weights: CustomDetails,
    #[serde(flatten)]
    pub sections: BTreeMap<String, Section>,
}

impl TemplateDef {
    pub fn section(&self, name: &str) -> Option<&Section> {
        self.sections.get(name)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(transparent)]
pub struct RoutineCatalog {
    templates: BTreeMap<String, TemplateDef>,
}

impl RoutineCatalog {
    pub fn builtin() -> Result<Self> {
        serde_json::from_str(BUILTIN_ROUTINES).context("built-in routine catalog is malformed")
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading routine catalog {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("parsing routine catalog {}", path.display()))
    }

    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::from_path(p),
            None => Self::builtin(),
        }
    }

    pub fn template(&self, name: &str) -> Option<&TemplateDef> {
        self.templates.get(name)
    }
}
