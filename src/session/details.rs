//! Exercise detail resolution: plan overrides first, catalog text second

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::plan::ExerciseDetail;

static SERIES_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d+)\s*series").expect("series pattern"));
static REPS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d+)\s*(?:reps|repeticiones)").expect("reps pattern"));
static PESO_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d+(?:[.,]\d+)?)\s*kg").expect("peso pattern"));

/// What a session shows next to an exercise
#[derive(Debug, Clone, PartialEq)]
pub enum DisplayDetail {
    Custom(ExerciseDetail),
    Catalog(String),
}

impl DisplayDetail {
    pub fn resolve(custom: Option<&ExerciseDetail>, catalog_text: &str) -> Self {
        match custom {
            Some(detail) if detail.has_override() => DisplayDetail::Custom(*detail),
            _ => DisplayDetail::Catalog(catalog_text.to_string()),
        }
    }
}

impl fmt::Display for DisplayDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisplayDetail::Catalog(text) => f.write_str(text),
            DisplayDetail::Custom(d) => {
                let series = d.series.map(|s| s.to_string()).unwrap_or_else(|| "?".into());
                let reps = d.reps.map(|r| r.to_string()).unwrap_or_else(|| "?".into());
                write!(f, "{} series de {} repeticiones", series, reps)?;
                if let Some(peso) = d.peso {
                    write!(f, " con {} kg", peso)?;
                }
                Ok(())
            }
        }
    }
}

/// Structured fields stored in a session record
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RecordedLoad {
    pub series: u32,
    pub reps: u32,
    pub peso: f64,
}

impl RecordedLoad {
    /// Override fields win; with no override at all, recover what the catalog
    /// text spells out. Anything unknown is 0.
    pub fn resolve(custom: Option<&ExerciseDetail>, catalog_text: &str) -> Self {
        match custom {
            Some(d) if d.has_override() => Self {
                series: d.series.unwrap_or(0),
                reps: d.reps.unwrap_or(0),
                peso: d.peso.unwrap_or(0.0),
            },
            _ => parse_catalog_text(catalog_text),
        }
    }
}

/// Pull `<n> series`, `<n> reps|repeticiones` and `<n> kg` out of free text
pub fn parse_catalog_text(text: &str) -> RecordedLoad {
    let capture = |re: &Regex| {
        re.captures(text)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().replace(',', "."))
    };
    RecordedLoad {
        series: capture(&SERIES_RE).and_then(|s| s.parse().ok()).unwrap_or(0),
        reps: capture(&REPS_RE).and_then(|s| s.parse().ok()).unwrap_or(0),
        peso: capture(&PESO_RE).and_then(|s| s.parse().ok()).unwrap_or(0.0),
    }
}
