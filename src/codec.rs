//! Snapshot codec - a whole plan packed into one URL query value
//!
//! Wire format: canonical JSON of `{schedule, selectedExercises, customDetails}`,
//! zlib-wrapped DEFLATE, standard Base64 (padded, `+` and `/`). Browsers get
//! there through a one-char-per-byte binary string and `btoa`; on bytes that
//! step is the identity, so Base64 is applied to the compressed bytes directly.

use std::collections::BTreeMap;
use std::io::{Read, Write};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

use crate::plan::{CustomDetails, ExerciseDetail, MuscleGroup, Plan, Schedule, Selections, Weekday};

/// Query parameter that carries a shared plan
pub const QUERY_PARAM: &str = "config";

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("snapshot is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("snapshot stream is corrupt: {0}")]
    Inflate(#[source] std::io::Error),

    #[error("snapshot compression failed: {0}")]
    Deflate(#[source] std::io::Error),

    #[error("snapshot JSON is invalid: {0}")]
    Json(#[from] serde_json::Error),

    #[error("snapshot is missing `{0}`")]
    MissingKey(&'static str),

    #[error("snapshot schedules {0}")]
    Unschedulable(Weekday),
}

/// Serialize a plan into a shareable snapshot string
pub fn encode(plan: &Plan) -> Result<String, CodecError> {
    let json = serde_json::to_vec(plan)?;
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&json).map_err(CodecError::Deflate)?;
    let compressed = encoder.finish().map_err(CodecError::Deflate)?;
    Ok(STANDARD.encode(compressed))
}

/// Decode a snapshot, falling back to the empty plan on any failure.
///
/// Failures are reported through the log, never to the caller.
pub fn decode(text: &str) -> Plan {
    match try_decode(text) {
        Ok(plan) => plan,
        Err(e) => {
            warn!("Discarding shared plan snapshot: {}", e);
            Plan::empty()
        }
    }
}

/// Decode a snapshot, reporting why it was rejected
pub fn try_decode(text: &str) -> Result<Plan, CodecError> {
    let compressed = STANDARD.decode(text.trim())?;
    let mut json = Vec::new();
    ZlibDecoder::new(compressed.as_slice())
        .read_to_end(&mut json)
        .map_err(CodecError::Inflate)?;
    let raw: RawSnapshot = serde_json::from_slice(&json)?;
    raw.into_plan()
}

/// Build the share link for a plan
pub fn share_url(base: &str, plan: &Plan) -> Result<String, CodecError> {
    let snapshot = encode(plan)?;
    let base = base.split('?').next().unwrap_or(base);
    Ok(format!("{}?{}={}", base, QUERY_PARAM, escape_query(&snapshot)))
}

/// Recover a snapshot from a raw `config` query value.
///
/// Undoes percent-escaping of the Base64 punctuation, and the `+` to space
/// rewrite some form decoders apply.
pub fn snapshot_from_query(value: &str) -> String {
    value
        .trim()
        .replace("%2B", "+")
        .replace("%2b", "+")
        .replace("%2F", "/")
        .replace("%2f", "/")
        .replace("%3D", "=")
        .replace("%3d", "=")
        .replace(' ', "+")
}

/// Accept either a full share link or a bare snapshot
pub fn snapshot_from_link(link: &str) -> String {
    let value = link
        .split_once('?')
        .and_then(|(_, query)| {
            query
                .split('&')
                .find_map(|pair| pair.strip_prefix(QUERY_PARAM)?.strip_prefix('='))
        })
        .unwrap_or(link);
    snapshot_from_query(value)
}

fn escape_query(snapshot: &str) -> String {
    let mut out = String::with_capacity(snapshot.len() + 8);
    for c in snapshot.chars() {
        match c {
            '+' => out.push_str("%2B"),
            '/' => out.push_str("%2F"),
            '=' => out.push_str("%3D"),
            _ => out.push(c),
        }
    }
    out
}

// Untrusted shape: only the known keys, each optional until checked
#[derive(Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
struct RawSnapshot {
    schedule: Option<RawSchedule>,
    selected_exercises: Option<Selections>,
    custom_details: Option<CustomDetails>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSchedule {
    days: Option<BTreeMap<MuscleGroup, Vec<Weekday>>>,
    types: Option<Vec<String>>,
}

impl RawSnapshot {
    fn into_plan(self) -> Result<Plan, CodecError> {
        let schedule = self.schedule.ok_or(CodecError::MissingKey("schedule"))?;
        let selected = self
            .selected_exercises
            .ok_or(CodecError::MissingKey("selectedExercises"))?;

        let mut days = BTreeMap::new();
        for (group, list) in schedule.days.unwrap_or_default() {
            if let Some(day) = list.iter().find(|d| !d.is_schedulable()) {
                return Err(CodecError::Unschedulable(*day));
            }
            let list = dedup(list);
            if !list.is_empty() {
                days.insert(group, list);
            }
        }

        let selected_exercises = selected
            .into_iter()
            .map(|(group, names)| (group, dedup(names)))
            .filter(|(_, names)| !names.is_empty())
            .collect();

        let custom_details: CustomDetails = self
            .custom_details
            .unwrap_or_default()
            .into_iter()
            .map(|(group, details)| {
                let kept: BTreeMap<String, ExerciseDetail> = details
                    .into_iter()
                    .filter(|(_, d)| d.has_override())
                    .collect();
                (group, kept)
            })
            .filter(|(_, details)| !details.is_empty())
            .collect();

        Ok(Plan {
            schedule: Schedule {
                days,
                types: dedup(schedule.types.unwrap_or_default()),
            },
            selected_exercises,
            custom_details,
        })
    }
}

fn dedup<T: PartialEq>(items: Vec<T>) -> Vec<T> {
    let mut out: Vec<T> = Vec::with_capacity(items.len());
    for item in items {
        if !out.contains(&item) {
            out.push(item);
        }
    }
    out
}
