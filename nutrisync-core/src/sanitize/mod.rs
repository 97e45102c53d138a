//! Schema sanitizer and migrator.
//!
//! Every path that ingests a document from outside the process (local store,
//! remote store, backup, another tab, an import file) goes through
//! [`sanitize`]. It never fails on object-shaped input: missing or mistyped
//! fields fall back to defaults, and the result always satisfies the model
//! invariants (date keys, fixed meal slots, sessions with a start, finite
//! numbers). Sanitizing an already sanitized document yields the same
//! document.

mod coerce;
pub mod migrations;

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashSet};

use chrono::NaiveDate;
use rand::distr::Alphanumeric;
use rand::Rng;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::models::{
    AppState, DayLog, FastingSession, FoodEntry, Goals, MealSlot, MealTotals, Meals, Profile,
    DEFAULT_FASTING_SOURCE,
};

pub use migrations::{MigrationReport, CURRENT_SCHEMA_VERSION, MIGRATIONS};

const PROFILE_KEYS: &[&str] = &[
    "nombre",
    "edad",
    "sexo",
    "peso",
    "altura",
    "actividad",
    "exclusiones",
    "objetivo",
];

const GOAL_KEYS: &[&str] = &["kcal", "protein", "carbs", "fat", "water", "steps"];

/// A sanitized document together with the migrations it went through.
#[derive(Debug, Clone)]
pub struct Sanitized {
    pub state: AppState,
    pub report: MigrationReport,
}

/// Turns arbitrary JSON into a valid [`AppState`].
///
/// Returns `None` only when `raw` is not a JSON object.
pub fn sanitize(raw: &Value) -> Option<AppState> {
    sanitize_with_report(raw).map(|sanitized| sanitized.state)
}

/// Parses and sanitizes a serialized document. Unparseable input is treated
/// the same as no document.
pub fn sanitize_str(raw: &str) -> Option<AppState> {
    parse_and_sanitize(raw).map(|sanitized| sanitized.state)
}

pub fn parse_and_sanitize(raw: &str) -> Option<Sanitized> {
    match serde_json::from_str::<Value>(raw) {
        Ok(value) => sanitize_with_report(&value),
        Err(e) => {
            tracing::warn!(error = %e, "discarding unparseable document");
            None
        }
    }
}

/// Like [`sanitize`], also reporting which schema migrations were applied.
pub fn sanitize_with_report(raw: &Value) -> Option<Sanitized> {
    let mut doc = raw.as_object()?.clone();
    let report = migrations::migrate(&mut doc);

    let state = AppState {
        schema_version: report.to_version,
        profile: sanitize_profile(doc.get("profile")),
        goals: sanitize_goals(doc.get("goals")),
        log: sanitize_log(doc.get("log")),
        fasting_sessions: sanitize_fasting_sessions(doc.get("fastingSessions")),
    };

    Some(Sanitized { state, report })
}

fn unknown_keys(map: &Map<String, Value>, known: &[&str]) -> Map<String, Value> {
    map.iter()
        .filter(|(key, _)| !known.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

fn sanitize_profile(raw: Option<&Value>) -> Profile {
    let defaults = Profile::default();
    let Some(map) = raw.and_then(Value::as_object) else {
        return defaults;
    };

    Profile {
        name: coerce::string(map.get("nombre")).unwrap_or(defaults.name),
        age: coerce::count(map.get("edad")).unwrap_or(defaults.age),
        sex: coerce::string(map.get("sexo")).unwrap_or(defaults.sex),
        weight_kg: coerce::number(map.get("peso")).unwrap_or(defaults.weight_kg),
        height_cm: coerce::number(map.get("altura")).unwrap_or(defaults.height_cm),
        activity_factor: coerce::number(map.get("actividad")).unwrap_or(defaults.activity_factor),
        exclusions: coerce::string_list(map.get("exclusiones")).unwrap_or(defaults.exclusions),
        goal: coerce::string(map.get("objetivo")).unwrap_or(defaults.goal),
        extra: unknown_keys(map, PROFILE_KEYS),
    }
}

fn sanitize_goals(raw: Option<&Value>) -> Goals {
    let defaults = Goals::default();
    let Some(map) = raw.and_then(Value::as_object) else {
        return defaults;
    };

    Goals {
        kcal: coerce::number(map.get("kcal")).unwrap_or(defaults.kcal),
        protein: coerce::number(map.get("protein")).unwrap_or(defaults.protein),
        carbs: coerce::number(map.get("carbs")).unwrap_or(defaults.carbs),
        fat: coerce::number(map.get("fat")).unwrap_or(defaults.fat),
        water: coerce::number(map.get("water")).unwrap_or(defaults.water),
        steps: coerce::count(map.get("steps")).unwrap_or(defaults.steps),
        extra: unknown_keys(map, GOAL_KEYS),
    }
}

fn sanitize_log(raw: Option<&Value>) -> BTreeMap<NaiveDate, DayLog> {
    let mut log = BTreeMap::new();
    let Some(map) = raw.and_then(Value::as_object) else {
        return log;
    };

    for (key, raw_day) in map {
        let Some(date) = coerce::date_key(key) else {
            tracing::warn!(key = %key, "dropping log entry whose key is not a date");
            continue;
        };
        let day = sanitize_day(raw_day);

        // Two keys for the same calendar day: keep the fuller one.
        match log.entry(date) {
            Entry::Vacant(slot) => {
                slot.insert(day);
            }
            Entry::Occupied(mut slot) => {
                if day.completeness() > slot.get().completeness() {
                    slot.insert(day);
                }
            }
        }
    }

    log
}

fn sanitize_day(raw: &Value) -> DayLog {
    let empty = Map::new();
    let map = raw.as_object().unwrap_or(&empty);

    DayLog {
        water: coerce::number_or_zero(map.get("water")),
        steps: coerce::count(map.get("steps")).unwrap_or(0),
        exercise_minutes: coerce::number_or_zero(map.get("exerciseMinutes")),
        fasting_start: coerce::timestamp(map.get("fastingStart")),
        fasting_completed_hours: coerce::number_or_zero(map.get("fastingCompletedHours")),
        meals: sanitize_meals(map.get("meals")),
        totals: sanitize_totals(map.get("totals")),
    }
}

fn sanitize_meals(raw: Option<&Value>) -> Meals {
    let mut meals = Meals::default();
    let Some(map) = raw.and_then(Value::as_object) else {
        return meals;
    };

    for slot in MealSlot::ALL {
        let Some(items) = map.get(slot.wire_name()).and_then(Value::as_array) else {
            continue;
        };
        *meals.slot_mut(slot) = items
            .iter()
            .enumerate()
            .filter_map(|(index, item)| sanitize_food_entry(slot, index, item))
            .collect();
    }

    meals
}

fn sanitize_food_entry(slot: MealSlot, index: usize, raw: &Value) -> Option<FoodEntry> {
    let Some(map) = raw.as_object() else {
        tracing::debug!(%slot, index, "skipping meal item that is not an object");
        return None;
    };

    Some(FoodEntry {
        id: coerce::id(map.get("id")).unwrap_or_else(|| generated_entry_id(slot, index)),
        name: coerce::string(map.get("name")).unwrap_or_default(),
        grams: coerce::number(map.get("grams")),
        units: coerce::number(map.get("units")),
        kcal: coerce::number_or_zero(map.get("kcal")),
        protein: coerce::number_or_zero(map.get("protein")),
        carbs: coerce::number_or_zero(map.get("carbs")),
        fat: coerce::number_or_zero(map.get("fat")),
        time: coerce::string(map.get("time")).filter(|t| !t.trim().is_empty()),
    })
}

/// Id for an entry that arrived without one: slot, position and a random
/// suffix, a shape no client-issued id takes.
fn generated_entry_id(slot: MealSlot, index: usize) -> String {
    let suffix: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(char::from)
        .collect();
    format!("{}-{}-{}", slot.wire_name(), index, suffix.to_lowercase())
}

fn sanitize_totals(raw: Option<&Value>) -> MealTotals {
    let Some(map) = raw.and_then(Value::as_object) else {
        return MealTotals::default();
    };

    MealTotals {
        kcal: coerce::number_or_zero(map.get("kcal")),
        protein: coerce::number_or_zero(map.get("protein")),
        carbs: coerce::number_or_zero(map.get("carbs")),
        fat: coerce::number_or_zero(map.get("fat")),
    }
}

fn sanitize_fasting_sessions(raw: Option<&Value>) -> Vec<FastingSession> {
    let Some(items) = raw.and_then(Value::as_array) else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    let mut sessions = Vec::with_capacity(items.len());

    for item in items {
        let Some(map) = item.as_object() else {
            continue;
        };
        let Some(start) = coerce::timestamp(map.get("start")) else {
            tracing::debug!("dropping fasting session without a start");
            continue;
        };
        let id = coerce::id(map.get("id")).unwrap_or_else(|| Uuid::new_v4().to_string());
        if !seen.insert(id.clone()) {
            tracing::debug!(id = %id, "dropping duplicate fasting session");
            continue;
        }

        sessions.push(FastingSession {
            id,
            start,
            end: coerce::timestamp(map.get("end")),
            source: coerce::string(map.get("source"))
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_FASTING_SOURCE.to_string()),
        });
    }

    sessions
}
