//! Proptest strategies for documents, valid and otherwise.

use chrono::{DateTime, NaiveDate, Utc};
use proptest::prelude::*;
use serde_json::{Map, Value};

use super::{
    AppState, DayLog, FastingSession, FoodEntry, Goals, MealSlot, MealTotals, Meals, Profile,
};
use crate::sanitize::CURRENT_SCHEMA_VERSION;

/// Wire names the sanitizer looks for, so generated documents hit real
/// fields as well as unknown ones.
const FIELD_NAMES: &[&str] = &[
    "schemaVersion",
    "profile",
    "goals",
    "log",
    "fastingSessions",
    "nombre",
    "edad",
    "peso",
    "exclusiones",
    "kcal",
    "water",
    "steps",
    "meals",
    "totals",
    "fastingStart",
    "desayuno",
    "comida",
    "cena",
    "id",
    "name",
    "grams",
    "qty",
    "unit",
    "time",
    "start",
    "end",
    "source",
];

/// Any instant chrono can write as RFC 3339.
pub fn timestamp() -> impl Strategy<Value = DateTime<Utc>> {
    (-62_135_596_800_000i64..253_402_300_799_000)
        .prop_map(|ms| DateTime::from_timestamp_millis(ms).unwrap_or_default())
}

pub fn date() -> impl Strategy<Value = NaiveDate> {
    (2000i32..=2030, 1u32..=12, 1u32..=28)
        .prop_map(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default())
}

pub fn finite() -> impl Strategy<Value = f64> {
    prop::num::f64::NORMAL | prop::num::f64::ZERO
}

fn key() -> impl Strategy<Value = String> {
    prop_oneof![
        prop::sample::select(FIELD_NAMES).prop_map(str::to_string),
        date().prop_map(|d| d.to_string()),
        "[a-z]{1,6}",
    ]
}

/// Arbitrary JSON, biased towards the shapes a stored document takes.
pub fn json_value() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        any::<i64>().prop_map(Value::from),
        (-1e13f64..1e13).prop_map(Value::from),
        "[a-z0-9 ]{0,8}".prop_map(Value::from),
        timestamp().prop_map(|t| Value::from(t.to_rfc3339())),
        key().prop_map(Value::from),
    ];

    leaf.prop_recursive(5, 96, 8, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
            prop::collection::btree_map(key(), inner, 0..8)
                .prop_map(|map| Value::Object(map.into_iter().collect::<Map<_, _>>())),
        ]
    })
}

fn extra() -> impl Strategy<Value = Map<String, Value>> {
    prop::collection::btree_map("x[a-z]{0,4}", "[a-z ]{0,6}".prop_map(Value::from), 0..3)
        .prop_map(|map| map.into_iter().collect())
}

fn profile() -> impl Strategy<Value = Profile> {
    (
        ("\\PC{0,12}", any::<u32>(), "[fm]"),
        (finite(), finite(), finite()),
        (prop::collection::vec("\\PC{0,8}", 0..3), "[a-z]{0,8}", extra()),
    )
        .prop_map(
            |((name, age, sex), (weight_kg, height_cm, activity_factor), (exclusions, goal, extra))| {
                Profile {
                    name,
                    age,
                    sex,
                    weight_kg,
                    height_cm,
                    activity_factor,
                    exclusions,
                    goal,
                    extra,
                }
            },
        )
}

fn goals() -> impl Strategy<Value = Goals> {
    (finite(), finite(), finite(), finite(), finite(), any::<u32>(), extra()).prop_map(
        |(kcal, protein, carbs, fat, water, steps, extra)| Goals {
            kcal,
            protein,
            carbs,
            fat,
            water,
            steps,
            extra,
        },
    )
}

fn food_entry() -> impl Strategy<Value = FoodEntry> {
    (
        ("[a-z0-9]{1,8}", "\\PC{0,12}"),
        (prop::option::of(finite()), prop::option::of(finite())),
        (finite(), finite(), finite(), finite()),
        prop::option::of("[0-2][0-9]:[0-5][0-9]"),
    )
        .prop_map(
            |((id, name), (grams, units), (kcal, protein, carbs, fat), time)| FoodEntry {
                id,
                name,
                grams,
                units,
                kcal,
                protein,
                carbs,
                fat,
                time,
            },
        )
}

fn meals() -> impl Strategy<Value = Meals> {
    prop::collection::vec(prop::collection::vec(food_entry(), 0..3), MealSlot::ALL.len())
        .prop_map(|slots| {
            let mut meals = Meals::default();
            for (slot, entries) in MealSlot::ALL.into_iter().zip(slots) {
                *meals.slot_mut(slot) = entries;
            }
            meals
        })
}

fn day_log() -> impl Strategy<Value = DayLog> {
    (
        (finite(), any::<u32>(), finite()),
        (prop::option::of(timestamp()), finite()),
        meals(),
        (finite(), finite(), finite(), finite()),
    )
        .prop_map(
            |((water, steps, exercise_minutes), (fasting_start, fasting_completed_hours), meals, (kcal, protein, carbs, fat))| {
                DayLog {
                    water,
                    steps,
                    exercise_minutes,
                    fasting_start,
                    fasting_completed_hours,
                    meals,
                    totals: MealTotals {
                        kcal,
                        protein,
                        carbs,
                        fat,
                    },
                }
            },
        )
}

/// Sessions with ids unique within the list. Two generated lists share ids,
/// which exercises precedence when they are merged.
fn fasting_sessions() -> impl Strategy<Value = Vec<FastingSession>> {
    prop::collection::vec(
        (timestamp(), prop::option::of(timestamp()), "[a-z]{1,6}"),
        0..4,
    )
    .prop_map(|sessions| {
        sessions
            .into_iter()
            .enumerate()
            .map(|(i, (start, end, source))| FastingSession {
                id: format!("f{}", i),
                start,
                end,
                source,
            })
            .collect()
    })
}

/// A state the sanitizer leaves as it is.
pub fn app_state() -> impl Strategy<Value = AppState> {
    (
        profile(),
        goals(),
        prop::collection::btree_map(date(), day_log(), 0..4),
        fasting_sessions(),
    )
        .prop_map(|(profile, goals, log, fasting_sessions)| AppState {
            schema_version: CURRENT_SCHEMA_VERSION,
            profile,
            goals,
            log,
            fasting_sessions,
        })
}
