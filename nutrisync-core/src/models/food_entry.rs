use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// A single logged food item inside a meal slot.
///
/// Macros are derived by the nutrition collaborator when the entry is created;
/// the sync core only carries them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FoodEntry {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grams: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub units: Option<f64>,
    pub kcal: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
    /// Time of day, `HH:MM`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
}

impl FoodEntry {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            grams: None,
            units: None,
            kcal: 0.0,
            protein: 0.0,
            carbs: 0.0,
            fat: 0.0,
            time: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_grams(mut self, grams: f64) -> Self {
        self.grams = Some(grams);
        self
    }

    pub fn with_units(mut self, units: f64) -> Self {
        self.units = Some(units);
        self
    }

    pub fn with_macros(mut self, kcal: f64, protein: f64, carbs: f64, fat: f64) -> Self {
        self.kcal = kcal;
        self.protein = protein;
        self.carbs = carbs;
        self.fat = fat;
        self
    }

    pub fn with_time(mut self, time: impl Into<String>) -> Self {
        self.time = Some(time.into());
        self
    }
}

impl fmt::Display for FoodEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        match (self.grams, self.units) {
            (Some(g), Some(u)) => write!(f, " ({} g, {} u)", g, u)?,
            (Some(g), None) => write!(f, " ({} g)", g)?,
            (None, Some(u)) => write!(f, " ({} u)", u)?,
            (None, None) => {}
        }
        write!(f, " - {} kcal", self.kcal)
    }
}
