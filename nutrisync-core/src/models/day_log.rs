use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::food_entry::FoodEntry;
use super::meal_slot::MealSlot;

/// The five meal slots of a day, each an ordered list of entries.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Meals {
    #[serde(rename = "desayuno", default)]
    pub breakfast: Vec<FoodEntry>,
    #[serde(rename = "mediaManana", default)]
    pub mid_morning: Vec<FoodEntry>,
    #[serde(rename = "comida", default)]
    pub lunch: Vec<FoodEntry>,
    #[serde(rename = "merienda", default)]
    pub snack: Vec<FoodEntry>,
    #[serde(rename = "cena", default)]
    pub dinner: Vec<FoodEntry>,
}

impl Meals {
    pub fn slot(&self, slot: MealSlot) -> &[FoodEntry] {
        match slot {
            MealSlot::Breakfast => &self.breakfast,
            MealSlot::MidMorning => &self.mid_morning,
            MealSlot::Lunch => &self.lunch,
            MealSlot::Snack => &self.snack,
            MealSlot::Dinner => &self.dinner,
        }
    }

    pub fn slot_mut(&mut self, slot: MealSlot) -> &mut Vec<FoodEntry> {
        match slot {
            MealSlot::Breakfast => &mut self.breakfast,
            MealSlot::MidMorning => &mut self.mid_morning,
            MealSlot::Lunch => &mut self.lunch,
            MealSlot::Snack => &mut self.snack,
            MealSlot::Dinner => &mut self.dinner,
        }
    }

    /// Iterates slots in day order.
    pub fn iter(&self) -> impl Iterator<Item = (MealSlot, &[FoodEntry])> {
        MealSlot::ALL.into_iter().map(move |slot| (slot, self.slot(slot)))
    }

    /// Total number of entries across all five slots.
    pub fn entry_count(&self) -> usize {
        self.iter().map(|(_, entries)| entries.len()).sum()
    }
}

/// Aggregated macros for a day.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct MealTotals {
    pub kcal: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
}

/// One calendar day of tracked data.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DayLog {
    /// Millilitres.
    pub water: f64,
    pub steps: u32,
    pub exercise_minutes: f64,
    pub fasting_start: Option<DateTime<Utc>>,
    pub fasting_completed_hours: f64,
    pub meals: Meals,
    /// Maintained by the nutrition collaborator; carried verbatim here.
    pub totals: MealTotals,
}

impl DayLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(mut self, slot: MealSlot, entry: FoodEntry) -> Self {
        self.meals.slot_mut(slot).push(entry);
        self
    }

    pub fn with_water(mut self, ml: f64) -> Self {
        self.water = ml;
        self
    }

    /// How much has been logged for the day: the number of food entries over
    /// all slots. Used by the merge engine to break ties between copies.
    pub fn completeness(&self) -> usize {
        self.meals.entry_count()
    }
}

impl fmt::Display for DayLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (slot, entries) in self.meals.iter() {
            if entries.is_empty() {
                continue;
            }
            writeln!(f, "{}:", slot)?;
            for entry in entries {
                writeln!(f, "  - {}", entry)?;
            }
        }
        writeln!(
            f,
            "Totals: {} kcal (P {} / C {} / F {})",
            self.totals.kcal, self.totals.protein, self.totals.carbs, self.totals.fat
        )?;
        writeln!(f, "Water: {} ml", self.water)?;
        writeln!(f, "Steps: {}", self.steps)?;
        write!(f, "Exercise: {} min", self.exercise_minutes)
    }
}
