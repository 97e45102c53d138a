mod app_state;
mod day_log;
mod fasting;
mod food_entry;
mod meal_slot;
mod profile;

pub use app_state::AppState;
pub use day_log::{DayLog, MealTotals, Meals};
pub use fasting::{FastingSession, DEFAULT_FASTING_SOURCE};
pub use food_entry::FoodEntry;
pub use meal_slot::MealSlot;
pub use profile::{Goals, Profile};

#[cfg(test)]
pub(crate) mod strategies;
