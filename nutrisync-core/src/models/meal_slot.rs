use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the five fixed meal slots of a day.
///
/// Serialized with the app's wire names (`desayuno`, `mediaManana`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MealSlot {
    #[serde(rename = "desayuno")]
    Breakfast,
    #[serde(rename = "mediaManana")]
    MidMorning,
    #[serde(rename = "comida")]
    Lunch,
    #[serde(rename = "merienda")]
    Snack,
    #[serde(rename = "cena")]
    Dinner,
}

impl MealSlot {
    /// All slots in the order they appear during a day.
    pub const ALL: [MealSlot; 5] = [
        MealSlot::Breakfast,
        MealSlot::MidMorning,
        MealSlot::Lunch,
        MealSlot::Snack,
        MealSlot::Dinner,
    ];

    /// Key used for this slot in the persisted document.
    pub fn wire_name(&self) -> &'static str {
        match self {
            MealSlot::Breakfast => "desayuno",
            MealSlot::MidMorning => "mediaManana",
            MealSlot::Lunch => "comida",
            MealSlot::Snack => "merienda",
            MealSlot::Dinner => "cena",
        }
    }
}

impl fmt::Display for MealSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MealSlot::Breakfast => write!(f, "breakfast"),
            MealSlot::MidMorning => write!(f, "mid-morning"),
            MealSlot::Lunch => write!(f, "lunch"),
            MealSlot::Snack => write!(f, "snack"),
            MealSlot::Dinner => write!(f, "dinner"),
        }
    }
}

impl FromStr for MealSlot {
    type Err = String;

    /// Accepts either the English display name or the wire name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "breakfast" | "desayuno" => Ok(MealSlot::Breakfast),
            "mid-morning" | "midmorning" | "mediamanana" => Ok(MealSlot::MidMorning),
            "lunch" | "comida" => Ok(MealSlot::Lunch),
            "snack" | "merienda" => Ok(MealSlot::Snack),
            "dinner" | "cena" => Ok(MealSlot::Dinner),
            _ => Err(format!(
                "Invalid meal slot '{}'. Valid options: breakfast, mid-morning, lunch, snack, dinner",
                s
            )),
        }
    }
}
