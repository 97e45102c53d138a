use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// User settings and body metrics consumed by the calorie engine.
///
/// Keys this version does not know about are kept in `extra` so a document
/// written by a newer client survives a round trip through an older one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Profile {
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "edad")]
    pub age: u32,
    #[serde(rename = "sexo")]
    pub sex: String,
    #[serde(rename = "peso")]
    pub weight_kg: f64,
    #[serde(rename = "altura")]
    pub height_cm: f64,
    #[serde(rename = "actividad")]
    pub activity_factor: f64,
    #[serde(rename = "exclusiones")]
    pub exclusions: Vec<String>,
    #[serde(rename = "objetivo")]
    pub goal: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            name: String::new(),
            age: 30,
            sex: "f".to_string(),
            weight_kg: 70.0,
            height_cm: 170.0,
            activity_factor: 1.2,
            exclusions: Vec::new(),
            goal: "mantener".to_string(),
            extra: Map::new(),
        }
    }
}

/// Daily targets.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Goals {
    pub kcal: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
    /// Millilitres.
    pub water: f64,
    pub steps: u32,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for Goals {
    fn default() -> Self {
        Self {
            kcal: 2000.0,
            protein: 120.0,
            carbs: 230.0,
            fat: 65.0,
            water: 2000.0,
            steps: 8000,
            extra: Map::new(),
        }
    }
}
