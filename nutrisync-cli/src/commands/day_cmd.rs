use chrono::{DateTime, Local, NaiveDate, Utc};
use clap::{Args, ValueEnum};
use nutrisync_core::{
    AppState, DayLog, FastingSession, Goals, LocalStateStore, MealSlot, SyncStatus,
};

use super::session::{runtime, Session};
use crate::config::Config;

#[derive(Clone, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Resolves the day a command applies to: the explicit date, else the
/// remembered selection, else today.
fn resolve_date(
    date: &Option<String>,
    local: &LocalStateStore,
) -> Result<NaiveDate, Box<dyn std::error::Error>> {
    match date {
        Some(d) => {
            let parsed = NaiveDate::parse_from_str(d, "%Y-%m-%d")
                .map_err(|_| format!("Invalid date '{}'. Use YYYY-MM-DD format.", d))?;
            local.set_selected_date(parsed)?;
            Ok(parsed)
        }
        None => Ok(local
            .selected_date()
            .unwrap_or_else(|| Local::now().date_naive())),
    }
}

#[derive(Args)]
pub struct WaterCommand {
    /// Millilitres to add
    pub ml: f64,

    /// Date (YYYY-MM-DD), defaults to the selected day or today
    #[arg(long, short)]
    pub date: Option<String>,
}

impl WaterCommand {
    pub fn run(&self, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
        if !self.ml.is_finite() || self.ml <= 0.0 {
            return Err(format!("Water amount must be positive, got {}", self.ml).into());
        }

        let rt = runtime()?;
        rt.block_on(async {
            let session = Session::open(config)?;
            let orchestrator = &session.orchestrator;
            let date = resolve_date(&self.date, orchestrator.local())?;

            let ml = self.ml;
            orchestrator.mutate(|state| state.day_mut(date).water += ml)?;

            let state = orchestrator.state();
            let total = state.day(date).map(|day| day.water).unwrap_or_default();
            println!(
                "{}: {} ml of water ({} ml goal)",
                date, total, state.goals.water
            );

            // The process exits right away; push now instead of after the delay.
            if orchestrator.flush_autosave().await {
                if let SyncStatus::Error { message } = orchestrator.status() {
                    println!("Saved locally; not synced: {}", message);
                }
            }
            Ok::<(), Box<dyn std::error::Error>>(())
        })
    }
}

#[derive(Args)]
pub struct ShowCommand {
    /// Date (YYYY-MM-DD), defaults to the selected day or today
    #[arg(long, short)]
    pub date: Option<String>,

    /// Only show one meal slot (breakfast, mid-morning, lunch, snack, dinner)
    #[arg(long, short)]
    pub slot: Option<MealSlot>,

    /// Output format
    #[arg(long, short, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

impl ShowCommand {
    pub fn run(&self, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
        let session = Session::open(config)?;
        let date = resolve_date(&self.date, session.orchestrator.local())?;
        let state = session.orchestrator.state();
        let day = state.day(date).cloned().unwrap_or_default();

        match (self.slot, &self.format) {
            (Some(slot), OutputFormat::Json) => {
                println!("{}", serde_json::to_string_pretty(day.meals.slot(slot))?);
            }
            (Some(slot), OutputFormat::Text) => print_slot(date, slot, &day),
            (None, OutputFormat::Json) => {
                println!("{}", serde_json::to_string_pretty(&day)?);
            }
            (None, OutputFormat::Text) => print_day(date, &day, &state),
        }
        Ok(())
    }
}

fn print_slot(date: NaiveDate, slot: MealSlot, day: &DayLog) {
    println!("{} - {}", date, slot);
    let entries = day.meals.slot(slot);
    if entries.is_empty() {
        println!("Nothing logged.");
        return;
    }
    for entry in entries {
        println!("  - {}", entry);
    }
    let kcal: f64 = entries.iter().map(|entry| entry.kcal).sum();
    println!("{:.0} kcal", kcal);
}

/// Sessions that started on `date` (UTC) or are still running.
fn fasting_on(sessions: &[FastingSession], date: NaiveDate) -> Vec<&FastingSession> {
    sessions
        .iter()
        .filter(|session| session.is_running() || session.start.date_naive() == date)
        .collect()
}

fn fasting_line(session: &FastingSession, now: DateTime<Utc>) -> String {
    let hours = session.hours(now);
    if session.is_running() {
        format!(
            "fasting:  {:>7.1} h (running since {})",
            hours,
            session.start.format("%H:%M")
        )
    } else {
        format!("fasting:  {:>7.1} h ({})", hours, session.source)
    }
}

fn print_day(date: NaiveDate, day: &DayLog, state: &AppState) {
    let Goals {
        kcal,
        protein,
        carbs,
        fat,
        water,
        steps,
        ..
    } = &state.goals;

    if state.profile.name.is_empty() {
        println!("{}", date);
    } else {
        println!("{} - {}", date, state.profile.name);
    }
    println!("{}", "=".repeat(24));
    println!();

    if day.completeness() == 0 {
        println!("No food logged.");
    } else {
        print!("{}", day);
    }
    println!();

    let totals = &day.totals;
    println!("kcal:     {:>7.0} / {:.0}", totals.kcal, kcal);
    println!("protein:  {:>7.1} / {:.0} g", totals.protein, protein);
    println!("carbs:    {:>7.1} / {:.0} g", totals.carbs, carbs);
    println!("fat:      {:>7.1} / {:.0} g", totals.fat, fat);
    println!("water:    {:>7.0} / {:.0} ml", day.water, water);
    println!("steps:    {:>7} / {}", day.steps, steps);
    if day.exercise_minutes > 0.0 {
        println!("exercise: {:>7.0} min", day.exercise_minutes);
    }
    if let Some(start) = day.fasting_start {
        println!("fasting since {}", start.format("%H:%M"));
    }

    let now = Utc::now();
    for session in fasting_on(&state.fasting_sessions, date) {
        println!("{}", fasting_line(session, now));
    }
}
