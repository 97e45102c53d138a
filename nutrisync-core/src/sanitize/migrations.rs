//! Versioned migrations applied to raw documents before sanitization.
//!
//! Documents carry a `schemaVersion`. Anything without one predates
//! versioning and is treated as version 0. Migrations run in ascending order,
//! each one only for documents older than its version, and must leave
//! already-migrated data untouched.

use serde_json::{Map, Value};

/// Version stamped on every sanitized document.
pub const CURRENT_SCHEMA_VERSION: u32 = 2;

const SCHEMA_VERSION_KEY: &str = "schemaVersion";

/// Version of the migration that adds the fasting session list.
pub const ADD_FASTING_SESSIONS: u32 = 1;

/// A single schema step. `apply` returns whether it changed the document.
pub struct Migration {
    pub version: u32,
    pub name: &'static str,
    apply: fn(&mut Map<String, Value>) -> bool,
}

/// All migrations, ordered by version.
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: ADD_FASTING_SESSIONS,
        name: "add_fasting_sessions",
        apply: add_fasting_sessions,
    },
    Migration {
        version: 2,
        name: "split_legacy_quantity",
        apply: split_legacy_quantity,
    },
];

/// What happened to a document on its way to the current schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    pub from_version: u32,
    pub to_version: u32,
    pub applied: Vec<u32>,
    /// Subset of `applied` that actually rewrote part of the document.
    pub changed: Vec<u32>,
}

impl MigrationReport {
    /// True when the stored document is older than the current schema.
    pub fn upgraded(&self) -> bool {
        !self.applied.is_empty()
    }

    pub fn applied(&self, version: u32) -> bool {
        self.applied.contains(&version)
    }

    pub fn changed(&self, version: u32) -> bool {
        self.changed.contains(&version)
    }
}

/// Brings `doc` up to the current schema in place.
pub fn migrate(doc: &mut Map<String, Value>) -> MigrationReport {
    let from_version = doc
        .get(SCHEMA_VERSION_KEY)
        .and_then(Value::as_u64)
        .map(|v| v.min(u32::MAX as u64) as u32)
        .unwrap_or(0);

    let mut applied = Vec::new();
    let mut changed = Vec::new();
    for migration in MIGRATIONS.iter().filter(|m| m.version > from_version) {
        let rewrote = (migration.apply)(doc);
        tracing::debug!(
            version = migration.version,
            name = migration.name,
            rewrote,
            "applied schema migration"
        );
        applied.push(migration.version);
        if rewrote {
            changed.push(migration.version);
        }
    }

    // Newer documents keep their version; nothing here downgrades them.
    let to_version = from_version.max(CURRENT_SCHEMA_VERSION);
    doc.insert(SCHEMA_VERSION_KEY.to_string(), Value::from(to_version));

    MigrationReport {
        from_version,
        to_version,
        applied,
        changed,
    }
}

/// v1: documents written before fasting tracking have no session list.
fn add_fasting_sessions(doc: &mut Map<String, Value>) -> bool {
    if doc.contains_key("fastingSessions") {
        return false;
    }
    doc.insert("fastingSessions".to_string(), Value::Array(Vec::new()));
    true
}

/// v2: food entries stored a single `qty` with a `unit` of `"g"` or `"u"`;
/// they now carry `grams` and `units` separately.
fn split_legacy_quantity(doc: &mut Map<String, Value>) -> bool {
    let Some(log) = doc.get_mut("log").and_then(Value::as_object_mut) else {
        return false;
    };

    let entries = log
        .values_mut()
        .filter_map(|day| day.get_mut("meals").and_then(Value::as_object_mut))
        .flat_map(|meals| meals.values_mut())
        .filter_map(Value::as_array_mut)
        .flat_map(|slot| slot.iter_mut())
        .filter_map(Value::as_object_mut);

    let mut split = false;
    for entry in entries {
        let Some(qty) = entry.remove("qty") else {
            continue;
        };
        let unit = entry.remove("unit");
        let target = match unit.as_ref().and_then(Value::as_str) {
            Some("u") | Some("ud") | Some("unidades") => "units",
            _ => "grams",
        };
        entry.entry(target).or_insert(qty);
        split = true;
    }
    split
}
