//! Cloud-first reconciliation of a remote and a local snapshot.
//!
//! Settings (`profile`, `goals`) are remote-authoritative. Days are compared
//! one by one: the remote copy wins unless the local copy has strictly more
//! food entries, which means it carries edits that never reached the cloud.
//! Fasting sessions are unioned by id with remote precedence.

use std::collections::HashSet;

use crate::models::{AppState, Goals, Profile};

/// Reconciles `remote` into `local`.
///
/// With no remote document the local state is returned unchanged. The result
/// owns all of its data; neither input is modified.
pub fn merge_cloud_first(remote: Option<&AppState>, local: &AppState) -> AppState {
    let Some(remote) = remote else {
        return local.clone();
    };

    let mut log = local.log.clone();
    for (date, remote_day) in &remote.log {
        let local_entries = log.get(date).map(|day| day.completeness());
        match local_entries {
            Some(local) if remote_day.completeness() < local => {
                tracing::debug!(
                    %date,
                    local,
                    remote = remote_day.completeness(),
                    "keeping fuller local day"
                );
            }
            _ => {
                log.insert(*date, remote_day.clone());
            }
        }
    }

    let remote_ids: HashSet<&str> = remote
        .fasting_sessions
        .iter()
        .map(|session| session.id.as_str())
        .collect();
    let fasting_sessions = remote
        .fasting_sessions
        .iter()
        .chain(
            local
                .fasting_sessions
                .iter()
                .filter(|session| !remote_ids.contains(session.id.as_str())),
        )
        .cloned()
        .collect();

    AppState {
        schema_version: remote.schema_version.max(local.schema_version),
        profile: merge_profile(&remote.profile, &local.profile),
        goals: merge_goals(&remote.goals, &local.goals),
        log,
        fasting_sessions,
    }
}

/// Shallow merge: every field the remote profile defines overrides local.
/// Keys only local knows about are kept.
fn merge_profile(remote: &Profile, local: &Profile) -> Profile {
    let mut extra = local.extra.clone();
    extra.extend(remote.extra.clone());
    Profile {
        extra,
        ..remote.clone()
    }
}

fn merge_goals(remote: &Goals, local: &Goals) -> Goals {
    let mut extra = local.extra.clone();
    extra.extend(remote.extra.clone());
    Goals {
        extra,
        ..remote.clone()
    }
}
