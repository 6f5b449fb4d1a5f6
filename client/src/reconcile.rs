//! Pure reconciler: `(session, change event) → next session`.
//!
//! DESIGN
//! ======
//! Every committed row change arrives here as a typed [`ChangeEvent`],
//! including the echo of this client's own writes. Application is idempotent
//! and value-aware: an event whose payload equals current local state returns
//! [`ApplyOutcome::Unchanged`] so the host skips the re-render — this is what
//! keeps a fast local drag from visually regressing under its own slow echo.
//!
//! Roster changes never patch incrementally. Any participant event for the
//! held encounter flags a full roster re-fetch, which sidesteps ordering races
//! between initiative edits and membership changes at the cost of one fetch.

#[cfg(test)]
#[path = "reconcile_test.rs"]
mod reconcile_test;

use frames::change::{ChangeEvent, ChangeOp, Table};
use tabletop::doc::{FogDocument, Token};
use uuid::Uuid;

use crate::session::{Encounter, MapSession};

/// What applying a change event did to local state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Local state changed; the host should re-render.
    Applied,
    /// The event matched local state exactly (self-echo); nothing to do.
    Unchanged,
    /// The event was for a row this session does not watch.
    Ignored,
}

/// Apply one change event to the session.
pub fn apply_change(session: &mut MapSession, event: &ChangeEvent) -> ApplyOutcome {
    match event.table {
        Table::Tokens => apply_token(session, event),
        Table::Fog => apply_fog(session, event),
        Table::CombatEncounters => apply_encounter(session, event),
        Table::CombatParticipants => apply_participant(session, event),
    }
}

fn apply_token(session: &mut MapSession, event: &ChangeEvent) -> ApplyOutcome {
    match event.op {
        ChangeOp::Insert | ChangeOp::Update => {
            let Ok(token) = serde_json::from_value::<Token>(event.row.clone()) else {
                return ApplyOutcome::Ignored;
            };
            if session.map_id.is_some_and(|m| m != token.map_id) {
                return ApplyOutcome::Ignored;
            }
            if session.store.upsert_token(token) {
                ApplyOutcome::Applied
            } else {
                ApplyOutcome::Unchanged
            }
        }
        ChangeOp::Delete => {
            let Some(id) = event.row_id() else {
                return ApplyOutcome::Ignored;
            };
            if session.store.remove_token(&id).is_some() {
                ApplyOutcome::Applied
            } else {
                ApplyOutcome::Unchanged
            }
        }
    }
}

fn apply_fog(session: &mut MapSession, event: &ChangeEvent) -> ApplyOutcome {
    // The fog document is one logical row per map; deletes don't occur.
    let Ok(fog) = serde_json::from_value::<FogDocument>(event.row.clone()) else {
        return ApplyOutcome::Ignored;
    };
    if session.store.set_fog(fog) {
        ApplyOutcome::Applied
    } else {
        ApplyOutcome::Unchanged
    }
}

fn apply_encounter(session: &mut MapSession, event: &ChangeEvent) -> ApplyOutcome {
    if event.op == ChangeOp::Delete {
        let Some(id) = event.row_id() else {
            return ApplyOutcome::Ignored;
        };
        return clear_if_current(session, id);
    }

    let Ok(encounter) = serde_json::from_value::<Encounter>(event.row.clone()) else {
        return ApplyOutcome::Ignored;
    };

    if encounter.active {
        // Adopt a newly-active encounter when it matches the watched map
        // (an encounter with no map binds to the whole campaign).
        let matches_map = match (encounter.map_id, session.map_id) {
            (Some(enc_map), Some(our_map)) => enc_map == our_map,
            _ => true,
        };
        if !matches_map {
            return ApplyOutcome::Ignored;
        }
        if session.encounter.as_ref() == Some(&encounter) {
            return ApplyOutcome::Unchanged;
        }
        let adopted_new = session.encounter.as_ref().map(|e| e.id) != Some(encounter.id);
        session.encounter = Some(encounter);
        if adopted_new {
            // Fresh encounter: the roster we hold belongs to the old one.
            session.participants.clear();
            session.roster_refetch_needed = true;
        }
        ApplyOutcome::Applied
    } else {
        clear_if_current(session, encounter.id)
    }
}

fn clear_if_current(session: &mut MapSession, encounter_id: Uuid) -> ApplyOutcome {
    if session.encounter.as_ref().map(|e| e.id) == Some(encounter_id) {
        session.clear_encounter();
        ApplyOutcome::Applied
    } else {
        ApplyOutcome::Ignored
    }
}

fn apply_participant(session: &mut MapSession, event: &ChangeEvent) -> ApplyOutcome {
    let Some(held) = session.encounter.as_ref() else {
        return ApplyOutcome::Ignored;
    };
    let row_encounter: Option<Uuid> = event
        .row
        .get("encounter_id")
        .and_then(|v| v.as_str())
        .and_then(|s| s.parse().ok());
    if row_encounter != Some(held.id) {
        return ApplyOutcome::Ignored;
    }
    // Full re-fetch over incremental patching: initiative changes and roster
    // membership changes must not be interleaved out of order.
    session.roster_refetch_needed = true;
    ApplyOutcome::Applied
}
