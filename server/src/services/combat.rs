//! Combat service — encounter lifecycle and the turn-order state machine.
//!
//! DESIGN
//! ======
//! Encounter rows are the authority for combat state. Turn transitions are a
//! single read-modify-write: fetch the current (round, index) and the roster
//! count, compute the next position with [`advance`]/[`retreat`], write back.
//! Under two racing DMs the last write wins — a turn can be skipped or
//! double-advanced; accepted for single-DM-in-practice usage.
//!
//! Starting an encounter deactivates any prior active encounter for the same
//! (campaign, map) before inserting the new row. The two writes are not one
//! transaction, so two concurrent starts can leave a brief two-active window;
//! clients self-heal on the next change-event re-fetch.
//!
//! Participant rows are never cached in memory: every roster read goes to
//! Postgres so membership and initiative changes cannot interleave stale.

#[cfg(test)]
#[path = "combat_test.rs"]
mod tests;

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::services::character::{CharacterProvider, CharacterSummary};
use crate::state::{AppState, Encounter};

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum CombatError {
    #[error("map not loaded: {0}")]
    MapNotLoaded(Uuid),
    #[error("encounter not found: {0}")]
    EncounterNotFound(Uuid),
    #[error("participant not found: {0}")]
    ParticipantNotFound(Uuid),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl frames::ErrorCode for CombatError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::MapNotLoaded(_) => "E_MAP_NOT_LOADED",
            Self::EncounterNotFound(_) => "E_ENCOUNTER_NOT_FOUND",
            Self::ParticipantNotFound(_) => "E_PARTICIPANT_NOT_FOUND",
            Self::Database(_) => "E_DATABASE",
        }
    }
}

/// A participant row. Mirrors `combat_participants`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    pub id: Uuid,
    pub encounter_id: Uuid,
    pub token_id: Uuid,
    pub initiative_roll: i32,
    pub turn_order: i32,
    pub conditions: Vec<String>,
    pub notes: String,
}

/// One roster row as shipped to clients: the participant joined with its
/// token's name and that token's character display fields.
#[derive(Debug, Clone, Serialize)]
pub struct RosterEntry {
    #[serde(flatten)]
    pub participant: Participant,
    pub token_name: String,
    /// `None` renders as a placeholder (initials, default color).
    pub character: Option<CharacterSummary>,
}

// =============================================================================
// TURN MATH
// =============================================================================

/// Advance the turn cursor: `index + 1`, wrapping to 0 and incrementing the
/// round at roster end. No-op on an empty roster.
#[must_use]
pub fn advance(round: i32, index: i32, count: usize) -> (i32, i32) {
    let Ok(count) = i32::try_from(count) else {
        return (round, index);
    };
    if count == 0 {
        return (round, index);
    }
    let next = index + 1;
    if next >= count {
        (round + 1, 0)
    } else {
        (round, next)
    }
}

/// Retreat the turn cursor: `index - 1`, wrapping to `count - 1` and
/// decrementing the round, clamped at round 1. No-op on an empty roster.
#[must_use]
pub fn retreat(round: i32, index: i32, count: usize) -> (i32, i32) {
    let Ok(count) = i32::try_from(count) else {
        return (round, index);
    };
    if count == 0 {
        return (round, index);
    }
    if index - 1 < 0 {
        ((round - 1).max(1), count - 1)
    } else {
        (round, index - 1)
    }
}

// =============================================================================
// ENCOUNTER LIFECYCLE
// =============================================================================

/// Start an encounter on a map: deactivate any prior active encounter for the
/// same (campaign, map), then insert a fresh row with round=1, index=0.
///
/// # Errors
///
/// Returns `MapNotLoaded` if the map isn't in memory.
pub async fn start_encounter(
    state: &AppState,
    map_id: Uuid,
    name: &str,
) -> Result<Encounter, CombatError> {
    let campaign_id = {
        let maps = state.maps.read().await;
        maps.get(&map_id)
            .ok_or(CombatError::MapNotLoaded(map_id))?
            .campaign_id
    };

    // Two separate writes, not one transaction (see module docs).
    let deactivated = sqlx::query(
        "UPDATE combat_encounters SET active = FALSE \
         WHERE campaign_id = $1 AND map_id IS NOT DISTINCT FROM $2 AND active",
    )
    .bind(campaign_id)
    .bind(map_id)
    .execute(&state.pool)
    .await?
    .rows_affected();
    if deactivated > 0 {
        info!(%map_id, deactivated, "deactivated prior active encounters");
    }

    let encounter = Encounter {
        id: Uuid::new_v4(),
        campaign_id,
        map_id: Some(map_id),
        name: name.to_string(),
        active: true,
        round_number: 1,
        current_turn_index: 0,
    };
    sqlx::query(
        "INSERT INTO combat_encounters (id, campaign_id, map_id, name, active, round_number, current_turn_index) \
         VALUES ($1, $2, $3, $4, TRUE, 1, 0)",
    )
    .bind(encounter.id)
    .bind(campaign_id)
    .bind(map_id)
    .bind(name)
    .execute(&state.pool)
    .await?;

    let mut maps = state.maps.write().await;
    if let Some(map) = maps.get_mut(&map_id) {
        map.encounter = Some(encounter.clone());
    }

    info!(%map_id, encounter_id = %encounter.id, name, "encounter started");
    Ok(encounter)
}

/// End an encounter: set `active = FALSE`. Participant rows are retained
/// for history.
///
/// # Errors
///
/// Returns `EncounterNotFound` if the row doesn't exist.
pub async fn end_encounter(
    state: &AppState,
    map_id: Uuid,
    encounter_id: Uuid,
) -> Result<Encounter, CombatError> {
    let row = sqlx::query_as::<_, (Uuid, Option<Uuid>, String, i32, i32)>(
        "UPDATE combat_encounters SET active = FALSE WHERE id = $1 \
         RETURNING campaign_id, map_id, name, round_number, current_turn_index",
    )
    .bind(encounter_id)
    .fetch_optional(&state.pool)
    .await?;

    let Some((campaign_id, enc_map_id, name, round_number, current_turn_index)) = row else {
        return Err(CombatError::EncounterNotFound(encounter_id));
    };

    let mut maps = state.maps.write().await;
    if let Some(map) = maps.get_mut(&map_id) {
        if map.encounter.as_ref().map(|e| e.id) == Some(encounter_id) {
            map.encounter = None;
        }
    }

    info!(%encounter_id, "encounter ended");
    Ok(Encounter {
        id: encounter_id,
        campaign_id,
        map_id: enc_map_id,
        name,
        active: false,
        round_number,
        current_turn_index,
    })
}

/// Fetch the active encounter for a (campaign, map), if any. At most one
/// result is expected; if the deactivate-then-insert window left several,
/// the newest wins.
pub async fn fetch_active_encounter(
    pool: &PgPool,
    campaign_id: Uuid,
    map_id: Uuid,
) -> Result<Option<Encounter>, sqlx::Error> {
    let row = sqlx::query_as::<_, (Uuid, Uuid, Option<Uuid>, String, bool, i32, i32)>(
        "SELECT id, campaign_id, map_id, name, active, round_number, current_turn_index \
         FROM combat_encounters \
         WHERE campaign_id = $1 AND map_id IS NOT DISTINCT FROM $2 AND active \
         ORDER BY created_at DESC LIMIT 1",
    )
    .bind(campaign_id)
    .bind(map_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(
        |(id, campaign_id, map_id, name, active, round_number, current_turn_index)| Encounter {
            id,
            campaign_id,
            map_id,
            name,
            active,
            round_number,
            current_turn_index,
        },
    ))
}

// =============================================================================
// TURN TRANSITIONS
// =============================================================================

/// Direction of a turn transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnStep {
    Next,
    Prev,
}

/// Apply one turn transition as a read-modify-write on the encounter row.
/// Returns the resulting encounter and whether anything changed (an empty
/// roster makes both transitions a no-op).
///
/// # Errors
///
/// Returns `EncounterNotFound` if the row doesn't exist.
pub async fn step_turn(
    state: &AppState,
    map_id: Uuid,
    encounter_id: Uuid,
    step: TurnStep,
) -> Result<(Encounter, bool), CombatError> {
    // Read: current cursor and roster size.
    let row = sqlx::query_as::<_, (Uuid, Option<Uuid>, String, bool, i32, i32)>(
        "SELECT campaign_id, map_id, name, active, round_number, current_turn_index \
         FROM combat_encounters WHERE id = $1",
    )
    .bind(encounter_id)
    .fetch_optional(&state.pool)
    .await?;
    let Some((campaign_id, enc_map_id, name, active, round, index)) = row else {
        return Err(CombatError::EncounterNotFound(encounter_id));
    };

    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM combat_participants WHERE encounter_id = $1")
            .bind(encounter_id)
            .fetch_one(&state.pool)
            .await?;
    let count = usize::try_from(count).unwrap_or(0);

    // Modify.
    let (new_round, new_index) = match step {
        TurnStep::Next => advance(round, index, count),
        TurnStep::Prev => retreat(round, index, count),
    };
    let changed = (new_round, new_index) != (round, index);

    // Write back. Racing transitions are last-write-wins.
    if changed {
        sqlx::query(
            "UPDATE combat_encounters SET round_number = $2, current_turn_index = $3 WHERE id = $1",
        )
        .bind(encounter_id)
        .bind(new_round)
        .bind(new_index)
        .execute(&state.pool)
        .await?;
    }

    let encounter = Encounter {
        id: encounter_id,
        campaign_id,
        map_id: enc_map_id,
        name,
        active,
        round_number: new_round,
        current_turn_index: new_index,
    };

    let mut maps = state.maps.write().await;
    if let Some(map) = maps.get_mut(&map_id) {
        if map.encounter.as_ref().map(|e| e.id) == Some(encounter_id) {
            map.encounter = Some(encounter.clone());
        }
    }

    Ok((encounter, changed))
}

// =============================================================================
// PARTICIPANTS
// =============================================================================

/// Add a token to the roster. `turn_order` is caller-managed; when omitted
/// the server appends to the end (`max(existing) + 1`). It is never
/// recomputed from initiative.
///
/// # Errors
///
/// Returns a database error if the insert fails.
pub async fn add_participant(
    pool: &PgPool,
    encounter_id: Uuid,
    token_id: Uuid,
    initiative_roll: i32,
    turn_order: Option<i32>,
) -> Result<Participant, CombatError> {
    let turn_order = match turn_order {
        Some(rank) => rank,
        None => {
            let max: Option<i32> = sqlx::query_scalar(
                "SELECT MAX(turn_order) FROM combat_participants WHERE encounter_id = $1",
            )
            .bind(encounter_id)
            .fetch_one(pool)
            .await?;
            max.unwrap_or(0) + 1
        }
    };

    let participant = Participant {
        id: Uuid::new_v4(),
        encounter_id,
        token_id,
        initiative_roll,
        turn_order,
        conditions: vec![],
        notes: String::new(),
    };
    sqlx::query(
        "INSERT INTO combat_participants (id, encounter_id, token_id, initiative_roll, turn_order) \
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(participant.id)
    .bind(encounter_id)
    .bind(token_id)
    .bind(initiative_roll)
    .bind(turn_order)
    .execute(pool)
    .await?;

    Ok(participant)
}

/// Patch participant fields (initiative, conditions, notes). Does not touch
/// `turn_order` or the encounter's turn cursor.
///
/// # Errors
///
/// Returns `ParticipantNotFound` if the row doesn't exist.
pub async fn update_participant(
    pool: &PgPool,
    participant_id: Uuid,
    initiative_roll: Option<i32>,
    conditions: Option<Vec<String>>,
    notes: Option<String>,
) -> Result<Participant, CombatError> {
    let row = sqlx::query_as::<_, (Uuid, Uuid, i32, i32, Vec<String>, String)>(
        "UPDATE combat_participants SET \
             initiative_roll = COALESCE($2, initiative_roll), \
             conditions = COALESCE($3, conditions), \
             notes = COALESCE($4, notes) \
         WHERE id = $1 \
         RETURNING encounter_id, token_id, initiative_roll, turn_order, conditions, notes",
    )
    .bind(participant_id)
    .bind(initiative_roll)
    .bind(conditions)
    .bind(notes)
    .fetch_optional(pool)
    .await?;

    let Some((encounter_id, token_id, initiative_roll, turn_order, conditions, notes)) = row else {
        return Err(CombatError::ParticipantNotFound(participant_id));
    };
    Ok(Participant { id: participant_id, encounter_id, token_id, initiative_roll, turn_order, conditions, notes })
}

/// Remove a participant. A turn cursor pointing past the shrunk roster
/// self-heals on the next transition.
///
/// # Errors
///
/// Returns `ParticipantNotFound` if the row doesn't exist.
pub async fn remove_participant(pool: &PgPool, participant_id: Uuid) -> Result<(), CombatError> {
    let result = sqlx::query("DELETE FROM combat_participants WHERE id = $1")
        .bind(participant_id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(CombatError::ParticipantNotFound(participant_id));
    }
    Ok(())
}

/// Fetch the full roster in turn order, each row joined with its token's name
/// and enriched with that token's character display fields.
///
/// # Errors
///
/// Returns a database error if the query fails; a dangling character id is
/// not an error (entry ships with `character: None`).
pub async fn fetch_roster(
    pool: &PgPool,
    characters: &dyn CharacterProvider,
    encounter_id: Uuid,
) -> Result<Vec<RosterEntry>, CombatError> {
    let rows = sqlx::query_as::<_, (Uuid, Uuid, i32, i32, Vec<String>, String, String, Option<Uuid>)>(
        "SELECT p.id, p.token_id, p.initiative_roll, p.turn_order, p.conditions, p.notes, \
                t.name, t.character_id \
         FROM combat_participants p \
         JOIN tokens t ON t.id = p.token_id \
         WHERE p.encounter_id = $1 \
         ORDER BY p.turn_order ASC, p.id ASC",
    )
    .bind(encounter_id)
    .fetch_all(pool)
    .await?;

    let mut roster = Vec::with_capacity(rows.len());
    for (id, token_id, initiative_roll, turn_order, conditions, notes, token_name, character_id) in rows {
        let character = match character_id {
            // A failed or missing lookup degrades to the placeholder.
            Some(character_id) => characters.summary(character_id).await.unwrap_or(None),
            None => None,
        };
        roster.push(RosterEntry {
            participant: Participant {
                id,
                encounter_id,
                token_id,
                initiative_roll,
                turn_order,
                conditions,
                notes,
            },
            token_name,
            character,
        });
    }
    Ok(roster)
}
