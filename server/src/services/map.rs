//! Map service — join/part, state hydration, and broadcast.
//!
//! DESIGN
//! ======
//! Map state is hydrated from Postgres on first join and kept in memory while
//! any client is connected. The join reply is the bootstrap fetch: tokens,
//! the fog document, the active encounter, and its enriched roster in one
//! shot. A change landing between the hydrate and the client registration is
//! healed by the next change event's idempotent re-fetch.
//!
//! ERROR HANDLING
//! ==============
//! On last-client part, dirty state is flushed before eviction. If that flush
//! fails, the map is intentionally kept in memory with dirty flags intact so
//! the persistence worker can retry instead of losing edits.

#[cfg(test)]
#[path = "map_test.rs"]
mod tests;

use std::collections::HashMap;

use sqlx::PgPool;
use tokio::sync::mpsc;
use tracing::info;
use uuid::Uuid;

use crate::services::combat::{self, RosterEntry};
use crate::services::fog::flush_fog;
use crate::state::{AppState, Encounter, FogDoc, MapLive, Token};
use frames::Frame;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum MapError {
    #[error("map not found: {0}")]
    NotFound(Uuid),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl frames::ErrorCode for MapError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "E_MAP_NOT_FOUND",
            Self::Database(_) => "E_DATABASE",
        }
    }
}

/// Row returned from map queries.
#[derive(Debug, Clone)]
pub struct MapRow {
    pub id: Uuid,
    pub campaign_id: Uuid,
    pub name: String,
    pub width: f64,
    pub height: f64,
    pub grid_size: f64,
    pub image_ref: Option<String>,
}

/// Everything a client needs to render after `map:join`.
pub struct JoinSnapshot {
    pub map: MapRow,
    pub tokens: Vec<Token>,
    pub fog: FogDoc,
    pub encounter: Option<Encounter>,
    pub roster: Vec<RosterEntry>,
}

// =============================================================================
// QUERIES
// =============================================================================

/// List all maps in a campaign.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn list_maps(pool: &PgPool, campaign_id: Uuid) -> Result<Vec<MapRow>, MapError> {
    let rows = sqlx::query_as::<_, (Uuid, Uuid, String, f64, f64, f64, Option<String>)>(
        "SELECT id, campaign_id, name, width, height, grid_size, image_ref \
         FROM maps WHERE campaign_id = $1 ORDER BY created_at DESC",
    )
    .bind(campaign_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(row_to_map).collect())
}

/// Fetch one map row.
///
/// # Errors
///
/// Returns `NotFound` if the map doesn't exist.
pub async fn fetch_map(pool: &PgPool, map_id: Uuid) -> Result<MapRow, MapError> {
    let row = sqlx::query_as::<_, (Uuid, Uuid, String, f64, f64, f64, Option<String>)>(
        "SELECT id, campaign_id, name, width, height, grid_size, image_ref \
         FROM maps WHERE id = $1",
    )
    .bind(map_id)
    .fetch_optional(pool)
    .await?;

    row.map(row_to_map).ok_or(MapError::NotFound(map_id))
}

fn row_to_map(row: (Uuid, Uuid, String, f64, f64, f64, Option<String>)) -> MapRow {
    let (id, campaign_id, name, width, height, grid_size, image_ref) = row;
    MapRow { id, campaign_id, name, width, height, grid_size, image_ref }
}

// =============================================================================
// JOIN / PART
// =============================================================================

/// Join a map. Hydrates from Postgres if not already in memory and returns
/// the full bootstrap snapshot.
///
/// # Errors
///
/// Returns `NotFound` for an unknown map and a database error if hydration
/// fails.
pub async fn join_map(
    state: &AppState,
    map_id: Uuid,
    client_id: Uuid,
    tx: mpsc::Sender<Frame>,
) -> Result<JoinSnapshot, MapError> {
    let map_row = fetch_map(&state.pool, map_id).await?;

    // Fetch snapshots outside locks; applied only on first live client.
    let token_snapshot = hydrate_tokens(&state.pool, map_id).await?;
    let fog_snapshot = hydrate_fog(&state.pool, map_id).await?;
    let encounter_snapshot =
        combat::fetch_active_encounter(&state.pool, map_row.campaign_id, map_id).await?;
    let roster = match &encounter_snapshot {
        Some(encounter) => {
            combat::fetch_roster(&state.pool, state.characters.as_ref(), encounter.id)
                .await
                .map_err(|e| match e {
                    combat::CombatError::Database(db) => MapError::Database(db),
                    _ => MapError::NotFound(map_id),
                })?
        }
        None => Vec::new(),
    };

    let mut maps = state.maps.write().await;
    let live = maps
        .entry(map_id)
        .or_insert_with(|| MapLive::new(map_id, map_row.campaign_id));

    // Hydrate from Postgres if this is the first live client for this map.
    if live.clients.is_empty() {
        live.campaign_id = map_row.campaign_id;
        live.width = map_row.width;
        live.height = map_row.height;
        live.grid_size = map_row.grid_size;
        live.tokens = token_snapshot;
        live.fog = fog_snapshot;
        live.encounter = encounter_snapshot;
        info!(%map_id, count = live.tokens.len(), "hydrated map from database");
    }

    live.clients.insert(client_id, tx);
    let tokens: Vec<Token> = live.tokens.values().cloned().collect();
    let fog = live.fog.clone();
    let encounter = live.encounter.clone();

    info!(%map_id, %client_id, clients = live.clients.len(), "client joined map");
    Ok(JoinSnapshot { map: map_row, tokens, fog, encounter, roster })
}

/// Leave a map. Removes the client sender. If last client, flushes dirty
/// state and evicts the map from memory.
pub async fn part_map(state: &AppState, map_id: Uuid, client_id: Uuid) {
    let mut maps = state.maps.write().await;
    let Some(live) = maps.get_mut(&map_id) else {
        return;
    };

    live.clients.remove(&client_id);
    info!(%map_id, %client_id, remaining = live.clients.len(), "client left map");

    if live.clients.is_empty() {
        // PHASE: HANDLE CLEAN EVICTION FAST PATH
        // WHY: avoid unnecessary I/O when the map has no pending mutations.
        if live.dirty.is_empty() && !live.fog_dirty {
            maps.remove(&map_id);
            info!(%map_id, "evicted map from memory");
        } else {
            // PHASE: SNAPSHOT DIRTY STATE FOR FINAL FLUSH
            // WHY: perform DB I/O outside the lock and keep dirty flags until
            // the write has actually succeeded.
            let dirty_tokens = live
                .dirty
                .iter()
                .filter_map(|id| live.tokens.get(id).cloned())
                .collect::<Vec<_>>();
            let dirty_versions = dirty_tokens
                .iter()
                .map(|token| (token.id, token.version))
                .collect::<Vec<_>>();
            let fog = live.fog_dirty.then(|| live.fog.clone());
            let fog_version = live.fog.version;

            // Release lock before writing to Postgres.
            drop(maps);
            let token_result = flush_tokens(&state.pool, &dirty_tokens).await;
            let fog_result = match &fog {
                Some(fog) => flush_fog(&state.pool, fog).await,
                None => Ok(()),
            };

            // PHASE: ACK OR RETAIN DIRTY FLAGS
            // WHY: clear dirties only when persisted. On error, retain state.
            let mut maps = state.maps.write().await;
            let Some(live) = maps.get_mut(&map_id) else {
                return;
            };
            if !live.clients.is_empty() {
                return;
            }

            match (&token_result, &fog_result) {
                (Ok(()), Ok(())) => {
                    clear_flushed_dirty_ids(live, &dirty_versions);
                    if fog.is_some() && live.fog.version == fog_version {
                        live.fog_dirty = false;
                    }
                    if live.dirty.is_empty() && !live.fog_dirty {
                        maps.remove(&map_id);
                        info!(%map_id, "evicted map from memory");
                    } else {
                        tracing::warn!(
                            %map_id,
                            remaining_dirty = live.dirty.len(),
                            "retaining map after final flush because newer dirty state exists"
                        );
                    }
                }
                (token_result, fog_result) => {
                    if let Err(e) = token_result {
                        tracing::error!(error = %e, %map_id, "final token flush failed; map retained for retry");
                    }
                    if let Err(e) = fog_result {
                        tracing::error!(error = %e, %map_id, "final fog flush failed; map retained for retry");
                    }
                }
            }
        }
    }
}

/// Clear dirty flags for tokens whose flushed version is still current.
pub(crate) fn clear_flushed_dirty_ids(live: &mut MapLive, flushed_versions: &[(Uuid, i32)]) {
    for (token_id, flushed_version) in flushed_versions {
        // EDGE: keep dirty flag if the token was updated again after snapshot.
        let can_clear = match live.tokens.get(token_id) {
            Some(current) => current.version == *flushed_version,
            None => true,
        };
        if can_clear {
            live.dirty.remove(token_id);
        }
    }
}

// =============================================================================
// BROADCAST
// =============================================================================

/// Broadcast a frame to all clients on a map, optionally excluding one.
pub async fn broadcast(state: &AppState, map_id: Uuid, frame: &Frame, exclude: Option<Uuid>) {
    let maps = state.maps.read().await;
    let Some(live) = maps.get(&map_id) else {
        return;
    };

    for (client_id, tx) in &live.clients {
        if exclude == Some(*client_id) {
            continue;
        }
        // Best-effort: if a client's channel is full, skip it.
        let _ = tx.try_send(frame.clone());
    }
}

// =============================================================================
// HELPERS
// =============================================================================

async fn hydrate_tokens(pool: &PgPool, map_id: Uuid) -> Result<HashMap<Uuid, Token>, sqlx::Error> {
    let rows = sqlx::query_as::<
        _,
        (
            Uuid,
            Uuid,
            Option<Uuid>,
            String,
            f64,
            f64,
            String,
            String,
            Option<String>,
            i32,
            i32,
            i32,
        ),
    >(
        "SELECT id, map_id, character_id, name, x, y, size, color, image_ref, hp_current, hp_max, version \
         FROM tokens WHERE map_id = $1",
    )
    .bind(map_id)
    .fetch_all(pool)
    .await?;

    let mut tokens = HashMap::new();
    for (id, map_id, character_id, name, x, y, size, color, image_ref, hp_current, hp_max, version) in rows {
        tokens.insert(
            id,
            Token { id, map_id, character_id, name, x, y, size, color, image_ref, hp_current, hp_max, version },
        );
    }
    Ok(tokens)
}

async fn hydrate_fog(pool: &PgPool, map_id: Uuid) -> Result<FogDoc, sqlx::Error> {
    let row = sqlx::query_as::<_, (bool, serde_json::Value, i32)>(
        "SELECT revealed, shapes, version FROM fog WHERE map_id = $1",
    )
    .bind(map_id)
    .fetch_optional(pool)
    .await?;

    Ok(match row {
        Some((revealed, shapes, version)) => FogDoc { map_id, revealed, shapes, version },
        None => FogDoc::empty(map_id),
    })
}

/// Batch upsert tokens to Postgres.
pub async fn flush_tokens(pool: &PgPool, tokens: &[Token]) -> Result<(), sqlx::Error> {
    for token in tokens {
        sqlx::query(
            "INSERT INTO tokens (id, map_id, character_id, name, x, y, size, color, image_ref, hp_current, hp_max, version, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, now()) \
             ON CONFLICT (id) DO UPDATE SET \
                 name = EXCLUDED.name, x = EXCLUDED.x, y = EXCLUDED.y, size = EXCLUDED.size, \
                 color = EXCLUDED.color, image_ref = EXCLUDED.image_ref, \
                 hp_current = EXCLUDED.hp_current, hp_max = EXCLUDED.hp_max, \
                 version = EXCLUDED.version, updated_at = now()",
        )
        .bind(token.id)
        .bind(token.map_id)
        .bind(token.character_id)
        .bind(&token.name)
        .bind(token.x)
        .bind(token.y)
        .bind(&token.size)
        .bind(&token.color)
        .bind(&token.image_ref)
        .bind(token.hp_current)
        .bind(token.hp_max)
        .bind(token.version)
        .execute(pool)
        .await?;
    }
    Ok(())
}
