//! Fog service — whole-document replace and the reveal master switch.
//!
//! DESIGN
//! ======
//! The fog document is one logical row per map: a `revealed` flag plus an
//! ordered shape list stored as a single JSON value. Commits replace the
//! shape list wholesale, which guarantees list order and atomicity at the
//! cost of whole-document last-write-wins on concurrent edits. The server
//! never inspects individual shapes.

#[cfg(test)]
#[path = "fog_test.rs"]
mod tests;

use uuid::Uuid;

use crate::state::{AppState, FogDoc};

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum FogError {
    #[error("map not loaded: {0}")]
    MapNotLoaded(Uuid),
    #[error("stale update: incoming version {incoming} < current {current}")]
    StaleUpdate { incoming: i32, current: i32 },
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl frames::ErrorCode for FogError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::MapNotLoaded(_) => "E_MAP_NOT_LOADED",
            Self::StaleUpdate { .. } => "E_STALE_UPDATE",
            Self::Database(_) => "E_DATABASE",
        }
    }
}

// =============================================================================
// COMMIT
// =============================================================================

/// Replace the shape list for a map's fog document.
///
/// # Errors
///
/// Returns `StaleUpdate` if `incoming_version < current.version`.
pub async fn commit_shapes(
    state: &AppState,
    map_id: Uuid,
    shapes: serde_json::Value,
    incoming_version: i32,
) -> Result<FogDoc, FogError> {
    let mut maps = state.maps.write().await;
    let map = maps.get_mut(&map_id).ok_or(FogError::MapNotLoaded(map_id))?;

    if incoming_version < map.fog.version {
        return Err(FogError::StaleUpdate { incoming: incoming_version, current: map.fog.version });
    }

    map.fog.shapes = shapes;
    map.fog.version += 1;
    map.fog_dirty = true;

    Ok(map.fog.clone())
}

/// Set the reveal-whole-map master switch. Shapes are retained; the flag
/// bypasses them while set.
///
/// # Errors
///
/// Returns `StaleUpdate` if `incoming_version < current.version`.
pub async fn set_revealed(
    state: &AppState,
    map_id: Uuid,
    revealed: bool,
    incoming_version: i32,
) -> Result<FogDoc, FogError> {
    let mut maps = state.maps.write().await;
    let map = maps.get_mut(&map_id).ok_or(FogError::MapNotLoaded(map_id))?;

    if incoming_version < map.fog.version {
        return Err(FogError::StaleUpdate { incoming: incoming_version, current: map.fog.version });
    }

    map.fog.revealed = revealed;
    map.fog.version += 1;
    map.fog_dirty = true;

    Ok(map.fog.clone())
}

// =============================================================================
// PERSISTENCE
// =============================================================================

/// Upsert one fog document to Postgres.
pub async fn flush_fog(pool: &sqlx::PgPool, fog: &FogDoc) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO fog (map_id, revealed, shapes, version, updated_at) \
         VALUES ($1, $2, $3, $4, now()) \
         ON CONFLICT (map_id) DO UPDATE SET \
             revealed = EXCLUDED.revealed, shapes = EXCLUDED.shapes, \
             version = EXCLUDED.version, updated_at = now()",
    )
    .bind(fog.map_id)
    .bind(fog.revealed)
    .bind(&fog.shapes)
    .bind(fog.version)
    .execute(pool)
    .await?;
    Ok(())
}
