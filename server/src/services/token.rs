//! Token service — create, update, move, delete with LWW versioning.
//!
//! DESIGN
//! ======
//! Token mutations update in-memory state immediately, mark the token as
//! dirty for debounced persistence, and return the updated row for broadcast.
//! LWW conflict resolution: incoming version must be >= current version,
//! otherwise the update is rejected as stale.

#[cfg(test)]
#[path = "token_test.rs"]
mod tests;

use rand::Rng;
use uuid::Uuid;

use crate::state::{AppState, Token};
use frames::Data;

/// Default palette for tokens created without an explicit color.
const TOKEN_COLORS: &[&str] = &[
    "#B03A2E", "#1F618D", "#196F3D", "#9A7D0A", "#6C3483", "#AF601A",
];

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("token not found: {0}")]
    NotFound(Uuid),
    #[error("map not loaded: {0}")]
    MapNotLoaded(Uuid),
    #[error("stale update: incoming version {incoming} < current {current}")]
    StaleUpdate { incoming: i32, current: i32 },
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl frames::ErrorCode for TokenError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "E_TOKEN_NOT_FOUND",
            Self::MapNotLoaded(_) => "E_MAP_NOT_LOADED",
            Self::StaleUpdate { .. } => "E_STALE_UPDATE",
            Self::Database(_) => "E_DATABASE",
        }
    }
}

// =============================================================================
// CREATE
// =============================================================================

/// Create a new token on a map.
///
/// # Errors
///
/// Returns `MapNotLoaded` if the map isn't in memory.
pub async fn create_token(
    state: &AppState,
    map_id: Uuid,
    name: &str,
    x: f64,
    y: f64,
    size: &str,
    character_id: Option<Uuid>,
) -> Result<Token, TokenError> {
    let mut maps = state.maps.write().await;
    let map = maps
        .get_mut(&map_id)
        .ok_or(TokenError::MapNotLoaded(map_id))?;

    let color_index = rand::rng().random_range(0..TOKEN_COLORS.len());
    let token = Token {
        id: Uuid::new_v4(),
        map_id,
        character_id,
        name: name.to_string(),
        x,
        y,
        size: size.to_string(),
        color: TOKEN_COLORS[color_index].to_string(),
        image_ref: None,
        hp_current: 0,
        hp_max: 0,
        version: 1,
    };

    let result = token.clone();
    map.dirty.insert(token.id);
    map.tokens.insert(token.id, token);

    Ok(result)
}

// =============================================================================
// UPDATE
// =============================================================================

/// Update an existing token with LWW conflict resolution. `token:move` and
/// `token:update` both land here; position, name, hp, and appearance fields
/// are applied from whatever keys the request carried.
///
/// # Errors
///
/// Returns `StaleUpdate` if `incoming_version < current.version`.
pub async fn update_token(
    state: &AppState,
    map_id: Uuid,
    token_id: Uuid,
    updates: &Data,
    incoming_version: i32,
) -> Result<Token, TokenError> {
    let mut maps = state.maps.write().await;
    let map = maps
        .get_mut(&map_id)
        .ok_or(TokenError::MapNotLoaded(map_id))?;
    let token = map
        .tokens
        .get_mut(&token_id)
        .ok_or(TokenError::NotFound(token_id))?;

    // LWW: reject stale updates.
    if incoming_version < token.version {
        return Err(TokenError::StaleUpdate { incoming: incoming_version, current: token.version });
    }

    // Apply updates from the data map.
    if let Some(x) = updates.get("x").and_then(serde_json::Value::as_f64) {
        token.x = x;
    }
    if let Some(y) = updates.get("y").and_then(serde_json::Value::as_f64) {
        token.y = y;
    }
    if let Some(name) = updates.get("name").and_then(|v| v.as_str()) {
        token.name = name.to_string();
    }
    if let Some(size) = updates.get("size").and_then(|v| v.as_str()) {
        token.size = size.to_string();
    }
    if let Some(color) = updates.get("color").and_then(|v| v.as_str()) {
        token.color = color.to_string();
    }
    if let Some(image_ref) = updates.get("image_ref").and_then(|v| v.as_str()) {
        token.image_ref = Some(image_ref.to_string());
    }
    if let Some(hp) = updates.get("hp_current").and_then(serde_json::Value::as_i64) {
        token.hp_current = i32::try_from(hp).unwrap_or(token.hp_current);
    }
    if let Some(hp) = updates.get("hp_max").and_then(serde_json::Value::as_i64) {
        token.hp_max = i32::try_from(hp).unwrap_or(token.hp_max);
    }

    token.version += 1;
    map.dirty.insert(token_id);

    Ok(token.clone())
}

// =============================================================================
// DELETE
// =============================================================================

/// Delete a token from a map. Removes from memory and Postgres immediately.
///
/// # Errors
///
/// Returns `NotFound` if the token doesn't exist.
pub async fn delete_token(state: &AppState, map_id: Uuid, token_id: Uuid) -> Result<(), TokenError> {
    let mut maps = state.maps.write().await;
    let map = maps
        .get_mut(&map_id)
        .ok_or(TokenError::MapNotLoaded(map_id))?;

    if map.tokens.remove(&token_id).is_none() {
        return Err(TokenError::NotFound(token_id));
    }
    map.dirty.remove(&token_id);

    // Delete from Postgres immediately (not deferred).
    sqlx::query("DELETE FROM tokens WHERE id = $1")
        .bind(token_id)
        .execute(&state.pool)
        .await?;

    Ok(())
}

// =============================================================================
// HELPERS
// =============================================================================

/// Flatten a token row into frame data for replies and change events.
#[must_use]
pub fn token_to_row(token: &Token) -> serde_json::Value {
    serde_json::to_value(token).unwrap_or_default()
}
