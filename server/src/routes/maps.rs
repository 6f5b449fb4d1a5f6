//! Read-side REST handlers for maps and tokens.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use tracing::error;
use uuid::Uuid;

use crate::services;
use crate::state::AppState;

/// `GET /api/campaigns/{id}/maps`
pub async fn list_maps_rest(
    State(state): State<AppState>,
    Path(campaign_id): Path<Uuid>,
) -> Result<Json<Vec<serde_json::Value>>, StatusCode> {
    match services::map::list_maps(&state.pool, campaign_id).await {
        Ok(maps) => Ok(Json(
            maps.iter()
                .map(|m| {
                    serde_json::json!({
                        "id": m.id,
                        "campaign_id": m.campaign_id,
                        "name": m.name,
                        "width": m.width,
                        "height": m.height,
                        "grid_size": m.grid_size,
                        "image_ref": m.image_ref,
                    })
                })
                .collect(),
        )),
        Err(e) => {
            error!(error = %e, %campaign_id, "map list failed");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// `GET /api/maps/{id}`
pub async fn get_map(
    State(state): State<AppState>,
    Path(map_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    match services::map::fetch_map(&state.pool, map_id).await {
        Ok(m) => Ok(Json(serde_json::json!({
            "id": m.id,
            "campaign_id": m.campaign_id,
            "name": m.name,
            "width": m.width,
            "height": m.height,
            "grid_size": m.grid_size,
            "image_ref": m.image_ref,
        }))),
        Err(services::map::MapError::NotFound(_)) => Err(StatusCode::NOT_FOUND),
        Err(e) => {
            error!(error = %e, %map_id, "map fetch failed");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// `GET /api/maps/{id}/tokens`
///
/// Reads from live memory when the map is loaded (the freshest state),
/// falling back to Postgres otherwise.
pub async fn list_tokens(
    State(state): State<AppState>,
    Path(map_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    {
        let maps = state.maps.read().await;
        if let Some(live) = maps.get(&map_id) {
            let tokens: Vec<_> = live.tokens.values().collect();
            return Ok(Json(serde_json::to_value(tokens).unwrap_or_default()));
        }
    }

    let rows = sqlx::query_as::<_, (Uuid, String, f64, f64, String, i32, i32, i32)>(
        "SELECT id, name, x, y, size, hp_current, hp_max, version FROM tokens WHERE map_id = $1",
    )
    .bind(map_id)
    .fetch_all(&state.pool)
    .await
    .map_err(|e| {
        error!(error = %e, %map_id, "token list failed");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    let tokens: Vec<serde_json::Value> = rows
        .into_iter()
        .map(|(id, name, x, y, size, hp_current, hp_max, version)| {
            serde_json::json!({
                "id": id, "name": name, "x": x, "y": y, "size": size,
                "hp_current": hp_current, "hp_max": hp_max, "version": version,
            })
        })
        .collect();
    Ok(Json(serde_json::Value::Array(tokens)))
}
