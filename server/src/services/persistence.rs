//! Persistence service — background flush for dirty tokens and fog.
//!
//! DESIGN
//! ======
//! Token drags and fog edits are applied in memory and marked dirty; a
//! background task flushes dirty state, then sleeps before the next cycle, so
//! a 60 Hz drag becomes at most ten writes per second.
//!
//! ERROR HANDLING
//! ==============
//! Dirty flags are cleared only after successful writes. This prioritizes
//! durability over duplicate flush attempts: repeated upserts are acceptable,
//! silent data loss is not.

#[cfg(test)]
#[path = "persistence_test.rs"]
mod tests;

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{error, info};
use uuid::Uuid;

use crate::services::fog::flush_fog;
use crate::services::map::{clear_flushed_dirty_ids, flush_tokens};
use crate::state::{AppState, FogDoc, Token};

const DEFAULT_TOKEN_FLUSH_INTERVAL_MS: u64 = 100;

/// Parse an environment knob, falling back to the default on absence or junk.
pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

/// Spawn the background persistence task. Returns a handle for shutdown.
pub fn spawn_persistence_task(state: AppState) -> JoinHandle<()> {
    let flush_interval_ms = env_parse("TOKEN_FLUSH_INTERVAL_MS", DEFAULT_TOKEN_FLUSH_INTERVAL_MS);
    info!(flush_interval_ms, "persistence flush configured");
    tokio::spawn(async move {
        loop {
            flush_all_dirty(&state).await;
            tokio::time::sleep(Duration::from_millis(flush_interval_ms)).await;
        }
    })
}

#[derive(Debug)]
struct DirtyFlushBatch {
    map_id: Uuid,
    tokens: Vec<Token>,
    flushed_versions: Vec<(Uuid, i32)>,
    fog: Option<FogDoc>,
}

async fn flush_all_dirty(state: &AppState) {
    // PHASE: SNAPSHOT DIRTY STATE
    // WHY: collect immutable clones under lock, then perform I/O lock-free.
    let batches = {
        let maps = state.maps.read().await;
        let mut collected = Vec::new();

        for (map_id, live) in maps.iter() {
            if live.dirty.is_empty() && !live.fog_dirty {
                continue;
            }

            let tokens = live
                .dirty
                .iter()
                .filter_map(|id| live.tokens.get(id).cloned())
                .collect::<Vec<_>>();
            let versions = tokens
                .iter()
                .map(|token| (token.id, token.version))
                .collect::<Vec<_>>();
            let fog = live.fog_dirty.then(|| live.fog.clone());
            collected.push(DirtyFlushBatch { map_id: *map_id, tokens, flushed_versions: versions, fog });
        }

        collected
    };

    // PHASE: FLUSH PER MAP + ACK DIRTY FLAGS
    // WHY: if a flush fails we intentionally keep dirty flags for retry.
    for batch in batches {
        match flush_tokens(&state.pool, &batch.tokens).await {
            Ok(()) => {
                ack_flushed_tokens(state, batch.map_id, &batch.flushed_versions).await;
            }
            Err(e) => {
                error!(error = %e, count = batch.tokens.len(), map_id = %batch.map_id, "token flush failed");
            }
        }

        if let Some(fog) = batch.fog {
            let flushed_version = fog.version;
            match flush_fog(&state.pool, &fog).await {
                Ok(()) => {
                    ack_flushed_fog(state, batch.map_id, flushed_version).await;
                }
                Err(e) => {
                    error!(error = %e, map_id = %batch.map_id, "fog flush failed");
                }
            }
        }
    }
}

async fn ack_flushed_tokens(state: &AppState, map_id: Uuid, flushed_versions: &[(Uuid, i32)]) {
    let mut maps = state.maps.write().await;
    let Some(live) = maps.get_mut(&map_id) else {
        return;
    };
    clear_flushed_dirty_ids(live, flushed_versions);
}

async fn ack_flushed_fog(state: &AppState, map_id: Uuid, flushed_version: i32) {
    let mut maps = state.maps.write().await;
    let Some(live) = maps.get_mut(&map_id) else {
        return;
    };
    // EDGE: keep the dirty flag if the document changed again after snapshot.
    if live.fog.version == flushed_version {
        live.fog_dirty = false;
    }
}

#[cfg(test)]
pub(crate) async fn flush_all_dirty_for_tests(state: &AppState) {
    flush_all_dirty(state).await;
}
