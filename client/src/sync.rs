//! Outbound sync: request-frame builders, drag debounce, reconnect backoff.
//!
//! DESIGN
//! ======
//! Every mutation entry point the UI shell exposes maps to one builder here;
//! the shell serializes the returned [`Frame`] onto the socket and forgets it
//! (fire-and-forget — local state was already updated optimistically by the
//! engine). Mid-drag positions flow through [`MoveDebouncer`] so a 60 Hz drag
//! doesn't become 60 writes per second; drag end bypasses the debouncer and
//! commits the snapped position immediately.
//!
//! Time is always injected (`now_ms`) so this logic stays testable.

#[cfg(test)]
#[path = "sync_test.rs"]
mod sync_test;

use frames::{Data, Frame};
use tabletop::doc::{FogShape, PartialToken, SizeCategory};
use uuid::Uuid;

// =============================================================================
// REQUEST BUILDERS
// =============================================================================

/// `map:join` — bootstrap fetch + subscribe in one exchange.
#[must_use]
pub fn join_map(map_id: Uuid) -> Frame {
    Frame::request("map:join", Data::new()).with_map_id(map_id)
}

/// `map:part` — leave the current map.
#[must_use]
pub fn part_map(map_id: Uuid) -> Frame {
    Frame::request("map:part", Data::new()).with_map_id(map_id)
}

/// `token:create` — place a new token.
#[must_use]
pub fn create_token(
    name: &str,
    x: f64,
    y: f64,
    size: SizeCategory,
    character_id: Option<Uuid>,
) -> Frame {
    let mut frame = Frame::request("token:create", Data::new())
        .with_data("name", name)
        .with_data("x", x)
        .with_data("y", y)
        .with_data("size", serde_json::to_value(size).unwrap_or_default());
    if let Some(character_id) = character_id {
        frame = frame.with_data("character_id", character_id.to_string());
    }
    frame
}

/// `token:move` — commit a position. The caller snaps before calling.
#[must_use]
pub fn move_token(id: Uuid, x: f64, y: f64, version: i32) -> Frame {
    Frame::request("token:move", Data::new())
        .with_data("id", id.to_string())
        .with_data("x", x)
        .with_data("y", y)
        .with_data("version", version)
}

/// `token:update` — sparse field update (name, color, hp, ...).
#[must_use]
pub fn update_token(id: Uuid, fields: &PartialToken, version: i32) -> Frame {
    let mut frame = Frame::request("token:update", Data::new())
        .with_data("id", id.to_string())
        .with_data("version", version);
    if let Ok(serde_json::Value::Object(map)) = serde_json::to_value(fields) {
        for (key, value) in map {
            frame.data.insert(key, value);
        }
    }
    frame
}

/// `token:delete`.
#[must_use]
pub fn delete_token(id: Uuid) -> Frame {
    Frame::request("token:delete", Data::new()).with_data("id", id.to_string())
}

/// `fog:commit` — replace the whole shape list (the unit of persistence).
#[must_use]
pub fn commit_fog(shapes: &[FogShape], version: i32) -> Frame {
    Frame::request("fog:commit", Data::new())
        .with_data("shapes", serde_json::to_value(shapes).unwrap_or_default())
        .with_data("version", version)
}

/// `fog:reveal` — set the reveal-whole-map master switch.
#[must_use]
pub fn reveal_fog(revealed: bool, version: i32) -> Frame {
    Frame::request("fog:reveal", Data::new())
        .with_data("revealed", revealed)
        .with_data("version", version)
}

/// `combat:start` — begin an encounter on the joined map.
#[must_use]
pub fn start_combat(name: &str) -> Frame {
    Frame::request("combat:start", Data::new()).with_data("name", name)
}

/// `combat:end`.
#[must_use]
pub fn end_combat(encounter_id: Uuid) -> Frame {
    Frame::request("combat:end", Data::new()).with_data("encounter_id", encounter_id.to_string())
}

/// `combat:add` — add a token to the roster. `turn_order` is caller-managed;
/// omit it to accept the server's append-to-end default.
#[must_use]
pub fn add_participant(
    encounter_id: Uuid,
    token_id: Uuid,
    initiative_roll: i32,
    turn_order: Option<i32>,
) -> Frame {
    let mut frame = Frame::request("combat:add", Data::new())
        .with_data("encounter_id", encounter_id.to_string())
        .with_data("token_id", token_id.to_string())
        .with_data("initiative_roll", initiative_roll);
    if let Some(turn_order) = turn_order {
        frame = frame.with_data("turn_order", turn_order);
    }
    frame
}

/// `combat:update` — patch participant fields. Never touches `turn_order`
/// or the turn cursor.
#[must_use]
pub fn update_participant(
    participant_id: Uuid,
    initiative_roll: Option<i32>,
    conditions: Option<&[String]>,
    notes: Option<&str>,
) -> Frame {
    let mut frame = Frame::request("combat:update", Data::new())
        .with_data("participant_id", participant_id.to_string());
    if let Some(initiative_roll) = initiative_roll {
        frame = frame.with_data("initiative_roll", initiative_roll);
    }
    if let Some(conditions) = conditions {
        frame = frame.with_data("conditions", serde_json::to_value(conditions).unwrap_or_default());
    }
    if let Some(notes) = notes {
        frame = frame.with_data("notes", notes);
    }
    frame
}

/// `combat:remove`.
#[must_use]
pub fn remove_participant(participant_id: Uuid) -> Frame {
    Frame::request("combat:remove", Data::new())
        .with_data("participant_id", participant_id.to_string())
}

/// `combat:next` — advance the turn cursor.
#[must_use]
pub fn next_turn(encounter_id: Uuid) -> Frame {
    Frame::request("combat:next", Data::new()).with_data("encounter_id", encounter_id.to_string())
}

/// `combat:prev` — retreat the turn cursor.
#[must_use]
pub fn prev_turn(encounter_id: Uuid) -> Frame {
    Frame::request("combat:prev", Data::new()).with_data("encounter_id", encounter_id.to_string())
}

/// `combat:roster` — full roster re-fetch for the held encounter.
#[must_use]
pub fn fetch_roster(encounter_id: Uuid) -> Frame {
    Frame::request("combat:roster", Data::new())
        .with_data("encounter_id", encounter_id.to_string())
}

// =============================================================================
// MOVE DEBOUNCE
// =============================================================================

/// Default milliseconds between mid-drag position writes.
pub const MOVE_DEBOUNCE_MS: i64 = 100;

/// Trailing-edge debouncer for mid-drag token positions.
///
/// `offer` records the latest position and returns a frame only when the
/// debounce window has elapsed; `flush` drains whatever is pending (used on
/// drag end, right before the snapped `token:move` commit).
pub struct MoveDebouncer {
    interval_ms: i64,
    last_sent_ms: Option<i64>,
    pending: Option<(Uuid, f64, f64, i32)>,
}

impl MoveDebouncer {
    #[must_use]
    pub fn new(interval_ms: i64) -> Self {
        Self { interval_ms, last_sent_ms: None, pending: None }
    }

    /// Record a drag position at `now_ms`. Returns a `token:move` frame when
    /// enough time has passed since the last emission.
    pub fn offer(&mut self, now_ms: i64, id: Uuid, x: f64, y: f64, version: i32) -> Option<Frame> {
        self.pending = Some((id, x, y, version));
        let due = match self.last_sent_ms {
            None => true,
            Some(last) => now_ms - last >= self.interval_ms,
        };
        if due { self.emit(now_ms) } else { None }
    }

    /// Emit the pending position regardless of the window, if any.
    pub fn flush(&mut self, now_ms: i64) -> Option<Frame> {
        self.emit(now_ms)
    }

    fn emit(&mut self, now_ms: i64) -> Option<Frame> {
        let (id, x, y, version) = self.pending.take()?;
        self.last_sent_ms = Some(now_ms);
        Some(move_token(id, x, y, version))
    }
}

impl Default for MoveDebouncer {
    fn default() -> Self {
        Self::new(MOVE_DEBOUNCE_MS)
    }
}

// =============================================================================
// RECONNECT BACKOFF
// =============================================================================

/// Exponential reconnect backoff, doubling from 1s and capped at 10s.
pub struct Backoff {
    current_ms: u32,
    max_ms: u32,
}

impl Backoff {
    #[must_use]
    pub fn new() -> Self {
        Self { current_ms: 1000, max_ms: 10_000 }
    }

    /// Delay to wait before the next attempt; doubles on each call.
    pub fn next_delay_ms(&mut self) -> u32 {
        let delay = self.current_ms;
        self.current_ms = (self.current_ms * 2).min(self.max_ms);
        delay
    }

    /// Reset after a successful connection.
    pub fn reset(&mut self) {
        self.current_ms = 1000;
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new()
    }
}
