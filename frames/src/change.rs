//! Typed row-change events.
//!
//! DESIGN
//! ======
//! The server emits one `ChangeEvent` per committed row mutation (and one per
//! fog document commit, which is a single logical row). Clients consume the
//! stream through a pure reconciler: `(local state, event) → next state`.
//! The `row` payload stays as loose JSON so this crate never depends on the
//! consumer's model types; reconciler code parses what it needs and ignores
//! the rest.

#[cfg(test)]
#[path = "change_test.rs"]
mod tests;

use serde::{Deserialize, Serialize};

use crate::{Data, Frame};

/// Which logical table a change event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Tokens,
    Fog,
    CombatEncounters,
    CombatParticipants,
}

/// Kind of row mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeOp {
    Insert,
    Update,
    Delete,
}

/// A single row-level change, as broadcast to every subscribed client.
///
/// For `Delete`, `row` carries at minimum the row's `id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub table: Table,
    pub op: ChangeOp,
    pub row: serde_json::Value,
}

impl ChangeEvent {
    #[must_use]
    pub fn new(table: Table, op: ChangeOp, row: serde_json::Value) -> Self {
        Self { table, op, row }
    }

    /// The `id` field of the affected row, if present and parseable.
    #[must_use]
    pub fn row_id(&self) -> Option<uuid::Uuid> {
        self.row
            .get("id")
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse().ok())
    }

    /// Wrap this event in a `change:event` notification frame.
    #[must_use]
    pub fn into_frame(self, map_id: uuid::Uuid) -> Frame {
        let mut data = Data::new();
        data.insert("table".into(), serde_json::to_value(self.table).unwrap_or_default());
        data.insert("op".into(), serde_json::to_value(self.op).unwrap_or_default());
        data.insert("row".into(), self.row);
        Frame::request("change:event", data).with_map_id(map_id)
    }

    /// Parse a `change:event` frame back into a typed event.
    ///
    /// Returns `None` for frames with a different syscall or missing fields.
    #[must_use]
    pub fn from_frame(frame: &Frame) -> Option<Self> {
        if frame.syscall != "change:event" {
            return None;
        }
        let table = serde_json::from_value(frame.data.get("table")?.clone()).ok()?;
        let op = serde_json::from_value(frame.data.get("op")?.clone()).ok()?;
        let row = frame.data.get("row")?.clone();
        Some(Self { table, op, row })
    }
}
