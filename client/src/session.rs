//! Map-session state for the active view.
//!
//! SYSTEM CONTEXT
//! ==============
//! This model stores the local projection of one joined map: real-time tokens
//! and fog through a [`MapStore`], the active combat encounter and its roster,
//! and connection lifecycle state. Mutations arrive from two directions — the
//! local interaction engine (optimistic) and the server change feed (via the
//! reconciler) — and both funnel through the same store so the renderer always
//! reads one coherent snapshot.

#[cfg(test)]
#[path = "session_test.rs"]
mod session_test;

use serde::{Deserialize, Serialize};
use tabletop::doc::{FogDocument, MapStore, Token};
use uuid::Uuid;

/// WebSocket connection status.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// Not connected; socket is closed or not yet opened.
    #[default]
    Disconnected,
    /// WebSocket handshake is in progress.
    Connecting,
    /// WebSocket is open and the server acknowledged the session.
    Connected,
}

/// A combat encounter row as seen by clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Encounter {
    pub id: Uuid,
    pub campaign_id: Uuid,
    pub map_id: Option<Uuid>,
    pub name: String,
    pub active: bool,
    pub round_number: i32,
    pub current_turn_index: i32,
}

/// Character display stats provided by the character subsystem. Read-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterSummary {
    pub name: String,
    pub image_url: Option<String>,
    pub hp_current: i32,
    pub hp_max: i32,
}

/// A combat participant row, optionally enriched with character display data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: Uuid,
    pub encounter_id: Uuid,
    pub token_id: Uuid,
    pub initiative_roll: i32,
    /// Iteration rank within the encounter. Caller-managed; distinct from
    /// insertion order and not recomputed from initiative.
    pub turn_order: i32,
    pub conditions: Vec<String>,
    pub notes: String,
    /// Display enrichment; `None` renders as a placeholder.
    #[serde(default)]
    pub character: Option<CharacterSummary>,
}

impl Participant {
    /// Display label: character name when enriched, otherwise a placeholder
    /// derived from the token id.
    #[must_use]
    pub fn display_name<'a>(&'a self, token_name: Option<&'a str>) -> &'a str {
        if let Some(character) = &self.character {
            return &character.name;
        }
        token_name.unwrap_or("?")
    }
}

/// The local projection of one joined map.
#[derive(Default)]
pub struct MapSession {
    /// Current WebSocket connection lifecycle state.
    pub connection_status: ConnectionStatus,
    /// ID of the currently joined map.
    pub map_id: Option<Uuid>,
    /// Tokens and fog for the joined map.
    pub store: MapStore,
    /// The active combat encounter, if one is held locally.
    pub encounter: Option<Encounter>,
    /// Roster for the active encounter, in server-fetch order.
    pub participants: Vec<Participant>,
    /// Set when a change event invalidated the roster; the host should issue
    /// a `combat:roster` fetch and clear it on reply.
    pub roster_refetch_needed: bool,
}

impl MapSession {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adopt the bootstrap snapshot returned by `map:join`.
    pub fn load_bootstrap(
        &mut self,
        map_id: Uuid,
        tokens: Vec<Token>,
        fog: FogDocument,
        encounter: Option<Encounter>,
        participants: Vec<Participant>,
    ) {
        self.map_id = Some(map_id);
        self.store.load_snapshot(tokens);
        self.store.set_fog(fog);
        self.encounter = encounter;
        self.participants = participants;
        self.roster_refetch_needed = false;
    }

    /// Replace the roster after a `combat:roster` fetch.
    pub fn set_roster(&mut self, participants: Vec<Participant>) {
        self.participants = participants;
        self.roster_refetch_needed = false;
    }

    /// Roster in turn order: ascending `turn_order`, ties broken by id.
    #[must_use]
    pub fn ordered_roster(&self) -> Vec<&Participant> {
        let mut roster: Vec<&Participant> = self.participants.iter().collect();
        roster.sort_by(|a, b| a.turn_order.cmp(&b.turn_order).then_with(|| a.id.cmp(&b.id)));
        roster
    }

    /// The participant whose turn it currently is, if any.
    ///
    /// A cursor pointing past the end of a shrunk roster reads as `None`
    /// until the next turn transition self-heals it.
    #[must_use]
    pub fn active_participant(&self) -> Option<&Participant> {
        let encounter = self.encounter.as_ref()?;
        let index = usize::try_from(encounter.current_turn_index).ok()?;
        self.ordered_roster().get(index).copied()
    }

    /// Drop all encounter state (encounter ended or deactivated remotely).
    pub fn clear_encounter(&mut self) {
        self.encounter = None;
        self.participants.clear();
        self.roster_refetch_needed = false;
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================
