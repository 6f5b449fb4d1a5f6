//! Document model: tokens, the fog document, and the in-memory map store.
//!
//! This module defines the core data types that describe what is on the map
//! (`Token`, `SizeCategory`, `FogShape`), a sparse-update type for incremental
//! edits (`PartialToken`), and the runtime store that owns all live state
//! (`MapStore`).
//!
//! Data flows into this layer from the network (JSON deserialization) and from
//! the interaction engine (mutations). The renderer reads from `MapStore` via
//! `sorted_tokens` to determine draw order.

#[cfg(test)]
#[path = "doc_test.rs"]
mod doc_test;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::consts::DEFAULT_GRID_SIZE;

/// Unique identifier for a token.
pub type TokenId = Uuid;

/// Token size category. Each maps to a grid-cell multiplier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SizeCategory {
    Tiny,
    Small,
    #[default]
    Medium,
    Large,
    Huge,
    Gargantuan,
}

impl SizeCategory {
    /// Grid-cell multiplier applied uniformly to width and height.
    #[must_use]
    pub fn multiplier(self) -> f64 {
        match self {
            Self::Tiny => 0.5,
            Self::Small => 0.8,
            Self::Medium => 1.0,
            Self::Large => 2.0,
            Self::Huge => 3.0,
            Self::Gargantuan => 4.0,
        }
    }

    /// Side length of the (square) footprint for a given grid cell size.
    #[must_use]
    pub fn footprint(self, grid_size: f64) -> f64 {
        grid_size * self.multiplier()
    }
}

/// A token as stored in the map and on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    /// Unique identifier for this token.
    pub id: TokenId,
    /// The map this token belongs to.
    pub map_id: Uuid,
    /// Linked character, if any. Lookup only; the token never owns it.
    pub character_id: Option<Uuid>,
    /// Display name.
    pub name: String,
    /// Left edge of the footprint in map pixels.
    pub x: f64,
    /// Top edge of the footprint in map pixels.
    pub y: f64,
    /// Size category; footprint side is `grid * multiplier`.
    pub size: SizeCategory,
    /// Base color as a CSS color string.
    pub color: String,
    /// Portrait/sprite reference, if any.
    pub image_ref: Option<String>,
    pub hp_current: i32,
    pub hp_max: i32,
    /// Monotonically increasing edit counter used for conflict detection.
    pub version: i32,
}

/// Sparse update for a token. Only present fields are applied.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PartialToken {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<SizeCategory>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_ref: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hp_current: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hp_max: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<i32>,
}

/// A vertex of a polygon fog shape.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FogPoint {
    pub x: f64,
    pub y: f64,
}

/// Geometry of one fog shape, tagged by `type` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FogGeometry {
    Rect { x: f64, y: f64, width: f64, height: f64 },
    Circle { x: f64, y: f64, radius: f64 },
    Polygon { points: Vec<FogPoint> },
}

/// One reveal/hide shape in the fog document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FogShape {
    pub id: Uuid,
    #[serde(flatten)]
    pub geometry: FogGeometry,
    /// When true this shape reveals (punches a hole) rather than hides.
    pub subtracted: bool,
}

/// The per-map fog document: a master reveal switch plus an ordered shape
/// list, persisted and broadcast as a single atomic JSON value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FogDocument {
    /// Global reveal-all override; bypasses the entire shape list.
    pub revealed: bool,
    /// Shapes composited strictly in list order.
    pub shapes: Vec<FogShape>,
    /// Whole-document edit counter for conflict detection.
    #[serde(default)]
    pub version: i32,
}

/// In-memory store of everything on one map.
pub struct MapStore {
    /// Map width in pixels.
    pub width: f64,
    /// Map height in pixels.
    pub height: f64,
    /// Grid cell size in pixels; drives snapping and footprints.
    pub grid_size: f64,
    tokens: HashMap<TokenId, Token>,
    fog: FogDocument,
}

impl MapStore {
    /// Create an empty store with default dimensions.
    #[must_use]
    pub fn new() -> Self {
        Self {
            width: 0.0,
            height: 0.0,
            grid_size: DEFAULT_GRID_SIZE,
            tokens: HashMap::new(),
            fog: FogDocument::default(),
        }
    }

    /// Update map dimensions (e.g. after the background image loads).
    pub fn set_dimensions(&mut self, width: f64, height: f64) {
        self.width = width;
        self.height = height;
    }

    /// Insert or replace a token. Returns `true` if the stored value changed;
    /// re-applying an identical token is a no-op.
    pub fn upsert_token(&mut self, token: Token) -> bool {
        match self.tokens.get(&token.id) {
            Some(existing) if *existing == token => false,
            _ => {
                self.tokens.insert(token.id, token);
                true
            }
        }
    }

    /// Remove a token by id, returning it if it was present.
    pub fn remove_token(&mut self, id: &TokenId) -> Option<Token> {
        self.tokens.remove(id)
    }

    /// Return a reference to a token by id.
    #[must_use]
    pub fn get(&self, id: &TokenId) -> Option<&Token> {
        self.tokens.get(id)
    }

    /// Apply a partial update to an existing token. Returns `true` if the
    /// token exists and any field observably changed.
    pub fn apply_partial(&mut self, id: &TokenId, partial: &PartialToken) -> bool {
        let Some(token) = self.tokens.get_mut(id) else {
            return false;
        };
        let before = token.clone();
        if let Some(x) = partial.x {
            token.x = x;
        }
        if let Some(y) = partial.y {
            token.y = y;
        }
        if let Some(ref name) = partial.name {
            token.name = name.clone();
        }
        if let Some(size) = partial.size {
            token.size = size;
        }
        if let Some(ref color) = partial.color {
            token.color = color.clone();
        }
        if let Some(ref image_ref) = partial.image_ref {
            token.image_ref = Some(image_ref.clone());
        }
        if let Some(hp) = partial.hp_current {
            token.hp_current = hp;
        }
        if let Some(hp) = partial.hp_max {
            token.hp_max = hp;
        }
        if let Some(v) = partial.version {
            token.version = v;
        }
        *token != before
    }

    /// Replace all tokens with a full snapshot.
    pub fn load_snapshot(&mut self, tokens: Vec<Token>) {
        self.tokens.clear();
        for token in tokens {
            self.tokens.insert(token.id, token);
        }
    }

    /// Replace the fog document wholesale. Returns `true` if it changed.
    pub fn set_fog(&mut self, fog: FogDocument) -> bool {
        if self.fog == fog {
            return false;
        }
        self.fog = fog;
        true
    }

    /// The current fog document.
    #[must_use]
    pub fn fog(&self) -> &FogDocument {
        &self.fog
    }

    /// Mutable access to the fog document for local edits.
    pub fn fog_mut(&mut self) -> &mut FogDocument {
        &mut self.fog
    }

    /// Return all tokens sorted by id for stable draw order.
    #[must_use]
    pub fn sorted_tokens(&self) -> Vec<&Token> {
        let mut tokens: Vec<&Token> = self.tokens.values().collect();
        tokens.sort_by(|a, b| a.id.cmp(&b.id));
        tokens
    }

    /// Number of tokens currently in the store.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Returns `true` if the store contains no tokens.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

impl Default for MapStore {
    fn default() -> Self {
        Self::new()
    }
}
