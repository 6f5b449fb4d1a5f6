//! Character summary provider — the read-only seam to the character subsystem.
//!
//! DESIGN
//! ======
//! The VTT core never mutates characters; it only enriches tokens and the
//! combat roster with display stats. The lookup is a trait object so tests
//! (and a future remote character service) can swap the Postgres-backed
//! implementation. A missing row is `Ok(None)`, rendered as a placeholder,
//! never an error.

#[cfg(test)]
#[path = "character_test.rs"]
mod tests;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// Display stats for one character.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterSummary {
    pub name: String,
    pub image_url: Option<String>,
    pub hp_current: i32,
    pub hp_max: i32,
}

/// Read-only lookup into the character subsystem.
#[async_trait]
pub trait CharacterProvider: Send + Sync {
    /// Fetch display stats by character id. `None` when the id dangles.
    async fn summary(&self, character_id: Uuid) -> Result<Option<CharacterSummary>, sqlx::Error>;
}

/// Postgres-backed provider reading the `characters` table.
pub struct PgCharacterProvider {
    pool: PgPool,
}

impl PgCharacterProvider {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CharacterProvider for PgCharacterProvider {
    async fn summary(&self, character_id: Uuid) -> Result<Option<CharacterSummary>, sqlx::Error> {
        let row = sqlx::query_as::<_, (String, Option<String>, i32, i32)>(
            "SELECT name, image_url, hp_current, hp_max FROM characters WHERE id = $1",
        )
        .bind(character_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(name, image_url, hp_current, hp_max)| CharacterSummary {
            name,
            image_url,
            hp_current,
            hp_max,
        }))
    }
}

/// Fixed in-memory provider for tests.
#[derive(Default)]
pub struct StaticCharacterProvider {
    entries: std::collections::HashMap<Uuid, CharacterSummary>,
}

impl StaticCharacterProvider {
    #[must_use]
    pub fn with(entries: impl IntoIterator<Item = (Uuid, CharacterSummary)>) -> Self {
        Self { entries: entries.into_iter().collect() }
    }
}

#[async_trait]
impl CharacterProvider for StaticCharacterProvider {
    async fn summary(&self, character_id: Uuid) -> Result<Option<CharacterSummary>, sqlx::Error> {
        Ok(self.entries.get(&character_id).cloned())
    }
}
