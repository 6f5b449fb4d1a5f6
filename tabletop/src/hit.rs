#[cfg(test)]
#[path = "hit_test.rs"]
mod hit_test;

use crate::camera::Point;
use crate::doc::{MapStore, TokenId};

/// Test which token (if any) is under `world_pt`.
///
/// Tokens have a square footprint of side `grid * size multiplier` anchored at
/// their `(x, y)` top-left corner. When footprints overlap, the topmost in
/// draw order (highest id) wins.
#[must_use]
pub fn hit_test(world_pt: Point, store: &MapStore) -> Option<TokenId> {
    store
        .sorted_tokens()
        .iter()
        .rev()
        .find(|token| {
            let side = token.size.footprint(store.grid_size);
            world_pt.x >= token.x
                && world_pt.x < token.x + side
                && world_pt.y >= token.y
                && world_pt.y < token.y + side
        })
        .map(|token| token.id)
}
