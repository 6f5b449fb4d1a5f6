use uuid::Uuid;

use super::*;
use crate::doc::{SizeCategory, Token};

fn make_token(x: f64, y: f64, size: SizeCategory) -> Token {
    Token {
        id: Uuid::new_v4(),
        map_id: Uuid::new_v4(),
        character_id: None,
        name: "t".into(),
        x,
        y,
        size,
        color: "#B03A2E".into(),
        image_ref: None,
        hp_current: 1,
        hp_max: 1,
        version: 1,
    }
}

#[test]
fn hit_inside_footprint() {
    let mut store = MapStore::new();
    store.grid_size = 50.0;
    let token = make_token(100.0, 100.0, SizeCategory::Medium);
    store.upsert_token(token.clone());

    assert_eq!(hit_test(Point::new(125.0, 125.0), &store), Some(token.id));
}

#[test]
fn miss_outside_footprint() {
    let mut store = MapStore::new();
    store.grid_size = 50.0;
    store.upsert_token(make_token(100.0, 100.0, SizeCategory::Medium));

    assert_eq!(hit_test(Point::new(160.0, 125.0), &store), None);
    assert_eq!(hit_test(Point::new(99.0, 100.0), &store), None);
}

#[test]
fn footprint_scales_with_size_category() {
    let mut store = MapStore::new();
    store.grid_size = 50.0;
    let token = make_token(100.0, 100.0, SizeCategory::Large);
    store.upsert_token(token.clone());

    // Large = 2 cells = 100px side.
    assert_eq!(hit_test(Point::new(190.0, 190.0), &store), Some(token.id));
    assert_eq!(hit_test(Point::new(205.0, 190.0), &store), None);
}

#[test]
fn overlapping_tokens_topmost_wins() {
    let mut store = MapStore::new();
    store.grid_size = 50.0;
    let a = make_token(100.0, 100.0, SizeCategory::Medium);
    let b = make_token(100.0, 100.0, SizeCategory::Medium);
    store.upsert_token(a.clone());
    store.upsert_token(b.clone());

    let top = if a.id > b.id { a.id } else { b.id };
    assert_eq!(hit_test(Point::new(110.0, 110.0), &store), Some(top));
}

#[test]
fn empty_store_misses() {
    let store = MapStore::new();
    assert_eq!(hit_test(Point::new(0.0, 0.0), &store), None);
}
