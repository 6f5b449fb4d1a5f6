#![allow(clippy::float_cmp)]

use uuid::Uuid;

use super::*;

fn make_token(name: &str, x: f64, y: f64) -> Token {
    Token {
        id: Uuid::new_v4(),
        map_id: Uuid::new_v4(),
        character_id: None,
        name: name.into(),
        x,
        y,
        size: SizeCategory::Medium,
        color: "#B03A2E".into(),
        image_ref: None,
        hp_current: 10,
        hp_max: 10,
        version: 1,
    }
}

// --- SizeCategory ---

#[test]
fn size_multipliers() {
    assert_eq!(SizeCategory::Tiny.multiplier(), 0.5);
    assert_eq!(SizeCategory::Small.multiplier(), 0.8);
    assert_eq!(SizeCategory::Medium.multiplier(), 1.0);
    assert_eq!(SizeCategory::Large.multiplier(), 2.0);
    assert_eq!(SizeCategory::Huge.multiplier(), 3.0);
    assert_eq!(SizeCategory::Gargantuan.multiplier(), 4.0);
}

#[test]
fn size_footprint_scales_with_grid() {
    assert_eq!(SizeCategory::Large.footprint(50.0), 100.0);
    assert_eq!(SizeCategory::Tiny.footprint(50.0), 25.0);
}

#[test]
fn size_serde_is_lowercase() {
    let json = serde_json::to_string(&SizeCategory::Gargantuan).unwrap();
    assert_eq!(json, "\"gargantuan\"");
    let back: SizeCategory = serde_json::from_str("\"huge\"").unwrap();
    assert_eq!(back, SizeCategory::Huge);
}

// --- Token serde ---

#[test]
fn token_serde_round_trip() {
    let token = make_token("Goblin", 150.0, 200.0);
    let json = serde_json::to_string(&token).unwrap();
    let restored: Token = serde_json::from_str(&json).unwrap();
    assert_eq!(restored, token);
}

// --- FogShape serde ---

#[test]
fn fog_shape_rect_tagged_by_type() {
    let shape = FogShape {
        id: Uuid::new_v4(),
        geometry: FogGeometry::Rect { x: 10.0, y: 20.0, width: 30.0, height: 40.0 },
        subtracted: false,
    };
    let value = serde_json::to_value(&shape).unwrap();
    assert_eq!(value.get("type").and_then(|v| v.as_str()), Some("rect"));
    assert_eq!(value.get("width").and_then(serde_json::Value::as_f64), Some(30.0));

    let restored: FogShape = serde_json::from_value(value).unwrap();
    assert_eq!(restored, shape);
}

#[test]
fn fog_shape_polygon_round_trip() {
    let shape = FogShape {
        id: Uuid::new_v4(),
        geometry: FogGeometry::Polygon {
            points: vec![
                FogPoint { x: 0.0, y: 0.0 },
                FogPoint { x: 50.0, y: 0.0 },
                FogPoint { x: 25.0, y: 40.0 },
            ],
        },
        subtracted: true,
    };
    let json = serde_json::to_string(&shape).unwrap();
    let restored: FogShape = serde_json::from_str(&json).unwrap();
    assert_eq!(restored, shape);
}

#[test]
fn fog_document_default_hides_everything() {
    let doc = FogDocument::default();
    assert!(!doc.revealed);
    assert!(doc.shapes.is_empty());
    assert_eq!(doc.version, 0);
}

// --- MapStore: upsert ---

#[test]
fn upsert_inserts_new_token() {
    let mut store = MapStore::new();
    let token = make_token("Orc", 0.0, 0.0);
    assert!(store.upsert_token(token.clone()));
    assert_eq!(store.len(), 1);
    assert_eq!(store.get(&token.id), Some(&token));
}

#[test]
fn upsert_identical_token_is_noop() {
    let mut store = MapStore::new();
    let token = make_token("Orc", 0.0, 0.0);
    assert!(store.upsert_token(token.clone()));
    assert!(!store.upsert_token(token.clone()));
    assert_eq!(store.len(), 1);
}

#[test]
fn upsert_changed_token_reports_change() {
    let mut store = MapStore::new();
    let mut token = make_token("Orc", 0.0, 0.0);
    store.upsert_token(token.clone());
    token.x = 50.0;
    token.version = 2;
    assert!(store.upsert_token(token.clone()));
    assert_eq!(store.get(&token.id).unwrap().x, 50.0);
}

// --- MapStore: apply_partial ---

#[test]
fn apply_partial_updates_named_fields_only() {
    let mut store = MapStore::new();
    let token = make_token("Orc", 10.0, 20.0);
    store.upsert_token(token.clone());

    let partial = PartialToken { x: Some(99.0), hp_current: Some(4), ..Default::default() };
    assert!(store.apply_partial(&token.id, &partial));

    let updated = store.get(&token.id).unwrap();
    assert_eq!(updated.x, 99.0);
    assert_eq!(updated.y, 20.0);
    assert_eq!(updated.hp_current, 4);
    assert_eq!(updated.name, "Orc");
}

#[test]
fn apply_partial_missing_token_returns_false() {
    let mut store = MapStore::new();
    let partial = PartialToken { x: Some(1.0), ..Default::default() };
    assert!(!store.apply_partial(&Uuid::new_v4(), &partial));
}

#[test]
fn apply_partial_equal_values_reports_no_change() {
    let mut store = MapStore::new();
    let token = make_token("Orc", 10.0, 20.0);
    store.upsert_token(token.clone());

    let partial = PartialToken { x: Some(10.0), y: Some(20.0), ..Default::default() };
    assert!(!store.apply_partial(&token.id, &partial));
}

// --- MapStore: remove / snapshot ---

#[test]
fn remove_returns_token() {
    let mut store = MapStore::new();
    let token = make_token("Orc", 0.0, 0.0);
    store.upsert_token(token.clone());
    let removed = store.remove_token(&token.id);
    assert_eq!(removed.map(|t| t.id), Some(token.id));
    assert!(store.is_empty());
}

#[test]
fn load_snapshot_replaces_contents() {
    let mut store = MapStore::new();
    store.upsert_token(make_token("Old", 0.0, 0.0));

    let a = make_token("A", 1.0, 1.0);
    let b = make_token("B", 2.0, 2.0);
    store.load_snapshot(vec![a.clone(), b.clone()]);

    assert_eq!(store.len(), 2);
    assert!(store.get(&a.id).is_some());
    assert!(store.get(&b.id).is_some());
}

#[test]
fn sorted_tokens_is_stable_by_id() {
    let mut store = MapStore::new();
    for i in 0..5 {
        store.upsert_token(make_token(&format!("t{i}"), 0.0, 0.0));
    }
    let ids: Vec<_> = store.sorted_tokens().iter().map(|t| t.id).collect();
    let mut sorted = ids.clone();
    sorted.sort();
    assert_eq!(ids, sorted);
}

// --- MapStore: fog ---

#[test]
fn set_fog_detects_no_change() {
    let mut store = MapStore::new();
    let doc = FogDocument { revealed: true, shapes: vec![], version: 3 };
    assert!(store.set_fog(doc.clone()));
    assert!(!store.set_fog(doc));
}
