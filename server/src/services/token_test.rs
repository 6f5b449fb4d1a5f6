use super::*;
use crate::state::test_helpers;

#[tokio::test]
async fn create_token_succeeds() {
    let state = test_helpers::test_app_state();
    let map_id = test_helpers::seed_map(&state).await;
    let token = create_token(&state, map_id, "Goblin", 10.0, 20.0, "medium", None)
        .await
        .unwrap();
    assert_eq!(token.name, "Goblin");
    assert!((token.x - 10.0).abs() < f64::EPSILON);
    assert!((token.y - 20.0).abs() < f64::EPSILON);
    assert_eq!(token.version, 1);
    assert!(TOKEN_COLORS.contains(&token.color.as_str()));

    // Verify in-memory state
    let maps = state.maps.read().await;
    let map = maps.get(&map_id).unwrap();
    assert!(map.tokens.contains_key(&token.id));
    assert!(map.dirty.contains(&token.id));
}

#[tokio::test]
async fn create_token_map_not_loaded() {
    let state = test_helpers::test_app_state();
    let fake_id = Uuid::new_v4();
    let result = create_token(&state, fake_id, "Goblin", 0.0, 0.0, "medium", None).await;
    assert!(matches!(result.unwrap_err(), TokenError::MapNotLoaded(_)));
}

#[tokio::test]
async fn update_token_succeeds() {
    let state = test_helpers::test_app_state();
    let map_id = test_helpers::seed_map(&state).await;
    let token = create_token(&state, map_id, "Orc", 0.0, 0.0, "medium", None)
        .await
        .unwrap();

    let mut data = Data::new();
    data.insert("x".into(), serde_json::json!(550.0));
    data.insert("y".into(), serde_json::json!(200.0));
    let updated = update_token(&state, map_id, token.id, &data, 1)
        .await
        .unwrap();
    assert!((updated.x - 550.0).abs() < f64::EPSILON);
    assert!((updated.y - 200.0).abs() < f64::EPSILON);
    assert_eq!(updated.version, 2);
}

#[tokio::test]
async fn update_token_lww_rejects_stale() {
    let state = test_helpers::test_app_state();
    let map_id = test_helpers::seed_map(&state).await;
    let token = create_token(&state, map_id, "Orc", 0.0, 0.0, "large", None)
        .await
        .unwrap();
    assert_eq!(token.version, 1);

    // Update with version 1 succeeds (incoming >= current)
    let mut data = Data::new();
    data.insert("x".into(), serde_json::json!(10.0));
    let updated = update_token(&state, map_id, token.id, &data, 1)
        .await
        .unwrap();
    assert_eq!(updated.version, 2);

    // Update with version 0 fails (incoming < current)
    let result = update_token(&state, map_id, token.id, &data, 0).await;
    assert!(matches!(
        result.unwrap_err(),
        TokenError::StaleUpdate { incoming: 0, current: 2 }
    ));
}

#[tokio::test]
async fn update_token_not_found() {
    let state = test_helpers::test_app_state();
    let map_id = test_helpers::seed_map(&state).await;
    let data = Data::new();
    let result = update_token(&state, map_id, Uuid::new_v4(), &data, 0).await;
    assert!(matches!(result.unwrap_err(), TokenError::NotFound(_)));
}

#[tokio::test]
async fn update_token_partial_fields() {
    let state = test_helpers::test_app_state();
    let map_id = test_helpers::seed_map(&state).await;
    let token = create_token(&state, map_id, "Orc", 10.0, 20.0, "medium", None)
        .await
        .unwrap();

    // Only update hp_current; position stays untouched.
    let mut data = Data::new();
    data.insert("hp_current".into(), serde_json::json!(3));
    let updated = update_token(&state, map_id, token.id, &data, 1)
        .await
        .unwrap();
    assert_eq!(updated.hp_current, 3);
    assert!((updated.x - 10.0).abs() < f64::EPSILON);
    assert!((updated.y - 20.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn update_token_marks_dirty() {
    let state = test_helpers::test_app_state();
    let map_id = test_helpers::seed_map(&state).await;
    let token = create_token(&state, map_id, "Orc", 0.0, 0.0, "medium", None)
        .await
        .unwrap();

    let mut data = Data::new();
    data.insert("name".into(), serde_json::json!("Orc Chief"));
    update_token(&state, map_id, token.id, &data, 1).await.unwrap();

    let maps = state.maps.read().await;
    let map = maps.get(&map_id).unwrap();
    assert!(map.dirty.contains(&token.id));
}

#[tokio::test]
#[ignore = "delete_token hits Postgres via sqlx::query"]
async fn delete_token_removes_from_memory() {
    let state = test_helpers::test_app_state();
    let map_id = test_helpers::seed_map(&state).await;
    let token = create_token(&state, map_id, "Orc", 0.0, 0.0, "medium", None)
        .await
        .unwrap();
    let _ = delete_token(&state, map_id, token.id).await;
}

#[test]
fn token_to_row_carries_all_fields() {
    let token = test_helpers::dummy_token();
    let row = token_to_row(&token);
    assert_eq!(row.get("name").and_then(|v| v.as_str()), Some("Goblin"));
    assert_eq!(row.get("version").and_then(serde_json::Value::as_i64), Some(1));
    assert_eq!(row.get("x").and_then(serde_json::Value::as_f64), Some(100.0));
}
