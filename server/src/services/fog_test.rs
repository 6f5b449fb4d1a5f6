use super::*;
use crate::state::test_helpers;

#[tokio::test]
async fn commit_replaces_shapes_wholesale() {
    let state = test_helpers::test_app_state();
    let map_id = test_helpers::seed_map(&state).await;

    let shapes = serde_json::json!([
        {"id": uuid::Uuid::new_v4(), "type": "rect", "x": 0.0, "y": 0.0, "width": 100.0, "height": 100.0, "subtracted": true}
    ]);
    let fog = commit_shapes(&state, map_id, shapes.clone(), 0).await.unwrap();
    assert_eq!(fog.shapes, shapes);
    assert_eq!(fog.version, 1);

    // Second commit replaces the whole list, not appends.
    let fog = commit_shapes(&state, map_id, serde_json::json!([]), 1).await.unwrap();
    assert_eq!(fog.shapes, serde_json::json!([]));
    assert_eq!(fog.version, 2);
}

#[tokio::test]
async fn commit_marks_fog_dirty() {
    let state = test_helpers::test_app_state();
    let map_id = test_helpers::seed_map(&state).await;

    commit_shapes(&state, map_id, serde_json::json!([]), 0).await.unwrap();

    let maps = state.maps.read().await;
    assert!(maps.get(&map_id).unwrap().fog_dirty);
}

#[tokio::test]
async fn commit_rejects_stale_version() {
    let state = test_helpers::test_app_state();
    let map_id = test_helpers::seed_map(&state).await;

    commit_shapes(&state, map_id, serde_json::json!([]), 0).await.unwrap();
    commit_shapes(&state, map_id, serde_json::json!([]), 1).await.unwrap();

    let result = commit_shapes(&state, map_id, serde_json::json!([]), 0).await;
    assert!(matches!(
        result.unwrap_err(),
        FogError::StaleUpdate { incoming: 0, current: 2 }
    ));
}

#[tokio::test]
async fn commit_map_not_loaded() {
    let state = test_helpers::test_app_state();
    let result = commit_shapes(&state, uuid::Uuid::new_v4(), serde_json::json!([]), 0).await;
    assert!(matches!(result.unwrap_err(), FogError::MapNotLoaded(_)));
}

#[tokio::test]
async fn reveal_toggles_flag_and_keeps_shapes() {
    let state = test_helpers::test_app_state();
    let map_id = test_helpers::seed_map(&state).await;

    let shapes = serde_json::json!([{"id": uuid::Uuid::new_v4(), "type": "circle", "x": 5.0, "y": 5.0, "radius": 3.0, "subtracted": true}]);
    commit_shapes(&state, map_id, shapes.clone(), 0).await.unwrap();

    let fog = set_revealed(&state, map_id, true, 1).await.unwrap();
    assert!(fog.revealed);
    assert_eq!(fog.shapes, shapes);
    assert_eq!(fog.version, 2);

    let fog = set_revealed(&state, map_id, false, 2).await.unwrap();
    assert!(!fog.revealed);
}

#[tokio::test]
async fn reveal_rejects_stale_version() {
    let state = test_helpers::test_app_state();
    let map_id = test_helpers::seed_map(&state).await;

    set_revealed(&state, map_id, true, 0).await.unwrap();
    let result = set_revealed(&state, map_id, false, 0).await;
    assert!(matches!(result.unwrap_err(), FogError::StaleUpdate { .. }));
}
