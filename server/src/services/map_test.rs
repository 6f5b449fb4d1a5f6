use tokio::sync::mpsc;

use super::*;
use crate::state::test_helpers;
use frames::Data;

#[tokio::test]
async fn broadcast_reaches_all_clients() {
    let state = test_helpers::test_app_state();
    let map_id = test_helpers::seed_map(&state).await;

    let (tx_a, mut rx_a) = mpsc::channel::<Frame>(8);
    let (tx_b, mut rx_b) = mpsc::channel::<Frame>(8);
    let client_a = Uuid::new_v4();
    let client_b = Uuid::new_v4();
    {
        let mut maps = state.maps.write().await;
        let live = maps.get_mut(&map_id).unwrap();
        live.clients.insert(client_a, tx_a);
        live.clients.insert(client_b, tx_b);
    }

    let frame = Frame::request("change:event", Data::new()).with_map_id(map_id);
    broadcast(&state, map_id, &frame, None).await;

    assert_eq!(rx_a.recv().await.unwrap().syscall, "change:event");
    assert_eq!(rx_b.recv().await.unwrap().syscall, "change:event");
}

#[tokio::test]
async fn broadcast_excludes_sender() {
    let state = test_helpers::test_app_state();
    let map_id = test_helpers::seed_map(&state).await;

    let (tx_a, mut rx_a) = mpsc::channel::<Frame>(8);
    let (tx_b, mut rx_b) = mpsc::channel::<Frame>(8);
    let client_a = Uuid::new_v4();
    let client_b = Uuid::new_v4();
    {
        let mut maps = state.maps.write().await;
        let live = maps.get_mut(&map_id).unwrap();
        live.clients.insert(client_a, tx_a);
        live.clients.insert(client_b, tx_b);
    }

    let frame = Frame::request("map:part", Data::new()).with_map_id(map_id);
    broadcast(&state, map_id, &frame, Some(client_a)).await;

    assert_eq!(rx_b.recv().await.unwrap().syscall, "map:part");
    assert!(rx_a.try_recv().is_err());
}

#[tokio::test]
async fn broadcast_unknown_map_is_silent() {
    let state = test_helpers::test_app_state();
    let frame = Frame::request("change:event", Data::new());
    // No panic, no error.
    broadcast(&state, Uuid::new_v4(), &frame, None).await;
}

#[tokio::test]
async fn broadcast_full_channel_skips_client() {
    let state = test_helpers::test_app_state();
    let map_id = test_helpers::seed_map(&state).await;

    let (tx, mut rx) = mpsc::channel::<Frame>(1);
    let client = Uuid::new_v4();
    {
        let mut maps = state.maps.write().await;
        maps.get_mut(&map_id).unwrap().clients.insert(client, tx);
    }

    let frame = Frame::request("change:event", Data::new());
    broadcast(&state, map_id, &frame, None).await;
    broadcast(&state, map_id, &frame, None).await; // channel full; dropped

    assert!(rx.recv().await.is_some());
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn part_map_clean_eviction_without_dirty_state() {
    let state = test_helpers::test_app_state();
    let map_id = test_helpers::seed_map(&state).await;

    let (tx, _rx) = mpsc::channel::<Frame>(8);
    let client = Uuid::new_v4();
    {
        let mut maps = state.maps.write().await;
        maps.get_mut(&map_id).unwrap().clients.insert(client, tx);
    }

    part_map(&state, map_id, client).await;

    let maps = state.maps.read().await;
    assert!(!maps.contains_key(&map_id));
}

#[tokio::test]
async fn part_map_keeps_state_while_clients_remain() {
    let state = test_helpers::test_app_state();
    let map_id = test_helpers::seed_map(&state).await;

    let (tx_a, _rx_a) = mpsc::channel::<Frame>(8);
    let (tx_b, _rx_b) = mpsc::channel::<Frame>(8);
    let client_a = Uuid::new_v4();
    let client_b = Uuid::new_v4();
    {
        let mut maps = state.maps.write().await;
        let live = maps.get_mut(&map_id).unwrap();
        live.clients.insert(client_a, tx_a);
        live.clients.insert(client_b, tx_b);
    }

    part_map(&state, map_id, client_a).await;

    let maps = state.maps.read().await;
    let live = maps.get(&map_id).expect("map stays loaded");
    assert_eq!(live.clients.len(), 1);
}

#[tokio::test]
async fn part_map_unknown_map_is_silent() {
    let state = test_helpers::test_app_state();
    part_map(&state, Uuid::new_v4(), Uuid::new_v4()).await;
}

#[test]
fn clear_flushed_dirty_ids_respects_newer_versions() {
    let map_id = Uuid::new_v4();
    let mut live = crate::state::MapLive::new(map_id, Uuid::new_v4());

    let mut stale = test_helpers::dummy_token();
    stale.map_id = map_id;
    let mut fresh = test_helpers::dummy_token();
    fresh.map_id = map_id;

    live.dirty.insert(stale.id);
    live.dirty.insert(fresh.id);

    // `fresh` was edited again (version 2) after the flush snapshot (version 1).
    let snapshot = vec![(stale.id, stale.version), (fresh.id, fresh.version)];
    fresh.version += 1;
    live.tokens.insert(stale.id, stale.clone());
    live.tokens.insert(fresh.id, fresh.clone());

    clear_flushed_dirty_ids(&mut live, &snapshot);

    assert!(!live.dirty.contains(&stale.id));
    assert!(live.dirty.contains(&fresh.id));
}

#[tokio::test]
#[ignore = "join_map hits Postgres for hydration"]
async fn join_map_hydrates_from_database() {
    let state = test_helpers::test_app_state();
    let (tx, _rx) = mpsc::channel::<Frame>(8);
    let _ = join_map(&state, Uuid::new_v4(), Uuid::new_v4(), tx).await;
}
