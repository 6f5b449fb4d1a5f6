//! WebSocket handler — bidirectional frame relay and change feed.
//!
//! DESIGN
//! ======
//! On upgrade, generates a client ID and enters a `select!` loop:
//! - Incoming client frames → parse + dispatch by syscall prefix
//! - Broadcast frames from map peers → forward to client
//!
//! Handler functions are pure business logic — they validate, mutate state,
//! and return an `Outcome`. The dispatch layer owns all outbound concerns:
//! reply to sender and the change-event broadcast.
//!
//! Every committed row mutation is rebroadcast as a `change:event` frame to
//! ALL map clients including the originator; originators no-op on their own
//! echo because the payload equals their optimistic local state.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade → send `session:connected` with `client_id`
//! 2. Client sends frames → dispatch → handler returns Outcome
//! 3. Dispatch applies Outcome (reply / change broadcast / both)
//! 4. Close → broadcast `map:part` → cleanup

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::services;
use crate::state::AppState;
use frames::change::{ChangeEvent, ChangeOp, Table};
use frames::{Data, Frame};

// =============================================================================
// OUTCOME
// =============================================================================

/// Result returned by handler functions. The dispatch layer uses this to
/// decide who receives what — handlers never send frames directly.
enum Outcome {
    /// Reply done+data to sender AND broadcast a change event to every map
    /// client including the sender (idempotent echo, see module docs).
    ReplyAndChange { reply: Data, event: ChangeEvent },
    /// Reply to sender with one payload, notify peers with different data
    /// (presence: join/part).
    ReplyAndBroadcast { reply: Data, broadcast: Data },
    /// Send done+data to sender only.
    Reply(Data),
    /// Send empty done to sender only.
    Done,
}

// =============================================================================
// UPGRADE
// =============================================================================

pub async fn handle_ws(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| run_ws(socket, state))
}

// =============================================================================
// CONNECTION
// =============================================================================

async fn run_ws(mut socket: WebSocket, state: AppState) {
    let client_id = Uuid::new_v4();

    // Per-connection channel for receiving broadcast frames from peers.
    let (client_tx, mut client_rx) = mpsc::channel::<Frame>(256);

    let welcome =
        Frame::request("session:connected", Data::new()).with_data("client_id", client_id.to_string());
    if send_frame(&mut socket, &welcome).await.is_err() {
        return;
    }

    info!(%client_id, "ws: client connected");

    // Track which map this client has joined.
    let mut current_map: Option<Uuid> = None;

    loop {
        tokio::select! {
            msg = socket.recv() => {
                let Some(msg) = msg else { break };
                let Ok(msg) = msg else { break };
                match msg {
                    Message::Text(text) => {
                        let sender_frames =
                            process_inbound_text(&state, &mut current_map, client_id, &client_tx, &text).await;
                        for frame in sender_frames {
                            let _ = send_frame(&mut socket, &frame).await;
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            Some(frame) = client_rx.recv() => {
                if send_frame(&mut socket, &frame).await.is_err() {
                    break;
                }
            }
        }
    }

    // Broadcast map:part to peers BEFORE cleanup (part_map may evict state).
    if let Some(map_id) = current_map {
        let mut part_data = Data::new();
        part_data.insert("client_id".into(), serde_json::json!(client_id));
        let part_frame = Frame::request("map:part", part_data).with_map_id(map_id);
        services::map::broadcast(&state, map_id, &part_frame, Some(client_id)).await;

        services::map::part_map(&state, map_id, client_id).await;
    }
    info!(%client_id, "ws: client disconnected");
}

// =============================================================================
// FRAME DISPATCH
// =============================================================================

/// Parse and process one inbound text frame and return frames for the sender.
///
/// This keeps the websocket transport concerns separate from frame handling,
/// so tests can exercise dispatch and broadcast behavior end-to-end.
async fn process_inbound_text(
    state: &AppState,
    current_map: &mut Option<Uuid>,
    client_id: Uuid,
    client_tx: &mpsc::Sender<Frame>,
    text: &str,
) -> Vec<Frame> {
    let mut req: Frame = match serde_json::from_str(text) {
        Ok(r) => r,
        Err(e) => {
            warn!(%client_id, error = %e, "ws: invalid inbound frame");
            let err = Frame::request("gateway:error", Data::new())
                .with_data("message", format!("invalid json: {e}"));
            return vec![err];
        }
    };

    // Stamp the connection identity as `from`.
    req.from = Some(client_id.to_string());

    info!(%client_id, id = %req.id, syscall = %req.syscall, status = ?req.status, "ws: recv frame");

    // Dispatch to handler — returns Outcome or error Frame.
    let result = match req.prefix() {
        "map" => handle_map(state, current_map, client_id, client_tx, &req).await,
        "token" => handle_token(state, *current_map, &req).await,
        "fog" => handle_fog(state, *current_map, &req).await,
        "combat" => handle_combat(state, *current_map, &req).await,
        prefix => Err(req.error(format!("unknown prefix: {prefix}"))),
    };

    // Apply outcome — the dispatch layer owns all outbound logic.
    let map_id = *current_map;
    match result {
        Ok(Outcome::ReplyAndChange { reply, event }) => {
            let sender_frame = req.done_with(reply);
            if let Some(map_id) = map_id {
                let change_frame = event.into_frame(map_id);
                services::map::broadcast(state, map_id, &change_frame, None).await;
            }
            vec![sender_frame]
        }
        Ok(Outcome::ReplyAndBroadcast { reply, broadcast }) => {
            let sender_frame = req.done_with(reply);
            if let Some(map_id) = map_id {
                let notif = Frame::request(&req.syscall, broadcast).with_map_id(map_id);
                services::map::broadcast(state, map_id, &notif, Some(client_id)).await;
            }
            vec![sender_frame]
        }
        Ok(Outcome::Reply(data)) => {
            vec![req.done_with(data)]
        }
        Ok(Outcome::Done) => {
            vec![req.done()]
        }
        Err(err_frame) => {
            vec![err_frame]
        }
    }
}

// =============================================================================
// MAP HANDLERS
// =============================================================================

async fn handle_map(
    state: &AppState,
    current_map: &mut Option<Uuid>,
    client_id: Uuid,
    client_tx: &mpsc::Sender<Frame>,
    req: &Frame,
) -> Result<Outcome, Frame> {
    match req.op() {
        "join" => {
            let Some(map_id) = req.map_id.or_else(|| parse_uuid(&req.data, "map_id")) else {
                return Err(req.error("map_id required"));
            };

            // Part current map if already joined.
            if let Some(old_map) = current_map.take() {
                services::map::part_map(state, old_map, client_id).await;
            }

            match services::map::join_map(state, map_id, client_id, client_tx.clone()).await {
                Ok(snapshot) => {
                    *current_map = Some(map_id);

                    let mut reply = Data::new();
                    reply.insert(
                        "map".into(),
                        serde_json::json!({
                            "id": snapshot.map.id,
                            "campaign_id": snapshot.map.campaign_id,
                            "name": snapshot.map.name,
                            "width": snapshot.map.width,
                            "height": snapshot.map.height,
                            "grid_size": snapshot.map.grid_size,
                            "image_ref": snapshot.map.image_ref,
                        }),
                    );
                    reply.insert("tokens".into(), serde_json::to_value(&snapshot.tokens).unwrap_or_default());
                    reply.insert("fog".into(), serde_json::to_value(&snapshot.fog).unwrap_or_default());
                    reply.insert("encounter".into(), serde_json::to_value(&snapshot.encounter).unwrap_or_default());
                    reply.insert("participants".into(), serde_json::to_value(&snapshot.roster).unwrap_or_default());

                    let mut broadcast = Data::new();
                    broadcast.insert("client_id".into(), serde_json::json!(client_id));

                    Ok(Outcome::ReplyAndBroadcast { reply, broadcast })
                }
                Err(e) => Err(req.error_from(&e)),
            }
        }
        "part" => {
            let Some(map_id) = current_map.take() else {
                return Ok(Outcome::Done);
            };
            let mut broadcast = Data::new();
            broadcast.insert("client_id".into(), serde_json::json!(client_id));
            let notif = Frame::request("map:part", broadcast).with_map_id(map_id);
            services::map::broadcast(state, map_id, &notif, Some(client_id)).await;

            services::map::part_map(state, map_id, client_id).await;
            Ok(Outcome::Done)
        }
        op => Err(req.error(format!("unknown map op: {op}"))),
    }
}

// =============================================================================
// TOKEN HANDLERS
// =============================================================================

async fn handle_token(
    state: &AppState,
    current_map: Option<Uuid>,
    req: &Frame,
) -> Result<Outcome, Frame> {
    let Some(map_id) = current_map else {
        return Err(req.error("must join a map first"));
    };

    match req.op() {
        "create" => {
            let name = req.data.get("name").and_then(|v| v.as_str()).unwrap_or("Token");
            let x = req.data.get("x").and_then(serde_json::Value::as_f64).unwrap_or(0.0);
            let y = req.data.get("y").and_then(serde_json::Value::as_f64).unwrap_or(0.0);
            let size = req.data.get("size").and_then(|v| v.as_str()).unwrap_or("medium");
            let character_id = parse_uuid(&req.data, "character_id");

            match services::token::create_token(state, map_id, name, x, y, size, character_id).await {
                Ok(token) => {
                    let row = services::token::token_to_row(&token);
                    Ok(reply_and_change(row, Table::Tokens, ChangeOp::Insert))
                }
                Err(e) => Err(req.error_from(&e)),
            }
        }
        // `move` is a position-only `update`; both share LWW semantics.
        "update" | "move" => {
            let Some(token_id) = parse_uuid(&req.data, "id") else {
                return Err(req.error("id required"));
            };
            let version = req
                .data
                .get("version")
                .and_then(serde_json::Value::as_i64)
                .and_then(|v| i32::try_from(v).ok())
                .unwrap_or(0);

            match services::token::update_token(state, map_id, token_id, &req.data, version).await {
                Ok(token) => {
                    let row = services::token::token_to_row(&token);
                    Ok(reply_and_change(row, Table::Tokens, ChangeOp::Update))
                }
                Err(e) => Err(req.error_from(&e)),
            }
        }
        "delete" => {
            let Some(token_id) = parse_uuid(&req.data, "id") else {
                return Err(req.error("id required"));
            };

            match services::token::delete_token(state, map_id, token_id).await {
                Ok(()) => {
                    let row = serde_json::json!({"id": token_id});
                    Ok(reply_and_change(row, Table::Tokens, ChangeOp::Delete))
                }
                Err(e) => Err(req.error_from(&e)),
            }
        }
        op => Err(req.error(format!("unknown token op: {op}"))),
    }
}

// =============================================================================
// FOG HANDLERS
// =============================================================================

async fn handle_fog(
    state: &AppState,
    current_map: Option<Uuid>,
    req: &Frame,
) -> Result<Outcome, Frame> {
    let Some(map_id) = current_map else {
        return Err(req.error("must join a map first"));
    };

    let version = req
        .data
        .get("version")
        .and_then(serde_json::Value::as_i64)
        .and_then(|v| i32::try_from(v).ok())
        .unwrap_or(0);

    match req.op() {
        "commit" => {
            let shapes = req
                .data
                .get("shapes")
                .cloned()
                .unwrap_or_else(|| serde_json::json!([]));

            match services::fog::commit_shapes(state, map_id, shapes, version).await {
                Ok(fog) => {
                    let row = serde_json::to_value(&fog).unwrap_or_default();
                    Ok(reply_and_change(row, Table::Fog, ChangeOp::Update))
                }
                Err(e) => Err(req.error_from(&e)),
            }
        }
        "reveal" => {
            let revealed = req
                .data
                .get("revealed")
                .and_then(serde_json::Value::as_bool)
                .unwrap_or(true);

            match services::fog::set_revealed(state, map_id, revealed, version).await {
                Ok(fog) => {
                    let row = serde_json::to_value(&fog).unwrap_or_default();
                    Ok(reply_and_change(row, Table::Fog, ChangeOp::Update))
                }
                Err(e) => Err(req.error_from(&e)),
            }
        }
        op => Err(req.error(format!("unknown fog op: {op}"))),
    }
}

// =============================================================================
// COMBAT HANDLERS
// =============================================================================

async fn handle_combat(
    state: &AppState,
    current_map: Option<Uuid>,
    req: &Frame,
) -> Result<Outcome, Frame> {
    let Some(map_id) = current_map else {
        return Err(req.error("must join a map first"));
    };

    match req.op() {
        "start" => {
            let name = req
                .data
                .get("name")
                .and_then(|v| v.as_str())
                .unwrap_or("Encounter");
            match services::combat::start_encounter(state, map_id, name).await {
                Ok(encounter) => {
                    let row = serde_json::to_value(&encounter).unwrap_or_default();
                    Ok(reply_and_change(row, Table::CombatEncounters, ChangeOp::Insert))
                }
                Err(e) => Err(req.error_from(&e)),
            }
        }
        "end" => {
            let Some(encounter_id) = parse_uuid(&req.data, "encounter_id") else {
                return Err(req.error("encounter_id required"));
            };
            match services::combat::end_encounter(state, map_id, encounter_id).await {
                Ok(encounter) => {
                    let row = serde_json::to_value(&encounter).unwrap_or_default();
                    Ok(reply_and_change(row, Table::CombatEncounters, ChangeOp::Update))
                }
                Err(e) => Err(req.error_from(&e)),
            }
        }
        "add" => {
            let Some(encounter_id) = parse_uuid(&req.data, "encounter_id") else {
                return Err(req.error("encounter_id required"));
            };
            let Some(token_id) = parse_uuid(&req.data, "token_id") else {
                return Err(req.error("token_id required"));
            };
            let initiative = req
                .data
                .get("initiative_roll")
                .and_then(serde_json::Value::as_i64)
                .and_then(|v| i32::try_from(v).ok())
                .unwrap_or(0);
            let turn_order = req
                .data
                .get("turn_order")
                .and_then(serde_json::Value::as_i64)
                .and_then(|v| i32::try_from(v).ok());

            match services::combat::add_participant(&state.pool, encounter_id, token_id, initiative, turn_order).await {
                Ok(participant) => {
                    let row = serde_json::to_value(&participant).unwrap_or_default();
                    Ok(reply_and_change(row, Table::CombatParticipants, ChangeOp::Insert))
                }
                Err(e) => Err(req.error_from(&e)),
            }
        }
        "update" => {
            let Some(participant_id) = parse_uuid(&req.data, "participant_id") else {
                return Err(req.error("participant_id required"));
            };
            let initiative = req
                .data
                .get("initiative_roll")
                .and_then(serde_json::Value::as_i64)
                .and_then(|v| i32::try_from(v).ok());
            let conditions: Option<Vec<String>> = req
                .data
                .get("conditions")
                .and_then(|v| serde_json::from_value(v.clone()).ok());
            let notes = req
                .data
                .get("notes")
                .and_then(|v| v.as_str())
                .map(String::from);

            match services::combat::update_participant(&state.pool, participant_id, initiative, conditions, notes).await {
                Ok(participant) => {
                    let row = serde_json::to_value(&participant).unwrap_or_default();
                    Ok(reply_and_change(row, Table::CombatParticipants, ChangeOp::Update))
                }
                Err(e) => Err(req.error_from(&e)),
            }
        }
        "remove" => {
            let Some(participant_id) = parse_uuid(&req.data, "participant_id") else {
                return Err(req.error("participant_id required"));
            };
            match services::combat::remove_participant(&state.pool, participant_id).await {
                Ok(()) => {
                    let row = serde_json::json!({"id": participant_id});
                    Ok(reply_and_change(row, Table::CombatParticipants, ChangeOp::Delete))
                }
                Err(e) => Err(req.error_from(&e)),
            }
        }
        "next" | "prev" => {
            let Some(encounter_id) = parse_uuid(&req.data, "encounter_id") else {
                return Err(req.error("encounter_id required"));
            };
            let step = if req.op() == "next" {
                services::combat::TurnStep::Next
            } else {
                services::combat::TurnStep::Prev
            };

            match services::combat::step_turn(state, map_id, encounter_id, step).await {
                Ok((encounter, changed)) => {
                    let row = serde_json::to_value(&encounter).unwrap_or_default();
                    if changed {
                        Ok(reply_and_change(row, Table::CombatEncounters, ChangeOp::Update))
                    } else {
                        // Empty roster: no-op, nothing to broadcast.
                        let mut reply = Data::new();
                        reply.insert("encounter".into(), row);
                        Ok(Outcome::Reply(reply))
                    }
                }
                Err(e) => Err(req.error_from(&e)),
            }
        }
        "roster" => {
            let Some(encounter_id) = parse_uuid(&req.data, "encounter_id") else {
                return Err(req.error("encounter_id required"));
            };
            match services::combat::fetch_roster(&state.pool, state.characters.as_ref(), encounter_id).await {
                Ok(roster) => {
                    let mut reply = Data::new();
                    reply.insert("participants".into(), serde_json::to_value(&roster).unwrap_or_default());
                    Ok(Outcome::Reply(reply))
                }
                Err(e) => Err(req.error_from(&e)),
            }
        }
        op => Err(req.error(format!("unknown combat op: {op}"))),
    }
}

// =============================================================================
// HELPERS
// =============================================================================

/// Reply with the committed row and queue the matching change event.
fn reply_and_change(row: serde_json::Value, table: Table, op: ChangeOp) -> Outcome {
    let mut reply = Data::new();
    reply.insert("row".into(), row.clone());
    Outcome::ReplyAndChange { reply, event: ChangeEvent::new(table, op, row) }
}

fn parse_uuid(data: &Data, key: &str) -> Option<Uuid> {
    data.get(key).and_then(|v| v.as_str()).and_then(|s| s.parse().ok())
}

async fn send_frame(socket: &mut WebSocket, frame: &Frame) -> Result<(), ()> {
    let json = match serde_json::to_string(frame) {
        Ok(j) => j,
        Err(e) => {
            warn!(error = %e, "ws: failed to serialize frame");
            return Err(());
        }
    };
    if frame.status == frames::Status::Error {
        let code = frame.data.get("code").and_then(|v| v.as_str()).unwrap_or("-");
        let message = frame.data.get("message").and_then(|v| v.as_str()).unwrap_or("-");
        warn!(id = %frame.id, syscall = %frame.syscall, code, message, "ws: send frame status=Error");
    } else {
        info!(id = %frame.id, syscall = %frame.syscall, status = ?frame.status, "ws: send frame");
    }
    socket
        .send(Message::Text(json.into()))
        .await
        .map_err(|_| ())
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;
