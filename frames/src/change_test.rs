use uuid::Uuid;

use super::*;

#[test]
fn frame_round_trip() {
    let map_id = Uuid::new_v4();
    let token_id = Uuid::new_v4();
    let event = ChangeEvent::new(
        Table::Tokens,
        ChangeOp::Update,
        serde_json::json!({"id": token_id, "x": 150.0, "y": 200.0}),
    );

    let frame = event.clone().into_frame(map_id);
    assert_eq!(frame.syscall, "change:event");
    assert_eq!(frame.map_id, Some(map_id));

    let restored = ChangeEvent::from_frame(&frame).expect("parse back");
    assert_eq!(restored.table, Table::Tokens);
    assert_eq!(restored.op, ChangeOp::Update);
    assert_eq!(restored.row_id(), Some(token_id));
}

#[test]
fn from_frame_rejects_other_syscalls() {
    let frame = crate::Frame::request("token:move", crate::Data::new());
    assert!(ChangeEvent::from_frame(&frame).is_none());
}

#[test]
fn row_id_absent_when_missing() {
    let event = ChangeEvent::new(Table::Fog, ChangeOp::Update, serde_json::json!({"revealed": true}));
    assert!(event.row_id().is_none());
}

#[test]
fn table_serde_names_are_snake_case() {
    let json = serde_json::to_string(&Table::CombatParticipants).unwrap();
    assert_eq!(json, "\"combat_participants\"");
    let json = serde_json::to_string(&ChangeOp::Delete).unwrap();
    assert_eq!(json, "\"delete\"");
}
