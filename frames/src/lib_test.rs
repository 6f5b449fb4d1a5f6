use super::*;

#[test]
fn request_sets_fields() {
    let frame = Frame::request("map:join", Data::new());
    assert_eq!(frame.syscall, "map:join");
    assert_eq!(frame.status, Status::Request);
    assert!(frame.parent_id.is_none());
    assert!(frame.map_id.is_none());
    assert!(frame.ts > 0);
}

#[test]
fn reply_inherits_context() {
    let map_id = Uuid::new_v4();
    let req = Frame::request("token:create", Data::new()).with_map_id(map_id);
    let item = req.item(Data::new());

    assert_eq!(item.parent_id, Some(req.id));
    assert_eq!(item.map_id, Some(map_id));
    assert_eq!(item.syscall, "token:create");
    assert_eq!(item.status, Status::Item);
}

#[test]
fn done_with_carries_payload() {
    let req = Frame::request("combat:next", Data::new());
    let done = req.done_with(Data::from([("round".into(), serde_json::json!(2))]));

    assert_eq!(done.status, Status::Done);
    assert_eq!(done.parent_id, Some(req.id));
    assert_eq!(done.data.get("round").and_then(serde_json::Value::as_i64), Some(2));
}

#[test]
fn done_is_terminal() {
    assert!(Status::Done.is_terminal());
    assert!(Status::Error.is_terminal());
    assert!(Status::Cancel.is_terminal());
    assert!(!Status::Request.is_terminal());
    assert!(!Status::Item.is_terminal());
}

#[test]
fn prefix_and_op_extraction() {
    let frame = Frame::request("token:move", Data::new());
    assert_eq!(frame.prefix(), "token");
    assert_eq!(frame.op(), "move");

    let frame = Frame::request("noseparator", Data::new());
    assert_eq!(frame.prefix(), "noseparator");
    assert_eq!(frame.op(), "");
}

#[test]
fn json_round_trip() {
    let map_id = Uuid::new_v4();
    let original = Frame::request("map:join", Data::new())
        .with_map_id(map_id)
        .with_from("test-user")
        .with_data("key", "value");

    let json = serde_json::to_string(&original).expect("serialize");
    let restored: Frame = serde_json::from_str(&json).expect("deserialize");

    assert_eq!(restored.id, original.id);
    assert_eq!(restored.map_id, Some(map_id));
    assert_eq!(restored.syscall, "map:join");
    assert_eq!(restored.from.as_deref(), Some("test-user"));
    assert_eq!(restored.data.get("key").and_then(|v| v.as_str()), Some("value"));
}

#[test]
fn error_from_typed() {
    #[derive(Debug, thiserror::Error)]
    #[error("not found")]
    struct NotFound;

    impl ErrorCode for NotFound {
        fn error_code(&self) -> &'static str {
            "E_NOT_FOUND"
        }
    }

    let req = Frame::request("token:update", Data::new());
    let err = req.error_from(&NotFound);

    assert_eq!(err.status, Status::Error);
    assert_eq!(err.data.get("code").and_then(|v| v.as_str()), Some("E_NOT_FOUND"));
    assert_eq!(err.data.get("message").and_then(|v| v.as_str()), Some("not found"));
    assert_eq!(
        err.data
            .get("retryable")
            .and_then(serde_json::Value::as_bool),
        Some(false)
    );
}
