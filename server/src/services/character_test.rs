use super::*;

#[tokio::test]
async fn static_provider_returns_known_entry() {
    let id = Uuid::new_v4();
    let summary = CharacterSummary {
        name: "Shadowheart".into(),
        image_url: Some("portraits/shadowheart.png".into()),
        hp_current: 24,
        hp_max: 30,
    };
    let provider = StaticCharacterProvider::with([(id, summary.clone())]);

    let found = provider.summary(id).await.unwrap();
    assert_eq!(found, Some(summary));
}

#[tokio::test]
async fn static_provider_misses_return_none() {
    let provider = StaticCharacterProvider::default();
    let found = provider.summary(Uuid::new_v4()).await.unwrap();
    assert!(found.is_none());
}

#[test]
fn summary_serde_round_trip() {
    let summary = CharacterSummary {
        name: "Gale".into(),
        image_url: None,
        hp_current: 18,
        hp_max: 22,
    };
    let json = serde_json::to_string(&summary).unwrap();
    let restored: CharacterSummary = serde_json::from_str(&json).unwrap();
    assert_eq!(restored, summary);
}
