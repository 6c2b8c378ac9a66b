use crate::*;

use packcast_core::config::PackcastConfig;
use packcast_core::PackHash;
use packcast_services::{ApplyError, PackManager, SkipReason, TomlDocument, DELIVERY_DELAY};

async fn setup() -> (PackServer, PackManager, Arc<RecordingHost>) {
    let server = PackServer::start().await.unwrap();
    let host = RecordingHost::shared();
    let config = PackcastConfig {
        resolver: test_resolver_settings(),
        ..PackcastConfig::default()
    };
    let manager = PackManager::from_config(
        &config,
        host.clone(),
        Arc::new(TomlDocument::in_memory()),
    )
    .unwrap();
    manager.register_pack("lobby", &server.url("/lobby.zip")).await.unwrap().unwrap();
    manager.register_pack("arena", &server.url("/arena.zip")).await.unwrap().unwrap();
    (server, manager, host)
}

#[tokio::test]
async fn test_apply_pushes_registered_pack() {
    let (server, manager, host) = setup().await;
    let clients = vec![ClientId::random(), ClientId::random()];

    let handle = manager.apply_to(clients.clone(), "lobby", true).unwrap();
    assert_eq!(handle.pack(), "lobby");
    assert_eq!(handle.targets(), clients.as_slice());
    let report = handle.outcome().await;

    assert!(report.is_clean());
    assert_eq!(report.pushed, clients);
    let expected_hex = PackHash::of(&server.lobby).to_hex();
    for client in &clients {
        let pushes = host.pushes_to(client);
        assert_eq!(pushes.len(), 1);
        assert_eq!(pushes[0].url, server.url("/lobby.zip"));
        assert_eq!(pushes[0].hash_hex, expected_hex);
    }
}

#[tokio::test]
async fn test_apply_is_not_immediate() {
    let (_server, manager, host) = setup().await;
    let client = ClientId::random();

    let handle = manager.apply_to(vec![client], "lobby", true).unwrap();
    assert!(host.pushes_to(&client).is_empty());

    tokio::time::sleep(DELIVERY_DELAY * 4).await;
    assert_eq!(host.pushes_to(&client).len(), 1);
    assert_eq!(handle.outcome().await.pushed, vec![client]);
}

#[tokio::test]
async fn test_repeat_apply_does_not_nag() {
    let (_server, manager, host) = setup().await;
    let client = ClientId::random();

    manager.apply_to(vec![client], "lobby", true).unwrap().outcome().await;
    let report = manager.apply_to(vec![client], "lobby", true).unwrap().outcome().await;

    assert_eq!(report.skipped, vec![(client, SkipReason::AlreadyOffered)]);
    assert_eq!(host.pushes_to(&client).len(), 1);
}

#[tokio::test]
async fn test_switching_packs_pushes_again() {
    let (server, manager, host) = setup().await;
    let client = ClientId::random();

    manager.apply_to(vec![client], "lobby", true).unwrap().outcome().await;
    manager.apply_to(vec![client], "arena", true).unwrap().outcome().await;

    let pushes = host.pushes_to(&client);
    assert_eq!(pushes.len(), 2);
    assert_eq!(pushes[1].url, server.url("/arena.zip"));
    assert_eq!(
        manager.scheduler().state().get_session(&client).last_offered,
        Some(PackHash::of(&server.arena))
    );
}

#[tokio::test]
async fn test_apply_if_absent_skips_holders() {
    let (server, manager, host) = setup().await;
    let holder = ClientId::random();
    let fresh = ClientId::random();
    host.holding.lock().insert(holder);

    let report = manager
        .apply_to(vec![holder, fresh], "lobby", false)
        .unwrap()
        .outcome()
        .await;

    assert_eq!(report.pushed, vec![fresh]);
    assert_eq!(report.skipped, vec![(holder, SkipReason::HasPack)]);
    assert!(host.pushes_to(&holder).is_empty());
    assert_eq!(
        manager.scheduler().state().get_session(&holder).last_offered,
        Some(PackHash::of(&server.lobby))
    );
}

#[tokio::test]
async fn test_declined_client_is_not_pushed_on_apply() {
    let (_server, manager, host) = setup().await;
    let client = ClientId::random();
    host.declined.lock().insert(client);

    let report = manager.apply_to(vec![client], "lobby", true).unwrap().outcome().await;
    assert_eq!(report.skipped, vec![(client, SkipReason::Declined)]);
    assert!(host.pushes_to(&client).is_empty());
}

#[tokio::test]
async fn test_apply_refusals() {
    let (_server, manager, _host) = setup().await;
    assert!(matches!(
        manager.apply_to(vec![ClientId::random()], "missing", true),
        Err(ApplyError::NotRegistered(_))
    ));
    assert!(matches!(
        manager.apply_to(Vec::new(), "lobby", true),
        Err(ApplyError::NoTargets)
    ));
}

// ── Connect ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_connect_redelivers_to_declined_client() {
    let (server, manager, host) = setup().await;
    manager.set_default_pack(Some("lobby")).unwrap();

    let client = ClientId::random();
    host.declined.lock().insert(client);

    let report = manager.on_client_connect(client).unwrap().outcome().await;
    assert_eq!(report.pushed, vec![client]);
    assert_eq!(host.pushes_to(&client)[0].url, server.url("/lobby.zip"));
}

#[tokio::test]
async fn test_connect_leaves_accepting_client_alone() {
    let (server, manager, host) = setup().await;
    manager.set_default_pack(Some("lobby")).unwrap();

    let client = ClientId::random();
    let report = manager.on_client_connect(client).unwrap().outcome().await;

    assert_eq!(report.skipped, vec![(client, SkipReason::NotDeclined)]);
    assert!(host.pushes_to(&client).is_empty());
    assert_eq!(
        manager.scheduler().state().get_session(&client).last_offered,
        Some(PackHash::of(&server.lobby))
    );
}

#[tokio::test]
async fn test_connect_then_apply_default_is_skipped() {
    let (_server, manager, host) = setup().await;
    manager.set_default_pack(Some("lobby")).unwrap();

    let client = ClientId::random();
    manager.on_client_connect(client).unwrap().outcome().await;
    let report = manager.apply_to(vec![client], "lobby", true).unwrap().outcome().await;

    assert_eq!(report.skipped, vec![(client, SkipReason::AlreadyOffered)]);
    assert!(host.pushes_to(&client).is_empty());
}

#[tokio::test]
async fn test_cleared_default_resets_session() {
    let (_server, manager, host) = setup().await;
    let client = ClientId::random();
    manager.apply_to(vec![client], "lobby", true).unwrap().outcome().await;

    manager.set_default_pack(None).unwrap();
    assert!(manager.on_client_connect(client).is_none());
    assert!(manager
        .scheduler()
        .state()
        .get_session(&client)
        .last_offered
        .is_none());

    // With the session reset, the same pack is offered again.
    let report = manager.apply_to(vec![client], "lobby", true).unwrap().outcome().await;
    assert_eq!(report.pushed, vec![client]);
    assert_eq!(host.pushes_to(&client).len(), 2);
}
