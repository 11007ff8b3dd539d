use fleet_telemetry_backbone::stream::ClientRegistry;
use std::collections::HashSet;
use std::sync::Arc;

fn filter(keys: &[&str]) -> Option<HashSet<String>> {
    Some(keys.iter().map(|k| k.to_string()).collect())
}

/// Drive a registry through a realistic session: clients with mixed filters
/// come and go while broadcast rounds keep flowing.
#[tokio::test]
async fn test_fanout_session_with_mixed_filters() {
    let registry = ClientRegistry::new(16);

    let (dashboard_id, mut dashboard_rx) = registry.register(None);
    let (vin1_id, mut vin1_rx) = registry.register(filter(&["VIN1"]));
    let (pair_id, mut pair_rx) = registry.register(filter(&["VIN1", "VIN2"]));
    assert_eq!(registry.len(), 3);

    // Round one: frames for three vehicles
    for vin in ["VIN1", "VIN2", "VIN3"] {
        registry.broadcast("fleet.telemetry", vin, Arc::from(vin));
    }

    assert_eq!(&*dashboard_rx.recv().await.unwrap(), "VIN1");
    assert_eq!(&*dashboard_rx.recv().await.unwrap(), "VIN2");
    assert_eq!(&*dashboard_rx.recv().await.unwrap(), "VIN3");

    assert_eq!(&*vin1_rx.recv().await.unwrap(), "VIN1");
    assert!(vin1_rx.try_recv().is_err());

    assert_eq!(&*pair_rx.recv().await.unwrap(), "VIN1");
    assert_eq!(&*pair_rx.recv().await.unwrap(), "VIN2");
    assert!(pair_rx.try_recv().is_err());

    // The single-vehicle client disconnects mid-session
    drop(vin1_rx);
    registry.remove(&vin1_id);
    assert_eq!(registry.len(), 2);

    // Round two: only the survivors are delivery candidates
    let delivered = registry.broadcast("fleet.telemetry", "VIN1", Arc::from("after"));
    assert_eq!(delivered, 2);
    assert_eq!(&*dashboard_rx.recv().await.unwrap(), "after");
    assert_eq!(&*pair_rx.recv().await.unwrap(), "after");

    registry.remove(&dashboard_id);
    registry.remove(&pair_id);
    assert!(registry.is_empty());
}

#[tokio::test]
async fn test_removing_unknown_client_is_harmless() {
    let registry = ClientRegistry::new(4);
    let (id, _rx) = registry.register(None);

    registry.remove(&uuid::Uuid::new_v4());
    assert_eq!(registry.len(), 1);

    // Removing twice must not underflow anything
    registry.remove(&id);
    registry.remove(&id);
    assert!(registry.is_empty());
}

#[tokio::test]
async fn test_saturated_client_never_stalls_the_session() {
    let registry = ClientRegistry::new(1);
    let (_stalled_id, _stalled_rx) = registry.register(None);
    let (_live_id, mut live_rx) = registry.register(None);

    // Frame 0 fills the stalled client's single-slot sink; every later frame
    // is dropped for it but must still reach the live client immediately
    for i in 0..5 {
        registry.broadcast("fleet.telemetry", "VIN1", Arc::from(i.to_string().as_str()));
    }

    for i in 0..5u32 {
        assert_eq!(&*live_rx.recv().await.unwrap(), i.to_string().as_str());
    }
    assert!(live_rx.try_recv().is_err());
}

#[tokio::test]
async fn test_broadcast_with_no_clients_delivers_nothing() {
    let registry = ClientRegistry::new(4);
    assert_eq!(
        registry.broadcast("fleet.telemetry", "VIN1", Arc::from("frame")),
        0
    );
}
