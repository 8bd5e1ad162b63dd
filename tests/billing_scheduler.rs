use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use orbit_entitlements::billing::{
    scheduler, Entitlement, EntitlementCheck, HttpBillingBridge, MemorySnapshotStore,
    StoreAdapter, StoreAdapterConfig, SubscriptionService, Tier,
};
use orbit_entitlements::Platform;
use httpmock::prelude::*;
use serde_json::json;

fn config(platform: Platform) -> StoreAdapterConfig {
    StoreAdapterConfig {
        platform,
        bridge_timeout: StdDuration::from_secs(2),
        simulated_purchase_delay: StdDuration::ZERO,
        simulated_restore_delay: StdDuration::ZERO,
    }
}

// key: entitlement-scheduler-tests -> expiry sweep and store reconciliation
#[tokio::test]
async fn tick_downgrades_lapsed_pro_on_simulated_store() {
    let now = Utc::now();
    let lapsed = Entitlement::pro(
        Some(now - Duration::days(400)),
        Some(now - Duration::days(35)),
        Some("web_txn_0123456789ab".to_string()),
    );
    let snapshots = Arc::new(MemorySnapshotStore::with_entitlement(lapsed));
    let store = Arc::new(StoreAdapter::simulated(config(Platform::Web)));
    let service = SubscriptionService::load(store, snapshots.clone()).await;

    let check = scheduler::process_tick(&service, now).await;
    assert_eq!(check, EntitlementCheck::Inactive);
    assert_eq!(service.entitlement(), Entitlement::free());
    assert_eq!(snapshots.stored().await, Some(Entitlement::free()));
}

#[tokio::test]
async fn tick_keeps_valid_pro_when_store_is_unreachable() {
    let server = MockServer::start_async().await;
    let outage = server
        .mock_async(|when, then| {
            when.method(POST).path("/checkEntitlements");
            then.status(503)
                .json_body(json!({"code": "UNAVAILABLE", "message": "store offline"}));
        })
        .await;

    let now = Utc::now();
    let valid = Entitlement::pro(
        Some(now - Duration::days(10)),
        Some(now + Duration::days(355)),
        Some("t1".to_string()),
    );
    let snapshots = Arc::new(MemorySnapshotStore::with_entitlement(valid.clone()));
    let bridge = HttpBillingBridge::new(&server.base_url()).unwrap();
    let store = Arc::new(StoreAdapter::new(Some(Arc::new(bridge)), config(Platform::Ios)));
    let service = SubscriptionService::load(store, snapshots.clone()).await;

    let check = scheduler::process_tick(&service, now).await;
    outage.assert_async().await;
    assert!(matches!(check, EntitlementCheck::Unknown { .. }));
    assert_eq!(service.entitlement(), valid);
    assert_eq!(service.effective_tier(now), Tier::Pro);
    assert_eq!(snapshots.save_count().await, 0);
}

#[tokio::test]
async fn tick_applies_renewal_reported_by_store() {
    let server = MockServer::start_async().await;
    let renewed_until = Utc::now() + Duration::days(365);
    server
        .mock_async(|when, then| {
            when.method(POST).path("/checkEntitlements");
            then.status(200).json_body(json!({
                "isProActive": true,
                "expiresDate": renewed_until.timestamp_millis(),
                "transactionId": "renewal-2"
            }));
        })
        .await;

    let now = Utc::now();
    let expiring = Entitlement::pro(
        Some(now - Duration::days(360)),
        Some(now + Duration::days(5)),
        Some("t1".to_string()),
    );
    let snapshots = Arc::new(MemorySnapshotStore::with_entitlement(expiring.clone()));
    let bridge = HttpBillingBridge::new(&server.base_url()).unwrap();
    let store = Arc::new(StoreAdapter::new(Some(Arc::new(bridge)), config(Platform::Android)));
    let service = SubscriptionService::load(store, snapshots).await;

    assert!(scheduler::process_tick(&service, now).await.is_pro_active());
    let entitlement = service.entitlement();
    assert_eq!(entitlement.tier, Tier::Pro);
    assert_eq!(entitlement.subscribed_at, expiring.subscribed_at);
    assert_eq!(entitlement.transaction_id.as_deref(), Some("renewal-2"));
    assert_eq!(
        entitlement.expires_at.map(|at| at.timestamp_millis()),
        Some(renewed_until.timestamp_millis())
    );
}
