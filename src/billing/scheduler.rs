use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::time::{self, Duration as TokioDuration, MissedTickBehavior};
use tracing::{debug, info};

use crate::config;

use super::models::EntitlementCheck;
use super::service::SubscriptionService;

/// key: entitlement-verify-scheduler -> periodic reconciliation with the store
pub fn spawn(service: Arc<SubscriptionService>) {
    let interval = TokioDuration::from_secs(*config::ENTITLEMENT_VERIFY_INTERVAL_SECS);

    tokio::spawn(async move {
        let mut ticker = time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick fires immediately; startup already ran a pass.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            process_tick(&service, Utc::now()).await;
        }
    });
}

/// key: entitlement-verify-scheduler -> tick handler
///
/// Local expiry first so a lapsed pro is downgraded even when the store is
/// unreachable, then a full verification against the store.
pub async fn process_tick(service: &SubscriptionService, now: DateTime<Utc>) -> EntitlementCheck {
    if service.check_expiration_at(now).await {
        info!("downgraded lapsed entitlement during scheduled sweep");
    }
    let check = service.verify_entitlements().await;
    debug!(
        tier = service.effective_tier(now).as_str(),
        active = check.is_pro_active(),
        "scheduled entitlement verification finished"
    );
    check
}
