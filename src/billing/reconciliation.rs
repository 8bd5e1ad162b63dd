use std::sync::Arc;

use anyhow::{anyhow, Result};
use tokio::sync::mpsc::{channel, Sender};
use tracing::{debug, info};

use super::models::{EntitlementCheck, SubscriptionUpdate};
use super::service::SubscriptionService;

/// key: entitlement-reconciliation -> background worker for store pushes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconciliationJob {
    /// Renewal, revocation or refund pushed by the native store.
    SubscriptionUpdate(SubscriptionUpdate),
    VerifyEntitlements,
    CheckExpiration,
}

/// key: entitlement-reconciliation-handle -> enqueue interface
#[derive(Clone)]
pub struct ReconciliationHandle {
    sender: Sender<ReconciliationJob>,
}

impl ReconciliationHandle {
    pub async fn dispatch(&self, job: ReconciliationJob) -> Result<()> {
        self.sender
            .send(job)
            .await
            .map_err(|err| anyhow!("failed to enqueue entitlement reconciliation job: {err}"))
    }
}

/// Jobs run one at a time, in arrival order.
pub fn start_reconciliation_worker(service: Arc<SubscriptionService>) -> ReconciliationHandle {
    let (tx, mut rx) = channel(64);
    tokio::spawn(async move {
        while let Some(job) = rx.recv().await {
            match job {
                ReconciliationJob::SubscriptionUpdate(update) => {
                    let check = service.apply_subscription_update(&update).await;
                    log_check("subscription_update", &check);
                }
                ReconciliationJob::VerifyEntitlements => {
                    let check = service.verify_entitlements().await;
                    log_check("verify", &check);
                }
                ReconciliationJob::CheckExpiration => {
                    if service.check_expiration().await {
                        info!("expired entitlement downgraded by reconciliation worker");
                    }
                }
            }
        }
        debug!("entitlement reconciliation worker stopped");
    });

    ReconciliationHandle { sender: tx }
}

fn log_check(job: &'static str, check: &EntitlementCheck) {
    match check {
        EntitlementCheck::Active { .. } => debug!(job, "store reports pro active"),
        EntitlementCheck::Inactive => debug!(job, "store reports no active entitlement"),
        EntitlementCheck::Unknown { reason } => {
            info!(job, %reason, "store unreachable; kept local entitlement")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::billing::adapters::{StoreAdapter, StoreAdapterConfig};
    use crate::billing::bridge::EntitlementsResponse;
    use crate::billing::models::{Entitlement, Tier, PRO_ANNUAL_PRODUCT_ID};
    use crate::billing::snapshot::MemorySnapshotStore;
    use crate::billing::testing::{Scripted, ScriptedBridge};
    use crate::platform::Platform;
    use std::time::Duration;

    #[tokio::test]
    async fn revocation_push_downgrades_through_worker() {
        let bridge = Arc::new(ScriptedBridge::default());
        bridge.set_entitlements(Scripted::Ok(EntitlementsResponse::default()));
        let store = Arc::new(StoreAdapter::new(
            Some(bridge.clone()),
            StoreAdapterConfig {
                platform: Platform::Ios,
                ..StoreAdapterConfig::default()
            },
        ));
        let snapshots = Arc::new(MemorySnapshotStore::with_entitlement(Entitlement::pro(
            None,
            None,
            Some("t1".to_string()),
        )));
        let service = Arc::new(SubscriptionService::load(store, snapshots).await);
        let mut updates = service.subscribe();

        let handle = start_reconciliation_worker(service.clone());
        handle
            .dispatch(ReconciliationJob::SubscriptionUpdate(SubscriptionUpdate {
                transaction_id: "t1".to_string(),
                product_id: PRO_ANNUAL_PRODUCT_ID.to_string(),
                is_revoked: true,
            }))
            .await
            .unwrap();

        tokio::time::timeout(Duration::from_secs(5), async {
            while updates.borrow().entitlement.tier != Tier::Free {
                updates.changed().await.unwrap();
            }
        })
        .await
        .unwrap();
        assert_eq!(service.entitlement(), Entitlement::free());
    }
}
