use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use tokio::time;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config;
use crate::platform::Platform;

use super::bridge::{BridgeError, NativeBillingBridge};
use super::models::{
    EntitlementCheck, PurchaseReceipt, PurchaseResult, RestoreResult, StoreProduct,
    KNOWN_PRODUCT_IDS, NO_SUBSCRIPTION_MESSAGE, PRO_ANNUAL_PRODUCT_ID, PURCHASE_FAILED_MESSAGE,
    RESTORE_FAILED_MESSAGE,
};

/// key: store-adapter-config -> timeouts and simulated latency
#[derive(Debug, Clone)]
pub struct StoreAdapterConfig {
    pub platform: Platform,
    pub bridge_timeout: Duration,
    pub simulated_purchase_delay: Duration,
    pub simulated_restore_delay: Duration,
}

impl Default for StoreAdapterConfig {
    fn default() -> Self {
        Self {
            platform: Platform::Web,
            bridge_timeout: Duration::from_secs(30),
            simulated_purchase_delay: Duration::from_millis(1500),
            simulated_restore_delay: Duration::from_millis(1200),
        }
    }
}

impl StoreAdapterConfig {
    pub fn from_env() -> Self {
        Self {
            platform: *config::ORBIT_PLATFORM,
            bridge_timeout: Duration::from_secs(*config::BILLING_BRIDGE_TIMEOUT_SECS),
            simulated_purchase_delay: Duration::from_millis(
                *config::BILLING_SIMULATED_PURCHASE_DELAY_MS,
            ),
            simulated_restore_delay: Duration::from_millis(
                *config::BILLING_SIMULATED_RESTORE_DELAY_MS,
            ),
        }
    }
}

/// key: store-adapter -> platform-neutral store contract
///
/// Wraps the native bridge so that no bridge failure ever escapes as an error:
/// every operation resolves to a typed result. Without a bridge the adapter
/// runs a simulated store that can sell but never restore.
pub struct StoreAdapter {
    bridge: Option<Arc<dyn NativeBillingBridge>>,
    config: StoreAdapterConfig,
}

impl StoreAdapter {
    pub fn new(bridge: Option<Arc<dyn NativeBillingBridge>>, config: StoreAdapterConfig) -> Self {
        Self { bridge, config }
    }

    pub fn simulated(config: StoreAdapterConfig) -> Self {
        Self::new(None, config)
    }

    pub fn platform(&self) -> Platform {
        self.config.platform
    }

    pub fn has_native_bridge(&self) -> bool {
        self.bridge.is_some()
    }

    async fn guarded<T, F>(&self, method: &'static str, call: F) -> Result<T, BridgeError>
    where
        F: Future<Output = Result<T, BridgeError>>,
    {
        let after = self.config.bridge_timeout;
        match time::timeout(after, call).await {
            Ok(result) => result,
            Err(_) => Err(BridgeError::Timeout { method, after }),
        }
    }

    /// Preloads product metadata. Best-effort: failures are only logged.
    pub async fn initialize(&self) {
        let store = self.config.platform.store_label();
        let Some(bridge) = &self.bridge else {
            info!(store, "no native billing bridge; using simulated purchases");
            return;
        };
        match self
            .guarded("initialize", bridge.initialize(&known_product_ids()))
            .await
        {
            Ok(response) => info!(
                store,
                product_count = response.product_count,
                "native store initialized"
            ),
            Err(err) => warn!(?err, store, "native store initialization failed; will retry on purchase"),
        }
    }

    /// Product metadata for display. Falls back to fixed pricing so the paywall
    /// always has something to render.
    pub async fn get_products(&self) -> Vec<StoreProduct> {
        let Some(bridge) = &self.bridge else {
            return fallback_products();
        };
        match self
            .guarded("getProducts", bridge.get_products(&known_product_ids()))
            .await
        {
            Ok(products) if !products.is_empty() => products,
            Ok(_) => {
                warn!("native store returned no products; using fallback pricing");
                fallback_products()
            }
            Err(err) => {
                warn!(?err, "failed to fetch store products; using fallback pricing");
                fallback_products()
            }
        }
    }

    pub async fn purchase(&self, product_id: &str) -> PurchaseResult {
        let Some(bridge) = &self.bridge else {
            return self.simulate_purchase(product_id).await;
        };
        match self.guarded("purchase", bridge.purchase(product_id)).await {
            Ok(response) => {
                info!(
                    product_id = response.product_id.as_deref().unwrap_or(product_id),
                    transaction_id = response.transaction_id.as_deref().unwrap_or(""),
                    "purchase completed"
                );
                PurchaseResult::Completed(PurchaseReceipt {
                    transaction_id: response.transaction_id,
                    product_id: response.product_id,
                    purchase_date: response.purchase_date,
                    expires_date: response.expires_date,
                })
            }
            Err(BridgeError::UserCancelled) => {
                info!(%product_id, "purchase cancelled by user");
                PurchaseResult::Cancelled
            }
            Err(BridgeError::Pending) => {
                info!(%product_id, "purchase awaiting external approval");
                PurchaseResult::Pending
            }
            Err(err) => {
                warn!(?err, %product_id, "purchase failed");
                PurchaseResult::Failed {
                    error: err
                        .store_message()
                        .unwrap_or(PURCHASE_FAILED_MESSAGE)
                        .to_string(),
                }
            }
        }
    }

    pub async fn restore(&self) -> RestoreResult {
        let Some(bridge) = &self.bridge else {
            time::sleep(self.config.simulated_restore_delay).await;
            return RestoreResult {
                success: false,
                transactions: Vec::new(),
                error: Some(NO_SUBSCRIPTION_MESSAGE.to_string()),
            };
        };
        match self
            .guarded("restorePurchases", bridge.restore_purchases())
            .await
        {
            Ok(transactions) => {
                debug!(count = transactions.len(), "store returned transaction history");
                RestoreResult {
                    success: !transactions.is_empty(),
                    transactions,
                    error: None,
                }
            }
            Err(err) => {
                warn!(?err, "restore purchases failed");
                RestoreResult {
                    success: false,
                    transactions: Vec::new(),
                    error: Some(
                        err.store_message()
                            .unwrap_or(RESTORE_FAILED_MESSAGE)
                            .to_string(),
                    ),
                }
            }
        }
    }

    /// Asks the store which entitlements are currently valid. A call that
    /// could not complete yields `Unknown`, never `Active`.
    pub async fn check_entitlements(&self) -> EntitlementCheck {
        let Some(bridge) = &self.bridge else {
            return EntitlementCheck::Inactive;
        };
        match self
            .guarded("checkEntitlements", bridge.check_entitlements())
            .await
        {
            Ok(response) if response.is_pro_active => EntitlementCheck::Active {
                expires_at: response.expires_date,
                transaction_id: response.transaction_id,
            },
            Ok(_) => EntitlementCheck::Inactive,
            Err(err) => {
                warn!(?err, "entitlement check failed");
                EntitlementCheck::Unknown {
                    reason: err.to_string(),
                }
            }
        }
    }

    /// Fire-and-forget request to show the platform subscription page.
    pub fn open_management_ui(&self) {
        let platform = self.config.platform;
        let (Some(bridge), Some(url)) = (self.bridge.clone(), platform.management_url()) else {
            info!(%platform, "platform has no subscription management page");
            return;
        };
        let after = self.config.bridge_timeout;
        tokio::spawn(async move {
            match time::timeout(after, bridge.open_subscription_management(url)).await {
                Ok(Ok(())) => debug!(%platform, url, "opened subscription management"),
                Ok(Err(err)) => warn!(?err, %platform, "failed to open subscription management"),
                Err(_) => warn!(%platform, "opening subscription management timed out"),
            }
        });
    }

    async fn simulate_purchase(&self, product_id: &str) -> PurchaseResult {
        time::sleep(self.config.simulated_purchase_delay).await;
        let now = Utc::now();
        let transaction_id = format!("web_txn_{}", &Uuid::new_v4().simple().to_string()[..12]);
        info!(%product_id, %transaction_id, "simulated purchase completed");
        PurchaseResult::Completed(PurchaseReceipt {
            transaction_id: Some(transaction_id),
            product_id: Some(product_id.to_string()),
            purchase_date: Some(now),
            expires_date: Some(now + ChronoDuration::days(365)),
        })
    }
}

fn known_product_ids() -> Vec<String> {
    KNOWN_PRODUCT_IDS.iter().map(|id| id.to_string()).collect()
}

/// key: store-fallback-pricing -> one entry per known product
pub fn fallback_products() -> Vec<StoreProduct> {
    KNOWN_PRODUCT_IDS
        .iter()
        .map(|id| match *id {
            PRO_ANNUAL_PRODUCT_ID => StoreProduct {
                id: PRO_ANNUAL_PRODUCT_ID.to_string(),
                title: "Central Orbit Pro".to_string(),
                description: "Unlimited workspaces, tools, and premium features".to_string(),
                price: "$29.99".to_string(),
                price_amount: 29.99,
                currency: "USD".to_string(),
                period: Some("1 year".to_string()),
            },
            other => StoreProduct {
                id: other.to_string(),
                title: other.to_string(),
                description: String::new(),
                price: String::new(),
                price_amount: 0.0,
                currency: "USD".to_string(),
                period: None,
            },
        })
        .collect()
}
