pub mod adapters;
pub mod api;
pub mod bridge;
pub mod models;
pub mod reconciliation;
pub mod scheduler;
pub mod service;
pub mod snapshot;

#[cfg(test)]
pub(crate) mod testing;

pub use adapters::{fallback_products, StoreAdapter, StoreAdapterConfig};
pub use api::{
    check_expiration as billing_check_expiration, close_prompt as billing_close_prompt,
    get_subscription as billing_get_subscription, list_products as billing_list_products,
    manage as billing_manage, open_prompt as billing_open_prompt, purchase as billing_purchase,
    restore as billing_restore, stream_subscription as billing_stream_subscription,
    subscription_update_event as billing_subscription_update_event, verify as billing_verify,
    ExpirationOutcome, PromptRequest, PurchaseOutcome, RestoreOutcome, VerifyOutcome,
};
pub use bridge::{
    BridgeError, EntitlementsResponse, HttpBillingBridge, InitializeResponse, NativeBillingBridge,
    PurchaseResponse,
};
pub use models::{
    Entitlement, EntitlementCheck, PurchaseReceipt, PurchaseResult, RestoreResult,
    RestoredTransaction, StoreProduct, SubscriptionUpdate, SubscriptionView, Tier,
    UpgradePromptState, PRO_ANNUAL_PRODUCT_ID,
};
pub use reconciliation::{start_reconciliation_worker, ReconciliationHandle, ReconciliationJob};
pub use scheduler::{process_tick as run_entitlement_tick, spawn as spawn_entitlement_scheduler};
pub use service::{select_restorable, SubscriptionError, SubscriptionService};
pub use snapshot::{FileSnapshotStore, MemorySnapshotStore, SnapshotError, SnapshotStore};
