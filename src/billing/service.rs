use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::{watch, Mutex as AsyncMutex};
use tracing::{debug, error, info, warn};

use crate::usage::{PromptReason, UpgradePrompt};

use super::adapters::StoreAdapter;
use super::models::{
    Entitlement, EntitlementCheck, PurchaseResult, RestoredTransaction, StoreProduct,
    SubscriptionUpdate, SubscriptionView, Tier, UpgradePromptState, NO_SUBSCRIPTION_MESSAGE,
    PRO_ANNUAL_PRODUCT_ID,
};
use super::snapshot::SnapshotStore;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SubscriptionError {
    #[error("a purchase or restore is already in progress")]
    PurchaseInFlight,
}

#[derive(Debug, Clone, Default)]
struct RuntimeState {
    entitlement: Entitlement,
    is_purchasing: bool,
    purchase_error: Option<String>,
    purchase_pending: bool,
    store_products: Vec<StoreProduct>,
    is_loading_products: bool,
    prompt: UpgradePromptState,
}

impl RuntimeState {
    fn view(&self, now: DateTime<Utc>) -> SubscriptionView {
        SubscriptionView {
            entitlement: self.entitlement.clone(),
            effective_tier: self.entitlement.effective_tier(now),
            is_purchasing: self.is_purchasing,
            purchase_error: self.purchase_error.clone(),
            purchase_pending: self.purchase_pending,
            store_products: self.store_products.clone(),
            is_loading_products: self.is_loading_products,
            upgrade_prompt: self.prompt.clone(),
        }
    }

    fn close_prompt(&mut self) {
        self.prompt = UpgradePromptState::default();
        self.purchase_error = None;
        self.purchase_pending = false;
    }
}

/// key: entitlement-state-machine -> subscription lifecycle
///
/// Owns the entitlement of this install. Every entitlement write runs through
/// `commit`, which holds the writer lock across "read, compute next, persist,
/// publish" so purchase, restore, verification and store events never
/// interleave partial updates. Bridge calls happen outside the lock.
pub struct SubscriptionService {
    store: Arc<StoreAdapter>,
    snapshots: Arc<dyn SnapshotStore>,
    writer: AsyncMutex<()>,
    state: Mutex<RuntimeState>,
    updates: watch::Sender<SubscriptionView>,
}

impl SubscriptionService {
    /// Restores the persisted entitlement; a missing or unreadable snapshot starts free.
    pub async fn load(store: Arc<StoreAdapter>, snapshots: Arc<dyn SnapshotStore>) -> Self {
        let entitlement = match snapshots.load().await {
            Ok(Some(entitlement)) => {
                info!(tier = entitlement.tier.as_str(), "restored persisted entitlement");
                entitlement
            }
            Ok(None) => Entitlement::free(),
            Err(err) => {
                warn!(?err, "persisted entitlement unreadable; starting free");
                Entitlement::free()
            }
        };
        let state = RuntimeState {
            entitlement,
            ..RuntimeState::default()
        };
        let (updates, _) = watch::channel(state.view(Utc::now()));
        Self {
            store,
            snapshots,
            writer: AsyncMutex::new(()),
            state: Mutex::new(state),
            updates,
        }
    }

    pub fn store(&self) -> &StoreAdapter {
        &self.store
    }

    pub fn view(&self) -> SubscriptionView {
        self.lock_state().view(Utc::now())
    }

    pub fn entitlement(&self) -> Entitlement {
        self.lock_state().entitlement.clone()
    }

    pub fn effective_tier(&self, now: DateTime<Utc>) -> Tier {
        self.lock_state().entitlement.effective_tier(now)
    }

    /// Receives a fresh view after every state change.
    pub fn subscribe(&self) -> watch::Receiver<SubscriptionView> {
        self.updates.subscribe()
    }

    /// Store initialization, product load, then a reconciliation pass.
    pub async fn initialize_iap(&self) -> EntitlementCheck {
        self.update(|state| state.is_loading_products = true);
        self.store.initialize().await;
        let products = self.store.get_products().await;
        self.update(|state| {
            state.store_products = products;
            state.is_loading_products = false;
        });
        self.verify_entitlements().await
    }

    /// Cached products, fetched on first use.
    pub async fn products(&self) -> Vec<StoreProduct> {
        let cached = self.lock_state().store_products.clone();
        if !cached.is_empty() {
            return cached;
        }
        let products = self.store.get_products().await;
        self.update(|state| state.store_products = products.clone());
        products
    }

    pub async fn purchase_pro(&self) -> Result<PurchaseResult, SubscriptionError> {
        self.begin_purchase()?;
        let result = self.store.purchase(PRO_ANNUAL_PRODUCT_ID).await;
        let now = Utc::now();
        let outcome = result.clone();
        self.commit("purchase", move |state| {
            state.is_purchasing = false;
            match outcome {
                PurchaseResult::Completed(receipt) => {
                    state.entitlement = Entitlement::pro(
                        Some(receipt.purchase_date.unwrap_or(now)),
                        receipt.expires_date,
                        receipt.transaction_id,
                    );
                    state.close_prompt();
                }
                PurchaseResult::Pending => {
                    state.purchase_pending = true;
                    state.purchase_error = PurchaseResult::Pending.error_message();
                }
                other => state.purchase_error = other.error_message(),
            }
        })
        .await;
        Ok(result)
    }

    /// Adopts the most recent active pro transaction from the store's history.
    pub async fn restore_purchase(
        &self,
    ) -> Result<Option<RestoredTransaction>, SubscriptionError> {
        self.begin_purchase()?;
        let result = self.store.restore().await;
        let selected = if result.success {
            select_restorable(&result.transactions).cloned()
        } else {
            None
        };
        let adopted = selected.clone();
        let error = result.error;
        self.commit("restore", move |state| {
            state.is_purchasing = false;
            match adopted {
                Some(transaction) => {
                    state.entitlement = Entitlement::pro(
                        Some(transaction.purchase_date),
                        transaction.expires_date,
                        Some(transaction.transaction_id),
                    );
                    state.close_prompt();
                }
                None => {
                    state.purchase_error =
                        Some(error.unwrap_or_else(|| NO_SUBSCRIPTION_MESSAGE.to_string()));
                }
            }
        })
        .await;
        Ok(selected)
    }

    /// Local safety net: downgrades a pro entitlement whose expiry has passed.
    /// Returns whether a downgrade happened.
    pub async fn check_expiration_at(&self, now: DateTime<Utc>) -> bool {
        self.commit("expiration", move |state| {
            if state.entitlement.is_expired(now) {
                state.entitlement = Entitlement::free();
                true
            } else {
                false
            }
        })
        .await
    }

    pub async fn check_expiration(&self) -> bool {
        self.check_expiration_at(Utc::now()).await
    }

    /// Reconciles local state against the store. The store wins when it
    /// answers; when it cannot be reached only the local expiry check runs.
    pub async fn verify_entitlements(&self) -> EntitlementCheck {
        let check = self.store.check_entitlements().await;
        match &check {
            EntitlementCheck::Active {
                expires_at,
                transaction_id,
            } => {
                let expires_at = *expires_at;
                let transaction_id = transaction_id.clone();
                self.commit("verify", move |state| {
                    state.entitlement = Entitlement {
                        tier: Tier::Pro,
                        subscribed_at: state.entitlement.subscribed_at,
                        expires_at,
                        transaction_id,
                    };
                    // A purchase awaiting approval has now settled.
                    if state.purchase_pending {
                        state.close_prompt();
                    }
                })
                .await;
            }
            EntitlementCheck::Inactive => {
                self.commit("verify", |state| {
                    if state.entitlement.tier.is_pro() {
                        state.entitlement = Entitlement::free();
                    }
                })
                .await;
            }
            EntitlementCheck::Unknown { reason } => {
                warn!(%reason, "entitlement verification unavailable; checking local expiry");
                self.check_expiration().await;
            }
        }
        check
    }

    /// Renewals, revocations and refunds pushed by the store re-run verification.
    pub async fn apply_subscription_update(&self, update: &SubscriptionUpdate) -> EntitlementCheck {
        info!(
            transaction_id = %update.transaction_id,
            product_id = %update.product_id,
            is_revoked = update.is_revoked,
            "store reported subscription update"
        );
        self.verify_entitlements().await
    }

    pub fn manage_subscription(&self) {
        self.store.open_management_ui();
    }

    pub fn open_prompt(&self, trigger: Option<String>) {
        self.update(|state| {
            state.prompt = UpgradePromptState {
                open: true,
                trigger,
            };
            state.purchase_error = None;
            state.purchase_pending = false;
        });
    }

    /// Hides the prompt. An in-flight purchase keeps running.
    pub fn close_prompt(&self) {
        self.update(RuntimeState::close_prompt);
    }

    fn begin_purchase(&self) -> Result<(), SubscriptionError> {
        let view = {
            let mut state = self.lock_state();
            if state.is_purchasing {
                return Err(SubscriptionError::PurchaseInFlight);
            }
            state.is_purchasing = true;
            state.purchase_error = None;
            state.purchase_pending = false;
            state.view(Utc::now())
        };
        self.updates.send_replace(view);
        Ok(())
    }

    /// Single writer path for the entitlement.
    async fn commit<T, F>(&self, transition: &'static str, apply: F) -> T
    where
        F: FnOnce(&mut RuntimeState) -> T,
    {
        let _writer = self.writer.lock().await;
        let (output, before, after) = {
            let mut state = self.lock_state();
            let before = state.entitlement.clone();
            let output = apply(&mut state);
            (output, before, state.entitlement.clone())
        };

        if before != after {
            info!(
                transition,
                from = before.tier.as_str(),
                to = after.tier.as_str(),
                transaction_id = after.transaction_id.as_deref().unwrap_or(""),
                "entitlement updated"
            );
            if let Err(err) = self.snapshots.save(&after).await {
                error!(?err, transition, "failed to persist entitlement snapshot");
            }
        } else {
            debug!(transition, tier = after.tier.as_str(), "entitlement unchanged");
        }

        self.publish();
        output
    }

    fn update<F>(&self, apply: F)
    where
        F: FnOnce(&mut RuntimeState),
    {
        let view = {
            let mut state = self.lock_state();
            apply(&mut state);
            state.view(Utc::now())
        };
        self.updates.send_replace(view);
    }

    fn publish(&self) {
        let view = self.view();
        self.updates.send_replace(view);
    }

    fn lock_state(&self) -> MutexGuard<'_, RuntimeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl UpgradePrompt for SubscriptionService {
    fn open_upgrade_prompt(&self, reason: PromptReason) {
        self.open_prompt(Some(reason.as_str().to_string()));
    }
}

/// Most recent active transaction for the pro product. Equal purchase dates
/// fall back to the lexically greatest transaction id.
pub fn select_restorable(transactions: &[RestoredTransaction]) -> Option<&RestoredTransaction> {
    transactions
        .iter()
        .filter(|transaction| {
            transaction.is_active && transaction.product_id == PRO_ANNUAL_PRODUCT_ID
        })
        .max_by(|a, b| {
            a.purchase_date
                .cmp(&b.purchase_date)
                .then_with(|| a.transaction_id.cmp(&b.transaction_id))
        })
}
