use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The single recognized subscription product (annual plan).
pub const PRO_ANNUAL_PRODUCT_ID: &str = "com.centralorbit.pro.annual";

/// Every product id the store is asked about.
pub const KNOWN_PRODUCT_IDS: &[&str] = &[PRO_ANNUAL_PRODUCT_ID];

pub const PURCHASE_CANCELLED_MESSAGE: &str = "Purchase cancelled.";
pub const PURCHASE_PENDING_MESSAGE: &str = "Purchase is pending approval.";
pub const PURCHASE_FAILED_MESSAGE: &str = "Purchase failed. Please try again.";
pub const RESTORE_FAILED_MESSAGE: &str = "Could not restore purchases. Please try again.";
pub const NO_SUBSCRIPTION_MESSAGE: &str = "No active subscription found to restore.";

/// key: entitlement-tier -> free,pro
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    #[default]
    Free,
    Pro,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Free => "free",
            Tier::Pro => "pro",
        }
    }

    pub fn is_pro(&self) -> bool {
        matches!(self, Tier::Pro)
    }
}

/// key: entitlement-model -> persisted snapshot
///
/// The only durable subscription record. Timestamps are stored as epoch
/// milliseconds so the snapshot layout matches the native bridge payloads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entitlement {
    pub tier: Tier,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub subscribed_at: Option<DateTime<Utc>>,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub transaction_id: Option<String>,
}

impl Entitlement {
    /// Initial state, and the only state a downgrade may produce.
    pub fn free() -> Self {
        Self::default()
    }

    pub fn pro(
        subscribed_at: Option<DateTime<Utc>>,
        expires_at: Option<DateTime<Utc>>,
        transaction_id: Option<String>,
    ) -> Self {
        Self {
            tier: Tier::Pro,
            subscribed_at,
            expires_at,
            transaction_id,
        }
    }

    /// A pro entitlement whose expiry has already passed.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.tier.is_pro() && self.expires_at.map_or(false, |expires_at| expires_at < now)
    }

    /// Tier to gate on: stale pro entitlements count as free until reconciled.
    pub fn effective_tier(&self, now: DateTime<Utc>) -> Tier {
        if self.is_expired(now) {
            Tier::Free
        } else {
            self.tier
        }
    }
}

/// key: store-product -> display metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreProduct {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub price: String,
    pub price_amount: f64,
    pub currency: String,
    #[serde(default)]
    pub period: Option<String>,
}

impl StoreProduct {
    /// Monthly equivalent of the listed price, rounded to cents.
    pub fn monthly_price(&self) -> f64 {
        (self.price_amount / 12.0 * 100.0).round() / 100.0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseReceipt {
    pub transaction_id: Option<String>,
    pub product_id: Option<String>,
    #[serde(with = "chrono::serde::ts_milliseconds_option")]
    pub purchase_date: Option<DateTime<Utc>>,
    #[serde(with = "chrono::serde::ts_milliseconds_option")]
    pub expires_date: Option<DateTime<Utc>>,
}

/// key: purchase-result -> typed outcome of one purchase attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PurchaseResult {
    Completed(PurchaseReceipt),
    Cancelled,
    /// Awaiting external approval (e.g. Ask to Buy). Neither success nor failure.
    Pending,
    Failed { error: String },
}

impl PurchaseResult {
    pub fn is_success(&self) -> bool {
        matches!(self, PurchaseResult::Completed(_))
    }

    /// Short user-facing message for anything other than success.
    pub fn error_message(&self) -> Option<String> {
        match self {
            PurchaseResult::Completed(_) => None,
            PurchaseResult::Cancelled => Some(PURCHASE_CANCELLED_MESSAGE.to_string()),
            PurchaseResult::Pending => Some(PURCHASE_PENDING_MESSAGE.to_string()),
            PurchaseResult::Failed { error } => Some(error.clone()),
        }
    }
}

/// key: restored-transaction -> one entry of the store's transaction history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoredTransaction {
    pub transaction_id: String,
    pub product_id: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub purchase_date: DateTime<Utc>,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub expires_date: Option<DateTime<Utc>>,
    pub is_active: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreResult {
    pub success: bool,
    pub transactions: Vec<RestoredTransaction>,
    pub error: Option<String>,
}

/// key: entitlement-check -> remote verification outcome
///
/// `Unknown` means the store could not be asked; it is never evidence that
/// the subscription lapsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EntitlementCheck {
    Active {
        #[serde(rename = "expiresAt", with = "chrono::serde::ts_milliseconds_option")]
        expires_at: Option<DateTime<Utc>>,
        #[serde(rename = "transactionId")]
        transaction_id: Option<String>,
    },
    Inactive,
    Unknown {
        reason: String,
    },
}

impl EntitlementCheck {
    pub fn is_pro_active(&self) -> bool {
        matches!(self, EntitlementCheck::Active { .. })
    }
}

/// key: subscription-update -> unsolicited store notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionUpdate {
    pub transaction_id: String,
    pub product_id: String,
    #[serde(default)]
    pub is_revoked: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpgradePromptState {
    pub open: bool,
    pub trigger: Option<String>,
}

/// key: subscription-view -> reactive state rendered by the shell
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionView {
    #[serde(flatten)]
    pub entitlement: Entitlement,
    pub effective_tier: Tier,
    pub is_purchasing: bool,
    pub purchase_error: Option<String>,
    pub purchase_pending: bool,
    pub store_products: Vec<StoreProduct>,
    pub is_loading_products: bool,
    pub upgrade_prompt: UpgradePromptState,
}
