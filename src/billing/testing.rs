//! Programmable bridge for unit tests.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::bridge::{
    BridgeError, EntitlementsResponse, InitializeResponse, NativeBillingBridge, PurchaseResponse,
};
use super::models::{RestoredTransaction, StoreProduct};

#[derive(Clone)]
pub(crate) enum Scripted<T> {
    Ok(T),
    Cancelled,
    Pending,
    Fail(&'static str),
    Hang,
}

impl<T: Clone> Scripted<T> {
    async fn play(self, method: &'static str) -> Result<T, BridgeError> {
        match self {
            Scripted::Ok(value) => Ok(value),
            Scripted::Cancelled => Err(BridgeError::UserCancelled),
            Scripted::Pending => Err(BridgeError::Pending),
            Scripted::Fail(message) => Err(BridgeError::Failed {
                method,
                message: message.to_string(),
            }),
            Scripted::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(BridgeError::Unavailable("hang elapsed".to_string()))
            }
        }
    }
}

pub(crate) struct ScriptedBridge {
    initialize: Mutex<Scripted<InitializeResponse>>,
    products: Mutex<Scripted<Vec<StoreProduct>>>,
    purchase: Mutex<Scripted<PurchaseResponse>>,
    restore: Mutex<Scripted<Vec<RestoredTransaction>>>,
    entitlements: Mutex<Scripted<EntitlementsResponse>>,
    calls: Mutex<Vec<&'static str>>,
}

impl Default for ScriptedBridge {
    fn default() -> Self {
        Self {
            initialize: Mutex::new(Scripted::Ok(InitializeResponse {
                success: true,
                product_count: 1,
            })),
            products: Mutex::new(Scripted::Ok(Vec::new())),
            purchase: Mutex::new(Scripted::Fail("purchase not scripted")),
            restore: Mutex::new(Scripted::Ok(Vec::new())),
            entitlements: Mutex::new(Scripted::Ok(EntitlementsResponse::default())),
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl ScriptedBridge {
    pub(crate) fn set_initialize(&self, script: Scripted<InitializeResponse>) {
        *self.initialize.lock().unwrap() = script;
    }

    pub(crate) fn set_products(&self, script: Scripted<Vec<StoreProduct>>) {
        *self.products.lock().unwrap() = script;
    }

    pub(crate) fn set_purchase(&self, script: Scripted<PurchaseResponse>) {
        *self.purchase.lock().unwrap() = script;
    }

    pub(crate) fn set_restore(&self, script: Scripted<Vec<RestoredTransaction>>) {
        *self.restore.lock().unwrap() = script;
    }

    pub(crate) fn set_entitlements(&self, script: Scripted<EntitlementsResponse>) {
        *self.entitlements.lock().unwrap() = script;
    }

    pub(crate) fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, method: &'static str) {
        self.calls.lock().unwrap().push(method);
    }
}

#[async_trait]
impl NativeBillingBridge for ScriptedBridge {
    async fn initialize(&self, _product_ids: &[String]) -> Result<InitializeResponse, BridgeError> {
        self.record("initialize");
        let script = self.initialize.lock().unwrap().clone();
        script.play("initialize").await
    }

    async fn get_products(&self, _product_ids: &[String]) -> Result<Vec<StoreProduct>, BridgeError> {
        self.record("getProducts");
        let script = self.products.lock().unwrap().clone();
        script.play("getProducts").await
    }

    async fn purchase(&self, _product_id: &str) -> Result<PurchaseResponse, BridgeError> {
        self.record("purchase");
        let script = self.purchase.lock().unwrap().clone();
        script.play("purchase").await
    }

    async fn restore_purchases(&self) -> Result<Vec<RestoredTransaction>, BridgeError> {
        self.record("restorePurchases");
        let script = self.restore.lock().unwrap().clone();
        script.play("restorePurchases").await
    }

    async fn check_entitlements(&self) -> Result<EntitlementsResponse, BridgeError> {
        self.record("checkEntitlements");
        let script = self.entitlements.lock().unwrap().clone();
        script.play("checkEntitlements").await
    }

    async fn open_subscription_management(&self, _url: &str) -> Result<(), BridgeError> {
        self.record("openSubscriptionManagement");
        Ok(())
    }
}
