use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use url::Url;

use super::models::{RestoredTransaction, StoreProduct};

/// key: billing-bridge-error -> everything a native store call can report
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("purchase was cancelled by the user")]
    UserCancelled,
    #[error("purchase is pending external approval")]
    Pending,
    #[error("native billing bridge unavailable: {0}")]
    Unavailable(String),
    #[error("native billing call `{method}` failed: {message}")]
    Failed {
        method: &'static str,
        message: String,
    },
    #[error("malformed response from native billing call `{method}`: {detail}")]
    Malformed {
        method: &'static str,
        detail: String,
    },
    #[error("native billing call `{method}` timed out after {after:?}")]
    Timeout {
        method: &'static str,
        after: Duration,
    },
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
}

impl BridgeError {
    /// Message reported by the native layer itself, when there is one worth showing.
    pub fn store_message(&self) -> Option<&str> {
        match self {
            BridgeError::Failed { message, .. } if !message.trim().is_empty() => Some(message),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub product_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseResponse {
    #[serde(default)]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub product_id: Option<String>,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub purchase_date: Option<DateTime<Utc>>,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub expires_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntitlementsResponse {
    /// Required: a reply that omits it proves nothing either way.
    pub is_pro_active: bool,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub expires_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub transaction_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProductsResponse {
    #[serde(default)]
    products: Vec<StoreProduct>,
}

#[derive(Debug, Deserialize)]
struct RestoreResponse {
    #[serde(default)]
    transactions: Vec<RestoredTransaction>,
}

#[derive(Debug, Default, Deserialize)]
struct BridgeFailure {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl BridgeFailure {
    fn into_error(self, method: &'static str, status: StatusCode) -> BridgeError {
        match self.code.as_deref() {
            Some("USER_CANCELLED") => return BridgeError::UserCancelled,
            Some("PENDING") => return BridgeError::Pending,
            _ => {}
        }
        let message = self
            .message
            .filter(|message| !message.trim().is_empty())
            .unwrap_or_else(|| format!("bridge responded with {status}"));
        if method == "purchase" && message.to_ascii_lowercase().contains("cancel") {
            return BridgeError::UserCancelled;
        }
        BridgeError::Failed { method, message }
    }
}

/// key: native-billing-bridge -> StoreKit / Play Billing contract
///
/// One implementation per platform integration, selected once at startup.
/// Implementations report failures as `BridgeError`; the store adapter turns
/// them into typed results before the state machine sees them.
#[async_trait]
pub trait NativeBillingBridge: Send + Sync {
    async fn initialize(&self, product_ids: &[String]) -> Result<InitializeResponse, BridgeError>;
    async fn get_products(&self, product_ids: &[String]) -> Result<Vec<StoreProduct>, BridgeError>;
    async fn purchase(&self, product_id: &str) -> Result<PurchaseResponse, BridgeError>;
    async fn restore_purchases(&self) -> Result<Vec<RestoredTransaction>, BridgeError>;
    async fn check_entitlements(&self) -> Result<EntitlementsResponse, BridgeError>;
    async fn open_subscription_management(&self, url: &str) -> Result<(), BridgeError>;
}

/// key: native-billing-bridge-http -> loopback transport to the native host
///
/// Every contract method is a `POST {endpoint}/{method}` carrying the JSON
/// arguments. Failures come back as non-2xx with `{code?, message?}`.
#[derive(Clone)]
pub struct HttpBillingBridge {
    client: reqwest::Client,
    endpoint: Url,
}

impl HttpBillingBridge {
    pub fn new(endpoint: &str) -> Result<Self, BridgeError> {
        Self::with_client(reqwest::Client::new(), endpoint)
    }

    pub fn with_client(client: reqwest::Client, endpoint: &str) -> Result<Self, BridgeError> {
        let mut endpoint = Url::parse(endpoint)
            .map_err(|err| BridgeError::Unavailable(format!("invalid bridge endpoint: {err}")))?;
        if !endpoint.path().ends_with('/') {
            let path = format!("{}/", endpoint.path());
            endpoint.set_path(&path);
        }
        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    async fn post<B: Serialize + ?Sized>(
        &self,
        method: &'static str,
        body: &B,
    ) -> Result<Vec<u8>, BridgeError> {
        let url = self
            .endpoint
            .join(method)
            .map_err(|err| BridgeError::Unavailable(format!("invalid bridge method url: {err}")))?;
        let response = self.client.post(url).json(body).send().await?;
        let status = response.status();
        let payload = response.bytes().await?;
        if status.is_success() {
            return Ok(payload.to_vec());
        }
        let failure = serde_json::from_slice::<BridgeFailure>(&payload).unwrap_or_default();
        Err(failure.into_error(method, status))
    }

    async fn call<B, T>(&self, method: &'static str, body: &B) -> Result<T, BridgeError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let payload = self.post(method, body).await?;
        serde_json::from_slice(&payload).map_err(|err| BridgeError::Malformed {
            method,
            detail: err.to_string(),
        })
    }
}

#[async_trait]
impl NativeBillingBridge for HttpBillingBridge {
    async fn initialize(&self, product_ids: &[String]) -> Result<InitializeResponse, BridgeError> {
        self.call("initialize", &json!({ "productIds": product_ids }))
            .await
    }

    async fn get_products(&self, product_ids: &[String]) -> Result<Vec<StoreProduct>, BridgeError> {
        let response: ProductsResponse = self
            .call("getProducts", &json!({ "productIds": product_ids }))
            .await?;
        Ok(response.products)
    }

    async fn purchase(&self, product_id: &str) -> Result<PurchaseResponse, BridgeError> {
        self.call("purchase", &json!({ "productId": product_id }))
            .await
    }

    async fn restore_purchases(&self) -> Result<Vec<RestoredTransaction>, BridgeError> {
        let response: RestoreResponse = self.call("restorePurchases", &json!({})).await?;
        Ok(response.transactions)
    }

    async fn check_entitlements(&self) -> Result<EntitlementsResponse, BridgeError> {
        self.call("checkEntitlements", &json!({})).await
    }

    async fn open_subscription_management(&self, url: &str) -> Result<(), BridgeError> {
        self.post("openSubscriptionManagement", &json!({ "url": url }))
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    #[test]
    fn endpoint_gains_trailing_slash() {
        let bridge = HttpBillingBridge::new("http://127.0.0.1:9400/iap").unwrap();
        assert_eq!(bridge.endpoint().as_str(), "http://127.0.0.1:9400/iap/");
        assert!(matches!(
            HttpBillingBridge::new("not a url"),
            Err(BridgeError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn purchase_decodes_transaction() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/iap/purchase")
                    .json_body(serde_json::json!({"productId": "com.centralorbit.pro.annual"}));
                then.status(200).json_body(serde_json::json!({
                    "transactionId": "2000000123",
                    "productId": "com.centralorbit.pro.annual",
                    "purchaseDate": 1000,
                    "expiresDate": 31_536_001_000_i64,
                }));
            })
            .await;

        let bridge = HttpBillingBridge::new(&server.url("/iap")).unwrap();
        let response = bridge.purchase("com.centralorbit.pro.annual").await.unwrap();
        mock.assert_async().await;
        assert_eq!(response.transaction_id.as_deref(), Some("2000000123"));
        assert_eq!(
            response.purchase_date.map(|date| date.timestamp_millis()),
            Some(1000)
        );
        assert_eq!(
            response.expires_date.map(|date| date.timestamp_millis()),
            Some(31_536_001_000)
        );
    }

    #[tokio::test]
    async fn purchase_rejections_map_to_typed_errors() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/purchase");
                then.status(400).json_body(serde_json::json!({
                    "code": "USER_CANCELLED",
                    "message": "Purchase was cancelled by user",
                }));
            })
            .await;
        let bridge = HttpBillingBridge::new(&server.base_url()).unwrap();
        assert!(matches!(
            bridge.purchase("com.centralorbit.pro.annual").await,
            Err(BridgeError::UserCancelled)
        ));

        let pending = MockServer::start_async().await;
        pending
            .mock_async(|when, then| {
                when.method(POST).path("/purchase");
                then.status(400)
                    .json_body(serde_json::json!({"code": "PENDING"}));
            })
            .await;
        let bridge = HttpBillingBridge::new(&pending.base_url()).unwrap();
        assert!(matches!(
            bridge.purchase("com.centralorbit.pro.annual").await,
            Err(BridgeError::Pending)
        ));
    }

    #[tokio::test]
    async fn cancel_wording_without_code_counts_as_cancellation() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/purchase");
                then.status(500)
                    .json_body(serde_json::json!({"message": "User cancelled the sheet"}));
            })
            .await;
        let bridge = HttpBillingBridge::new(&server.base_url()).unwrap();
        assert!(matches!(
            bridge.purchase("com.centralorbit.pro.annual").await,
            Err(BridgeError::UserCancelled)
        ));
    }

    #[tokio::test]
    async fn generic_failures_keep_store_message() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/restorePurchases");
                then.status(502)
                    .json_body(serde_json::json!({"message": "App Store unreachable"}));
            })
            .await;
        let bridge = HttpBillingBridge::new(&server.base_url()).unwrap();
        let err = bridge.restore_purchases().await.unwrap_err();
        assert_eq!(err.store_message(), Some("App Store unreachable"));
    }

    #[tokio::test]
    async fn undecodable_success_body_is_malformed() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/checkEntitlements");
                then.status(200).body("<html>oops</html>");
            })
            .await;
        let bridge = HttpBillingBridge::new(&server.base_url()).unwrap();
        assert!(matches!(
            bridge.check_entitlements().await,
            Err(BridgeError::Malformed {
                method: "checkEntitlements",
                ..
            })
        ));
    }

    #[tokio::test]
    async fn entitlement_reply_without_flag_is_malformed() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/checkEntitlements");
                then.status(200).json_body(serde_json::json!({}));
            })
            .await;
        let bridge = HttpBillingBridge::new(&server.base_url()).unwrap();
        assert!(matches!(
            bridge.check_entitlements().await,
            Err(BridgeError::Malformed {
                method: "checkEntitlements",
                ..
            })
        ));
    }

    #[tokio::test]
    async fn explicit_inactive_flag_decodes() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/checkEntitlements");
                then.status(200)
                    .json_body(serde_json::json!({"isProActive": false}));
            })
            .await;
        let bridge = HttpBillingBridge::new(&server.base_url()).unwrap();
        let response = bridge.check_entitlements().await.unwrap();
        assert!(!response.is_pro_active);
        assert!(response.transaction_id.is_none());
    }

    #[tokio::test]
    async fn purchase_reply_without_date_still_decodes() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/purchase");
                then.status(200).json_body(serde_json::json!({
                    "transactionId": "t1",
                    "productId": "com.centralorbit.pro.annual",
                }));
            })
            .await;
        let bridge = HttpBillingBridge::new(&server.base_url()).unwrap();
        let response = bridge.purchase("com.centralorbit.pro.annual").await.unwrap();
        assert_eq!(response.transaction_id.as_deref(), Some("t1"));
        assert!(response.purchase_date.is_none());
        assert!(response.expires_date.is_none());
    }

    #[tokio::test]
    async fn restore_reads_transaction_history() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/restorePurchases");
                then.status(200).json_body(serde_json::json!({
                    "transactions": [
                        {
                            "transactionId": "A",
                            "productId": "com.centralorbit.pro.annual",
                            "purchaseDate": 100,
                            "isActive": true
                        }
                    ]
                }));
            })
            .await;
        let bridge = HttpBillingBridge::new(&server.base_url()).unwrap();
        let transactions = bridge.restore_purchases().await.unwrap();
        assert_eq!(transactions.len(), 1);
        assert_eq!(transactions[0].transaction_id, "A");
        assert!(transactions[0].expires_date.is_none());
    }
}
