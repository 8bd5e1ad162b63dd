use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::Extension,
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use serde::{Deserialize, Serialize};
use tokio_stream::{wrappers::WatchStream, Stream, StreamExt};
use tracing::error;

use crate::error::{AppError, AppResult};

use super::{
    EntitlementCheck, PurchaseResult, ReconciliationHandle, ReconciliationJob,
    RestoredTransaction, StoreProduct, SubscriptionService, SubscriptionUpdate, SubscriptionView,
};

#[derive(Debug, Serialize)]
pub struct PurchaseOutcome {
    pub result: PurchaseResult,
    pub subscription: SubscriptionView,
}

#[derive(Debug, Serialize)]
pub struct RestoreOutcome {
    pub restored: Option<RestoredTransaction>,
    pub subscription: SubscriptionView,
}

#[derive(Debug, Serialize)]
pub struct VerifyOutcome {
    pub check: EntitlementCheck,
    pub subscription: SubscriptionView,
}

#[derive(Debug, Serialize)]
pub struct ExpirationOutcome {
    pub downgraded: bool,
    pub subscription: SubscriptionView,
}

#[derive(Debug, Default, Deserialize)]
pub struct PromptRequest {
    #[serde(default)]
    pub trigger: Option<String>,
}

/// key: subscription-api -> entitlement state for the shell
pub async fn get_subscription(
    Extension(service): Extension<Arc<SubscriptionService>>,
) -> Json<SubscriptionView> {
    Json(service.view())
}

/// Current view first, then one event per state change.
pub async fn stream_subscription(
    Extension(service): Extension<Arc<SubscriptionService>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = WatchStream::new(service.subscribe()).filter_map(|view| {
        match Event::default().event("subscription").json_data(&view) {
            Ok(event) => Some(Ok(event)),
            Err(err) => {
                error!(?err, "failed to serialize subscription view");
                None
            }
        }
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}

pub async fn list_products(
    Extension(service): Extension<Arc<SubscriptionService>>,
) -> Json<Vec<StoreProduct>> {
    Json(service.products().await)
}

/// The purchase runs on its own task so a dropped request never abandons a
/// store transaction halfway.
pub async fn purchase(
    Extension(service): Extension<Arc<SubscriptionService>>,
) -> AppResult<Json<PurchaseOutcome>> {
    let task = {
        let service = service.clone();
        tokio::spawn(async move { service.purchase_pro().await })
    };
    let result = task
        .await
        .map_err(|err| AppError::Message(format!("purchase task failed: {err}")))??;
    Ok(Json(PurchaseOutcome {
        result,
        subscription: service.view(),
    }))
}

pub async fn restore(
    Extension(service): Extension<Arc<SubscriptionService>>,
) -> AppResult<Json<RestoreOutcome>> {
    let task = {
        let service = service.clone();
        tokio::spawn(async move { service.restore_purchase().await })
    };
    let restored = task
        .await
        .map_err(|err| AppError::Message(format!("restore task failed: {err}")))??;
    Ok(Json(RestoreOutcome {
        restored,
        subscription: service.view(),
    }))
}

pub async fn verify(
    Extension(service): Extension<Arc<SubscriptionService>>,
) -> Json<VerifyOutcome> {
    let check = service.verify_entitlements().await;
    Json(VerifyOutcome {
        check,
        subscription: service.view(),
    })
}

pub async fn check_expiration(
    Extension(service): Extension<Arc<SubscriptionService>>,
) -> Json<ExpirationOutcome> {
    let downgraded = service.check_expiration().await;
    Json(ExpirationOutcome {
        downgraded,
        subscription: service.view(),
    })
}

pub async fn manage(Extension(service): Extension<Arc<SubscriptionService>>) -> StatusCode {
    service.manage_subscription();
    StatusCode::ACCEPTED
}

pub async fn open_prompt(
    Extension(service): Extension<Arc<SubscriptionService>>,
    payload: Option<Json<PromptRequest>>,
) -> Json<SubscriptionView> {
    let trigger = payload.and_then(|Json(request)| request.trigger);
    service.open_prompt(trigger);
    Json(service.view())
}

pub async fn close_prompt(
    Extension(service): Extension<Arc<SubscriptionService>>,
) -> Json<SubscriptionView> {
    service.close_prompt();
    Json(service.view())
}

/// key: billing-events -> native host pushes transaction updates here
pub async fn subscription_update_event(
    Extension(reconciliation): Extension<ReconciliationHandle>,
    Json(update): Json<SubscriptionUpdate>,
) -> AppResult<StatusCode> {
    reconciliation
        .dispatch(ReconciliationJob::SubscriptionUpdate(update))
        .await
        .map_err(|err| AppError::Message(err.to_string()))?;
    Ok(StatusCode::ACCEPTED)
}
