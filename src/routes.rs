use axum::{
    routing::{get, post},
    Router,
};

use crate::{billing::api as subscription, usage::api as usage};

pub fn api_routes() -> Router {
    Router::new()
        .route("/api/subscription", get(subscription::get_subscription))
        .route(
            "/api/subscription/events",
            get(subscription::stream_subscription),
        )
        .route(
            "/api/subscription/products",
            get(subscription::list_products),
        )
        .route("/api/subscription/purchase", post(subscription::purchase))
        .route("/api/subscription/restore", post(subscription::restore))
        .route("/api/subscription/verify", post(subscription::verify))
        .route(
            "/api/subscription/check-expiration",
            post(subscription::check_expiration),
        )
        .route("/api/subscription/manage", post(subscription::manage))
        .route(
            "/api/subscription/prompt",
            post(subscription::open_prompt).delete(subscription::close_prompt),
        )
        .route(
            "/api/billing/events/subscription-update",
            post(subscription::subscription_update_event),
        )
        .route("/api/usage", get(usage::get_usage))
        .route("/api/usage/workspaces/check", post(usage::check_workspace))
        .route("/api/usage/tiles/check", post(usage::check_tile))
}
