use std::sync::Arc;

use axum::{extract::Extension, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::billing::{SubscriptionService, Tier};
use crate::error::AppResult;
use crate::extractor::AuthUser;

use super::counts::UsageCounts;
use super::gate::{
    is_at_limit, limits_for, remaining, usage_banner, usage_percent, LimitKey, TierLimits,
    UsageBanner, UsageGate,
};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageSummary {
    pub tier: Tier,
    pub limits: TierLimits,
    pub workspaces: u32,
    pub tiles: u32,
    pub workspace_percent: u8,
    pub tile_percent: u8,
    pub workspaces_remaining: Option<u32>,
    pub tiles_remaining: Option<u32>,
    pub at_workspace_limit: bool,
    pub at_tile_limit: bool,
    pub banner: Option<UsageBanner>,
}

#[derive(Debug, Deserialize)]
pub struct TileCheckRequest {
    pub workspace_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct UsageCheckResponse {
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl UsageCheckResponse {
    fn from_gate(allowed: bool, reason: &str) -> Self {
        Self {
            allowed,
            reason: (!allowed).then(|| reason.to_string()),
        }
    }
}

/// key: usage-api -> current usage against the effective tier
pub async fn get_usage(
    Extension(subscriptions): Extension<Arc<SubscriptionService>>,
    Extension(counts): Extension<Arc<dyn UsageCounts>>,
    AuthUser { owner_id }: AuthUser,
) -> AppResult<Json<UsageSummary>> {
    let tier = subscriptions.effective_tier(Utc::now());
    let workspaces = counts.workspace_count(&owner_id).await?;
    let tiles = counts.tile_count(&owner_id).await?;

    Ok(Json(UsageSummary {
        tier,
        limits: limits_for(tier),
        workspaces,
        tiles,
        workspace_percent: usage_percent(tier, workspaces, LimitKey::MaxWorkspaces),
        tile_percent: usage_percent(tier, tiles, LimitKey::MaxTotalTiles),
        workspaces_remaining: remaining(tier, workspaces, LimitKey::MaxWorkspaces),
        tiles_remaining: remaining(tier, tiles, LimitKey::MaxTotalTiles),
        at_workspace_limit: is_at_limit(tier, workspaces, LimitKey::MaxWorkspaces),
        at_tile_limit: is_at_limit(tier, tiles, LimitKey::MaxTotalTiles),
        banner: usage_banner(tier, tiles, workspaces),
    }))
}

/// Asked before creating a workspace. A block opens the upgrade prompt.
pub async fn check_workspace(
    Extension(subscriptions): Extension<Arc<SubscriptionService>>,
    Extension(counts): Extension<Arc<dyn UsageCounts>>,
    AuthUser { owner_id }: AuthUser,
) -> AppResult<Json<UsageCheckResponse>> {
    let workspaces = counts.workspace_count(&owner_id).await?;
    let gate = UsageGate::new(
        subscriptions.effective_tier(Utc::now()),
        subscriptions.as_ref(),
    );
    let allowed = gate.check_workspace_limit(workspaces);
    debug!(%owner_id, workspaces, allowed, tier = gate.tier().as_str(), "workspace limit check");
    Ok(Json(UsageCheckResponse::from_gate(
        allowed,
        "workspace_limit",
    )))
}

/// Asked before adding a tile to a workspace. A block opens the upgrade prompt.
pub async fn check_tile(
    Extension(subscriptions): Extension<Arc<SubscriptionService>>,
    Extension(counts): Extension<Arc<dyn UsageCounts>>,
    AuthUser { owner_id }: AuthUser,
    Json(payload): Json<TileCheckRequest>,
) -> AppResult<Json<UsageCheckResponse>> {
    let total = counts.tile_count(&owner_id).await?;
    let in_workspace = counts
        .tiles_in_workspace(&owner_id, payload.workspace_id)
        .await?;
    let gate = UsageGate::new(
        subscriptions.effective_tier(Utc::now()),
        subscriptions.as_ref(),
    );
    let allowed = gate.check_tile_limit(total, in_workspace);
    debug!(
        %owner_id,
        workspace_id = %payload.workspace_id,
        total,
        in_workspace,
        allowed,
        "tile limit check"
    );
    Ok(Json(UsageCheckResponse::from_gate(allowed, "tile_limit")))
}
