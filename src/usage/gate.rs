use serde::Serialize;

use crate::billing::Tier;

/// key: usage-limits -> per-tier caps; `None` is unbounded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TierLimits {
    pub max_workspaces: Option<u32>,
    pub max_tiles_per_workspace: Option<u32>,
    pub max_total_tiles: Option<u32>,
}

pub const FREE_LIMITS: TierLimits = TierLimits {
    max_workspaces: Some(3),
    max_tiles_per_workspace: Some(8),
    max_total_tiles: Some(15),
};

pub const PRO_LIMITS: TierLimits = TierLimits {
    max_workspaces: None,
    max_tiles_per_workspace: None,
    max_total_tiles: None,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum LimitKey {
    MaxWorkspaces,
    MaxTilesPerWorkspace,
    MaxTotalTiles,
}

impl TierLimits {
    pub fn get(&self, key: LimitKey) -> Option<u32> {
        match key {
            LimitKey::MaxWorkspaces => self.max_workspaces,
            LimitKey::MaxTilesPerWorkspace => self.max_tiles_per_workspace,
            LimitKey::MaxTotalTiles => self.max_total_tiles,
        }
    }
}

pub fn limits_for(tier: Tier) -> TierLimits {
    match tier {
        Tier::Free => FREE_LIMITS,
        Tier::Pro => PRO_LIMITS,
    }
}

fn below(limit: Option<u32>, current: u32) -> bool {
    limit.map_or(true, |max| current < max)
}

pub fn can_add_workspace(tier: Tier, current_workspaces: u32) -> bool {
    below(limits_for(tier).max_workspaces, current_workspaces)
}

/// Both the account-wide and the per-workspace cap must have room.
pub fn can_add_tile(tier: Tier, total_tiles: u32, tiles_in_workspace: u32) -> bool {
    let limits = limits_for(tier);
    below(limits.max_total_tiles, total_tiles)
        && below(limits.max_tiles_per_workspace, tiles_in_workspace)
}

/// Share of the limit in use, 0..=100. Unbounded limits report 0.
pub fn usage_percent(tier: Tier, current: u32, key: LimitKey) -> u8 {
    match limits_for(tier).get(key) {
        None => 0,
        Some(0) => 100,
        Some(max) => {
            let percent = (100.0 * f64::from(current) / f64::from(max)).round();
            percent.min(100.0) as u8
        }
    }
}

pub fn remaining(tier: Tier, current: u32, key: LimitKey) -> Option<u32> {
    limits_for(tier)
        .get(key)
        .map(|max| max.saturating_sub(current))
}

pub fn is_at_limit(tier: Tier, current: u32, key: LimitKey) -> bool {
    limits_for(tier)
        .get(key)
        .map_or(false, |max| current >= max)
}

/// Why the upgrade prompt was opened; drives the prompt copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptReason {
    WorkspaceLimit,
    TileLimit,
    UsageBanner,
    Other(String),
}

impl PromptReason {
    pub fn as_str(&self) -> &str {
        match self {
            PromptReason::WorkspaceLimit => "workspace_limit",
            PromptReason::TileLimit => "tile_limit",
            PromptReason::UsageBanner => "usage_banner",
            PromptReason::Other(trigger) => trigger,
        }
    }
}

/// Surface that shows the upgrade prompt. Must take effect before returning.
pub trait UpgradePrompt {
    fn open_upgrade_prompt(&self, reason: PromptReason);
}

/// key: usage-gate -> limit checks that raise the upgrade prompt
pub struct UsageGate<'a, P: UpgradePrompt + ?Sized> {
    tier: Tier,
    prompt: &'a P,
}

impl<'a, P: UpgradePrompt + ?Sized> UsageGate<'a, P> {
    pub fn new(tier: Tier, prompt: &'a P) -> Self {
        Self { tier, prompt }
    }

    pub fn tier(&self) -> Tier {
        self.tier
    }

    pub fn check_workspace_limit(&self, current_workspaces: u32) -> bool {
        if can_add_workspace(self.tier, current_workspaces) {
            return true;
        }
        self.prompt.open_upgrade_prompt(PromptReason::WorkspaceLimit);
        false
    }

    pub fn check_tile_limit(&self, total_tiles: u32, tiles_in_workspace: u32) -> bool {
        if can_add_tile(self.tier, total_tiles, tiles_in_workspace) {
            return true;
        }
        self.prompt.open_upgrade_prompt(PromptReason::TileLimit);
        false
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BannerLevel {
    Notice,
    NearLimit,
    AtLimit,
}

/// key: usage-banner -> free-plan usage nudge
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageBanner {
    pub level: BannerLevel,
    pub percent: u8,
    /// Only reported once three or fewer tiles are left.
    pub tiles_remaining: Option<u32>,
    /// Only reported once one or fewer workspaces are left.
    pub workspaces_remaining: Option<u32>,
}

/// Banner shown on the free plan once either limit is at least half used.
pub fn usage_banner(tier: Tier, total_tiles: u32, workspaces: u32) -> Option<UsageBanner> {
    if tier.is_pro() {
        return None;
    }
    let percent = usage_percent(tier, total_tiles, LimitKey::MaxTotalTiles).max(usage_percent(
        tier,
        workspaces,
        LimitKey::MaxWorkspaces,
    ));
    if percent < 50 {
        return None;
    }
    let level = if percent >= 100 {
        BannerLevel::AtLimit
    } else if percent >= 80 {
        BannerLevel::NearLimit
    } else {
        BannerLevel::Notice
    };
    Some(UsageBanner {
        level,
        percent,
        tiles_remaining: remaining(tier, total_tiles, LimitKey::MaxTotalTiles)
            .filter(|left| *left <= 3),
        workspaces_remaining: remaining(tier, workspaces, LimitKey::MaxWorkspaces)
            .filter(|left| *left <= 1),
    })
}
