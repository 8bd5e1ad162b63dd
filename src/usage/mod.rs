pub mod api;
pub mod counts;
pub mod gate;

pub use api::{
    check_tile as usage_check_tile, check_workspace as usage_check_workspace,
    get_usage as usage_summary, TileCheckRequest, UsageCheckResponse, UsageSummary,
};
pub use counts::{PgUsageCounts, UsageCounts};
pub use gate::{
    can_add_tile, can_add_workspace, is_at_limit, limits_for, remaining, usage_banner,
    usage_percent, BannerLevel, LimitKey, PromptReason, TierLimits, UpgradePrompt, UsageBanner,
    UsageGate, FREE_LIMITS, PRO_LIMITS,
};
