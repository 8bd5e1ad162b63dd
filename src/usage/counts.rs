use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

/// key: usage-counts -> read-only workspace/tile totals per owner
#[async_trait]
pub trait UsageCounts: Send + Sync {
    async fn workspace_count(&self, owner_id: &str) -> sqlx::Result<u32>;
    async fn tile_count(&self, owner_id: &str) -> sqlx::Result<u32>;
    async fn tiles_in_workspace(&self, owner_id: &str, workspace_id: Uuid) -> sqlx::Result<u32>;
}

#[derive(Clone)]
pub struct PgUsageCounts {
    pool: PgPool,
}

impl PgUsageCounts {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn clamp(count: i64) -> u32 {
    u32::try_from(count.max(0)).unwrap_or(u32::MAX)
}

#[async_trait]
impl UsageCounts for PgUsageCounts {
    async fn workspace_count(&self, owner_id: &str) -> sqlx::Result<u32> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM workspaces WHERE owner_id = $1")
            .bind(owner_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(clamp(count))
    }

    async fn tile_count(&self, owner_id: &str) -> sqlx::Result<u32> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tiles WHERE owner_id = $1")
            .bind(owner_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(clamp(count))
    }

    async fn tiles_in_workspace(&self, owner_id: &str, workspace_id: Uuid) -> sqlx::Result<u32> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM tiles WHERE owner_id = $1 AND workspace_id = $2",
        )
        .bind(owner_id)
        .bind(workspace_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(clamp(count))
    }
}
