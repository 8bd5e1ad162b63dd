use orbit_entitlements::usage::{PgUsageCounts, UsageCounts};
use sqlx::PgPool;
use uuid::Uuid;

async fn insert_workspace(pool: &PgPool, owner_id: &str, name: &str) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO workspaces (id, owner_id, name) VALUES ($1, $2, $3)")
        .bind(id)
        .bind(owner_id)
        .bind(name)
        .execute(pool)
        .await
        .unwrap();
    id
}

async fn insert_tile(pool: &PgPool, owner_id: &str, workspace_id: Uuid, name: &str) {
    sqlx::query(
        "INSERT INTO tiles (id, owner_id, workspace_id, name, url) VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(Uuid::new_v4())
    .bind(owner_id)
    .bind(workspace_id)
    .bind(name)
    .bind(format!("https://{name}.example.com"))
    .execute(pool)
    .await
    .unwrap();
}

// key: usage-counts-tests -> owner-scoped workspace and tile totals
#[sqlx::test]
#[ignore = "requires DATABASE_URL with Postgres server"]
async fn counts_are_scoped_to_owner(pool: PgPool) {
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();

    let home = insert_workspace(&pool, "owner-a", "Home").await;
    let work = insert_workspace(&pool, "owner-a", "Work").await;
    let other = insert_workspace(&pool, "owner-b", "Elsewhere").await;
    for name in ["mail", "calendar", "docs"] {
        insert_tile(&pool, "owner-a", home, name).await;
    }
    insert_tile(&pool, "owner-a", work, "tracker").await;
    insert_tile(&pool, "owner-b", other, "news").await;

    let counts = PgUsageCounts::new(pool.clone());
    assert_eq!(counts.workspace_count("owner-a").await.unwrap(), 2);
    assert_eq!(counts.tile_count("owner-a").await.unwrap(), 4);
    assert_eq!(counts.tiles_in_workspace("owner-a", home).await.unwrap(), 3);
    assert_eq!(counts.tiles_in_workspace("owner-a", other).await.unwrap(), 0);
    assert_eq!(counts.workspace_count("owner-c").await.unwrap(), 0);
}
