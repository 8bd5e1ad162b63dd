use std::net::SocketAddr;
use std::sync::Arc;

use axum::{routing::get, Extension, Router};
use axum_prometheus::PrometheusMetricLayer;
use orbit_entitlements::billing::{
    self, FileSnapshotStore, HttpBillingBridge, NativeBillingBridge, ReconciliationJob,
    StoreAdapter, StoreAdapterConfig, SubscriptionService,
};
use orbit_entitlements::config;
use orbit_entitlements::routes::api_routes;
use orbit_entitlements::usage::{PgUsageCounts, UsageCounts};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{fmt, EnvFilter};

async fn root() -> &'static str {
    "Central Orbit entitlements"
}

fn build_store() -> Result<StoreAdapter, Box<dyn std::error::Error>> {
    let store_config = StoreAdapterConfig::from_env();
    let platform = store_config.platform;
    let endpoint = config::BILLING_BRIDGE_ENDPOINT.as_deref();

    let bridge: Option<Arc<dyn NativeBillingBridge>> = match (platform.is_native(), endpoint) {
        (true, Some(endpoint)) => {
            let bridge = HttpBillingBridge::new(endpoint)?;
            tracing::info!(%platform, endpoint = %bridge.endpoint(), "using native billing bridge");
            Some(Arc::new(bridge) as Arc<dyn NativeBillingBridge>)
        }
        (true, None) => {
            tracing::warn!(
                %platform,
                "BILLING_BRIDGE_ENDPOINT is not set; falling back to simulated purchases"
            );
            None
        }
        (false, _) => None,
    };
    Ok(StoreAdapter::new(bridge, store_config))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    dotenvy::dotenv().ok();
    if config::JWT_SECRET.is_none() {
        tracing::warn!("JWT_SECRET is not set; usage endpoints will reject every request");
    }

    let store = Arc::new(build_store()?);
    let snapshots = Arc::new(FileSnapshotStore::new(config::ENTITLEMENT_STATE_DIR.as_str()));
    tracing::info!(path = %snapshots.path().display(), "entitlement snapshot location");
    let subscriptions = Arc::new(SubscriptionService::load(store, snapshots).await);

    let reconciliation = billing::start_reconciliation_worker(subscriptions.clone());
    reconciliation
        .dispatch(ReconciliationJob::CheckExpiration)
        .await?;
    {
        let subscriptions = subscriptions.clone();
        tokio::spawn(async move {
            let check = subscriptions.initialize_iap().await;
            tracing::info!(active = check.is_pro_active(), "in-app purchases initialized");
        });
    }
    billing::spawn_entitlement_scheduler(subscriptions.clone());

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect_lazy(config::DATABASE_URL.as_str())?;

    // Run migrations if available
    if let Err(error) = sqlx::migrate!().run(&pool).await {
        if *config::ALLOW_MIGRATION_FAILURE {
            tracing::warn!(
                ?error,
                "Database migrations failed but continuing due to ALLOW_MIGRATION_FAILURE"
            );
        } else {
            return Err(Box::new(error) as Box<dyn std::error::Error>);
        }
    }
    let counts: Arc<dyn UsageCounts> = Arc::new(PgUsageCounts::new(pool));

    let (prometheus_layer, metrics_handle) = PrometheusMetricLayer::pair();
    let app = Router::new()
        .route("/", get(root))
        .route(
            "/metrics",
            get(move || async move { metrics_handle.render() }),
        )
        .merge(api_routes())
        .layer(prometheus_layer)
        .layer(Extension(subscriptions.clone()))
        .layer(Extension(reconciliation.clone()))
        .layer(Extension(counts));

    let addr: SocketAddr = format!("{}:{}", config::BIND_ADDRESS.as_str(), *config::BIND_PORT)
        .parse()
        .map_err(|error| Box::new(error) as Box<dyn std::error::Error>)?;
    tracing::info!(%addr, "Listening for incoming connections");
    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await?;

    Ok(())
}
