use std::sync::Arc;
use std::time::Duration;

use cfp_review::config::Config;
use cfp_review::db::{self, MemoryStore, PgStore, Store};
use cfp_review::email::{
    Dispatcher, DryRunProvider, EmailProvider, LocalCouponIssuer, ResendClient,
};
use cfp_review::{build_router, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cfp_review=info,tower_http=info".into()),
        )
        .init();

    let config = Arc::new(Config::from_env()?);

    let store: Arc<dyn Store> = if config.uses_memory_store() {
        tracing::warn!("DATABASE_URL=memory: data will not survive a restart");
        Arc::new(MemoryStore::new())
    } else {
        let pool = db::create_pool(&config.database_url).await?;
        db::run_migrations(&pool).await?;
        Arc::new(PgStore::new(pool))
    };

    let provider: Arc<dyn EmailProvider> = match (&config.email.api_key, config.email.dry_run) {
        (Some(key), false) => Arc::new(ResendClient::with_config(
            key.clone(),
            config.email.api_base.clone(),
            Duration::from_secs(30),
        )?),
        _ => {
            tracing::info!("email dry-run enabled; nothing will be delivered");
            Arc::new(DryRunProvider::new())
        }
    };

    let dispatcher = Arc::new(Dispatcher::new(
        store.clone(),
        provider,
        Arc::new(LocalCouponIssuer),
        config.email.settings(),
    ));

    let state = Arc::new(AppState {
        store,
        dispatcher,
        config: config.clone(),
    });
    let app = build_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    tracing::info!("CFP review service listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
