use axum::http::{HeaderName, Method};
use pairchat_server::{config::Config, db, routes, AppState};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

#[tokio::main]
async fn main() {
    // Load .env if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pairchat_server=info,tower_http=info".into()),
        )
        .init();

    let config = Config::from_env();

    // The relay refuses to start without its store.
    let pool = match db::init_pool(&config.database_path).await {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!(path = %config.database_path, error = %e, "failed to open database");
            std::process::exit(1);
        }
    };
    tracing::info!(path = %config.database_path, "database ready");

    let state = Arc::new(AppState::new(pool, config.clone()));

    if let Some(days) = config.retention_days {
        match state.store.delete_messages_older_than(days).await {
            Ok(n) => tracing::info!(days, deleted = n, "retention sweep finished"),
            Err(e) => tracing::warn!(days, error = %e, "retention sweep failed"),
        }
    }

    let app = routes::build_router(state.clone()).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(
                CorsLayer::new()
                    .allow_origin(tower_http::cors::AllowOrigin::mirror_request())
                    .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                    .allow_headers([HeaderName::from_static("content-type")]),
            ),
    );

    let addr = format!("{}:{}", config.host, config.port);
    let listener = match TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!(%addr, error = %e, "failed to bind");
            std::process::exit(1);
        }
    };

    tracing::info!("PairChat relay running on {}", addr);

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!(error = %e, "server error");
        std::process::exit(1);
    }
}
