//! # PhonoPlan API Server
//!
//! Multi-tenant API for speech-therapy and inclusive-education teams:
//! organizations, pseudonymized students, audio consent, recordings stored
//! behind signed URLs, and AI-generated activity plans.
//!
//! ## Startup
//!
//! 1. Load configuration from the environment (`.env` in development)
//! 2. Connect to PostgreSQL and apply migrations
//! 3. Connect to Redis for shared rate limiting, if configured
//! 4. Select the storage provider and, if configured, the AI provider
//! 5. Serve until Ctrl+C or SIGTERM
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p phonoplan-api
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use phonoplan_api::{
    app::{build_router, AppState},
    config::{Config, LogFormat},
};
use phonoplan_shared::{
    db::{
        migrations::run_migrations,
        pool::{self, close_pool, create_pool},
    },
    plans::OpenAiPlanGenerator,
    rate_limit::RateLimiter,
    redis::RedisClient,
    storage::select_provider,
};
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_LOG_FILTER: &str = "phonoplan_api=debug,phonoplan_shared=info,tower_http=debug";

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("Failed to load configuration")?;
    init_tracing(config.log_format);

    tracing::info!(
        environment = %config.environment,
        "PhonoPlan API Server v{} starting...",
        env!("CARGO_PKG_VERSION")
    );

    let db = create_pool(pool::DatabaseConfig {
        url: config.database.url.clone(),
        max_connections: config.database.max_connections,
        ..Default::default()
    })
    .await
    .context("Failed to connect to the database")?;

    run_migrations(&db).await.context("Failed to run migrations")?;

    let rate_limiter = match config.redis.clone() {
        Some(redis_config) => match RedisClient::new(redis_config).await {
            Ok(client) => {
                tracing::info!(url = %client.display_url(), "Rate limiting backed by Redis");
                RateLimiter::new(Some(client))
            }
            Err(e) => {
                tracing::warn!(error = %e, "Redis unavailable, rate limiting in process memory");
                RateLimiter::memory_only()
            }
        },
        None => {
            tracing::info!("REDIS_URL not set, rate limiting in process memory");
            RateLimiter::memory_only()
        }
    };

    let storage = select_provider(&config.storage, config.environment, &config.auth.secret)
        .await
        .context("Failed to configure storage")?;
    tracing::info!(provider = storage.provider.name(), "Storage provider selected");

    let plan_generator = match config.openai.clone() {
        Some(openai) => Some(
            OpenAiPlanGenerator::new(openai).context("Failed to configure the AI provider")?,
        ),
        None => {
            tracing::warn!("OPENAI_API_KEY or OPENAI_MODEL not set, plan generation disabled");
            None
        }
    };

    let addr: SocketAddr = config
        .bind_address()
        .parse()
        .context("Invalid API_HOST/API_PORT")?;

    let mut state = AppState::new(db.clone(), config, storage, rate_limiter);
    if let Some(generator) = plan_generator {
        tracing::info!(model = generator.model(), "Plan generation enabled");
        state = state.with_plan_generator(Arc::new(generator));
    }

    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    close_pool(db).await;
    tracing::info!("Server shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("Received terminate signal, shutting down"),
    }
}
