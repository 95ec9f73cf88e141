/// Application state and router builder
///
/// # Example
///
/// ```no_run
/// use phonoplan_api::{app::{build_router, AppState}, config::Config};
/// use phonoplan_shared::rate_limit::RateLimiter;
/// use phonoplan_shared::storage::select_provider;
/// use sqlx::PgPool;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = PgPool::connect(&config.database.url).await?;
/// let storage = select_provider(&config.storage, config.environment, &config.auth.secret).await?;
/// let state = AppState::new(pool, config, storage, RateLimiter::memory_only());
/// let app = build_router(state);
/// # Ok(())
/// # }
/// ```

use crate::{
    config::Config,
    middleware::{
        rate_limit::{rate_limit_layer, RateLimitState},
        security::SecurityHeadersLayer,
    },
};
use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderName, HeaderValue, Method},
    middleware,
    routing::{get, post},
    Router,
};
use phonoplan_shared::{
    auth::middleware::{session_middleware, SessionVerifier},
    media::MAX_AUDIO_FILE_BYTES,
    plans::PlanGenerator,
    rate_limit::{RateLimitPolicy, RateLimiter},
    storage::{
        local::{LocalObjectStore, LocalUrlSigner},
        SelectedStorage, StorageProvider,
    },
};
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::{
    cors::CorsLayer,
    limit::RequestBodyLimitLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state
///
/// Cloned for each request handler via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: PgPool,

    /// Application configuration
    pub config: Arc<Config>,

    /// Request counters for rate-limited routes
    pub rate_limiter: Arc<RateLimiter>,

    /// Signs upload and download URLs
    pub storage: Arc<dyn StorageProvider>,

    /// Present when the local storage driver is active
    pub local_signer: Option<LocalUrlSigner>,

    /// Objects uploaded through the local `/storage` route
    pub local_store: LocalObjectStore,

    /// `None` when no AI provider is configured
    pub plan_generator: Option<Arc<dyn PlanGenerator>>,
}

impl AppState {
    /// Creates state without a plan generator
    pub fn new(db: PgPool, config: Config, storage: SelectedStorage, rate_limiter: RateLimiter) -> Self {
        Self {
            db,
            config: Arc::new(config),
            rate_limiter: Arc::new(rate_limiter),
            storage: storage.provider,
            local_signer: storage.local_signer,
            local_store: LocalObjectStore::new(),
            plan_generator: None,
        }
    }

    pub fn with_plan_generator(mut self, generator: Arc<dyn PlanGenerator>) -> Self {
        self.plan_generator = Some(generator);
        self
    }

    /// Secret for session tokens
    pub fn auth_secret(&self) -> &str {
        &self.config.auth.secret
    }

    fn limited(&self, policy: RateLimitPolicy) -> RateLimitState {
        RateLimitState::new(self.rate_limiter.clone(), policy)
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// # Architecture
///
/// ```text
/// /
/// ├── GET  /health
/// ├── /api/
/// │   ├── /auth/
/// │   │   ├── POST /register            (rate limited, no session)
/// │   │   ├── POST /login               (rate limited, no session)
/// │   │   └── GET  /session
/// │   ├── GET|POST /students
/// │   ├── GET|PATCH|DELETE /students/:id
/// │   ├── GET|POST|PATCH /students/:id/consent
/// │   ├── GET|POST /recordings
/// │   ├── POST /storage/sign-upload
/// │   ├── POST /storage/sign-download
/// │   ├── GET  /plans
/// │   └── POST /plans/generate          (rate limited)
/// └── GET|PUT /storage                  (local driver only)
/// ```
///
/// # Middleware Stack
///
/// Outermost first: security headers, CORS, request tracing. The session
/// layer wraps the `/api` routes except register and login; it only decodes
/// a bearer token when one is sent, and each handler applies its own role gate.
pub fn build_router(state: AppState) -> Router {
    use crate::routes;

    let health_routes = Router::new().route("/health", get(routes::health::health_check));

    let session = SessionVerifier::new(state.db.clone(), state.auth_secret());

    // Register and login sit outside the session layer; a bad token must not
    // skip their rate limit.
    let api_routes = Router::new()
        .route("/auth/session", get(routes::auth::session))
        .route(
            "/students",
            get(routes::students::list_students).post(routes::students::create_student),
        )
        .route(
            "/students/:id",
            get(routes::students::get_student)
                .patch(routes::students::update_student)
                .delete(routes::students::delete_student),
        )
        .route(
            "/students/:id/consent",
            get(routes::consent::get_consent)
                .post(routes::consent::create_consent)
                .patch(routes::consent::update_consent),
        )
        .route(
            "/recordings",
            get(routes::recordings::list_recordings).post(routes::recordings::create_recording),
        )
        .route("/storage/sign-upload", post(routes::storage::sign_upload))
        .route("/storage/sign-download", post(routes::storage::sign_download))
        .route("/plans", get(routes::plans::list_plans))
        .route(
            "/plans/generate",
            post(routes::plans::generate_plan).layer(middleware::from_fn_with_state(
                state.limited(RateLimitPolicy::PLAN_GENERATION),
                rate_limit_layer,
            )),
        )
        .route_layer(middleware::from_fn_with_state(session, session_middleware))
        .route(
            "/auth/register",
            post(routes::auth::register).layer(middleware::from_fn_with_state(
                state.limited(RateLimitPolicy::REGISTER),
                rate_limit_layer,
            )),
        )
        .route(
            "/auth/login",
            post(routes::auth::login).layer(middleware::from_fn_with_state(
                state.limited(RateLimitPolicy::LOGIN),
                rate_limit_layer,
            )),
        );

    let mut router = Router::new().merge(health_routes).nest("/api", api_routes);

    if state.local_signer.is_some() {
        let local_storage_routes = Router::new()
            .route(
                "/storage",
                get(routes::local_storage::download).put(routes::local_storage::upload),
            )
            .layer(DefaultBodyLimit::disable())
            .layer(RequestBodyLimitLayer::new(MAX_AUDIO_FILE_BYTES as usize));

        router = router.merge(local_storage_routes);
    }

    router
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_layer(&state.config))
        .layer(SecurityHeadersLayer::new(state.config.environment.is_production()))
        .with_state(state)
}

/// Permissive with `CORS_ORIGINS=*`, otherwise an explicit allow-list
fn cors_layer(config: &Config) -> CorsLayer {
    if config.allows_any_origin() {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = config
        .api
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .expose_headers([
            header::RETRY_AFTER,
            HeaderName::from_static("x-ratelimit-limit"),
            HeaderName::from_static("x-ratelimit-remaining"),
            HeaderName::from_static("x-ratelimit-reset"),
        ])
        .allow_credentials(true)
        .max_age(std::time::Duration::from_secs(3600))
}
