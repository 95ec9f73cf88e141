/// Configuration management for the API server
///
/// Everything is read from environment variables (after loading `.env` when
/// present) into a type-safe [`Config`].
///
/// # Environment Variables
///
/// - `APP_ENV`: `development` (default), `test` or `production`
/// - `API_HOST` / `API_PORT`: bind address (default `0.0.0.0:8080`)
/// - `CORS_ORIGINS`: comma-separated origins, or `*` (default)
/// - `DATABASE_URL`: PostgreSQL connection string (required)
/// - `DATABASE_MAX_CONNECTIONS`: pool size (default 10)
/// - `AUTH_SECRET` (or `JWT_SECRET`): signing secret, at least 32 characters (required)
/// - `SESSION_TTL_HOURS`: session token lifetime (default 24)
/// - `REDIS_URL`: shared rate-limit backend (optional)
/// - `STORAGE_DRIVER`: `local` or `s3` (default `s3`)
/// - `LOCAL_STORAGE_BASE_URL`: URL of the local `/storage` route
/// - `S3_*` / `AWS_*`: S3 provider settings
/// - `OPENAI_API_KEY`, `OPENAI_MODEL`, `OPENAI_BASE_URL`: plan generation provider
/// - `LOG_FORMAT`: `json` for JSON logs, anything else for text
///
/// # Example
///
/// ```no_run
/// use phonoplan_api::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```

use std::env;

use phonoplan_shared::auth::jwt::DEFAULT_SESSION_TTL_HOURS;
use phonoplan_shared::config::Environment;
use phonoplan_shared::plans::OpenAiConfig;
use phonoplan_shared::redis::RedisConfig;
use phonoplan_shared::storage::s3::S3Config;
use phonoplan_shared::storage::{StorageDriver, StorageSettings};

/// Minimum length of the signing secret
pub const MIN_SECRET_LENGTH: usize = 32;

/// Default URL of the local storage route
pub const DEFAULT_LOCAL_STORAGE_BASE_URL: &str = "http://localhost:8080/storage";

/// Complete application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub environment: Environment,

    pub api: ApiConfig,

    pub database: DatabaseConfig,

    pub auth: AuthConfig,

    /// `None` keeps rate-limit windows in process memory
    pub redis: Option<RedisConfig>,

    pub storage: StorageSettings,

    /// `None` disables plan generation
    pub openai: Option<OpenAiConfig>,

    pub log_format: LogFormat,
}

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub host: String,

    pub port: u16,

    /// Allowed CORS origins; `["*"]` allows any
    pub cors_origins: Vec<String>,
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,

    pub max_connections: u32,
}

/// Session signing configuration
#[derive(Clone)]
pub struct AuthConfig {
    /// Signs session tokens and local storage URLs
    ///
    /// Generate with: `openssl rand -hex 32`
    pub secret: String,

    pub session_ttl_hours: i64,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("session_ttl_hours", &self.session_ttl_hours)
            .finish_non_exhaustive()
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()) {
            Some(v) if v == "json" => LogFormat::Json,
            _ => LogFormat::Text,
        }
    }
}

impl Config {
    /// Loads configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `DATABASE_URL` or the signing secret is missing
    /// - the secret is shorter than 32 characters
    /// - a numeric or enumerated variable has an invalid value
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file if present (for development)
        dotenvy::dotenv().ok();

        let environment = Environment::from_env().map_err(|e| anyhow::anyhow!(e))?;

        let api_host = env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let api_port = env::var("API_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse::<u16>()?;
        let cors_origins = parse_cors_origins(&env::var("CORS_ORIGINS").unwrap_or_else(|_| "*".to_string()));

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable is required"))?;

        let max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse::<u32>()?;

        let secret = resolve_secret(env::var("AUTH_SECRET").ok(), env::var("JWT_SECRET").ok())?;

        let session_ttl_hours = match env::var("SESSION_TTL_HOURS") {
            Ok(value) => value.parse::<i64>()?,
            Err(_) => DEFAULT_SESSION_TTL_HOURS,
        };
        if session_ttl_hours <= 0 {
            anyhow::bail!("SESSION_TTL_HOURS must be positive");
        }

        let driver = env::var("STORAGE_DRIVER")
            .unwrap_or_default()
            .parse::<StorageDriver>()
            .map_err(|e| anyhow::anyhow!(e))?;

        let s3 = match S3Config::from_env() {
            Ok(s3) => Some(s3),
            Err(e) => {
                if driver == StorageDriver::S3 {
                    tracing::debug!(error = %e, "S3 configuration incomplete");
                }
                None
            }
        };

        let local_base_url = env::var("LOCAL_STORAGE_BASE_URL")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_LOCAL_STORAGE_BASE_URL.to_string());

        Ok(Self {
            environment,
            api: ApiConfig {
                host: api_host,
                port: api_port,
                cors_origins,
            },
            database: DatabaseConfig {
                url: database_url,
                max_connections,
            },
            auth: AuthConfig {
                secret,
                session_ttl_hours,
            },
            redis: RedisConfig::from_env(),
            storage: StorageSettings {
                driver,
                s3,
                local_base_url,
            },
            openai: OpenAiConfig::from_env(),
            log_format: LogFormat::parse(env::var("LOG_FORMAT").ok().as_deref()),
        })
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }

    /// Whether any origin may call the API
    pub fn allows_any_origin(&self) -> bool {
        self.api.cors_origins.iter().any(|o| o == "*")
    }
}

/// Splits `CORS_ORIGINS`; an empty value means `*`
pub fn parse_cors_origins(value: &str) -> Vec<String> {
    let origins: Vec<String> = value
        .split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .map(str::to_string)
        .collect();

    if origins.is_empty() {
        vec!["*".to_string()]
    } else {
        origins
    }
}

/// Picks `AUTH_SECRET`, falling back to `JWT_SECRET`, and checks its length
pub fn resolve_secret(auth_secret: Option<String>, jwt_secret: Option<String>) -> anyhow::Result<String> {
    let secret = auth_secret
        .filter(|s| !s.is_empty())
        .or(jwt_secret.filter(|s| !s.is_empty()))
        .ok_or_else(|| anyhow::anyhow!("AUTH_SECRET (or JWT_SECRET) environment variable is required"))?;

    if secret.len() < MIN_SECRET_LENGTH {
        anyhow::bail!("AUTH_SECRET must be at least {} characters long", MIN_SECRET_LENGTH);
    }

    Ok(secret)
}
