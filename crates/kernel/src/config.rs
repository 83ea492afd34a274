//! Configuration loaded from environment variables.

use std::env;
use std::path::PathBuf;
use std::sync::LazyLock;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use regex::Regex;
use reqwest::Url;

/// Default maximum upload size (10 MiB).
const DEFAULT_MAX_UPLOAD_SIZE: usize = 10 * 1024 * 1024;

/// Plain SQL identifier, safe to interpolate as a quoted role name.
#[allow(clippy::expect_used)]
static ROLE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,62}$").expect("valid role regex"));

/// Durable storage configuration. Absent when `DATABASE_URL` is unset.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL.
    pub url: String,

    /// Maximum database connections in pool (default: 10).
    pub max_connections: u32,

    /// Deadline for acquiring a connection and for each storage operation
    /// (default: 10s).
    pub timeout: Duration,

    /// Apply embedded migrations on startup (default: false).
    pub run_migrations: bool,

    /// Role assumed for anonymous requests.
    pub anon_role: Option<String>,

    /// Role assumed for requests with a verified bearer token.
    pub authenticated_role: Option<String>,
}

/// Identity provider configuration. Absent when `AUTH_URL` is unset.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Base URL of the provider, always ending in `/`.
    pub url: Url,

    /// Public API key sent as the `apikey` header.
    pub api_key: String,

    /// Shared HS256 secret for local access-token verification.
    pub jwt_secret: Option<String>,

    /// Request timeout (default: 10s).
    pub timeout: Duration,
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port (default: 3000).
    pub port: u16,

    /// Durable storage. `None` selects the in-memory backend.
    pub database: Option<DatabaseConfig>,

    /// Identity provider. `None` leaves every request anonymous.
    pub auth: Option<AuthConfig>,

    /// Path to uploads directory (default: ./uploads).
    pub uploads_dir: PathBuf,

    /// Base URL for serving uploaded files (default: /files).
    pub files_url: String,

    /// Maximum accepted image upload in bytes (default: 10 MiB).
    pub max_upload_size: usize,

    /// CORS allowed origins (comma-separated, default: "*").
    pub cors_allowed_origins: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            database: None,
            auth: None,
            uploads_dir: PathBuf::from("./uploads"),
            files_url: "/files".to_string(),
            max_upload_size: DEFAULT_MAX_UPLOAD_SIZE,
            cors_allowed_origins: vec!["*".to_string()],
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let port = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .context("PORT must be a valid u16")?;

        let database = match env::var("DATABASE_URL").ok().filter(|v| !v.is_empty()) {
            Some(url) => Some(database_from_env(url)?),
            None => None,
        };

        let auth = match env::var("AUTH_URL").ok().filter(|v| !v.is_empty()) {
            Some(url) => Some(auth_from_env(&url)?),
            None => None,
        };

        let uploads_dir = env::var("UPLOADS_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./uploads"));

        let files_url = env::var("FILES_URL").unwrap_or_else(|_| "/files".to_string());

        let max_upload_size = env::var("MAX_UPLOAD_SIZE")
            .unwrap_or_else(|_| DEFAULT_MAX_UPLOAD_SIZE.to_string())
            .parse()
            .context("MAX_UPLOAD_SIZE must be a valid byte count")?;

        let cors_allowed_origins = env::var("CORS_ALLOWED_ORIGINS")
            .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
            .unwrap_or_else(|_| vec!["*".to_string()]);

        Ok(Self {
            port,
            database,
            auth,
            uploads_dir,
            files_url,
            max_upload_size,
            cors_allowed_origins,
        })
    }
}

fn database_from_env(url: String) -> Result<DatabaseConfig> {
    let max_connections = env::var("DATABASE_MAX_CONNECTIONS")
        .unwrap_or_else(|_| "10".to_string())
        .parse()
        .context("DATABASE_MAX_CONNECTIONS must be a valid u32")?;

    let timeout_secs: u64 = env::var("DATABASE_TIMEOUT_SECS")
        .unwrap_or_else(|_| "10".to_string())
        .parse()
        .context("DATABASE_TIMEOUT_SECS must be a valid u64")?;

    let run_migrations = env::var("DATABASE_RUN_MIGRATIONS")
        .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false);

    let anon_role = role_from_env("DATABASE_ANON_ROLE")?;
    let authenticated_role = role_from_env("DATABASE_AUTHENTICATED_ROLE")?;

    Ok(DatabaseConfig {
        url,
        max_connections,
        timeout: Duration::from_secs(timeout_secs),
        run_migrations,
        anon_role,
        authenticated_role,
    })
}

fn auth_from_env(url: &str) -> Result<AuthConfig> {
    let url = parse_base_url(url).context("AUTH_URL must be a valid URL")?;

    let api_key = env::var("AUTH_API_KEY")
        .ok()
        .filter(|v| !v.is_empty())
        .context("AUTH_API_KEY is required when AUTH_URL is set")?;

    let jwt_secret = env::var("AUTH_JWT_SECRET").ok().filter(|v| !v.is_empty());

    let timeout_secs: u64 = env::var("AUTH_TIMEOUT_SECS")
        .unwrap_or_else(|_| "10".to_string())
        .parse()
        .context("AUTH_TIMEOUT_SECS must be a valid u64")?;

    Ok(AuthConfig {
        url,
        api_key,
        jwt_secret,
        timeout: Duration::from_secs(timeout_secs),
    })
}

fn role_from_env(name: &str) -> Result<Option<String>> {
    match env::var(name).ok().filter(|v| !v.is_empty()) {
        Some(role) => validate_role_name(&role)
            .with_context(|| format!("{name} is not a valid role name"))
            .map(|()| Some(role)),
        None => Ok(None),
    }
}

/// Check that a role name is a plain SQL identifier.
pub fn validate_role_name(role: &str) -> Result<()> {
    if !ROLE_NAME.is_match(role) {
        bail!("invalid role name: {role:?}");
    }
    Ok(())
}

/// Parse a base URL, appending a trailing `/` so relative joins keep the path.
pub fn parse_base_url(raw: &str) -> Result<Url> {
    let mut url = Url::parse(raw.trim())?;
    if url.cannot_be_a_base() {
        bail!("URL cannot be used as a base: {raw}");
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn role_names() {
        assert!(validate_role_name("anon").is_ok());
        assert!(validate_role_name("authenticated").is_ok());
        assert!(validate_role_name("_svc_1").is_ok());
        assert!(validate_role_name("").is_err());
        assert!(validate_role_name("1role").is_err());
        assert!(validate_role_name("anon\"; DROP TABLE x; --").is_err());
        assert!(validate_role_name("two words").is_err());
    }

    #[test]
    fn base_url_gets_trailing_slash() {
        assert_eq!(
            parse_base_url("https://auth.example.com").unwrap().as_str(),
            "https://auth.example.com/"
        );
        assert_eq!(
            parse_base_url("https://example.com/gotrue").unwrap().as_str(),
            "https://example.com/gotrue/"
        );
        assert_eq!(
            parse_base_url("https://example.com/gotrue/").unwrap().as_str(),
            "https://example.com/gotrue/"
        );
        assert!(parse_base_url("not a url").is_err());
        assert!(parse_base_url("mailto:someone@example.com").is_err());
    }

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.port, 3000);
        assert!(config.database.is_none());
        assert!(config.auth.is_none());
        assert_eq!(config.max_upload_size, 10 * 1024 * 1024);
        assert_eq!(config.cors_allowed_origins, vec!["*".to_string()]);
    }
}
