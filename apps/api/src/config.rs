use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub db_max_connections: u32,
    pub jwt_secret: String,
    pub access_token_expire_minutes: i64,
    pub port: u16,
    pub rust_log: String,
    pub max_upload_bytes: usize,
    pub model_path: String,
    pub cors_origins: Vec<String>,
    pub admin_email: String,
    pub admin_password: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            db_max_connections: parse_env("DB_MAX_CONNECTIONS", 10)?,
            jwt_secret: require_env("JWT_SECRET")?,
            access_token_expire_minutes: parse_env("ACCESS_TOKEN_EXPIRE_MINUTES", 60 * 24 * 8)?,
            port: parse_env("PORT", 8000)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            max_upload_bytes: parse_env("MAX_UPLOAD_BYTES", 50 * 1024 * 1024)?,
            model_path: std::env::var("MODEL_PATH")
                .unwrap_or_else(|_| "models/exoplanet_classifier.json".to_string()),
            cors_origins: std::env::var("CORS_ORIGINS")
                .map(|v| split_origins(&v))
                .unwrap_or_default(),
            admin_email: std::env::var("ADMIN_EMAIL")
                .unwrap_or_else(|_| "admin@exoplanet-research.org".to_string()),
            admin_password: std::env::var("ADMIN_PASSWORD")
                .ok()
                .filter(|v| !v.is_empty()),
        })
    }

    /// Minimal config for router tests; never touches the environment.
    #[cfg(test)]
    pub fn for_tests() -> Self {
        Config {
            database_url: "postgres://unused".to_string(),
            db_max_connections: 1,
            jwt_secret: "test-secret".to_string(),
            access_token_expire_minutes: 60,
            port: 0,
            rust_log: "debug".to_string(),
            max_upload_bytes: 64 * 1024,
            model_path: "unused.json".to_string(),
            cors_origins: Vec::new(),
            admin_email: "admin@example.org".to_string(),
            admin_password: None,
        }
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} has an invalid value '{raw}'")),
        Err(_) => Ok(default),
    }
}

fn split_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_origins_trims_and_drops_empty() {
        let origins = split_origins(" http://a.test, ,http://b.test ");
        assert_eq!(origins, vec!["http://a.test", "http://b.test"]);
    }

    #[test]
    fn test_split_origins_empty() {
        assert!(split_origins("").is_empty());
    }
}
