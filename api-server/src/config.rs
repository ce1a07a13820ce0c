use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_JWT_SECRET: &str = "dev-jwt-secret-change-me";
const DATABASE_FILE: &str = "taskdesk.db";
const UPLOADS_DIR: &str = "uploads";

/// Server settings, read once from `TASKDESK_*` environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub data_dir: PathBuf,
    pub port: u16,
    pub jwt_secret: String,
    pub jwt_ttl: Duration,
    pub cache_ttl: Duration,
    pub rate_limit: bool,
    /// Running behind a reverse proxy that sets `x-forwarded-for`.
    pub trust_proxy: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".taskdesk-data"),
            port: 3000,
            jwt_secret: DEFAULT_JWT_SECRET.to_string(),
            jwt_ttl: Duration::from_secs(60 * 60),
            cache_ttl: Duration::from_secs(60),
            rate_limit: true,
            trust_proxy: false,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let jwt_secret = env_string("TASKDESK_JWT_SECRET").unwrap_or_else(|| {
            tracing::warn!("TASKDESK_JWT_SECRET is not set; using the development secret");
            defaults.jwt_secret.clone()
        });

        Self {
            data_dir: env_string("TASKDESK_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            port: env_number("TASKDESK_PORT").unwrap_or(defaults.port),
            jwt_secret,
            jwt_ttl: env_number("TASKDESK_JWT_TTL_SECONDS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.jwt_ttl),
            cache_ttl: env_number("TASKDESK_CACHE_TTL_SECONDS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.cache_ttl),
            rate_limit: env_flag("TASKDESK_RATE_LIMIT", defaults.rate_limit),
            trust_proxy: env_flag("TASKDESK_TRUST_PROXY", defaults.trust_proxy),
        }
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(DATABASE_FILE)
    }

    /// Root of the local object store for file uploads.
    pub fn uploads_dir(&self) -> PathBuf {
        self.data_dir.join(UPLOADS_DIR)
    }
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn env_number<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = env_string(name)?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("Ignoring {}={:?}: not a valid number", name, raw);
            None
        }
    }
}

fn env_flag(name: &str, default: bool) -> bool {
    match std::env::var(name) {
        Ok(raw) => parse_flag(&raw).unwrap_or(default),
        Err(_) => default,
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proxy_is_untrusted_by_default() {
        assert!(!ServerConfig::default().trust_proxy);
    }

    #[test]
    fn flags_accept_common_spellings() {
        assert_eq!(parse_flag(" ON "), Some(true));
        assert_eq!(parse_flag("0"), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }

    #[test]
    fn database_lives_in_data_dir() {
        let config = ServerConfig {
            data_dir: PathBuf::from("/tmp/taskdesk"),
            ..Default::default()
        };
        assert_eq!(config.database_path(), PathBuf::from("/tmp/taskdesk/taskdesk.db"));
        assert_eq!(config.uploads_dir(), PathBuf::from("/tmp/taskdesk/uploads"));
    }
}
