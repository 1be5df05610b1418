use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

const DEFAULT_MODEL_DIR: &str = "models";
const DEFAULT_EMBEDDING_DIMENSION: usize = 384;
const DEFAULT_IMAGE_BUCKET: &str = "ecochain-product-images";

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub scoring: ScoringConfig,
    pub storage: StorageConfig,
}

impl AppConfig {
    /// Read `.env` (if present) and then the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(&var_or("APP_ENV", "development"));
        let server = ServerConfig {
            host: var_or("APP_HOST", "127.0.0.1"),
            port: var_or("APP_PORT", "3000")
                .parse::<u16>()
                .map_err(|_| ConfigError::InvalidPort)?,
        };

        let telemetry = TelemetryConfig {
            log_level: var_or("ECOCHAIN_LOG_LEVEL", "info"),
            format: match optional_var("ECOCHAIN_LOG_FORMAT") {
                Some(raw) => LogFormat::parse(&raw)
                    .ok_or(ConfigError::InvalidLogFormat { value: raw })?,
                None => LogFormat::Compact,
            },
        };

        let scoring = ScoringConfig {
            model_dir: PathBuf::from(var_or("ECOCHAIN_MODEL_DIR", DEFAULT_MODEL_DIR)),
            embedding_dimension: match optional_var("ECOCHAIN_EMBEDDING_DIM") {
                Some(raw) => parse_dimension(raw)?,
                None => DEFAULT_EMBEDDING_DIMENSION,
            },
        };

        let storage = StorageConfig {
            image_bucket: var_or("ECOCHAIN_IMAGE_BUCKET", DEFAULT_IMAGE_BUCKET),
            suppliers_csv: optional_var("ECOCHAIN_SUPPLIERS_CSV").map(PathBuf::from),
        };

        Ok(Self {
            environment,
            server,
            telemetry,
            scoring,
            storage,
        })
    }
}

/// Set and non-blank, trimmed.
fn optional_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn var_or(key: &str, default: &str) -> String {
    optional_var(key).unwrap_or_else(|| default.to_string())
}

fn parse_dimension(raw: String) -> Result<usize, ConfigError> {
    match raw.parse::<usize>() {
        Ok(dimension) if dimension > 0 => Ok(dimension),
        _ => Err(ConfigError::InvalidEmbeddingDimension { value: raw }),
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

impl LogFormat {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" | "text" => Some(Self::Compact),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub format: LogFormat,
}

/// Where the scoring artifacts live and the embedding width they expect.
#[derive(Debug, Clone)]
pub struct ScoringConfig {
    pub model_dir: PathBuf,
    pub embedding_dimension: usize,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub image_bucket: String,
    /// Supplier table export loaded into the store at startup.
    pub suppliers_csv: Option<PathBuf>,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidLogFormat { value: String },
    InvalidEmbeddingDimension { value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidLogFormat { value } => write!(
                f,
                "ECOCHAIN_LOG_FORMAT must be 'compact' or 'json', got '{}'",
                value
            ),
            ConfigError::InvalidEmbeddingDimension { value } => write!(
                f,
                "ECOCHAIN_EMBEDDING_DIM must be a positive integer, got '{}'",
                value
            ),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidLogFormat { .. }
            | ConfigError::InvalidEmbeddingDimension { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, OnceLock};

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        for key in [
            "APP_ENV",
            "APP_HOST",
            "APP_PORT",
            "ECOCHAIN_LOG_LEVEL",
            "ECOCHAIN_LOG_FORMAT",
            "ECOCHAIN_MODEL_DIR",
            "ECOCHAIN_EMBEDDING_DIM",
            "ECOCHAIN_IMAGE_BUCKET",
            "ECOCHAIN_SUPPLIERS_CSV",
        ] {
            env::remove_var(key);
        }
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.telemetry.log_level, "info");
        assert_eq!(config.telemetry.format, LogFormat::Compact);
        assert_eq!(config.scoring.model_dir, PathBuf::from("models"));
        assert_eq!(config.scoring.embedding_dimension, 384);
        assert_eq!(config.storage.image_bucket, "ecochain-product-images");
        assert!(config.storage.suppliers_csv.is_none());
    }

    #[test]
    fn accepts_localhost_host() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_HOST", "localhost");
        let config = AppConfig::load().expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 3000));
        reset_env();
    }

    #[test]
    fn reads_scoring_overrides() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("ECOCHAIN_MODEL_DIR", "/srv/ecochain/models");
        env::set_var("ECOCHAIN_EMBEDDING_DIM", "16");
        env::set_var("ECOCHAIN_LOG_FORMAT", "JSON");
        env::set_var("ECOCHAIN_SUPPLIERS_CSV", "suppliers.csv");
        let config = AppConfig::load().expect("config loads");
        assert_eq!(config.scoring.model_dir, PathBuf::from("/srv/ecochain/models"));
        assert_eq!(config.scoring.embedding_dimension, 16);
        assert_eq!(config.telemetry.format, LogFormat::Json);
        assert_eq!(
            config.storage.suppliers_csv,
            Some(PathBuf::from("suppliers.csv"))
        );
        reset_env();
    }

    #[test]
    fn rejects_zero_embedding_dimension() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("ECOCHAIN_EMBEDDING_DIM", "0");
        match AppConfig::load() {
            Err(ConfigError::InvalidEmbeddingDimension { value }) => assert_eq!(value, "0"),
            other => panic!("expected invalid dimension, got {other:?}"),
        }
        reset_env();
    }
}
