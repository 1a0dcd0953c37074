use std::env;
use std::path::PathBuf;

/// Which [`crate::object_store::ObjectStore`] backend to construct at startup.
#[derive(Debug, Clone)]
pub enum ObjectStoreBackend {
    Local { base_dir: PathBuf },
    S3 { bucket: String, endpoint_url: Option<String> },
}

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to listen on.
    pub port: u16,
    /// Bind address (0.0.0.0 for LAN, 127.0.0.1 for localhost).
    pub bind_addr: String,
    /// Object store backend selection and its connection details.
    pub object_store: ObjectStoreBackend,
    /// Base URL of the upstream FDSN archive (`dataselect`/`station` services).
    pub archive_base_url: String,
    /// Ceiling on a single archive fetch's span (§4.2).
    pub max_fetch_seconds: i64,
    /// Ceiling on a single `request_stream` request's duration (§4.6 step 1).
    pub max_request_duration_seconds: i64,
    /// Bounds concurrent archive fetches across all origin tasks (§5 backpressure).
    pub max_concurrent_archive_fetches: usize,
    /// TTL for presigned chunk URLs (§4.7 step 5, "on the order of one hour").
    pub presigned_url_ttl_seconds: u64,
    /// Default high-pass corner in Hz when a request enables it without specifying one.
    pub default_highpass_corner_hz: f64,
    /// How often the origin coalescing map is swept for finished entries (§5).
    pub origin_sweep_interval_seconds: u64,
    /// CORS allowed origins (comma-separated in env var).
    pub cors_origins: Vec<String>,
}

impl ServerConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let object_store = match env::var("OBJECT_STORE_BACKEND")
            .unwrap_or_else(|_| "local".to_string())
            .to_lowercase()
            .as_str()
        {
            "s3" => {
                let bucket = env::var("S3_BUCKET")
                    .map_err(|_| ConfigError::MissingEnvVar("S3_BUCKET".to_string()))?;
                ObjectStoreBackend::S3 {
                    bucket,
                    endpoint_url: env::var("S3_ENDPOINT_URL").ok(),
                }
            }
            "local" => ObjectStoreBackend::Local {
                base_dir: env::var("LOCAL_STORE_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| PathBuf::from("/var/lib/seismic-stream/data")),
            },
            other => return Err(ConfigError::InvalidValue(format!("unknown OBJECT_STORE_BACKEND: {other}"))),
        };

        let archive_base_url = env::var("ARCHIVE_BASE_URL")
            .map_err(|_| ConfigError::MissingEnvVar("ARCHIVE_BASE_URL".to_string()))?;

        Ok(Self {
            port: env::var("SEISMIC_STREAM_PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidPort)?,
            bind_addr: env::var("SEISMIC_STREAM_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0".to_string()),
            object_store,
            archive_base_url,
            max_fetch_seconds: env::var("MAX_FETCH_SECONDS")
                .unwrap_or_else(|_| "86400".to_string())
                .parse()
                .unwrap_or(86_400),
            max_request_duration_seconds: env::var("MAX_REQUEST_DURATION_SECONDS")
                .unwrap_or_else(|_| "86400".to_string())
                .parse()
                .unwrap_or(86_400),
            max_concurrent_archive_fetches: env::var("MAX_CONCURRENT_ARCHIVE_FETCHES")
                .unwrap_or_else(|_| "4".to_string())
                .parse()
                .unwrap_or(4),
            presigned_url_ttl_seconds: env::var("PRESIGNED_URL_TTL_SECONDS")
                .unwrap_or_else(|_| "3600".to_string())
                .parse()
                .unwrap_or(3600),
            default_highpass_corner_hz: env::var("DEFAULT_HIGHPASS_CORNER_HZ")
                .unwrap_or_else(|_| "1.0".to_string())
                .parse()
                .unwrap_or(1.0),
            origin_sweep_interval_seconds: env::var("ORIGIN_SWEEP_INTERVAL_SECONDS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .unwrap_or(60),
            cors_origins: env::var("CORS_ORIGINS")
                .map(|s| s.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or_else(|_| vec!["http://localhost:3000".to_string()]),
        })
    }

    /// Get the full bind address (addr:port).
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid port number")]
    InvalidPort,
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    #[error("invalid configuration value: {0}")]
    InvalidValue(String),
}
