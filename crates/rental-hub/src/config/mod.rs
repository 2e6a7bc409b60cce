use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

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

    /// Which set of payment credentials this stage is allowed to use.
    pub const fn payment_mode(self) -> PaymentMode {
        match self {
            Self::Production => PaymentMode::Live,
            Self::Development | Self::Test => PaymentMode::Sandbox,
        }
    }
}

/// Top-level configuration for the application.
///
/// Built once at process start and handed to the components that need it;
/// nothing reads the process environment after `load` returns.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub storage: StorageConfig,
    pub payments: PaymentConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let storage = StorageConfig {
            policy_file: non_empty_var("APP_POLICY_FILE").map(PathBuf::from),
            media_dir: non_empty_var("APP_MEDIA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("storage/media")),
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            storage,
            payments: PaymentConfig::for_mode(environment.payment_mode()),
        })
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
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

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Local paths used by the service adapters.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub policy_file: Option<PathBuf>,
    pub media_dir: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentMode {
    Sandbox,
    Live,
}

impl PaymentMode {
    const fn prefix(self) -> &'static str {
        match self {
            Self::Sandbox => "TEST",
            Self::Live => "LIVE",
        }
    }
}

/// Public/private key pair for one payment provider.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ProviderKeys {
    pub public_key: Option<String>,
    pub private_key: Option<String>,
}

impl ProviderKeys {
    fn from_env(provider: &str, mode: PaymentMode) -> Self {
        let prefix = mode.prefix();
        Self {
            public_key: non_empty_var(&format!("{provider}_{prefix}_PUBLIC")),
            private_key: non_empty_var(&format!("{provider}_{prefix}_PRIVATE")),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.public_key.is_some() && self.private_key.is_some()
    }
}

// Private keys stay out of logs.
impl fmt::Debug for ProviderKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderKeys")
            .field("public_key", &self.public_key)
            .field("private_key", &self.private_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Payment-provider credentials resolved for the running environment.
#[derive(Debug, Clone)]
pub struct PaymentConfig {
    pub mode: PaymentMode,
    pub conekta: ProviderKeys,
    pub paypal: ProviderKeys,
}

impl PaymentConfig {
    fn for_mode(mode: PaymentMode) -> Self {
        Self {
            mode,
            conekta: ProviderKeys::from_env("CONEKTA", mode),
            paypal: ProviderKeys::from_env("PAYPAL", mode),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort => None,
            ConfigError::InvalidHost { source } => Some(source),
        }
    }
}
