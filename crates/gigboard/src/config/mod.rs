use std::env;
use std::net::{IpAddr, SocketAddr};

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
    pub auth: AuthConfig,
    pub marketplace: MarketplaceConfig,
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

        let auth = AuthConfig {
            subject_header: header_var("APP_AUTH_SUBJECT_HEADER", "x-auth-subject")?,
            email_header: header_var("APP_AUTH_EMAIL_HEADER", "x-auth-email")?,
            session_header: header_var("APP_AUTH_SESSION_HEADER", "x-auth-session")?,
        };

        let store_retry_attempts = numeric_var("APP_STORE_RETRY_ATTEMPTS", 3u8)?;
        if !(1..=10).contains(&store_retry_attempts) {
            return Err(ConfigError::OutOfRange {
                var: "APP_STORE_RETRY_ATTEMPTS",
                expected: "1..=10",
            });
        }

        let marketplace = MarketplaceConfig {
            admin_subjects: env::var("APP_ADMIN_SUBJECTS")
                .map(|raw| split_list(&raw))
                .unwrap_or_default(),
            store_retry_attempts,
            allow_duplicate_applications: flag_var("APP_ALLOW_DUPLICATE_APPLICATIONS", false)?,
            top_freelancers_limit: numeric_var("APP_TOP_FREELANCERS_LIMIT", 10usize)?,
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            auth,
            marketplace,
        })
    }
}

fn header_var(var: &'static str, default: &str) -> Result<String, ConfigError> {
    let value = env::var(var)
        .unwrap_or_else(|_| default.to_string())
        .trim()
        .to_ascii_lowercase();
    let valid = !value.is_empty()
        && value
            .bytes()
            .all(|byte| byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_');
    if valid {
        Ok(value)
    } else {
        Err(ConfigError::InvalidHeaderName { var })
    }
}

fn numeric_var<T: std::str::FromStr>(var: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(var) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidNumber { var }),
        Err(_) => Ok(default),
    }
}

fn flag_var(var: &'static str, default: bool) -> Result<bool, ConfigError> {
    match env::var(var) {
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidFlag { var }),
        },
        Err(_) => Ok(default),
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
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

/// Header names set by the authenticating proxy in front of the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthConfig {
    pub subject_header: String,
    pub email_header: String,
    pub session_header: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            subject_header: "x-auth-subject".to_string(),
            email_header: "x-auth-email".to_string(),
            session_header: "x-auth-session".to_string(),
        }
    }
}

/// Workflow policy knobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketplaceConfig {
    /// Subjects granted the admin capability when they register.
    pub admin_subjects: Vec<String>,
    pub store_retry_attempts: u8,
    pub allow_duplicate_applications: bool,
    pub top_freelancers_limit: usize,
}

impl Default for MarketplaceConfig {
    fn default() -> Self {
        Self {
            admin_subjects: Vec::new(),
            store_retry_attempts: 3,
            allow_duplicate_applications: false,
            top_freelancers_limit: 10,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("APP_PORT must be a valid u16")]
    InvalidPort,
    #[error("APP_HOST must parse to an IPv4 or IPv6 address")]
    InvalidHost {
        #[source]
        source: std::net::AddrParseError,
    },
    #[error("{var} must be a valid HTTP header name")]
    InvalidHeaderName { var: &'static str },
    #[error("{var} must be a non-negative integer")]
    InvalidNumber { var: &'static str },
    #[error("{var} must be within {expected}")]
    OutOfRange {
        var: &'static str,
        expected: &'static str,
    },
    #[error("{var} must be one of true/false/1/0/yes/no/on/off")]
    InvalidFlag { var: &'static str },
}
