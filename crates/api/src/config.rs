use serde::Deserialize;
use shared::jwt::{JwtConfig, JwtError};
use std::net::{AddrParseError, SocketAddr};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    /// Identity token verification
    pub jwt: JwtAuthConfig,
    #[serde(default)]
    pub reservations: ReservationsConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
    #[serde(default)]
    pub jobs: JobsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
}

impl From<&DatabaseConfig> for persistence::db::DatabaseConfig {
    fn from(config: &DatabaseConfig) -> Self {
        Self {
            url: config.url.clone(),
            max_connections: config.max_connections,
            min_connections: config.min_connections,
            connect_timeout_secs: config.connect_timeout_secs,
            idle_timeout_secs: config.idle_timeout_secs,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SecurityConfig {
    #[serde(default)]
    pub cors_origins: Vec<String>,

    /// Send Strict-Transport-Security. Enable only behind TLS termination.
    #[serde(default)]
    pub hsts_enabled: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtAuthConfig {
    /// RSA public key in PEM format (RS256)
    #[serde(default)]
    pub public_key: String,

    /// Shared secret (HS256). Used when no public key is configured.
    #[serde(default)]
    pub shared_secret: String,

    /// Leeway in seconds for clock skew tolerance (default: 30)
    #[serde(default = "default_jwt_leeway")]
    pub leeway_secs: u64,
}

impl JwtAuthConfig {
    /// Builds the verifier. The public key wins when both are set.
    pub fn verifier(&self) -> Result<JwtConfig, JwtError> {
        if !self.public_key.is_empty() {
            JwtConfig::from_public_key(&self.public_key, self.leeway_secs)
        } else {
            JwtConfig::from_secret(&self.shared_secret, self.leeway_secs)
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReservationsConfig {
    /// Ticket number candidates tried before a registration fails
    #[serde(default = "default_ticket_max_attempts")]
    pub ticket_max_attempts: u32,
}

impl Default for ReservationsConfig {
    fn default() -> Self {
        Self {
            ticket_max_attempts: default_ticket_max_attempts(),
        }
    }
}

/// Notification provider selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationProvider {
    Console,
    Database,
    Disabled,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotificationsConfig {
    #[serde(default = "default_notification_provider")]
    pub provider: NotificationProvider,
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            provider: default_notification_provider(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct JobsConfig {
    #[serde(default = "default_jobs_enabled")]
    pub enabled: bool,

    #[serde(default = "default_pool_metrics_interval")]
    pub pool_metrics_interval_secs: u64,

    #[serde(default = "default_reconcile_interval")]
    pub reconcile_interval_minutes: u64,

    /// Rewrite drifted counters instead of only reporting them
    #[serde(default)]
    pub reconcile_repair: bool,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            enabled: default_jobs_enabled(),
            pool_metrics_interval_secs: default_pool_metrics_interval(),
            reconcile_interval_minutes: default_reconcile_interval(),
            reconcile_repair: false,
        }
    }
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_request_timeout() -> u64 {
    30
}
fn default_max_connections() -> u32 {
    20
}
fn default_min_connections() -> u32 {
    5
}
fn default_connect_timeout() -> u64 {
    10
}
fn default_idle_timeout() -> u64 {
    600
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "json".to_string()
}
fn default_jwt_leeway() -> u64 {
    shared::jwt::DEFAULT_LEEWAY_SECS
}
fn default_ticket_max_attempts() -> u32 {
    domain::services::DEFAULT_TICKET_MAX_ATTEMPTS
}
fn default_notification_provider() -> NotificationProvider {
    NotificationProvider::Console
}
fn default_jobs_enabled() -> bool {
    true
}
fn default_pool_metrics_interval() -> u64 {
    10
}
fn default_reconcile_interval() -> u64 {
    15
}

/// Configuration validation error
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Loading order (later sources override earlier):
    /// 1. config/default.toml - base configuration with defaults
    /// 2. config/local.toml - local overrides (optional, not in git)
    /// 3. Environment variables with ER__ prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(config::Environment::with_prefix("ER").separator("__"))
            .build()?;

        let cfg: Self = config.try_deserialize()?;
        cfg.validate()
            .map_err(|e| config::ConfigError::Message(e.to_string()))?;
        Ok(cfg)
    }

    /// Load configuration for testing with custom overrides.
    ///
    /// Builds entirely from embedded defaults so tests do not depend on the
    /// working directory. Validation is skipped to allow partial configs.
    pub fn load_for_test(overrides: &[(&str, &str)]) -> Result<Self, config::ConfigError> {
        let defaults = r#"
            [server]
            host = "127.0.0.1"
            port = 8080
            request_timeout_secs = 30

            [database]
            url = ""
            max_connections = 20
            min_connections = 5
            connect_timeout_secs = 10
            idle_timeout_secs = 600

            [logging]
            level = "info"
            format = "json"

            [security]
            cors_origins = []
            hsts_enabled = false

            [jwt]
            public_key = ""
            shared_secret = "test-shared-secret-for-event-rental"
            leeway_secs = 0

            [reservations]
            ticket_max_attempts = 8

            [notifications]
            provider = "disabled"

            [jobs]
            enabled = false
            pool_metrics_interval_secs = 10
            reconcile_interval_minutes = 15
            reconcile_repair = false
        "#;

        let mut builder = config::Config::builder()
            .add_source(config::File::from_str(defaults, config::FileFormat::Toml));

        for (key, value) in overrides {
            builder = builder.set_override(*key, *value)?;
        }

        builder.build()?.try_deserialize()
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        // Database URL is required
        if self.database.url.is_empty() {
            return Err(ConfigValidationError::MissingRequired(
                "ER__DATABASE__URL environment variable must be set".to_string(),
            ));
        }

        // Validate port range
        if self.server.port == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "Server port cannot be 0".to_string(),
            ));
        }

        if self.socket_addr().is_err() {
            return Err(ConfigValidationError::InvalidValue(format!(
                "Invalid listen address {}:{}",
                self.server.host, self.server.port
            )));
        }

        // Validate connection pool settings
        if self.database.min_connections > self.database.max_connections {
            return Err(ConfigValidationError::InvalidValue(
                "min_connections cannot exceed max_connections".to_string(),
            ));
        }

        if self.jwt.public_key.is_empty() && self.jwt.shared_secret.is_empty() {
            return Err(ConfigValidationError::MissingRequired(
                "jwt.public_key or jwt.shared_secret must be set".to_string(),
            ));
        }

        if self.reservations.ticket_max_attempts == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "reservations.ticket_max_attempts must be at least 1".to_string(),
            ));
        }

        if self.jobs.enabled
            && (self.jobs.pool_metrics_interval_secs == 0 || self.jobs.reconcile_interval_minutes == 0)
        {
            return Err(ConfigValidationError::InvalidValue(
                "job intervals must be positive".to_string(),
            ));
        }

        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, AddrParseError> {
        format!("{}:{}", self.server.host, self.server.port).parse()
    }
}
