use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration as StdDuration;

use chrono::Duration;

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

/// Top-level configuration for the screening service.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub questionnaire: QuestionnaireConfig,
    pub scoring: ScoringConfig,
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

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            questionnaire: QuestionnaireConfig::load()?,
            scoring: ScoringConfig::load(),
        })
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

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Timing and presentation knobs for the questionnaire flow.
///
/// Earlier revisions of the screening bot hard-coded diverging literals for
/// the retention window and sweep cadence; they are configuration here.
#[derive(Debug, Clone)]
pub struct QuestionnaireConfig {
    /// How long a paused interaction stays resumable before a fresh start.
    pub retention: Duration,
    /// Idle time after which a started interaction is force-paused.
    pub inactivity_threshold: Duration,
    /// Delay between pausing an interaction and the follow-up reminder.
    pub reminder_delay: Duration,
    /// Cadence of the background sweep over started interactions.
    pub sweep_interval: StdDuration,
    /// Cadence of the due-reminder poll.
    pub reminder_poll_interval: StdDuration,
    /// Number of answers shown per review page.
    pub review_page_size: usize,
    /// Whether choice answers match their configured label case-insensitively.
    pub choice_case_insensitive: bool,
}

impl Default for QuestionnaireConfig {
    fn default() -> Self {
        Self {
            retention: Duration::hours(24),
            inactivity_threshold: Duration::minutes(30),
            reminder_delay: Duration::minutes(30),
            sweep_interval: StdDuration::from_secs(15 * 60),
            reminder_poll_interval: StdDuration::from_secs(60),
            review_page_size: 5,
            choice_case_insensitive: false,
        }
    }
}

impl QuestionnaireConfig {
    fn load() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        Ok(Self {
            retention: Duration::hours(env_i64("SCREENING_RETENTION_HOURS", 24)?),
            inactivity_threshold: Duration::minutes(env_i64("SCREENING_IDLE_MINUTES", 30)?),
            reminder_delay: Duration::minutes(env_i64("SCREENING_REMINDER_MINUTES", 30)?),
            sweep_interval: StdDuration::from_secs(
                env_i64("SCREENING_SWEEP_MINUTES", 15)? as u64 * 60,
            ),
            reminder_poll_interval: defaults.reminder_poll_interval,
            review_page_size: env_i64("SCREENING_REVIEW_PAGE_SIZE", 5)? as usize,
            choice_case_insensitive: env::var("SCREENING_CHOICE_CASE_INSENSITIVE")
                .map(|value| matches!(value.trim(), "1" | "true" | "yes"))
                .unwrap_or(defaults.choice_case_insensitive),
        })
    }
}

/// Connection settings for the external scoring model.
#[derive(Debug, Clone)]
pub struct ScoringConfig {
    pub api_url: String,
    pub api_token: String,
    pub model: String,
}

impl ScoringConfig {
    fn load() -> Self {
        Self {
            api_url: env::var("SCORING_API_URL")
                .unwrap_or_else(|_| "http://localhost:9000/v1/chat/completions".to_string()),
            api_token: env::var("SCORING_API_TOKEN").unwrap_or_default(),
            model: env::var("SCORING_MODEL").unwrap_or_else(|_| "GigaChat-Pro".to_string()),
        }
    }
}

fn env_i64(var: &'static str, default: i64) -> Result<i64, ConfigError> {
    match env::var(var) {
        Ok(raw) => raw
            .trim()
            .parse::<i64>()
            .map_err(|_| ConfigError::InvalidNumber { var }),
        Err(_) => Ok(default),
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidNumber { var: &'static str },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber { var } => {
                write!(f, "{var} must be a whole number")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort => None,
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidNumber { .. } => None,
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
        env::remove_var("APP_ENV");
        env::remove_var("APP_HOST");
        env::remove_var("APP_PORT");
        env::remove_var("APP_LOG_LEVEL");
        env::remove_var("SCREENING_RETENTION_HOURS");
        env::remove_var("SCREENING_IDLE_MINUTES");
        env::remove_var("SCREENING_REMINDER_MINUTES");
        env::remove_var("SCREENING_SWEEP_MINUTES");
        env::remove_var("SCREENING_REVIEW_PAGE_SIZE");
        env::remove_var("SCREENING_CHOICE_CASE_INSENSITIVE");
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.questionnaire.retention, Duration::hours(24));
        assert_eq!(config.questionnaire.review_page_size, 5);
        assert!(!config.questionnaire.choice_case_insensitive);
    }

    #[test]
    fn questionnaire_knobs_come_from_env() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("SCREENING_RETENTION_HOURS", "12");
        env::set_var("SCREENING_IDLE_MINUTES", "15");
        env::set_var("SCREENING_CHOICE_CASE_INSENSITIVE", "true");
        let config = AppConfig::load().expect("config loads");
        assert_eq!(config.questionnaire.retention, Duration::hours(12));
        assert_eq!(
            config.questionnaire.inactivity_threshold,
            Duration::minutes(15)
        );
        assert!(config.questionnaire.choice_case_insensitive);
        reset_env();
    }

    #[test]
    fn rejects_malformed_durations() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("SCREENING_RETENTION_HOURS", "soon");
        let error = AppConfig::load().expect_err("config must reject junk");
        assert!(error.to_string().contains("SCREENING_RETENTION_HOURS"));
        reset_env();
    }
}
