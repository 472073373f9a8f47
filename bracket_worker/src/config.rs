//! Worker configuration management.
//!
//! Consolidates all environment variable reads and provides validated configuration.

use bracket_engine::db::DatabaseConfig;
use bracket_engine::tournament::PrizeSplit;
use rust_decimal::Decimal;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

/// Default poll interval of the reminder loop
pub const DEFAULT_REMINDER_INTERVAL_SECS: u64 = 3600;

/// Complete worker configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Database configuration
    pub database: DatabaseConfig,
    /// How often `watch` checks whether reminders are due
    pub reminder_interval: Duration,
    /// Where notifications go
    pub notifier: NotifierKind,
    /// Prometheus listener, if metrics are exported
    pub metrics_bind: Option<SocketAddr>,
    /// Pool shares paid to the top three places
    pub prize_split: PrizeSplit,
}

/// Notification backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifierKind {
    /// Write notifications to the log only
    Log,
    /// Store notifications in the `notifications` table
    Database,
}

impl FromStr for NotifierKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "log" => Ok(NotifierKind::Log),
            "database" | "db" => Ok(NotifierKind::Database),
            other => Err(ConfigError::Invalid {
                var: "NOTIFIER".to_string(),
                reason: format!("Unknown notifier '{other}', expected 'log' or 'database'"),
            }),
        }
    }
}

impl WorkerConfig {
    /// Load configuration from environment variables
    ///
    /// # Arguments
    ///
    /// * `database_url_override` - Optional database URL override (from CLI args)
    /// * `metrics_bind_override` - Optional metrics address override (from CLI args)
    ///
    /// # Errors
    ///
    /// Returns error if a variable is set to an unusable value
    pub fn from_env(
        database_url_override: Option<String>,
        metrics_bind_override: Option<SocketAddr>,
    ) -> Result<Self, ConfigError> {
        // Database configuration
        let mut database = DatabaseConfig::from_env();
        if let Some(url) = database_url_override {
            database.database_url = url;
        }

        let reminder_interval = Duration::from_secs(parse_env_or(
            "REMINDER_INTERVAL_SECS",
            DEFAULT_REMINDER_INTERVAL_SECS,
        ));

        let notifier = match std::env::var("NOTIFIER") {
            Ok(value) => value.parse()?,
            Err(_) => NotifierKind::Database,
        };

        let metrics_bind = match metrics_bind_override {
            Some(addr) => Some(addr),
            None => match std::env::var("METRICS_BIND") {
                Ok(value) => Some(value.parse().map_err(|_| ConfigError::Invalid {
                    var: "METRICS_BIND".to_string(),
                    reason: format!("'{value}' is not an IP:PORT address"),
                })?),
                Err(_) => None,
            },
        };

        let prize_split = match std::env::var("PRIZE_SPLIT") {
            Ok(value) => parse_prize_split(&value)?,
            Err(_) => PrizeSplit::default(),
        };

        Ok(WorkerConfig {
            database,
            reminder_interval,
            notifier,
            metrics_bind,
            prize_split,
        })
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid {
                var: "DB_MAX_CONNECTIONS".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        if self.database.min_connections > self.database.max_connections {
            return Err(ConfigError::Invalid {
                var: "DB_MIN_CONNECTIONS".to_string(),
                reason: format!(
                    "Cannot exceed max connections ({})",
                    self.database.max_connections
                ),
            });
        }

        if self.reminder_interval.is_zero() {
            return Err(ConfigError::Invalid {
                var: "REMINDER_INTERVAL_SECS".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        let split = self.prize_split;
        let shares = [split.winner, split.runner_up, split.third];
        if shares.iter().any(|share| share.is_sign_negative())
            || shares.iter().sum::<Decimal>() > Decimal::ONE
        {
            return Err(ConfigError::Invalid {
                var: "PRIZE_SPLIT".to_string(),
                reason: "Shares must be non-negative and pay out at most the whole pool"
                    .to_string(),
            });
        }

        Ok(())
    }
}

/// Parse `winner/runner_up/third` percentages, e.g. `60/30/10`
fn parse_prize_split(value: &str) -> Result<PrizeSplit, ConfigError> {
    let invalid = || ConfigError::Invalid {
        var: "PRIZE_SPLIT".to_string(),
        reason: format!("'{value}' is not three percentages like 70/20/10"),
    };
    let percents = value
        .split('/')
        .map(|part| part.trim().parse::<Decimal>().map_err(|_| invalid()))
        .collect::<Result<Vec<_>, _>>()?;
    let [winner, runner_up, third] = percents[..] else {
        return Err(invalid());
    };
    let hundred = Decimal::ONE_HUNDRED;
    Ok(PrizeSplit {
        winner: winner / hundred,
        runner_up: runner_up / hundred,
        third: third / hundred,
    })
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration for {var}: {reason}")]
    Invalid { var: String, reason: String },
}

/// Helper to parse environment variable with default fallback
fn parse_env_or<T>(key: &str, default: T) -> T
where
    T: FromStr,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn config() -> WorkerConfig {
        WorkerConfig {
            database: DatabaseConfig::development(),
            reminder_interval: Duration::from_secs(60),
            notifier: NotifierKind::Log,
            metrics_bind: None,
            prize_split: PrizeSplit::default(),
        }
    }

    fn clear_env() {
        for key in ["NOTIFIER", "METRICS_BIND", "REMINDER_INTERVAL_SECS", "PRIZE_SPLIT"] {
            unsafe { std::env::remove_var(key) };
        }
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::Invalid {
            var: "NOTIFIER".to_string(),
            reason: "Unknown notifier".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("NOTIFIER"));
        assert!(msg.contains("Unknown notifier"));
    }

    #[test]
    fn test_notifier_kind_parse() {
        assert_eq!("log".parse::<NotifierKind>().unwrap(), NotifierKind::Log);
        assert_eq!("DB".parse::<NotifierKind>().unwrap(), NotifierKind::Database);
        assert!("email".parse::<NotifierKind>().is_err());
    }

    #[test]
    fn test_validation_min_above_max() {
        let mut config = config();
        config.database.min_connections = config.database.max_connections + 1;

        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref var, .. } if var == "DB_MIN_CONNECTIONS"));
    }

    #[test]
    fn test_validation_zero_interval() {
        let mut config = config();
        config.reminder_interval = Duration::ZERO;
        assert!(config.validate().is_err());
    }

    #[test]
    #[serial]
    fn test_from_env_defaults() {
        clear_env();
        let config = WorkerConfig::from_env(Some("postgres://override/db".to_string()), None).unwrap();
        assert_eq!(config.database.database_url, "postgres://override/db");
        assert_eq!(config.notifier, NotifierKind::Database);
        assert_eq!(
            config.reminder_interval,
            Duration::from_secs(DEFAULT_REMINDER_INTERVAL_SECS)
        );
        assert!(config.metrics_bind.is_none());
        assert_eq!(config.prize_split, PrizeSplit::default());
        config.validate().unwrap();
    }

    #[test]
    #[serial]
    fn test_from_env_reads_variables() {
        clear_env();
        unsafe {
            std::env::set_var("NOTIFIER", "log");
            std::env::set_var("METRICS_BIND", "127.0.0.1:9100");
            std::env::set_var("REMINDER_INTERVAL_SECS", "120");
        }
        let config = WorkerConfig::from_env(None, None).unwrap();
        clear_env();

        assert_eq!(config.notifier, NotifierKind::Log);
        assert_eq!(config.metrics_bind, Some("127.0.0.1:9100".parse().unwrap()));
        assert_eq!(config.reminder_interval, Duration::from_secs(120));
    }

    #[test]
    #[serial]
    fn test_from_env_rejects_bad_metrics_bind() {
        clear_env();
        unsafe { std::env::set_var("METRICS_BIND", "not-an-address") };
        let result = WorkerConfig::from_env(None, None);
        clear_env();

        assert!(matches!(result, Err(ConfigError::Invalid { ref var, .. }) if var == "METRICS_BIND"));
    }

    #[test]
    #[serial]
    fn test_from_env_reads_prize_split() {
        clear_env();
        unsafe { std::env::set_var("PRIZE_SPLIT", "60 / 30 / 5") };
        let config = WorkerConfig::from_env(None, None).unwrap();
        clear_env();

        assert_eq!(config.prize_split.winner, Decimal::new(60, 2));
        assert_eq!(config.prize_split.runner_up, Decimal::new(30, 2));
        assert_eq!(config.prize_split.third, Decimal::new(5, 2));
        config.validate().unwrap();
    }

    #[test]
    fn test_prize_split_rejects_malformed_values() {
        assert!(parse_prize_split("70/30").is_err());
        assert!(parse_prize_split("70/20/ten").is_err());
    }

    #[test]
    fn test_validation_prize_split_over_pool() {
        let mut config = config();
        config.prize_split = parse_prize_split("80/20/10").unwrap();

        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref var, .. } if var == "PRIZE_SPLIT"));
    }
}
