use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use chrono::FixedOffset;

/// Where scenarios are persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    /// PostgreSQL through `signage-db`.
    Postgres { database_url: String },
    /// Process-local store, lost on restart.
    Memory,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} is not valid: {reason}")]
    Invalid { var: &'static str, reason: String },

    #[error("{0} must be set")]
    Missing(&'static str),
}

/// Server configuration loaded from environment variables.
///
/// All fields except the database URL have defaults suitable for local
/// development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `8099`).
    pub port: u16,
    /// Shared secret every inbound message must carry.
    pub request_token: String,
    /// Display time for scenarios without their own timeout, also used as
    /// the retry delay after an empty or failed selection.
    pub scenario_timeout: Duration,
    /// Message template file; `None` uses the built-in template.
    pub message_template_path: Option<PathBuf>,
    /// Offset of the display network's wall clock from UTC.
    pub display_offset: FixedOffset,
    pub store: StoreBackend,
    /// Interval between WebSocket pings.
    pub heartbeat_interval: Duration,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                      | Default                  |
    /// |------------------------------|--------------------------|
    /// | `HOST`                       | `0.0.0.0`                |
    /// | `PORT`                       | `8099`                   |
    /// | `REQUEST_TOKEN`              | empty                    |
    /// | `SCENARIO_TIMEOUT_MS`        | `60000`                  |
    /// | `MESSAGE_TEMPLATE_PATH`      | built-in template        |
    /// | `DISPLAY_UTC_OFFSET_MINUTES` | `0`                      |
    /// | `SCENARIO_STORE`             | `postgres`               |
    /// | `DATABASE_URL`               | required for `postgres`  |
    /// | `HEARTBEAT_INTERVAL_SECS`    | `30`                     |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Same as [`from_env`](Self::from_env), reading variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup("HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = parse_or(&lookup, "PORT", 8099)?;
        let request_token = lookup("REQUEST_TOKEN").unwrap_or_default();

        let timeout_ms: u64 = parse_or(&lookup, "SCENARIO_TIMEOUT_MS", 60_000)?;
        if timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                var: "SCENARIO_TIMEOUT_MS",
                reason: "must be greater than zero".into(),
            });
        }

        let message_template_path = lookup("MESSAGE_TEMPLATE_PATH")
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from);

        let offset_minutes: i32 = parse_or(&lookup, "DISPLAY_UTC_OFFSET_MINUTES", 0)?;
        let display_offset =
            FixedOffset::east_opt(offset_minutes * 60).ok_or_else(|| ConfigError::Invalid {
                var: "DISPLAY_UTC_OFFSET_MINUTES",
                reason: format!("{offset_minutes} minutes is out of range"),
            })?;

        let store = match lookup("SCENARIO_STORE").as_deref().map(str::trim) {
            None | Some("") | Some("postgres") => StoreBackend::Postgres {
                database_url: lookup("DATABASE_URL")
                    .filter(|url| !url.is_empty())
                    .ok_or(ConfigError::Missing("DATABASE_URL"))?,
            },
            Some("memory") => StoreBackend::Memory,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    var: "SCENARIO_STORE",
                    reason: format!("unknown store '{other}', expected 'postgres' or 'memory'"),
                })
            }
        };

        let heartbeat_secs: u64 = parse_or(&lookup, "HEARTBEAT_INTERVAL_SECS", 30)?;
        if heartbeat_secs == 0 {
            return Err(ConfigError::Invalid {
                var: "HEARTBEAT_INTERVAL_SECS",
                reason: "must be greater than zero".into(),
            });
        }

        Ok(Self {
            host,
            port,
            request_token,
            scenario_timeout: Duration::from_millis(timeout_ms),
            message_template_path,
            display_offset,
            store,
            heartbeat_interval: Duration::from_secs(heartbeat_secs),
        })
    }
}

fn parse_or<F, T>(lookup: &F, var: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(var) {
        Some(raw) if !raw.trim().is_empty() => {
            raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
                var,
                reason: e.to_string(),
            })
        }
        _ => Ok(default),
    }
}
