//! Service Configuration
//!
//! All settings come from `FLOWSYNC_*` environment variables. Parsing goes
//! through [`ServiceConfig::from_lookup`], which takes any variable source,
//! so tests never touch the process environment.
//!
//! # Environment Variables
//! - `FLOWSYNC_REDIS_URL`: Full Redis URL, overrides host/port/password
//! - `FLOWSYNC_REDIS_HOST`: Redis host (default: 127.0.0.1)
//! - `FLOWSYNC_REDIS_PORT`: Redis port (default: 6379)
//! - `FLOWSYNC_REDIS_PASSWORD`: Redis password (optional)
//! - `FLOWSYNC_BACKEND_URL`: Backend gRPC URL (required for scheduled updates)
//! - `FLOWSYNC_SESSION_TOKEN`: Token sent to the backend (optional)
//! - `FLOWSYNC_GRPC_BIND`: Configuration endpoint address (default: 0.0.0.0:8081)
//! - `FLOWSYNC_ENABLE_GRPC_UPDATE`: Serve the configuration endpoint (default: true)
//! - `FLOWSYNC_ENABLE_SCHEDULED_UPDATE`: Run scheduled reconciliation (default: false)
//! - `FLOWSYNC_UPDATE_SCHEDULE_INTERVAL_SECS`: Reconciliation interval (default: 300)
//! - `FLOWSYNC_CONFIGURATION_IDS`: Comma separated configuration ids to reconcile
//! - `FLOWSYNC_BACKEND_CONNECT_RETRIES`: Backend connection attempts (default: 10)
//! - `FLOWSYNC_MODE`: `static` or `dynamic` (default: static)
//! - `FLOWSYNC_FLOW_FALLBACK_PATH`: Flow list loaded in static mode when
//!   neither update path is enabled (default: ./configuration/configuration.json)

use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use flowsync_core::{ConfigError, ScopeId};
use flowsync_storage::RedisConfig;

use crate::constants::{
    DEFAULT_BACKEND_CONNECT_RETRIES, DEFAULT_ENABLE_GRPC_UPDATE, DEFAULT_ENABLE_SCHEDULED_UPDATE,
    DEFAULT_FLOW_FALLBACK_PATH, DEFAULT_GRPC_BIND, DEFAULT_REDIS_HOST, DEFAULT_REDIS_PORT,
    DEFAULT_UPDATE_SCHEDULE_INTERVAL_SECS,
};

/// How the cache is filled at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StartupMode {
    /// Seed the cache from the fallback file when no update path is enabled.
    #[default]
    Static,
    /// The cache is only fed by pushed updates and reconciliation.
    Dynamic,
}

impl FromStr for StartupMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "static" => Ok(StartupMode::Static),
            "dynamic" => Ok(StartupMode::Dynamic),
            _ => Err("expected static or dynamic".to_string()),
        }
    }
}

impl fmt::Display for StartupMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StartupMode::Static => write!(f, "static"),
            StartupMode::Dynamic => write!(f, "dynamic"),
        }
    }
}

/// Runtime configuration of the flowsync service.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Cache store connection.
    pub redis: RedisConfig,

    /// Backend gRPC URL.
    pub backend_url: Option<String>,

    /// Token attached to backend requests.
    pub session_token: Option<String>,

    /// Address the configuration endpoint listens on.
    pub grpc_bind: SocketAddr,

    /// Serve the bulk configuration endpoint.
    pub enable_grpc_update: bool,

    /// Run the scheduled reconciliation job.
    pub enable_scheduled_update: bool,

    /// Interval between scheduled reconciliation runs.
    pub update_schedule_interval: Duration,

    /// Configurations reconciled by the scheduled job.
    pub configuration_ids: Vec<ScopeId>,

    /// Attempts made to connect to the backend before giving up.
    pub backend_connect_retries: u32,

    /// Startup mode.
    pub mode: StartupMode,

    /// JSON flow list seeded in static mode.
    pub flow_fallback_path: PathBuf,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            redis: RedisConfig::new(DEFAULT_REDIS_HOST, DEFAULT_REDIS_PORT),
            backend_url: None,
            session_token: None,
            grpc_bind: SocketAddr::from(([0, 0, 0, 0], 8081)),
            enable_grpc_update: DEFAULT_ENABLE_GRPC_UPDATE,
            enable_scheduled_update: DEFAULT_ENABLE_SCHEDULED_UPDATE,
            update_schedule_interval: Duration::from_secs(DEFAULT_UPDATE_SCHEDULE_INTERVAL_SECS),
            configuration_ids: Vec::new(),
            backend_connect_retries: DEFAULT_BACKEND_CONNECT_RETRIES,
            mode: StartupMode::default(),
            flow_fallback_path: PathBuf::from(DEFAULT_FLOW_FALLBACK_PATH),
        }
    }
}

impl ServiceConfig {
    /// Create ServiceConfig from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    ///
    /// Unset or blank variables take their default. A variable that is set
    /// but does not parse is an error rather than a silent default.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let mut redis = RedisConfig::new(
            get("FLOWSYNC_REDIS_HOST").unwrap_or_else(|| DEFAULT_REDIS_HOST.to_string()),
            parse_or("FLOWSYNC_REDIS_PORT", get("FLOWSYNC_REDIS_PORT"), DEFAULT_REDIS_PORT)?,
        );
        redis.password = get("FLOWSYNC_REDIS_PASSWORD");
        redis.url = get("FLOWSYNC_REDIS_URL");

        let grpc_bind = parse_or(
            "FLOWSYNC_GRPC_BIND",
            get("FLOWSYNC_GRPC_BIND"),
            DEFAULT_GRPC_BIND
                .parse::<SocketAddr>()
                .map_err(|e| invalid("FLOWSYNC_GRPC_BIND", DEFAULT_GRPC_BIND, e))?,
        )?;

        let enable_grpc_update = bool_or(
            "FLOWSYNC_ENABLE_GRPC_UPDATE",
            get("FLOWSYNC_ENABLE_GRPC_UPDATE"),
            DEFAULT_ENABLE_GRPC_UPDATE,
        )?;

        let enable_scheduled_update = bool_or(
            "FLOWSYNC_ENABLE_SCHEDULED_UPDATE",
            get("FLOWSYNC_ENABLE_SCHEDULED_UPDATE"),
            DEFAULT_ENABLE_SCHEDULED_UPDATE,
        )?;

        let update_schedule_interval = Duration::from_secs(parse_or(
            "FLOWSYNC_UPDATE_SCHEDULE_INTERVAL_SECS",
            get("FLOWSYNC_UPDATE_SCHEDULE_INTERVAL_SECS"),
            DEFAULT_UPDATE_SCHEDULE_INTERVAL_SECS,
        )?);

        let configuration_ids = match get("FLOWSYNC_CONFIGURATION_IDS") {
            Some(raw) => parse_configuration_ids(&raw)?,
            None => Vec::new(),
        };

        let backend_connect_retries = parse_or(
            "FLOWSYNC_BACKEND_CONNECT_RETRIES",
            get("FLOWSYNC_BACKEND_CONNECT_RETRIES"),
            DEFAULT_BACKEND_CONNECT_RETRIES,
        )?;

        let mode = parse_or("FLOWSYNC_MODE", get("FLOWSYNC_MODE"), StartupMode::default())?;
        let flow_fallback_path = get("FLOWSYNC_FLOW_FALLBACK_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_FLOW_FALLBACK_PATH));

        Ok(Self {
            redis,
            backend_url: get("FLOWSYNC_BACKEND_URL"),
            session_token: get("FLOWSYNC_SESSION_TOKEN"),
            grpc_bind,
            enable_grpc_update,
            enable_scheduled_update,
            update_schedule_interval,
            configuration_ids,
            backend_connect_retries,
            mode,
            flow_fallback_path,
        })
    }

    /// Check cross-field requirements.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.enable_scheduled_update {
            if self.backend_url.is_none() {
                return Err(ConfigError::MissingRequired {
                    field: "FLOWSYNC_BACKEND_URL".to_string(),
                });
            }
            if self.update_schedule_interval.is_zero() {
                return Err(ConfigError::InvalidValue {
                    field: "FLOWSYNC_UPDATE_SCHEDULE_INTERVAL_SECS".to_string(),
                    value: "0".to_string(),
                    reason: "interval must be at least one second".to_string(),
                });
            }
        }
        if self.backend_url.is_some() && self.backend_connect_retries == 0 {
            return Err(ConfigError::InvalidValue {
                field: "FLOWSYNC_BACKEND_CONNECT_RETRIES".to_string(),
                value: "0".to_string(),
                reason: "at least one connection attempt is required".to_string(),
            });
        }
        if !self.enable_grpc_update
            && !self.enable_scheduled_update
            && self.mode == StartupMode::Dynamic
        {
            return Err(invalid(
                "FLOWSYNC_MODE",
                "dynamic",
                "dynamic mode needs the configuration endpoint or scheduled updates",
            ));
        }
        Ok(())
    }

    /// Returns true if the fallback flow file seeds the cache at startup.
    pub fn loads_fallback(&self) -> bool {
        self.mode == StartupMode::Static && !self.enable_grpc_update && !self.enable_scheduled_update
    }

    /// Returns true if the service needs a backend connection: for the
    /// scheduled job, or for the single startup pull when a backend URL is
    /// configured without scheduling.
    pub fn needs_backend(&self) -> bool {
        self.enable_scheduled_update || self.backend_url.is_some()
    }
}

fn invalid(field: &str, value: &str, reason: impl ToString) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_or<T>(field: &str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: ToString,
{
    match raw {
        Some(value) => value.parse().map_err(|e: T::Err| invalid(field, &value, e)),
        None => Ok(default),
    }
}

fn bool_or(field: &str, raw: Option<String>, default: bool) -> Result<bool, ConfigError> {
    match raw.as_deref().map(str::to_ascii_lowercase).as_deref() {
        None => Ok(default),
        Some("true" | "1" | "yes" | "on") => Ok(true),
        Some("false" | "0" | "no" | "off") => Ok(false),
        Some(other) => Err(invalid(field, other, "expected true or false")),
    }
}

fn parse_configuration_ids(raw: &str) -> Result<Vec<ScopeId>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(|id| ScopeId::parse(id).map_err(|e| invalid("FLOWSYNC_CONFIGURATION_IDS", id, e)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<ServiceConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServiceConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.redis.connection_url(), "redis://127.0.0.1:6379");
        assert_eq!(config.grpc_bind.to_string(), "0.0.0.0:8081");
        assert!(config.enable_grpc_update);
        assert!(!config.enable_scheduled_update);
        assert_eq!(config.update_schedule_interval, Duration::from_secs(300));
        assert!(config.configuration_ids.is_empty());
        assert_eq!(config.backend_connect_retries, 10);
        assert!(config.backend_url.is_none());
        assert_eq!(config.mode, StartupMode::Static);
        assert_eq!(
            config.flow_fallback_path,
            PathBuf::from("./configuration/configuration.json")
        );
        assert!(!config.loads_fallback());
        assert!(!config.needs_backend());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_impl_matches_empty_environment() {
        let from_env = config_from(&[]).unwrap();
        let default = ServiceConfig::default();
        assert_eq!(from_env.grpc_bind, default.grpc_bind);
        assert_eq!(from_env.redis, default.redis);
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("FLOWSYNC_REDIS_HOST", "cache"),
            ("FLOWSYNC_REDIS_PORT", "6380"),
            ("FLOWSYNC_REDIS_PASSWORD", "secret"),
            ("FLOWSYNC_BACKEND_URL", "http://backend:50051"),
            ("FLOWSYNC_SESSION_TOKEN", "token"),
            ("FLOWSYNC_GRPC_BIND", "127.0.0.1:9000"),
            ("FLOWSYNC_ENABLE_GRPC_UPDATE", "false"),
            ("FLOWSYNC_ENABLE_SCHEDULED_UPDATE", "TRUE"),
            ("FLOWSYNC_UPDATE_SCHEDULE_INTERVAL_SECS", "60"),
            ("FLOWSYNC_CONFIGURATION_IDS", "1, cfg-2,,3"),
            ("FLOWSYNC_BACKEND_CONNECT_RETRIES", "3"),
        ])
        .unwrap();

        assert_eq!(config.redis.connection_url(), "redis://:secret@cache:6380");
        assert_eq!(config.backend_url.as_deref(), Some("http://backend:50051"));
        assert_eq!(config.session_token.as_deref(), Some("token"));
        assert_eq!(config.grpc_bind.port(), 9000);
        assert!(!config.enable_grpc_update);
        assert!(config.enable_scheduled_update);
        assert_eq!(config.update_schedule_interval, Duration::from_secs(60));
        let ids: Vec<&str> = config.configuration_ids.iter().map(ScopeId::as_str).collect();
        assert_eq!(ids, vec!["1", "cfg-2", "3"]);
        assert_eq!(config.backend_connect_retries, 3);
        assert!(config.needs_backend());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_redis_url_takes_precedence() {
        let config = config_from(&[
            ("FLOWSYNC_REDIS_URL", "redis://elsewhere:1234/0"),
            ("FLOWSYNC_REDIS_HOST", "ignored"),
        ])
        .unwrap();
        assert_eq!(config.redis.connection_url(), "redis://elsewhere:1234/0");
    }

    #[test]
    fn test_blank_values_use_defaults() {
        let config = config_from(&[("FLOWSYNC_REDIS_PORT", "  "), ("FLOWSYNC_SESSION_TOKEN", "")])
            .unwrap();
        assert_eq!(config.redis.port, 6379);
        assert!(config.session_token.is_none());
    }

    #[test]
    fn test_unparseable_values_are_errors() {
        assert!(matches!(
            config_from(&[("FLOWSYNC_REDIS_PORT", "redis")]),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            config_from(&[("FLOWSYNC_ENABLE_GRPC_UPDATE", "maybe")]),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            config_from(&[("FLOWSYNC_CONFIGURATION_IDS", "1,flow")]),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_scheduled_update_requires_backend() {
        let config = config_from(&[("FLOWSYNC_ENABLE_SCHEDULED_UPDATE", "true")]).unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingRequired { .. })
        ));
    }

    #[test]
    fn test_zero_interval_is_rejected() {
        let config = config_from(&[
            ("FLOWSYNC_ENABLE_SCHEDULED_UPDATE", "true"),
            ("FLOWSYNC_BACKEND_URL", "http://backend:50051"),
            ("FLOWSYNC_UPDATE_SCHEDULE_INTERVAL_SECS", "0"),
        ])
        .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_static_mode_loads_fallback_when_no_update_path() {
        let config = config_from(&[
            ("FLOWSYNC_ENABLE_GRPC_UPDATE", "false"),
            ("FLOWSYNC_FLOW_FALLBACK_PATH", "/etc/flowsync/flows.json"),
        ])
        .unwrap();
        assert!(config.loads_fallback());
        assert_eq!(config.flow_fallback_path, PathBuf::from("/etc/flowsync/flows.json"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_dynamic_mode_needs_an_update_path() {
        let config = config_from(&[
            ("FLOWSYNC_MODE", "Dynamic"),
            ("FLOWSYNC_ENABLE_GRPC_UPDATE", "false"),
        ])
        .unwrap();
        assert_eq!(config.mode, StartupMode::Dynamic);
        assert!(!config.loads_fallback());
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { field, .. }) if field == "FLOWSYNC_MODE"
        ));

        assert!(matches!(
            config_from(&[("FLOWSYNC_MODE", "hybrid")]),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_backend_url_without_scheduling_needs_backend() {
        let config = config_from(&[("FLOWSYNC_BACKEND_URL", "http://backend:50051")]).unwrap();
        assert!(!config.enable_scheduled_update);
        assert!(config.needs_backend());
    }
}
