//! # Runtime Configuration
//!
//! Plain structs with sane defaults, overridable from the environment.
//!
//! ## Environment Variables
//!
//! | Variable | Default |
//! |----------|---------|
//! | `COURIER_SERVICE_NAME` | `courier` |
//! | `COURIER_TRANSPORT_HOST` | `localhost` |
//! | `COURIER_TRANSPORT_PORT` | `5672` |
//! | `COURIER_BUSINESS_CHANNEL` | `courier.business` |
//! | `COURIER_BROADCAST_CHANNEL` | `courier.broadcast` |
//! | `COURIER_SERVICE_QUEUE` | the service name |
//! | `COURIER_TRANSPORT_LOGIN` / `COURIER_TRANSPORT_PASSWORD` | unset |
//! | `COURIER_RESOLVE_TIMEOUT_MS` | `2000` |
//! | `COURIER_BUS_CAPACITY` | `1000` |
//! | `COURIER_REDELIVERY_CEILING` | unset (unbounded) |
//! | `COURIER_RESERVED_USERNAMES` | `admin` |

use std::env;
use std::str::FromStr;
use std::time::Duration;

use courier_bus::{RedeliveryPolicy, DEFAULT_CHANNEL_CAPACITY, DEFAULT_RESOLVE_TIMEOUT};
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A variable is set but cannot be parsed.
    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },

    /// A required setting is blank.
    #[error("{0} must be defined")]
    Missing(&'static str),

    /// A numeric setting is out of range.
    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    /// Only one of login and password is set.
    #[error("Transport login and password must be set together")]
    PartialCredentials,
}

/// Connection settings for the external message transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    pub host: String,
    pub port: u16,
    /// Channel for request/reply business traffic.
    pub business_channel: String,
    /// Channel for fan-out broadcasts.
    pub broadcast_channel: String,
    /// Queue this service consumes from.
    pub service_queue: String,
    pub login: Option<String>,
    pub password: Option<String>,
}

impl TransportConfig {
    /// Defaults for a service called `service_name`.
    pub fn for_service(service_name: &str) -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5672,
            business_channel: "courier.business".to_string(),
            broadcast_channel: "courier.broadcast".to_string(),
            service_queue: service_name.to_string(),
            login: None,
            password: None,
        }
    }

    /// Apply overrides from `lookup`, starting from the defaults for
    /// `service_name`.
    pub fn from_lookup<F>(service_name: &str, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::for_service(service_name);

        if let Some(host) = lookup("COURIER_TRANSPORT_HOST") {
            config.host = host;
        }
        if let Some(port) = parse_var(&lookup, "COURIER_TRANSPORT_PORT")? {
            config.port = port;
        }
        if let Some(channel) = lookup("COURIER_BUSINESS_CHANNEL") {
            config.business_channel = channel;
        }
        if let Some(channel) = lookup("COURIER_BROADCAST_CHANNEL") {
            config.broadcast_channel = channel;
        }
        if let Some(queue) = lookup("COURIER_SERVICE_QUEUE") {
            config.service_queue = queue;
        }
        config.login = lookup("COURIER_TRANSPORT_LOGIN");
        config.password = lookup("COURIER_TRANSPORT_PASSWORD");

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        require("transport host", &self.host)?;
        if self.port == 0 {
            return Err(ConfigError::Zero("transport port"));
        }
        require("business channel", &self.business_channel)?;
        require("broadcast channel", &self.broadcast_channel)?;
        require("service queue", &self.service_queue)?;
        if self.login.is_some() != self.password.is_some() {
            return Err(ConfigError::PartialCredentials);
        }
        Ok(())
    }

    /// `host:port`, for logging.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Settings of the in-process bus and dispatch gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    /// Bound on a single requester lookup.
    pub resolve_timeout: Duration,
    /// Envelopes buffered per subscriber.
    pub bus_capacity: usize,
    /// Retry ceiling for envelopes that leave theirs unbounded.
    pub redelivery_ceiling: Option<u32>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            resolve_timeout: DEFAULT_RESOLVE_TIMEOUT,
            bus_capacity: DEFAULT_CHANNEL_CAPACITY,
            redelivery_ceiling: None,
        }
    }
}

impl GatewayConfig {
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(millis) = parse_var::<u64, _>(&lookup, "COURIER_RESOLVE_TIMEOUT_MS")? {
            config.resolve_timeout = Duration::from_millis(millis);
        }
        if let Some(capacity) = parse_var(&lookup, "COURIER_BUS_CAPACITY")? {
            config.bus_capacity = capacity;
        }
        config.redelivery_ceiling = parse_var(&lookup, "COURIER_REDELIVERY_CEILING")?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.resolve_timeout.is_zero() {
            return Err(ConfigError::Zero("resolve timeout"));
        }
        if self.bus_capacity == 0 {
            return Err(ConfigError::Zero("bus capacity"));
        }
        Ok(())
    }

    pub fn redelivery_policy(&self) -> RedeliveryPolicy {
        match self.redelivery_ceiling {
            Some(ceiling) => RedeliveryPolicy::with_default_ceiling(ceiling),
            None => RedeliveryPolicy::new(),
        }
    }
}

/// Complete runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourierConfig {
    /// Name used as `from` on every envelope this service emits.
    pub service_name: String,
    pub transport: TransportConfig,
    pub gateway: GatewayConfig,
    /// Usernames that can never be registered.
    pub reserved_usernames: Vec<String>,
}

impl Default for CourierConfig {
    fn default() -> Self {
        let service_name = "courier".to_string();
        Self {
            transport: TransportConfig::for_service(&service_name),
            service_name,
            gateway: GatewayConfig::default(),
            reserved_usernames: vec!["admin".to_string()],
        }
    }
}

impl CourierConfig {
    /// Load from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(name) = lookup("COURIER_SERVICE_NAME") {
            config.service_name = name;
        }
        config.transport = TransportConfig::from_lookup(&config.service_name, &lookup)?;
        config.gateway = GatewayConfig::from_lookup(&lookup)?;
        if let Some(names) = lookup("COURIER_RESERVED_USERNAMES") {
            config.reserved_usernames = names
                .split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::to_string)
                .collect();
        }

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        require("service name", &self.service_name)?;
        self.transport.validate()?;
        self.gateway.validate()
    }
}

fn require(name: &'static str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Missing(name));
    }
    Ok(())
}

fn parse_var<T, F>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { key, value }),
    }
}
