// MIT License - Copyright (c) 2026 Peter Wright

use std::time::Duration;

use crate::constants::{DEFAULT_PASSWORD, DEFAULT_PORT, DEFAULT_USER};

/// Configuration for connecting to a Lutron bridge.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Bridge IP address or host name
    pub host: String,
    /// Telnet port (default: 23)
    pub port: u16,
    /// Integration login (default: lutron)
    pub user: String,
    /// Integration password (default: integration)
    pub password: String,
    /// Time allowed for the whole login handshake (default: 10s)
    pub login_timeout: Duration,
    /// Default time to wait for a query reply (default: 5s)
    pub query_timeout: Duration,
    /// Base delay for reconnect backoff (default: 1s)
    pub reconnect_delay: Duration,
    /// Ceiling for reconnect backoff (default: 60s)
    pub max_reconnect_delay: Duration,
    /// Interval between `?SYSTEM,10` keep-alives; `None` disables them (default: 60s)
    pub keepalive_interval: Option<Duration>,
    /// Minimum gap between two outbound lines (default: none)
    pub command_spacing: Option<Duration>,
    /// Capacity of the outbound line queue (default: 64)
    pub queue_capacity: usize,
    /// Capacity of the lifecycle event channel (default: 32)
    pub event_capacity: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            host: "192.168.1.10".to_string(),
            port: DEFAULT_PORT,
            user: DEFAULT_USER.to_string(),
            password: DEFAULT_PASSWORD.to_string(),
            login_timeout: Duration::from_secs(10),
            query_timeout: Duration::from_secs(5),
            reconnect_delay: Duration::from_secs(1),
            max_reconnect_delay: Duration::from_secs(60),
            keepalive_interval: Some(Duration::from_secs(60)),
            command_spacing: None,
            queue_capacity: 64,
            event_capacity: 32,
        }
    }
}

impl BridgeConfig {
    /// Create a new config builder starting from defaults.
    pub fn builder() -> BridgeConfigBuilder {
        BridgeConfigBuilder::default()
    }

    /// `host:port` as passed to the TCP connect.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Builder for BridgeConfig.
#[derive(Debug, Clone, Default)]
pub struct BridgeConfigBuilder {
    config: BridgeConfig,
}

impl BridgeConfigBuilder {
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.config.user = user.into();
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.config.password = password.into();
        self
    }

    pub fn login_timeout(mut self, timeout: Duration) -> Self {
        self.config.login_timeout = timeout;
        self
    }

    pub fn query_timeout(mut self, timeout: Duration) -> Self {
        self.config.query_timeout = timeout;
        self
    }

    pub fn reconnect_delay(mut self, delay: Duration) -> Self {
        self.config.reconnect_delay = delay;
        self
    }

    pub fn max_reconnect_delay(mut self, delay: Duration) -> Self {
        self.config.max_reconnect_delay = delay;
        self
    }

    pub fn keepalive_interval(mut self, interval: Option<Duration>) -> Self {
        self.config.keepalive_interval = interval;
        self
    }

    pub fn command_spacing(mut self, spacing: Option<Duration>) -> Self {
        self.config.command_spacing = spacing;
        self
    }

    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.queue_capacity = capacity.max(1);
        self
    }

    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.config.event_capacity = capacity.max(1);
        self
    }

    pub fn build(self) -> BridgeConfig {
        self.config
    }
}
