//! Socket layer configuration
//!
//! Compile-time defaults with runtime environment overrides.
//!
//! # Example
//!
//! ```rust,ignore
//! use coopsock::config::LayerConfig;
//!
//! let config = LayerConfig::from_env()
//!     .tcp_slots(16)
//!     .recv_capacity(4096);
//! ```

pub mod defaults;

use std::time::Duration;

use coopsock_core::bsd::FD_SETSIZE;
use coopsock_core::env::{env_get, env_get_bool};

/// Layer configuration with builder pattern.
#[derive(Debug, Clone)]
pub struct LayerConfig {
    /// Sockets in the TCP region (handles `0..tcp_slots`)
    pub tcp_slots: usize,
    /// Sockets in the UDP region (handles after the TCP region)
    pub udp_slots: usize,
    /// Receive ring capacity per socket
    pub recv_capacity: usize,
    /// Send buffer capacity per socket
    pub send_capacity: usize,
    /// Completion queue depth
    pub completion_queue: usize,
    /// Longest single park inside the blocking adapter
    pub park_interval: Duration,
    /// Park intervals `close()` waits for cancellation to settle
    pub close_grace: u32,
    /// Ephemeral port draws before `EADDRNOTAVAIL`
    pub port_attempts: u32,
    /// Raise the log level to debug when the layer opens
    pub debug_logging: bool,
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

impl LayerConfig {
    /// Create config from compile-time defaults with environment overrides.
    ///
    /// Environment variables (all optional):
    /// - `COOPSOCK_TCP_SLOTS` - TCP region size
    /// - `COOPSOCK_UDP_SLOTS` - UDP region size
    /// - `COOPSOCK_RECV_CAPACITY` - Receive ring bytes per socket
    /// - `COOPSOCK_SEND_CAPACITY` - Send buffer bytes per socket
    /// - `COOPSOCK_COMPLETION_QUEUE` - Completion queue depth
    /// - `COOPSOCK_PARK_INTERVAL_US` - Park interval in microseconds
    /// - `COOPSOCK_CLOSE_GRACE` - Park intervals close() waits
    /// - `COOPSOCK_PORT_ATTEMPTS` - Ephemeral port draws
    /// - `COOPSOCK_DEBUG` - Enable debug logging (0/1)
    pub fn from_env() -> Self {
        Self {
            tcp_slots: env_get("COOPSOCK_TCP_SLOTS", defaults::TCP_SLOTS),
            udp_slots: env_get("COOPSOCK_UDP_SLOTS", defaults::UDP_SLOTS),
            recv_capacity: env_get("COOPSOCK_RECV_CAPACITY", defaults::RECV_CAPACITY),
            send_capacity: env_get("COOPSOCK_SEND_CAPACITY", defaults::SEND_CAPACITY),
            completion_queue: env_get("COOPSOCK_COMPLETION_QUEUE", defaults::COMPLETION_QUEUE),
            park_interval: Duration::from_micros(env_get(
                "COOPSOCK_PARK_INTERVAL_US",
                defaults::PARK_INTERVAL_US,
            )),
            close_grace: env_get("COOPSOCK_CLOSE_GRACE", defaults::CLOSE_GRACE),
            port_attempts: env_get("COOPSOCK_PORT_ATTEMPTS", defaults::PORT_ATTEMPTS),
            debug_logging: env_get_bool("COOPSOCK_DEBUG", defaults::DEBUG_LOGGING),
        }
    }

    /// Create config with explicit defaults (no env override).
    pub fn new() -> Self {
        Self {
            tcp_slots: defaults::TCP_SLOTS,
            udp_slots: defaults::UDP_SLOTS,
            recv_capacity: defaults::RECV_CAPACITY,
            send_capacity: defaults::SEND_CAPACITY,
            completion_queue: defaults::COMPLETION_QUEUE,
            park_interval: Duration::from_micros(defaults::PARK_INTERVAL_US),
            close_grace: defaults::CLOSE_GRACE,
            port_attempts: defaults::PORT_ATTEMPTS,
            debug_logging: defaults::DEBUG_LOGGING,
        }
    }

    // Builder methods

    pub fn tcp_slots(mut self, n: usize) -> Self {
        self.tcp_slots = n;
        self
    }

    pub fn udp_slots(mut self, n: usize) -> Self {
        self.udp_slots = n;
        self
    }

    pub fn recv_capacity(mut self, bytes: usize) -> Self {
        self.recv_capacity = bytes;
        self
    }

    pub fn send_capacity(mut self, bytes: usize) -> Self {
        self.send_capacity = bytes;
        self
    }

    pub fn completion_queue(mut self, depth: usize) -> Self {
        self.completion_queue = depth;
        self
    }

    pub fn park_interval(mut self, d: Duration) -> Self {
        self.park_interval = d;
        self
    }

    pub fn close_grace(mut self, intervals: u32) -> Self {
        self.close_grace = intervals;
        self
    }

    pub fn port_attempts(mut self, n: u32) -> Self {
        self.port_attempts = n;
        self
    }

    pub fn debug_logging(mut self, enable: bool) -> Self {
        self.debug_logging = enable;
        self
    }

    /// Total table size
    #[inline]
    pub fn total_slots(&self) -> usize {
        self.tcp_slots + self.udp_slots
    }

    /// Validate configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.total_slots() == 0 {
            return Err(ConfigError::InvalidValue("tcp_slots + udp_slots must be > 0"));
        }
        if self.total_slots() > FD_SETSIZE {
            return Err(ConfigError::InvalidValue(
                "tcp_slots + udp_slots must fit in an FdSet",
            ));
        }
        if self.recv_capacity == 0 {
            return Err(ConfigError::InvalidValue("recv_capacity must be > 0"));
        }
        if self.send_capacity == 0 {
            return Err(ConfigError::InvalidValue("send_capacity must be > 0"));
        }
        if self.completion_queue == 0 {
            return Err(ConfigError::InvalidValue("completion_queue must be > 0"));
        }
        if self.park_interval.is_zero() {
            return Err(ConfigError::InvalidValue("park_interval must be > 0"));
        }
        if self.port_attempts == 0 {
            return Err(ConfigError::InvalidValue("port_attempts must be > 0"));
        }
        Ok(())
    }

    /// Print configuration (for debugging)
    pub fn print(&self) {
        eprintln!("coopsock configuration:");
        eprintln!("  tcp_slots:         {}", self.tcp_slots);
        eprintln!("  udp_slots:         {}", self.udp_slots);
        eprintln!("  recv_capacity:     {}", self.recv_capacity);
        eprintln!("  send_capacity:     {}", self.send_capacity);
        eprintln!("  completion_queue:  {}", self.completion_queue);
        eprintln!("  park_interval:     {:?}", self.park_interval);
        eprintln!("  close_grace:       {}", self.close_grace);
        eprintln!("  port_attempts:     {}", self.port_attempts);
        eprintln!("  debug_logging:     {}", self.debug_logging);
    }
}

/// Configuration error
#[derive(Debug, Clone)]
pub enum ConfigError {
    InvalidValue(&'static str),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidValue(msg) => write!(f, "Invalid config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_valid() {
        let config = LayerConfig::new();
        assert_eq!(config.total_slots(), 12);
        assert_eq!(config.send_capacity, 1460);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = LayerConfig::new()
            .tcp_slots(3)
            .udp_slots(0)
            .park_interval(Duration::from_micros(200));

        assert_eq!(config.total_slots(), 3);
        assert_eq!(config.park_interval, Duration::from_micros(200));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation() {
        assert!(LayerConfig::new().tcp_slots(0).udp_slots(0).validate().is_err());
        assert!(LayerConfig::new().tcp_slots(300).validate().is_err());
        assert!(LayerConfig::new().recv_capacity(0).validate().is_err());
        assert!(LayerConfig::new().port_attempts(0).validate().is_err());
        assert!(LayerConfig::new()
            .park_interval(Duration::ZERO)
            .validate()
            .is_err());
    }
}
