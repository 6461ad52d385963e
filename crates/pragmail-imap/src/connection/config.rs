//! Connection configuration types.

use std::sync::Arc;
use std::time::Duration;

/// Port conventionally used for IMAP over implicit TLS.
pub const IMAPS_PORT: u16 = 993;

/// Default connect and I/O timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Connection security mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Security {
    /// No encryption. Only sensible for local testing.
    None,
    /// TLS from the first byte (port 993).
    #[default]
    Implicit,
}

impl Security {
    /// Returns the default port for this security mode.
    #[must_use]
    pub const fn default_port(self) -> u16 {
        match self {
            Self::None => 143,
            Self::Implicit => IMAPS_PORT,
        }
    }

    /// Picks the security mode implied by a port: TLS on 993, plaintext
    /// everywhere else.
    #[must_use]
    pub const fn for_port(port: u16) -> Self {
        if port == IMAPS_PORT {
            Self::Implicit
        } else {
            Self::None
        }
    }
}

/// IMAP connection configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server hostname.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Security mode.
    pub security: Security,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Timeout applied to every command round trip.
    pub io_timeout: Duration,
    /// TLS client configuration. `None` means
    /// [`default_tls_config`](super::default_tls_config).
    pub tls_config: Option<Arc<rustls::ClientConfig>>,
}

impl Config {
    /// Creates a configuration for implicit TLS on port 993 with 5 second
    /// timeouts.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        ConfigBuilder::new(host).build()
    }

    /// Creates a configuration builder.
    #[must_use]
    pub fn builder(host: impl Into<String>) -> ConfigBuilder {
        ConfigBuilder::new(host)
    }
}

/// Builder for connection configuration.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    host: String,
    port: Option<u16>,
    security: Option<Security>,
    connect_timeout: Duration,
    io_timeout: Duration,
    tls_config: Option<Arc<rustls::ClientConfig>>,
}

impl ConfigBuilder {
    /// Creates a new builder with the given hostname.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: None,
            security: None,
            connect_timeout: DEFAULT_TIMEOUT,
            io_timeout: DEFAULT_TIMEOUT,
            tls_config: None,
        }
    }

    /// Sets the port.
    ///
    /// Unless [`security`](Self::security) is also set, the port decides
    /// whether TLS is used.
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Overrides the security mode.
    #[must_use]
    pub const fn security(mut self, security: Security) -> Self {
        self.security = Some(security);
        self
    }

    /// Sets the connection timeout.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the I/O timeout.
    #[must_use]
    pub const fn io_timeout(mut self, timeout: Duration) -> Self {
        self.io_timeout = timeout;
        self
    }

    /// Sets both the connection and the I/O timeout.
    #[must_use]
    pub const fn timeout(self, timeout: Duration) -> Self {
        self.connect_timeout(timeout).io_timeout(timeout)
    }

    /// Uses a caller-supplied TLS client configuration, e.g. one with a
    /// private root store or client certificates.
    #[must_use]
    pub fn tls_config(mut self, config: Arc<rustls::ClientConfig>) -> Self {
        self.tls_config = Some(config);
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> Config {
        let (port, security) = match (self.port, self.security) {
            (Some(port), Some(security)) => (port, security),
            (Some(port), None) => (port, Security::for_port(port)),
            (None, Some(security)) => (security.default_port(), security),
            (None, None) => (IMAPS_PORT, Security::Implicit),
        };

        Config {
            host: self.host,
            port,
            security,
            connect_timeout: self.connect_timeout,
            io_timeout: self.io_timeout,
            tls_config: self.tls_config,
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    #[test]
    fn test_default_ports() {
        assert_eq!(Security::None.default_port(), 143);
        assert_eq!(Security::Implicit.default_port(), 993);
    }

    #[test]
    fn test_config_new() {
        let config = Config::new("imap.example.com");
        assert_eq!(config.host, "imap.example.com");
        assert_eq!(config.port, 993);
        assert_eq!(config.security, Security::Implicit);
        assert_eq!(config.io_timeout, Duration::from_secs(5));
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert!(config.tls_config.is_none());
    }

    #[test]
    fn test_port_implies_security() {
        let plain = Config::builder("localhost").port(1143).build();
        assert_eq!(plain.security, Security::None);

        let tls = Config::builder("localhost").port(993).build();
        assert_eq!(tls.security, Security::Implicit);
    }

    #[test]
    fn test_security_override_wins() {
        let config = Config::builder("imap.example.com")
            .port(10993)
            .security(Security::Implicit)
            .timeout(Duration::from_secs(10))
            .build();

        assert_eq!(config.port, 10993);
        assert_eq!(config.security, Security::Implicit);
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.io_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_security_without_port_uses_default_port() {
        let config = Config::builder("imap.example.com")
            .security(Security::None)
            .build();
        assert_eq!(config.port, 143);
    }

    #[test]
    fn test_tls_config_is_shared() {
        let tls = Arc::new(super::super::default_tls_config().unwrap());
        let config = Config::builder("imap.example.com")
            .tls_config(Arc::clone(&tls))
            .build();
        assert!(Arc::ptr_eq(config.tls_config.as_ref().unwrap(), &tls));

        let copy = config.clone();
        assert!(Arc::ptr_eq(copy.tls_config.as_ref().unwrap(), &tls));
    }
}
