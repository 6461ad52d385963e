//! Connection configuration and host classification.

use std::sync::Arc;
use std::time::Duration;

use pragmail_imap::connection::{DEFAULT_TIMEOUT, IMAPS_PORT};
use pragmail_imap::{Config, Security};

/// How to connect to a mail server.
///
/// `host` is what the user typed: a server hostname, a bare provider name
/// or an email address. [`crate::lookup::resolve_host`] turns it into a
/// server address before any connection is opened.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Host as given by the user.
    pub host: String,
    /// Server port (default: 993).
    pub port: u16,
    /// Timeout for connecting and for every I/O operation.
    pub timeout: Duration,
    /// Explicit security mode. When `None`, port 993 means implicit TLS and
    /// any other port means plaintext.
    pub security: Option<Security>,
    /// TLS client configuration used instead of the built-in one, e.g. to
    /// trust a private certificate authority.
    pub tls_config: Option<Arc<rustls::ClientConfig>>,
}

impl ConnectionConfig {
    /// Creates a configuration with default port and timeout.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        ConnectionConfigBuilder::new(host).build()
    }

    /// Creates a builder.
    #[must_use]
    pub fn builder(host: impl Into<String>) -> ConnectionConfigBuilder {
        ConnectionConfigBuilder::new(host)
    }

    /// Returns the effective security mode.
    #[must_use]
    pub fn security(&self) -> Security {
        self.security.unwrap_or_else(|| Security::for_port(self.port))
    }

    /// Classifies the configured host.
    #[must_use]
    pub fn host_kind(&self) -> HostKind {
        HostKind::classify(&self.host)
    }

    /// Builds the transport configuration for an already resolved server.
    #[must_use]
    pub fn transport_config(&self, server: &str) -> Config {
        let mut builder = Config::builder(server)
            .port(self.port)
            .timeout(self.timeout);
        if let Some(security) = self.security {
            builder = builder.security(security);
        }
        if let Some(tls) = &self.tls_config {
            builder = builder.tls_config(Arc::clone(tls));
        }
        builder.build()
    }
}

/// Builder for [`ConnectionConfig`].
#[derive(Debug, Clone)]
pub struct ConnectionConfigBuilder {
    host: String,
    port: u16,
    timeout: Duration,
    security: Option<Security>,
    tls_config: Option<Arc<rustls::ClientConfig>>,
}

impl ConnectionConfigBuilder {
    /// Creates a builder for the given host.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: IMAPS_PORT,
            timeout: DEFAULT_TIMEOUT,
            security: None,
            tls_config: None,
        }
    }

    /// Sets the port.
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the connect and I/O timeout.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Forces a security mode regardless of the port.
    #[must_use]
    pub const fn security(mut self, security: Security) -> Self {
        self.security = Some(security);
        self
    }

    /// Sets the TLS client configuration.
    #[must_use]
    pub fn tls_config(mut self, config: Arc<rustls::ClientConfig>) -> Self {
        self.tls_config = Some(config);
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> ConnectionConfig {
        ConnectionConfig {
            host: self.host,
            port: self.port,
            timeout: self.timeout,
            security: self.security,
            tls_config: self.tls_config,
        }
    }
}

/// What kind of host string the user supplied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostKind {
    /// A full email address; the server is found through a settings lookup.
    Email(String),
    /// A bare provider name such as `gmail`; the server is `imap.<name>.com`.
    Provider(String),
    /// Already an IMAP server hostname.
    Server(String),
}

impl HostKind {
    /// Classifies a host string.
    ///
    /// Anything containing `@` is an email address. Otherwise a host that
    /// mentions `imap` is taken to be a server name, and everything else is
    /// a provider name.
    #[must_use]
    pub fn classify(host: &str) -> Self {
        let host = host.trim();
        if host.contains('@') {
            Self::Email(host.to_string())
        } else if host.to_ascii_lowercase().contains("imap") {
            Self::Server(host.to_string())
        } else {
            Self::Provider(host.to_string())
        }
    }
}

/// Returns the conventional IMAP server for a provider name.
#[must_use]
pub fn provider_host(provider: &str) -> String {
    format!("imap.{provider}.com")
}

/// Returns the RFC 5092 IMAP URL for a provider name.
#[must_use]
pub fn imap_url(provider: &str) -> String {
    format!("imap://{}", provider_host(provider))
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
    fn test_defaults() {
        let config = ConnectionConfig::new("imap.example.com");
        assert_eq!(config.port, 993);
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.security(), Security::Implicit);
    }

    #[test]
    fn test_port_implies_security() {
        let config = ConnectionConfig::builder("imap.example.com").port(143).build();
        assert_eq!(config.security(), Security::None);

        let transport = config.transport_config("imap.example.com");
        assert_eq!(transport.port, 143);
        assert_eq!(transport.security, Security::None);
    }

    #[test]
    fn test_security_override() {
        let config = ConnectionConfig::builder("imap.example.com")
            .port(1993)
            .security(Security::Implicit)
            .timeout(Duration::from_secs(30))
            .build();
        assert_eq!(config.security(), Security::Implicit);

        let transport = config.transport_config("mail.example.com");
        assert_eq!(transport.host, "mail.example.com");
        assert_eq!(transport.security, Security::Implicit);
        assert_eq!(transport.connect_timeout, Duration::from_secs(30));
        assert_eq!(transport.io_timeout, Duration::from_secs(30));
        assert!(transport.tls_config.is_none());
    }

    #[test]
    fn test_tls_config_reaches_transport() {
        let tls = Arc::new(pragmail_imap::connection::default_tls_config().unwrap());
        let config = ConnectionConfig::builder("imap.example.com")
            .tls_config(Arc::clone(&tls))
            .build();

        let transport = config.transport_config("imap.example.com");
        assert!(Arc::ptr_eq(transport.tls_config.as_ref().unwrap(), &tls));
        assert_eq!(transport.security, Security::Implicit);
    }

    #[test]
    fn test_classify_email() {
        assert_eq!(
            HostKind::classify("user@gmail.com"),
            HostKind::Email("user@gmail.com".into())
        );
    }

    #[test]
    fn test_classify_server() {
        assert_eq!(
            HostKind::classify("imap.gmail.com"),
            HostKind::Server("imap.gmail.com".into())
        );
        assert_eq!(
            HostKind::classify(" IMAP.example.org "),
            HostKind::Server("IMAP.example.org".into())
        );
    }

    #[test]
    fn test_classify_provider() {
        assert_eq!(HostKind::classify("gmail"), HostKind::Provider("gmail".into()));
        assert_eq!(
            ConnectionConfig::new("outlook").host_kind(),
            HostKind::Provider("outlook".into())
        );
    }

    #[test]
    fn test_provider_urls() {
        assert_eq!(provider_host("gmail"), "imap.gmail.com");
        assert_eq!(imap_url("gmail"), "imap://imap.gmail.com");
    }
}
