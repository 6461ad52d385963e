//! Stream types for IMAP connections.

#![allow(clippy::missing_errors_doc)]

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use rustls::pki_types::ServerName;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;

use super::config::{Config, Security};
use crate::{Error, Result};

/// A stream that can be either plaintext or TLS.
pub enum ImapStream {
    /// Plaintext TCP stream.
    Plain(TcpStream),
    /// TLS-encrypted stream (boxed to reduce enum size).
    Tls(Box<TlsStream<TcpStream>>),
}

impl ImapStream {
    /// Returns true if the stream is TLS-encrypted.
    #[must_use]
    pub const fn is_tls(&self) -> bool {
        matches!(self, Self::Tls(_))
    }
}

impl std::fmt::Debug for ImapStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(if self.is_tls() {
            "ImapStream::Tls"
        } else {
            "ImapStream::Plain"
        })
    }
}

impl AsyncRead for ImapStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_read(cx, buf),
            Self::Tls(stream) => Pin::new(stream).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for ImapStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_write(cx, buf),
            Self::Tls(stream) => Pin::new(stream).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_flush(cx),
            Self::Tls(stream) => Pin::new(stream).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_shutdown(cx),
            Self::Tls(stream) => Pin::new(stream).poll_shutdown(cx),
        }
    }
}

/// Builds the default client configuration: the `ring` provider, its safe
/// protocol versions and the webpki root certificates.
///
/// Never consults the process-wide default provider.
pub fn default_tls_config() -> Result<rustls::ClientConfig> {
    let root_store = rustls::RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    };

    let config = rustls::ClientConfig::builder_with_provider(Arc::new(
        rustls::crypto::ring::default_provider(),
    ))
    .with_safe_default_protocol_versions()?
    .with_root_certificates(root_store)
    .with_no_client_auth();

    Ok(config)
}

/// Creates a TLS connector from [`default_tls_config`].
pub fn create_tls_connector() -> Result<TlsConnector> {
    Ok(TlsConnector::from(Arc::new(default_tls_config()?)))
}

/// Opens a TCP connection, bounded by `timeout`.
async fn connect_tcp(host: &str, port: u16, timeout: Duration) -> Result<TcpStream> {
    let addr = format!("{host}:{port}");
    tokio::time::timeout(timeout, TcpStream::connect(&addr))
        .await
        .map_err(|_| Error::Timeout(timeout))?
        .map_err(Error::from)
}

/// Connects to a server with TLS from the start.
///
/// `tls_config` replaces the default client configuration when given.
pub async fn connect_tls(
    host: &str,
    port: u16,
    timeout: Duration,
    tls_config: Option<&Arc<rustls::ClientConfig>>,
) -> Result<ImapStream> {
    let server_name = ServerName::try_from(host.to_string())?;
    let connector = match tls_config {
        Some(config) => TlsConnector::from(Arc::clone(config)),
        None => create_tls_connector()?,
    };
    let tcp = connect_tcp(host, port, timeout).await?;

    let tls = tokio::time::timeout(timeout, connector.connect(server_name, tcp))
        .await
        .map_err(|_| Error::Timeout(timeout))??;

    Ok(ImapStream::Tls(Box::new(tls)))
}

/// Connects to a server without TLS.
pub async fn connect_plain(host: &str, port: u16, timeout: Duration) -> Result<ImapStream> {
    Ok(ImapStream::Plain(connect_tcp(host, port, timeout).await?))
}

/// Connects according to `config`.
#[tracing::instrument(skip(config), fields(host = %config.host, port = config.port))]
pub async fn connect(config: &Config) -> Result<ImapStream> {
    let stream = match config.security {
        Security::Implicit => {
            connect_tls(
                &config.host,
                config.port,
                config.connect_timeout,
                config.tls_config.as_ref(),
            )
            .await?
        }
        Security::None => {
            connect_plain(&config.host, config.port, config.connect_timeout).await?
        }
    };
    tracing::debug!(
        tls = stream.is_tls(),
        custom_tls = config.tls_config.is_some(),
        "Connected"
    );
    Ok(stream)
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
    fn test_create_tls_connector() {
        assert!(create_tls_connector().is_ok());
    }

    #[test]
    fn test_default_tls_config_uses_ring() {
        let config = default_tls_config().unwrap();
        let ring = rustls::crypto::ring::default_provider();
        let suites: Vec<_> = config
            .crypto_provider()
            .cipher_suites
            .iter()
            .map(|suite| suite.suite())
            .collect();
        let expected: Vec<_> = ring.cipher_suites.iter().map(|suite| suite.suite()).collect();
        assert_eq!(suites, expected);
    }

    #[tokio::test]
    async fn test_connect_plain_to_local_listener() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let stream = connect_plain("127.0.0.1", port, Duration::from_secs(5))
            .await
            .unwrap();
        assert!(!stream.is_tls());
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let result = connect_plain("127.0.0.1", port, Duration::from_secs(5)).await;
        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[tokio::test]
    async fn test_invalid_dns_name() {
        let result = connect_tls("not a host name", 993, Duration::from_secs(1), None).await;
        assert!(matches!(result, Err(Error::InvalidDnsName(_))));
    }

    /// Accepts one connection and returns the first TLS record it receives.
    async fn first_tls_record(config: Config) -> Vec<u8> {
        use tokio::io::AsyncReadExt;

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut header = [0u8; 5];
            socket.read_exact(&mut header).await.unwrap();
            let mut record = vec![0u8; usize::from(u16::from_be_bytes([header[3], header[4]]))];
            socket.read_exact(&mut record).await.unwrap();
            record
        });

        let config = Config {
            port,
            ..config
        };
        let result = connect(&config).await;
        assert!(result.is_err());
        server.await.unwrap()
    }

    fn contains(haystack: &[u8], needle: &[u8]) -> bool {
        haystack.windows(needle.len()).any(|window| window == needle)
    }

    #[tokio::test]
    async fn test_custom_tls_config_is_used() {
        let protocol = b"x-pragmail-test";
        let mut custom = default_tls_config().unwrap();
        custom.alpn_protocols = vec![protocol.to_vec()];

        let builder = || {
            Config::builder("127.0.0.1")
                .security(Security::Implicit)
                .timeout(Duration::from_secs(5))
        };

        let hello = first_tls_record(builder().tls_config(Arc::new(custom)).build()).await;
        assert!(contains(&hello, protocol));

        let hello = first_tls_record(builder().build()).await;
        assert!(!hello.is_empty());
        assert!(!contains(&hello, protocol));
    }
}
