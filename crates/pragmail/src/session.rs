//! Session lifecycle: connect, authenticate, examine, find the latest
//! message, and always log out.

use std::error::Error as _;
use std::fmt;
use std::time::Duration;

use pragmail_imap::{
    Client, FetchItems, Fetched, ImapStream, MailboxStatus, ProtocolState, SearchCriteria,
};

use crate::config::ConnectionConfig;
use crate::dates::{sent_since_token, today};
use crate::error::{Error, Result};
use crate::lookup::resolve_host;
use crate::resolver::{IdentifierSet, resolve_latest};
use crate::transport::Transport;

/// Default search window for [`Session::find_latest_message`]: since
/// yesterday.
pub const DEFAULT_MAX_AGE_DAYS: i64 = -1;

/// A session over a live TLS or plaintext IMAP connection.
pub type ImapSession = Session<Client<ImapStream>>;

/// The message picked by [`Session::find_latest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedMessage {
    /// Sequence number of the message.
    pub id: u32,
    /// FETCH responses for the requested data items.
    pub responses: Vec<Fetched>,
}

impl FetchedMessage {
    /// Returns the message content, if the requested items carried any.
    #[must_use]
    pub fn content(&self) -> Option<&[u8]> {
        self.responses.iter().find_map(|fetched| fetched.content())
    }
}

#[derive(Debug, Clone)]
struct Endpoint {
    host: String,
    port: u16,
    timeout: Duration,
}

/// One IMAP connection and what can be done with it.
///
/// A session moves from connected through authenticated and
/// mailbox-selected to closed. It is not meant to be shared; every
/// operation completes before the next one starts.
pub struct Session<T> {
    transport: T,
    endpoint: Option<Endpoint>,
}

impl ImapSession {
    /// Resolves the configured host and connects to it.
    ///
    /// # Errors
    ///
    /// Returns an error if the host cannot be resolved or reached, or if
    /// the connection or TLS handshake fails.
    #[tracing::instrument(skip(config), fields(host = %config.host, port = config.port))]
    pub async fn open(config: &ConnectionConfig) -> Result<Self> {
        let server = resolve_host(config).await?;
        let transport_config = config.transport_config(&server);

        let stream = pragmail_imap::connect(&transport_config).await?;
        let client = Client::from_stream(stream, transport_config.io_timeout).await?;
        tracing::debug!(server = %transport_config.host, state = %client.state(), "Connected");

        Ok(Self {
            transport: client,
            endpoint: Some(Endpoint {
                host: transport_config.host,
                port: transport_config.port,
                timeout: transport_config.io_timeout,
            }),
        })
    }
}

impl<T: Transport> Session<T> {
    /// Wraps an already connected transport.
    #[must_use]
    pub const fn new(transport: T) -> Self {
        Self {
            transport,
            endpoint: None,
        }
    }

    /// Returns the protocol state of the connection.
    #[must_use]
    pub fn state(&self) -> &ProtocolState {
        self.transport.state()
    }

    /// Returns the underlying transport.
    #[must_use]
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// Returns the underlying transport mutably, for commands the session
    /// does not wrap.
    pub const fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Consumes the session and returns the transport.
    #[must_use]
    pub fn into_inner(self) -> T {
        self.transport
    }

    /// Logs in.
    ///
    /// # Errors
    ///
    /// Returns an error if the server rejects the credentials or the
    /// session is not waiting for authentication.
    #[tracing::instrument(skip(self, password))]
    pub async fn authenticate(&mut self, username: &str, password: &str) -> Result<()> {
        self.transport.login(username, password).await?;
        tracing::debug!("Authenticated");
        Ok(())
    }

    /// Opens a mailbox read-only (EXAMINE), so nothing done through this
    /// session changes message flags.
    ///
    /// # Errors
    ///
    /// Returns an error if the mailbox does not exist or the session is
    /// not authenticated.
    #[tracing::instrument(skip(self))]
    pub async fn select_mailbox(&mut self, mailbox: &str) -> Result<MailboxStatus> {
        let status = self.transport.select(mailbox, true).await?;
        tracing::debug!(exists = status.exists, "Mailbox selected");
        Ok(status)
    }

    /// Fetches the most recent message from `sender` sent within the last
    /// `-max_age_days` days.
    ///
    /// Runs two searches, `FROM <sender>` and `SENTSINCE <date>`, and
    /// fetches the largest identifier found by both.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Command`] without searching if `max_age_days` is not
    /// negative, [`Error::MessageNotFound`] if no message matches both
    /// filters, and transport errors as they occur.
    #[tracing::instrument(skip(self, items))]
    pub async fn find_latest(
        &mut self,
        sender: &str,
        max_age_days: i64,
        items: &FetchItems,
    ) -> Result<FetchedMessage> {
        if max_age_days > -1 {
            return Err(Error::Command(format!(
                "max_age_days must be negative, got {max_age_days}"
            )));
        }
        let since = sent_since_token(today(), max_age_days)?;

        let sender_ids = self
            .transport
            .search(None, &SearchCriteria::From(sender.to_string()))
            .await?;
        let date_ids = self
            .transport
            .search(None, &SearchCriteria::SentSince(since))
            .await?;
        tracing::debug!(
            sender_matches = sender_ids.len(),
            date_matches = date_ids.len(),
            "Searches complete"
        );

        let latest = resolve_latest(
            &IdentifierSet::from_tokens(sender_ids),
            &IdentifierSet::from_tokens(date_ids),
        )?;
        let Some(id) = latest else {
            return Err(Error::MessageNotFound(0));
        };

        let responses = self.transport.fetch(id, items).await?;
        tracing::debug!(id, "Fetched latest message");
        Ok(FetchedMessage { id, responses })
    }

    /// Fetches the entire most recent message from `sender` sent since
    /// yesterday.
    ///
    /// # Errors
    ///
    /// See [`find_latest`](Self::find_latest).
    pub async fn find_latest_message(&mut self, sender: &str) -> Result<FetchedMessage> {
        self.find_latest(sender, DEFAULT_MAX_AGE_DAYS, &FetchItems::rfc822())
            .await
    }

    /// Closes the selected mailbox, if any, and logs out.
    ///
    /// Calling it again after a successful close does nothing. A failed
    /// CLOSE does not prevent the LOGOUT.
    ///
    /// # Errors
    ///
    /// Returns an error only if LOGOUT itself fails on a live connection.
    pub async fn close(&mut self) -> Result<()> {
        if self.transport.state().is_selected() {
            if let Err(e) = self.transport.close().await {
                tracing::debug!(error = %e, "CLOSE failed, logging out anyway");
            }
        }

        if !self.transport.state().is_logged_out() {
            self.transport.logout().await?;
            tracing::debug!("Logged out");
        }
        Ok(())
    }

    /// Runs `f` on this session, then closes it whatever the outcome.
    ///
    /// Teardown errors are logged and dropped. When `f` fails, the error is
    /// reported through `tracing` before being returned.
    ///
    /// # Errors
    ///
    /// Returns the error of `f`.
    pub async fn run<F, R>(mut self, f: F) -> Result<R>
    where
        F: AsyncFnOnce(&mut Self) -> Result<R>,
    {
        let outcome = f(&mut self).await;

        if let Err(e) = self.close().await {
            tracing::debug!(error = %e, "Ignoring teardown failure");
        }
        if let Err(e) = &outcome {
            report_failure(e);
        }
        outcome
    }
}

impl<T: Transport> fmt::Debug for Session<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Session");
        if let Some(endpoint) = &self.endpoint {
            s.field("host", &endpoint.host)
                .field("port", &endpoint.port)
                .field("timeout", &endpoint.timeout);
        }
        s.field("state", self.transport.state()).finish()
    }
}

/// Connects, runs `f` and logs out.
///
/// # Errors
///
/// Returns an error if connecting fails, or the error of `f`.
pub async fn with_session<F, R>(config: &ConnectionConfig, f: F) -> Result<R>
where
    F: AsyncFnOnce(&mut ImapSession) -> Result<R>,
{
    Session::open(config).await?.run(f).await
}

fn report_failure(err: &Error) {
    let mut chain = Vec::new();
    let mut source = err.source();
    while let Some(cause) = source {
        chain.push(cause.to_string());
        source = cause.source();
    }

    tracing::error!(
        target: "pragmail::session",
        error = %err,
        kind = ?err.kind(),
        source = ?chain,
        "Session failed"
    );
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
    use pragmail_imap::FetchItem;
    use tokio_test::io::Builder;

    const TIMEOUT: Duration = Duration::from_secs(5);

    async fn client(mock: tokio_test::io::Mock) -> Client<tokio_test::io::Mock> {
        Client::from_stream(mock, TIMEOUT).await.unwrap()
    }

    #[tokio::test]
    async fn test_find_latest_over_wire() {
        let since = sent_since_token(today(), -2).unwrap();
        let mock = Builder::new()
            .read(b"* OK ready\r\n")
            .write(b"A0000 LOGIN user pass\r\n")
            .read(b"A0000 OK logged in\r\n")
            .write(b"A0001 EXAMINE INBOX\r\n")
            .read(b"* 3 EXISTS\r\nA0001 OK [READ-ONLY] done\r\n")
            .write(b"A0002 SEARCH FROM \"John Smith\"\r\n")
            .read(b"* SEARCH 1 3\r\nA0002 OK done\r\n")
            .write(format!("A0003 SEARCH SENTSINCE {since}\r\n").as_bytes())
            .read(b"* SEARCH 2 3\r\nA0003 OK done\r\n")
            .write(b"A0004 FETCH 3 (RFC822)\r\n")
            .read(b"* 3 FETCH (RFC822 {5}\r\nhello)\r\nA0004 OK done\r\n")
            .write(b"A0005 CLOSE\r\n")
            .read(b"A0005 OK closed\r\n")
            .write(b"A0006 LOGOUT\r\n")
            .read(b"* BYE bye\r\nA0006 OK done\r\n")
            .build();

        let session = Session::new(client(mock).await);
        let message = session
            .run(async |s: &mut Session<_>| {
                s.authenticate("user", "pass").await?;
                let status = s.select_mailbox("INBOX").await?;
                assert!(status.read_only);
                s.find_latest("John Smith", -2, &FetchItems::rfc822()).await
            })
            .await
            .unwrap();

        assert_eq!(message.id, 3);
        assert_eq!(message.content(), Some(&b"hello"[..]));
        assert!(matches!(
            message.responses[0].items[0],
            FetchItem::Rfc822(Some(_))
        ));
    }

    #[tokio::test]
    async fn test_non_negative_window_rejected_before_search() {
        let mock = Builder::new()
            .read(b"* PREAUTH ready\r\n")
            .write(b"A0000 EXAMINE INBOX\r\n")
            .read(b"A0000 OK [READ-ONLY] done\r\n")
            .build();

        let mut session = Session::new(client(mock).await);
        session.select_mailbox("INBOX").await.unwrap();

        for days in [0, 3] {
            let err = session
                .find_latest("someone", days, &FetchItems::rfc822())
                .await
                .unwrap_err();
            assert!(matches!(err, Error::Command(_)));
        }
    }

    #[tokio::test]
    async fn test_sender_with_line_break_never_reaches_wire() {
        let mock = Builder::new()
            .read(b"* PREAUTH ready\r\n")
            .write(b"A0000 EXAMINE INBOX\r\n")
            .read(b"A0000 OK [READ-ONLY] done\r\n")
            .build();

        let mut session = Session::new(client(mock).await);
        session.select_mailbox("INBOX").await.unwrap();

        let err = session
            .find_latest_message("x\"\r\nA9999 LOGOUT\r\nA0002 NOOP")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Command(_)));
        assert_eq!(err.kind(), crate::ErrorKind::Usage);
        assert!(session.state().is_selected());
    }

    #[tokio::test]
    async fn test_debug_shows_state_only() {
        let mock = Builder::new().read(b"* OK ready\r\n").build();
        let session = Session::new(client(mock).await);
        let rendered = format!("{session:?}");
        assert!(rendered.contains("NotAuthenticated"));
        assert!(!rendered.contains("host"));
    }
}
