//! Transport failures.
//!
//! Server refusals (`NO`, `BAD`, `BYE`) keep the server's text so callers can
//! show it; everything else is a local or network failure.

use std::time::Duration;

use thiserror::Error;

/// Why an IMAP exchange failed.
#[derive(Debug, Error)]
pub enum Error {
    /// Socket read, write or connect failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The TLS handshake or record layer failed.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// The server host is not usable as a TLS server name.
    #[error("Invalid DNS name: {0}")]
    InvalidDnsName(#[from] rustls::pki_types::InvalidDnsNameError),

    /// A server line could not be parsed.
    #[error("Unparseable response at byte {position}: {message}")]
    Parse {
        /// Offset into the response.
        position: usize,
        /// What the parser expected.
        message: String,
    },

    /// Tagged `NO`: the command was understood but refused, e.g. bad
    /// credentials or an unknown mailbox.
    #[error("Server refused: {0}")]
    No(String),

    /// Tagged `BAD`: the server did not accept the command syntax.
    #[error("Server rejected syntax: {0}")]
    Bad(String),

    /// Untagged `BYE` outside of LOGOUT.
    #[error("Server closed the session: {0}")]
    Bye(String),

    /// No complete reply within the I/O timeout.
    #[error("No reply within {0:?}")]
    Timeout(Duration),

    /// The command is not valid in the current protocol state. Nothing was
    /// sent.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// A command argument cannot be sent, e.g. a value containing CR or LF.
    /// Nothing was sent.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The server sent something the client cannot act on, such as a
    /// missing greeting or an unexpected continuation.
    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl Error {
    /// Returns true if the connection is gone or going.
    #[must_use]
    pub const fn is_disconnect(&self) -> bool {
        matches!(self, Self::Bye(_) | Self::Io(_))
    }
}

/// Result of a transport operation.
pub type Result<T> = std::result::Result<T, Error>;
