//! Error types for pragmail.

use thiserror::Error;

/// Broad classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The caller asked for something invalid: bad arguments, malformed
    /// input, or a command issued in the wrong protocol state.
    Usage,
    /// Something failed while talking to the outside world.
    Operational,
}

/// Errors that can occur in pragmail operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid argument, input or command sequence.
    #[error("Command error: {0}")]
    Command(String),

    /// IMAP transport failure.
    #[error("IMAP error: {0}")]
    Imap(#[source] pragmail_imap::Error),

    /// No message matched both the sender and the date filter.
    #[error("Message not found: {0}")]
    MessageNotFound(u32),

    /// The host could not be turned into a reachable mail server.
    #[error("Host resolution failed: {0}")]
    HostResolution(String),

    /// Server settings lookup request failed.
    #[error("Settings lookup failed: {0}")]
    Lookup(#[from] reqwest::Error),

    /// Server settings response could not be decoded.
    #[error("Invalid settings response: {0}")]
    Json(#[from] serde_json::Error),

    /// Message could not be parsed.
    #[error("MIME error: {0}")]
    Mime(#[from] pragmail_mime::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Returns whether this is a usage or an operational error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Command(_) => ErrorKind::Usage,
            _ => ErrorKind::Operational,
        }
    }
}

impl From<pragmail_imap::Error> for Error {
    fn from(err: pragmail_imap::Error) -> Self {
        match err {
            pragmail_imap::Error::InvalidState(msg)
            | pragmail_imap::Error::InvalidArgument(msg) => Self::Command(msg),
            pragmail_imap::Error::Bad(msg) => {
                Self::Command(format!("Server rejected command: {msg}"))
            }
            other => Self::Imap(other),
        }
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

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
    use std::error::Error as _;

    #[test]
    fn test_message_not_found_display() {
        assert_eq!(Error::MessageNotFound(0).to_string(), "Message not found: 0");
    }

    #[test]
    fn test_invalid_state_is_usage() {
        let err = Error::from(pragmail_imap::Error::InvalidState(
            "SEARCH requires a selected mailbox".into(),
        ));
        assert!(matches!(err, Error::Command(_)));
        assert_eq!(err.kind(), ErrorKind::Usage);
    }

    #[test]
    fn test_invalid_argument_is_usage() {
        let err = Error::from(pragmail_imap::Error::InvalidArgument(
            "username contains forbidden byte 0x0d".into(),
        ));
        assert!(matches!(err, Error::Command(ref m) if m.contains("0x0d")));
        assert_eq!(err.kind(), ErrorKind::Usage);
    }

    #[test]
    fn test_bad_is_usage() {
        let err = Error::from(pragmail_imap::Error::Bad("unknown command".into()));
        assert_eq!(err.kind(), ErrorKind::Usage);
        assert!(err.to_string().contains("unknown command"));
    }

    #[test]
    fn test_transport_failure_is_operational() {
        let err = Error::from(pragmail_imap::Error::No("[AUTHENTICATIONFAILED] nope".into()));
        assert_eq!(err.kind(), ErrorKind::Operational);
        assert!(err.source().is_some());
    }

    #[test]
    fn test_io_is_operational() {
        let err = Error::from(std::io::Error::other("disk full"));
        assert_eq!(err.kind(), ErrorKind::Operational);
    }
}
