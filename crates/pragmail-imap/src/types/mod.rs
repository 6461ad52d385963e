//! Small protocol values shared by the parser and the client.

mod mailbox;
mod response_code;

pub use mailbox::MailboxStatus;
pub use response_code::ResponseCode;

/// Condition of a status response (`* OK ...`, `A0001 NO ...`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// `OK`.
    Ok,
    /// `NO`: refused.
    No,
    /// `BAD`: malformed or unknown command.
    Bad,
    /// `PREAUTH` greeting; the session starts authenticated.
    PreAuth,
    /// `BYE`: the server is hanging up.
    Bye,
}

impl Status {
    /// `OK` and `PREAUTH` let the exchange continue.
    #[must_use]
    pub const fn is_ok(self) -> bool {
        matches!(self, Self::Ok | Self::PreAuth)
    }
}

/// The tag that pairs a command with its completion reply.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Tag(pub String);

impl Tag {
    /// Wraps a tag string.
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    /// The tag text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
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
    fn test_status_is_ok() {
        assert!(Status::Ok.is_ok());
        assert!(Status::PreAuth.is_ok());
        assert!(!Status::No.is_ok());
        assert!(!Status::Bad.is_ok());
        assert!(!Status::Bye.is_ok());
    }

    #[test]
    fn test_tag_display() {
        let tag = Tag::new("A0007");
        assert_eq!(tag.as_str(), "A0007");
        assert_eq!(tag.to_string(), "A0007");
    }
}
