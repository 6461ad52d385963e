//! Bracketed response codes (`[READ-ONLY]`, `[UIDNEXT 4392]`, ...).

/// Response code carried inside a status response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseCode {
    /// ALERT: Human-readable message that MUST be shown to user.
    Alert,
    /// CAPABILITY list sent inline with a greeting or LOGIN reply.
    Capability(Vec<String>),
    /// PERMANENTFLAGS: Flags that can be changed permanently.
    PermanentFlags(Vec<String>),
    /// READ-ONLY: Mailbox selected as read-only.
    ReadOnly,
    /// READ-WRITE: Mailbox selected as read-write.
    ReadWrite,
    /// TRYCREATE: Mailbox doesn't exist, but can be created.
    TryCreate,
    /// UIDNEXT: Next UID to be assigned.
    UidNext(u32),
    /// UIDVALIDITY: Unique identifier validity value.
    UidValidity(u32),
    /// UNSEEN: First unseen message sequence number.
    Unseen(u32),
    /// Any other response code, kept by name.
    Unknown(String),
}

impl ResponseCode {
    /// Returns true for codes that mark the selected mailbox read-only.
    #[must_use]
    pub const fn is_read_only(&self) -> bool {
        matches!(self, Self::ReadOnly)
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
    fn read_only() {
        assert!(ResponseCode::ReadOnly.is_read_only());
        assert!(!ResponseCode::ReadWrite.is_read_only());
        assert!(!ResponseCode::Unknown("READ-ONLY".to_string()).is_read_only());
    }
}
