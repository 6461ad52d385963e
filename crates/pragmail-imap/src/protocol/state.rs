//! Where a connection is in the IMAP state machine (RFC 9051 section 3).

use std::fmt;

/// Connection state, tracked by the client from server replies.
///
/// Moves from `NotAuthenticated` to `Authenticated` on LOGIN (or a PREAUTH
/// greeting), to `Selected` on SELECT or EXAMINE, back on CLOSE, and to
/// `Logout` on LOGOUT or any BYE.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ProtocolState {
    /// Greeted, waiting for LOGIN.
    #[default]
    NotAuthenticated,

    /// Logged in, no mailbox open.
    Authenticated,

    /// A mailbox is open for SEARCH and FETCH.
    Selected(SelectedState),

    /// Logged out or dropped by the server. Terminal.
    Logout,
}

impl ProtocolState {
    /// True after LOGIN until LOGOUT, whether or not a mailbox is open.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated | Self::Selected(_))
    }

    /// True while a mailbox is open.
    #[must_use]
    pub const fn is_selected(&self) -> bool {
        matches!(self, Self::Selected(_))
    }

    /// True once no further command can be sent.
    #[must_use]
    pub const fn is_logged_out(&self) -> bool {
        matches!(self, Self::Logout)
    }

    /// Returns the selected mailbox name, if any.
    #[must_use]
    pub fn selected_mailbox(&self) -> Option<&str> {
        match self {
            Self::Selected(state) => Some(&state.mailbox),
            _ => None,
        }
    }

    /// True if the open mailbox was opened with EXAMINE or reported
    /// `[READ-ONLY]`.
    #[must_use]
    pub const fn is_read_only(&self) -> bool {
        match self {
            Self::Selected(state) => state.read_only,
            _ => false,
        }
    }
}

impl fmt::Display for ProtocolState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotAuthenticated => f.write_str("NONAUTH"),
            Self::Authenticated => f.write_str("AUTH"),
            Self::Selected(_) => f.write_str("SELECTED"),
            Self::Logout => f.write_str("LOGOUT"),
        }
    }
}

/// State information when a mailbox is selected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedState {
    /// Name of the selected mailbox.
    pub mailbox: String,
    /// Whether the mailbox is read-only (EXAMINE vs SELECT).
    pub read_only: bool,
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

    fn selected(read_only: bool) -> ProtocolState {
        ProtocolState::Selected(SelectedState {
            mailbox: "INBOX".to_string(),
            read_only,
        })
    }

    #[test]
    fn test_protocol_state_default() {
        assert_eq!(ProtocolState::default(), ProtocolState::NotAuthenticated);
    }

    #[test]
    fn test_is_authenticated() {
        assert!(!ProtocolState::NotAuthenticated.is_authenticated());
        assert!(ProtocolState::Authenticated.is_authenticated());
        assert!(selected(false).is_authenticated());
        assert!(!ProtocolState::Logout.is_authenticated());
    }

    #[test]
    fn test_selected_mailbox_and_read_only() {
        assert_eq!(ProtocolState::Authenticated.selected_mailbox(), None);
        assert_eq!(selected(true).selected_mailbox(), Some("INBOX"));
        assert!(selected(true).is_read_only());
        assert!(!selected(false).is_read_only());
        assert!(!ProtocolState::Authenticated.is_read_only());
    }

    #[test]
    fn test_display_uses_rfc_names() {
        assert_eq!(ProtocolState::NotAuthenticated.to_string(), "NONAUTH");
        assert_eq!(selected(false).to_string(), "SELECTED");
        assert_eq!(ProtocolState::Logout.to_string(), "LOGOUT");
        assert!(ProtocolState::Logout.is_logged_out());
    }
}
