//! IMAP command builder.
//!
//! This module provides types and serialization for IMAP commands.

mod serialize;
mod tag_generator;
mod types;

pub use tag_generator::TagGenerator;
pub use types::{FetchAttribute, FetchItems, SearchCriteria};

pub use serialize::Wire;

use serialize::{write_astring, write_fetch_items, write_search_criteria};

use crate::Result;

/// IMAP command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    // Any State Commands
    /// CAPABILITY command.
    Capability,
    /// NOOP command.
    Noop,
    /// LOGOUT command.
    Logout,

    // Not Authenticated State Commands
    /// LOGIN command.
    Login {
        /// Username.
        username: String,
        /// Password.
        password: String,
    },

    // Authenticated State Commands
    /// SELECT command.
    Select {
        /// Mailbox to select.
        mailbox: String,
    },
    /// EXAMINE command (read-only SELECT).
    Examine {
        /// Mailbox to examine.
        mailbox: String,
    },

    // Selected State Commands
    /// CLOSE command.
    Close,
    /// SEARCH command.
    Search {
        /// Optional `CHARSET` argument.
        charset: Option<String>,
        /// Search criteria.
        criteria: SearchCriteria,
        /// Use UIDs.
        uid: bool,
    },
    /// FETCH command for a single message.
    Fetch {
        /// Sequence number, or UID when `uid` is set.
        id: u32,
        /// Items to fetch.
        items: FetchItems,
        /// Use UIDs.
        uid: bool,
    },
}

impl Command {
    /// Returns the command keyword, for logging.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Capability => "CAPABILITY",
            Self::Noop => "NOOP",
            Self::Logout => "LOGOUT",
            Self::Login { .. } => "LOGIN",
            Self::Select { .. } => "SELECT",
            Self::Examine { .. } => "EXAMINE",
            Self::Close => "CLOSE",
            Self::Search { .. } => "SEARCH",
            Self::Fetch { .. } => "FETCH",
        }
    }

    /// Serializes the command with the given tag into wire chunks.
    ///
    /// A single chunk unless some argument had to be sent as a literal; see
    /// [`Wire`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`](crate::Error::InvalidArgument) if
    /// an argument contains CR, LF or NUL, or a date is not a single atom.
    pub fn to_wire(&self, tag: &str) -> Result<Vec<Vec<u8>>> {
        let mut buf = Wire::default();
        buf.extend_from_slice(tag.as_bytes());
        buf.push(b' ');

        match self {
            Self::Capability => buf.extend_from_slice(b"CAPABILITY"),
            Self::Noop => buf.extend_from_slice(b"NOOP"),
            Self::Logout => buf.extend_from_slice(b"LOGOUT"),

            Self::Login { username, password } => {
                buf.extend_from_slice(b"LOGIN ");
                write_astring(&mut buf, "username", username)?;
                buf.push(b' ');
                write_astring(&mut buf, "password", password)?;
            }

            Self::Select { mailbox } => {
                buf.extend_from_slice(b"SELECT ");
                write_astring(&mut buf, "mailbox", mailbox)?;
            }

            Self::Examine { mailbox } => {
                buf.extend_from_slice(b"EXAMINE ");
                write_astring(&mut buf, "mailbox", mailbox)?;
            }

            Self::Close => buf.extend_from_slice(b"CLOSE"),

            Self::Search {
                charset,
                criteria,
                uid,
            } => {
                if *uid {
                    buf.extend_from_slice(b"UID ");
                }
                buf.extend_from_slice(b"SEARCH ");
                match charset {
                    Some(charset) => {
                        buf.extend_from_slice(b"CHARSET ");
                        write_astring(&mut buf, "charset", charset)?;
                        buf.push(b' ');
                    }
                    // 8-bit keys mean nothing to the server without a charset.
                    None if !criteria.is_ascii() => buf.extend_from_slice(b"CHARSET UTF-8 "),
                    None => {}
                }
                write_search_criteria(&mut buf, criteria)?;
            }

            Self::Fetch { id, items, uid } => {
                if *uid {
                    buf.extend_from_slice(b"UID ");
                }
                buf.extend_from_slice(format!("FETCH {id} ").as_bytes());
                write_fetch_items(&mut buf, items)?;
            }
        }

        Ok(buf.finish())
    }

    /// Serializes the command to the exact bytes sent, literals inlined.
    ///
    /// # Errors
    ///
    /// See [`to_wire`](Self::to_wire).
    pub fn serialize(&self, tag: &str) -> Result<Vec<u8>> {
        Ok(self.to_wire(tag)?.concat())
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
    fn test_capability_command() {
        let cmd = Command::Capability;
        assert_eq!(cmd.serialize("A0001").unwrap(), b"A0001 CAPABILITY\r\n");
    }

    #[test]
    fn test_login_command() {
        let cmd = Command::Login {
            username: "user".to_string(),
            password: "pass".to_string(),
        };
        assert_eq!(cmd.serialize("A0001").unwrap(), b"A0001 LOGIN user pass\r\n");
    }

    #[test]
    fn test_login_quoted() {
        let cmd = Command::Login {
            username: "user@example.com".to_string(),
            password: "pa\"ss word".to_string(),
        };
        assert_eq!(
            cmd.serialize("A0001").unwrap(),
            b"A0001 LOGIN user@example.com \"pa\\\"ss word\"\r\n"
        );
    }

    #[test]
    fn test_examine_command() {
        let cmd = Command::Examine {
            mailbox: "INBOX".to_string(),
        };
        assert_eq!(cmd.serialize("A0002").unwrap(), b"A0002 EXAMINE INBOX\r\n");
    }

    #[test]
    fn test_select_mailbox_with_space() {
        let cmd = Command::Select {
            mailbox: "Sent Items".to_string(),
        };
        assert_eq!(cmd.serialize("A0002").unwrap(), b"A0002 SELECT \"Sent Items\"\r\n");
    }

    #[test]
    fn test_search_from_is_quoted() {
        let cmd = Command::Search {
            charset: None,
            criteria: SearchCriteria::From("John Smith".to_string()),
            uid: false,
        };
        assert_eq!(
            cmd.serialize("A0003").unwrap(),
            b"A0003 SEARCH FROM \"John Smith\"\r\n"
        );
    }

    #[test]
    fn test_search_sentsince_with_charset() {
        let cmd = Command::Search {
            charset: Some("UTF-8".to_string()),
            criteria: SearchCriteria::SentSince("01-Jan-2021".to_string()),
            uid: false,
        };
        assert_eq!(
            cmd.serialize("A0004").unwrap(),
            b"A0004 SEARCH CHARSET UTF-8 SENTSINCE 01-Jan-2021\r\n"
        );
    }

    #[test]
    fn test_search_compound() {
        let cmd = Command::Search {
            charset: None,
            criteria: SearchCriteria::And(vec![
                SearchCriteria::Unseen,
                SearchCriteria::Or(
                    Box::new(SearchCriteria::Subject("digest".to_string())),
                    Box::new(SearchCriteria::Not(Box::new(SearchCriteria::Since(
                        "31-Dec-2021".to_string(),
                    )))),
                ),
            ]),
            uid: true,
        };
        assert_eq!(
            cmd.serialize("A0005").unwrap(),
            b"A0005 UID SEARCH (UNSEEN OR SUBJECT \"digest\" NOT SINCE 31-Dec-2021)\r\n"
        );
    }

    #[test]
    fn test_fetch_rfc822() {
        let cmd = Command::Fetch {
            id: 259,
            items: FetchItems::rfc822(),
            uid: false,
        };
        assert_eq!(cmd.serialize("A0006").unwrap(), b"A0006 FETCH 259 (RFC822)\r\n");
    }

    #[test]
    fn test_fetch_items_list() {
        let cmd = Command::Fetch {
            id: 7,
            items: FetchItems::Items(vec![
                FetchAttribute::Uid,
                FetchAttribute::Body {
                    section: Some("HEADER".to_string()),
                    peek: true,
                    partial: Some((0, 1024)),
                },
            ]),
            uid: true,
        };
        assert_eq!(
            cmd.serialize("A0007").unwrap(),
            b"A0007 UID FETCH 7 (UID BODY.PEEK[HEADER]<0.1024>)\r\n"
        );
    }

    #[test]
    fn test_fetch_raw_items() {
        let cmd = Command::Fetch {
            id: 3,
            items: FetchItems::Raw(" (BODY[TEXT]) ".to_string()),
            uid: false,
        };
        assert_eq!(cmd.serialize("A0008").unwrap(), b"A0008 FETCH 3 (BODY[TEXT])\r\n");
    }

    #[test]
    fn test_login_with_line_break_rejected() {
        let cmd = Command::Login {
            username: "u\r\nA1 LOGOUT".to_string(),
            password: "pass".to_string(),
        };
        assert!(matches!(
            cmd.serialize("A0001"),
            Err(crate::Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_search_injection_rejected() {
        let cmd = Command::Search {
            charset: None,
            criteria: SearchCriteria::From("x\"\r\nA9999 LOGOUT\r\nA0002 NOOP".to_string()),
            uid: false,
        };
        assert!(matches!(
            cmd.to_wire("A0002"),
            Err(crate::Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_eight_bit_sender_uses_charset_and_literal() {
        let cmd = Command::Search {
            charset: None,
            criteria: SearchCriteria::From("Zoë".to_string()),
            uid: false,
        };
        assert_eq!(
            cmd.to_wire("A0003").unwrap(),
            vec![
                b"A0003 SEARCH CHARSET UTF-8 FROM {4}\r\n".to_vec(),
                "Zoë\r\n".as_bytes().to_vec(),
            ]
        );
    }

    #[test]
    fn test_command_names() {
        assert_eq!(Command::Close.name(), "CLOSE");
        assert_eq!(
            Command::Login {
                username: String::new(),
                password: String::new(),
            }
            .name(),
            "LOGIN"
        );
    }
}
