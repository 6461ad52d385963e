//! Response data types.

use crate::types::ResponseCode;

/// Untagged server data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UntaggedResponse {
    /// `* OK` status.
    Ok {
        /// Optional response code.
        code: Option<ResponseCode>,
        /// Human-readable text.
        text: String,
    },
    /// `* NO` warning.
    No {
        /// Optional response code.
        code: Option<ResponseCode>,
        /// Human-readable text.
        text: String,
    },
    /// `* BAD` protocol error.
    Bad {
        /// Optional response code.
        code: Option<ResponseCode>,
        /// Human-readable text.
        text: String,
    },
    /// `* PREAUTH` greeting.
    PreAuth {
        /// Optional response code.
        code: Option<ResponseCode>,
        /// Human-readable text.
        text: String,
    },
    /// `* BYE`: the server is closing the connection.
    Bye {
        /// Optional response code.
        code: Option<ResponseCode>,
        /// Human-readable text.
        text: String,
    },
    /// `* CAPABILITY ...`.
    Capability(Vec<String>),
    /// `* FLAGS (...)`.
    Flags(Vec<String>),
    /// `* SEARCH ...`, identifiers kept exactly as the server sent them.
    Search(Vec<String>),
    /// `* n EXISTS`.
    Exists(u32),
    /// `* n RECENT`.
    Recent(u32),
    /// `* n EXPUNGE`.
    Expunge(u32),
    /// `* n FETCH (...)`.
    Fetch(Fetched),
    /// Any untagged data this client does not interpret, kept verbatim.
    Other(String),
}

/// FETCH response item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchItem {
    /// Message flags.
    Flags(Vec<String>),
    /// Internal date.
    InternalDate(String),
    /// RFC822 size.
    Rfc822Size(u32),
    /// UID.
    Uid(u32),
    /// `RFC822`: the entire message.
    Rfc822(Option<Vec<u8>>),
    /// `RFC822.HEADER`.
    Rfc822Header(Option<Vec<u8>>),
    /// `RFC822.TEXT`.
    Rfc822Text(Option<Vec<u8>>),
    /// `BODY[section]<origin>`.
    Body {
        /// Section specifier; `None` for `BODY[]`.
        section: Option<String>,
        /// Origin offset of a partial fetch.
        origin: Option<u32>,
        /// Body data.
        data: Option<Vec<u8>>,
    },
    /// Any other item, with its value as raw protocol text.
    Other {
        /// Item name, upper-cased.
        name: String,
        /// Raw value.
        value: String,
    },
}

/// One `* n FETCH (...)` response: a message number and its data items.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Fetched {
    /// Message sequence number.
    pub seq: u32,
    /// Data items in the order the server sent them.
    pub items: Vec<FetchItem>,
}

impl Fetched {
    /// Returns the message content carried by this response.
    ///
    /// Prefers the entire message (`RFC822` or `BODY[]`), then falls back to
    /// the first section or header/text data present.
    #[must_use]
    pub fn content(&self) -> Option<&[u8]> {
        let whole = self.items.iter().find_map(|item| match item {
            FetchItem::Rfc822(Some(data))
            | FetchItem::Body {
                section: None,
                origin: None,
                data: Some(data),
            } => Some(data.as_slice()),
            _ => None,
        });

        whole.or_else(|| {
            self.items.iter().find_map(|item| match item {
                FetchItem::Body { data: Some(d), .. }
                | FetchItem::Rfc822Header(Some(d))
                | FetchItem::Rfc822Text(Some(d)) => Some(d.as_slice()),
                _ => None,
            })
        })
    }

    /// Returns the UID, if it was fetched.
    #[must_use]
    pub fn uid(&self) -> Option<u32> {
        self.items.iter().find_map(|item| match item {
            FetchItem::Uid(uid) => Some(*uid),
            _ => None,
        })
    }

    /// Returns the flags, if they were fetched.
    #[must_use]
    pub fn flags(&self) -> Option<&[String]> {
        self.items.iter().find_map(|item| match item {
            FetchItem::Flags(flags) => Some(flags.as_slice()),
            _ => None,
        })
    }

    /// Returns the `RFC822.SIZE`, if it was fetched.
    #[must_use]
    pub fn size(&self) -> Option<u32> {
        self.items.iter().find_map(|item| match item {
            FetchItem::Rfc822Size(n) => Some(*n),
            _ => None,
        })
    }
}
