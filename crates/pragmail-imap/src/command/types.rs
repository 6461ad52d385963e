//! Command-related type definitions.

/// FETCH items to request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchItems {
    /// Fetch all (equivalent to FLAGS INTERNALDATE RFC822.SIZE ENVELOPE).
    All,
    /// Fetch fast (equivalent to FLAGS INTERNALDATE RFC822.SIZE).
    Fast,
    /// Custom list of items.
    Items(Vec<FetchAttribute>),
    /// A pre-formatted item list, sent verbatim (e.g. `(BODY.PEEK[HEADER])`).
    Raw(String),
}

impl FetchItems {
    /// The entire message, headers and body (`RFC822`).
    #[must_use]
    pub fn rfc822() -> Self {
        Self::Items(vec![FetchAttribute::Rfc822])
    }
}

impl Default for FetchItems {
    fn default() -> Self {
        Self::rfc822()
    }
}

/// Individual FETCH attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchAttribute {
    /// Message flags.
    Flags,
    /// Internal date.
    InternalDate,
    /// RFC822 size.
    Rfc822Size,
    /// UID.
    Uid,
    /// Body section.
    Body {
        /// Section specifier.
        section: Option<String>,
        /// Peek (don't set \Seen).
        peek: bool,
        /// Partial fetch range.
        partial: Option<(u32, u32)>,
    },
    /// RFC822 (full message).
    Rfc822,
    /// RFC822.HEADER.
    Rfc822Header,
    /// RFC822.TEXT.
    Rfc822Text,
}

/// SEARCH criteria.
///
/// Date-valued criteria take the `DD-Mon-YYYY` form the protocol expects,
/// e.g. `"01-Jan-2021"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchCriteria {
    /// All messages.
    All,
    /// Messages with \Seen flag.
    Seen,
    /// Messages without \Seen flag.
    Unseen,
    /// Subject contains text.
    Subject(String),
    /// From contains text.
    From(String),
    /// To contains text.
    To(String),
    /// Text in header or body.
    Text(String),
    /// Internal date on or after the date.
    Since(String),
    /// Internal date before the date.
    Before(String),
    /// Internal date within the date.
    On(String),
    /// `Date:` header on or after the date.
    SentSince(String),
    /// `Date:` header before the date.
    SentBefore(String),
    /// AND of criteria.
    And(Vec<Self>),
    /// OR of criteria.
    Or(Box<Self>, Box<Self>),
    /// NOT of criteria.
    Not(Box<Self>),
}

impl SearchCriteria {
    /// Returns true if every string argument is 7-bit ASCII.
    ///
    /// Anything else needs an explicit `CHARSET` on the SEARCH.
    #[must_use]
    pub fn is_ascii(&self) -> bool {
        match self {
            Self::All | Self::Seen | Self::Unseen => true,
            Self::Subject(s)
            | Self::From(s)
            | Self::To(s)
            | Self::Text(s)
            | Self::Since(s)
            | Self::Before(s)
            | Self::On(s)
            | Self::SentSince(s)
            | Self::SentBefore(s) => s.is_ascii(),
            Self::And(criteria) => criteria.iter().all(Self::is_ascii),
            Self::Or(a, b) => a.is_ascii() && b.is_ascii(),
            Self::Not(c) => c.is_ascii(),
        }
    }
}
