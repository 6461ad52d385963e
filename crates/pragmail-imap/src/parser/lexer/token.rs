//! IMAP token types.

/// Token types produced by the lexer.
///
/// Atoms and literals borrow from the input line; quoted strings are
/// unescaped into an owned buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token<'a> {
    /// Atom (unquoted string without special characters).
    Atom(&'a str),
    /// Quoted string.
    QuotedString(String),
    /// Literal data announced with a `{n}` prefix.
    Literal(&'a [u8]),
    /// Number.
    Number(u32),
    /// Opening parenthesis.
    LParen,
    /// Closing parenthesis.
    RParen,
    /// Opening bracket.
    LBracket,
    /// Closing bracket.
    RBracket,
    /// Space character.
    Space,
    /// Asterisk (untagged response prefix).
    Asterisk,
    /// Plus (continuation response prefix).
    Plus,
    /// NIL literal.
    Nil,
    /// CRLF line ending.
    Crlf,
    /// End of input.
    Eof,
}

impl Token<'_> {
    /// Returns the token's text for atom, number and string tokens.
    #[must_use]
    pub fn text(&self) -> Option<String> {
        match self {
            Self::Atom(s) => Some((*s).to_string()),
            Self::QuotedString(s) => Some(s.clone()),
            Self::Number(n) => Some(n.to_string()),
            Self::Literal(data) => Some(String::from_utf8_lossy(data).into_owned()),
            _ => None,
        }
    }
}
