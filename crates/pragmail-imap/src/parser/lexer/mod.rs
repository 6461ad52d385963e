//! IMAP lexer for tokenizing server responses.
//!
//! Breaks one framed response (as produced by
//! [`FramedStream::read_response`](crate::FramedStream::read_response),
//! literals included) into tokens for the response parser.

#![allow(clippy::missing_errors_doc)]

mod token;

pub use token::Token;

use crate::{Error, Result};

/// IMAP lexer state.
pub struct Lexer<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    /// Creates a new lexer for the given input.
    #[must_use]
    pub const fn new(input: &'a [u8]) -> Self {
        Self { input, pos: 0 }
    }

    /// Returns the current position in the input.
    #[must_use]
    pub const fn position(&self) -> usize {
        self.pos
    }

    /// Returns true if at end of input.
    #[must_use]
    pub const fn is_eof(&self) -> bool {
        self.pos >= self.input.len()
    }

    /// Peeks at the current byte without consuming it.
    #[must_use]
    pub fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    /// Advances by one byte and returns it.
    pub fn advance(&mut self) -> Option<u8> {
        let byte = self.peek()?;
        self.pos += 1;
        Some(byte)
    }

    /// Consumes bytes while `pred` holds and returns them.
    pub fn take_while(&mut self, pred: impl Fn(u8) -> bool) -> &'a [u8] {
        let start = self.pos;
        while self.peek().is_some_and(&pred) {
            self.pos += 1;
        }
        &self.input[start..self.pos]
    }

    /// Consumes `byte` if it is next, returning whether it was.
    pub fn eat(&mut self, byte: u8) -> bool {
        if self.peek() == Some(byte) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// Reads the next token.
    pub fn next_token(&mut self) -> Result<Token<'a>> {
        let Some(byte) = self.peek() else {
            return Ok(Token::Eof);
        };

        let single = match byte {
            b' ' => Some(Token::Space),
            b'(' => Some(Token::LParen),
            b')' => Some(Token::RParen),
            b'[' => Some(Token::LBracket),
            b']' => Some(Token::RBracket),
            b'*' => Some(Token::Asterisk),
            b'+' => Some(Token::Plus),
            _ => None,
        };
        if let Some(token) = single {
            self.pos += 1;
            return Ok(token);
        }

        match byte {
            b'\r' if self.input.get(self.pos + 1) == Some(&b'\n') => {
                self.pos += 2;
                Ok(Token::Crlf)
            }
            b'\r' => Err(self.error("Expected LF after CR")),
            b'"' => self.read_quoted_string(),
            b'{' => self.read_literal(),
            _ if is_atom_char(byte) => Ok(self.read_atom()),
            _ => Err(self.error(&format!("Unexpected character: {byte:#04x}"))),
        }
    }

    /// Reads a quoted string token.
    fn read_quoted_string(&mut self) -> Result<Token<'a>> {
        self.pos += 1;
        let mut result = Vec::new();

        loop {
            match self.advance() {
                Some(b'"') => break,
                Some(b'\\') => match self.advance() {
                    Some(c @ (b'"' | b'\\')) => result.push(c),
                    Some(c) => return Err(self.error(&format!("Invalid escape: \\{}", c as char))),
                    None => return Err(self.error("Unexpected EOF in quoted string")),
                },
                Some(c) => result.push(c),
                None => return Err(self.error("Unexpected EOF in quoted string")),
            }
        }

        Ok(Token::QuotedString(
            String::from_utf8_lossy(&result).into_owned(),
        ))
    }

    /// Reads a literal: `{n}` or `{n+}`, CRLF, then `n` bytes of data.
    fn read_literal(&mut self) -> Result<Token<'a>> {
        self.pos += 1;
        let digits = self.take_while(|b| b.is_ascii_digit());
        let size: usize = std::str::from_utf8(digits)
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| self.error("Invalid literal size"))?;

        self.eat(b'+');
        if !self.eat(b'}') {
            return Err(self.error("Expected } after literal size"));
        }
        if !(self.eat(b'\r') && self.eat(b'\n')) {
            return Err(self.error("Expected CRLF after literal size"));
        }

        let end = self
            .pos
            .checked_add(size)
            .filter(|&end| end <= self.input.len())
            .ok_or_else(|| self.error("Incomplete literal data"))?;
        let data = &self.input[self.pos..end];
        self.pos = end;

        Ok(Token::Literal(data))
    }

    /// Reads an atom, a number, or NIL.
    fn read_atom(&mut self) -> Token<'a> {
        let raw = self.take_while(is_atom_char);
        // Atom bytes are a subset of ASCII.
        let s = std::str::from_utf8(raw).unwrap_or_default();

        if s.eq_ignore_ascii_case("NIL") {
            Token::Nil
        } else if raw.iter().all(u8::is_ascii_digit) {
            s.parse().map_or(Token::Atom(s), Token::Number)
        } else {
            Token::Atom(s)
        }
    }

    /// Creates a parse error at the current position.
    pub(crate) fn error(&self, message: &str) -> Error {
        Error::Parse {
            position: self.pos,
            message: message.to_string(),
        }
    }

    /// Expects and consumes a specific kind of token.
    #[allow(clippy::needless_pass_by_value)]
    pub fn expect(&mut self, expected: Token<'_>) -> Result<()> {
        let token = self.next_token()?;
        if std::mem::discriminant(&token) == std::mem::discriminant(&expected) {
            Ok(())
        } else {
            Err(self.error(&format!("Expected {expected:?}, got {token:?}")))
        }
    }

    /// Expects and consumes a space.
    pub fn expect_space(&mut self) -> Result<()> {
        self.expect(Token::Space)
    }

    /// Reads an astring (atom, number, quoted string or literal).
    pub fn read_astring(&mut self) -> Result<String> {
        let token = self.next_token()?;
        match token {
            Token::Nil => Ok("NIL".to_string()),
            other => other
                .text()
                .ok_or_else(|| self.error(&format!("Expected astring, got {other:?}"))),
        }
    }

    /// Reads a nstring (NIL, quoted string or literal).
    pub fn read_nstring(&mut self) -> Result<Option<String>> {
        match self.next_token()? {
            Token::Nil => Ok(None),
            token @ (Token::QuotedString(_) | Token::Literal(_)) => Ok(token.text()),
            token => Err(self.error(&format!("Expected nstring, got {token:?}"))),
        }
    }

    /// Reads a number.
    pub fn read_number(&mut self) -> Result<u32> {
        match self.next_token()? {
            Token::Number(n) => Ok(n),
            token => Err(self.error(&format!("Expected number, got {token:?}"))),
        }
    }

    /// Reads an atom.
    pub fn read_atom_string(&mut self) -> Result<&'a str> {
        match self.next_token()? {
            Token::Atom(s) => Ok(s),
            token => Err(self.error(&format!("Expected atom, got {token:?}"))),
        }
    }

    /// Returns the input between `start` and the current position as text.
    #[must_use]
    pub fn slice_from(&self, start: usize) -> String {
        let start = start.min(self.pos);
        String::from_utf8_lossy(&self.input[start..self.pos]).into_owned()
    }

    /// Returns the rest of the line, without the trailing CRLF.
    pub fn rest_of_line(&mut self) -> String {
        let raw = self.take_while(|b| b != b'\r' && b != b'\n');
        self.eat(b'\r');
        self.eat(b'\n');
        String::from_utf8_lossy(raw).into_owned()
    }
}

/// Returns true if the byte is a valid atom character.
///
/// `\` is accepted so that flags like `\Seen` lex as a single atom, and `.`,
/// `<` and `>` so that `RFC822.SIZE` and partial-fetch origins stay intact.
#[must_use]
pub const fn is_atom_char(b: u8) -> bool {
    matches!(b, 0x21..=0x7E)
        && !matches!(b, b'(' | b')' | b'{' | b'%' | b'*' | b'"' | b'[' | b']')
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

    fn tokens(input: &[u8]) -> Vec<Token<'_>> {
        let mut lexer = Lexer::new(input);
        let mut out = Vec::new();
        loop {
            let token = lexer.next_token().unwrap();
            if token == Token::Eof {
                break;
            }
            out.push(token);
        }
        out
    }

    #[test]
    fn test_tagged_response() {
        assert_eq!(
            tokens(b"A0001 OK LOGIN completed\r\n"),
            vec![
                Token::Atom("A0001"),
                Token::Space,
                Token::Atom("OK"),
                Token::Space,
                Token::Atom("LOGIN"),
                Token::Space,
                Token::Atom("completed"),
                Token::Crlf,
            ]
        );
    }

    #[test]
    fn test_numbers_and_oversized_numbers() {
        assert_eq!(
            tokens(b"123 99999999999"),
            vec![
                Token::Number(123),
                Token::Space,
                Token::Atom("99999999999"),
            ]
        );
    }

    #[test]
    fn test_quoted_string_escaped() {
        assert_eq!(
            tokens(b"\"hello \\\"world\\\"\""),
            vec![Token::QuotedString("hello \"world\"".to_string())]
        );
    }

    #[test]
    fn test_invalid_escape() {
        let mut lexer = Lexer::new(b"\"bad \\n\"");
        assert!(lexer.next_token().is_err());
    }

    #[test]
    fn test_nil_any_case() {
        assert_eq!(
            tokens(b"NIL nil"),
            vec![Token::Nil, Token::Space, Token::Nil]
        );
    }

    #[test]
    fn test_flags_and_brackets() {
        assert_eq!(
            tokens(b"(\\Seen) [UIDNEXT 100]"),
            vec![
                Token::LParen,
                Token::Atom("\\Seen"),
                Token::RParen,
                Token::Space,
                Token::LBracket,
                Token::Atom("UIDNEXT"),
                Token::Space,
                Token::Number(100),
                Token::RBracket,
            ]
        );
    }

    #[test]
    fn test_literal_borrows_input() {
        assert_eq!(
            tokens(b"{5}\r\nhello)"),
            vec![Token::Literal(b"hello"), Token::RParen]
        );
        assert_eq!(tokens(b"{2+}\r\nhi"), vec![Token::Literal(b"hi")]);
    }

    #[test]
    fn test_incomplete_literal() {
        let mut lexer = Lexer::new(b"{10}\r\nshort");
        assert!(lexer.next_token().is_err());
    }

    #[test]
    fn test_rest_of_line() {
        let mut lexer = Lexer::new(b"OK [READ-ONLY] done\r\n");
        let _ = lexer.next_token().unwrap();
        let _ = lexer.next_token().unwrap();
        assert_eq!(lexer.rest_of_line(), "[READ-ONLY] done");
        assert!(lexer.is_eof());
    }

    #[test]
    fn test_is_atom_char() {
        assert!(is_atom_char(b'A'));
        assert!(is_atom_char(b'.'));
        assert!(is_atom_char(b'\\'));
        assert!(is_atom_char(b'<'));
        assert!(!is_atom_char(b' '));
        assert!(!is_atom_char(b'('));
        assert!(!is_atom_char(b'['));
        assert!(!is_atom_char(b']'));
        assert!(!is_atom_char(b'{'));
    }
}
