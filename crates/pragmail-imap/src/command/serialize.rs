//! Command serialization helpers.
//!
//! Strings from callers end up inside a command line, so CR, LF and NUL are
//! refused outright. 8-bit strings cannot be quoted and go out as `{n}`
//! literals, which split the command into chunks the server must accept one
//! at a time.

use super::types::{FetchAttribute, FetchItems, SearchCriteria};
use crate::parser::lexer::is_atom_char;
use crate::{Error, Result};

/// A command on its way to the wire.
///
/// Every chunk but the last ends with a `{n}` literal announcement; the
/// next chunk may only be sent after the server's continuation.
#[derive(Debug, Default)]
pub struct Wire {
    chunks: Vec<Vec<u8>>,
    current: Vec<u8>,
}

impl Wire {
    /// Appends raw protocol bytes.
    pub fn extend_from_slice(&mut self, bytes: &[u8]) {
        self.current.extend_from_slice(bytes);
    }

    /// Appends one raw protocol byte.
    pub fn push(&mut self, byte: u8) {
        self.current.push(byte);
    }

    /// Appends a synchronizing literal.
    fn literal(&mut self, bytes: &[u8]) {
        self.current
            .extend_from_slice(format!("{{{}}}\r\n", bytes.len()).as_bytes());
        self.chunks.push(std::mem::take(&mut self.current));
        self.current.extend_from_slice(bytes);
    }

    /// Terminates the command line and returns its chunks.
    pub fn finish(mut self) -> Vec<Vec<u8>> {
        self.current.extend_from_slice(b"\r\n");
        self.chunks.push(self.current);
        self.chunks
    }
}

/// Refuses values that would end or corrupt the command line.
pub fn check_line(what: &str, s: &str) -> Result<()> {
    match s.bytes().find(|&b| matches!(b, b'\r' | b'\n' | 0)) {
        Some(b) => Err(Error::InvalidArgument(format!(
            "{what} contains forbidden byte {b:#04x}"
        ))),
        None => Ok(()),
    }
}

/// Writes an astring: a bare atom when possible, quoted when it has
/// specials, a literal when it has 8-bit bytes.
pub fn write_astring(buf: &mut Wire, what: &str, s: &str) -> Result<()> {
    check_line(what, s)?;
    if !s.is_ascii() {
        buf.literal(s.as_bytes());
    } else if s.is_empty() || s.bytes().any(needs_quoting) {
        write_quoted(buf, s);
    } else {
        buf.extend_from_slice(s.as_bytes());
    }
    Ok(())
}

/// Writes a string argument that is never an atom: quoted, or a literal
/// when it has 8-bit bytes.
pub fn write_string(buf: &mut Wire, what: &str, s: &str) -> Result<()> {
    check_line(what, s)?;
    if s.is_ascii() {
        write_quoted(buf, s);
    } else {
        buf.literal(s.as_bytes());
    }
    Ok(())
}

/// Writes a quoted string, escaping `"` and `\`. The caller has already
/// ruled out CR, LF, NUL and 8-bit bytes.
fn write_quoted(buf: &mut Wire, s: &str) {
    buf.push(b'"');
    for b in s.bytes() {
        if b == b'"' || b == b'\\' {
            buf.push(b'\\');
        }
        buf.push(b);
    }
    buf.push(b'"');
}

/// Returns true if the byte needs quoting.
const fn needs_quoting(b: u8) -> bool {
    matches!(
        b,
        b' ' | b'"' | b'\\' | b'(' | b')' | b'{' | b'%' | b'*' | b'+' | b'[' | b']'
    ) || b < 0x20
        || b >= 0x7F
}

/// Writes FETCH items.
pub fn write_fetch_items(buf: &mut Wire, items: &FetchItems) -> Result<()> {
    match items {
        FetchItems::All => buf.extend_from_slice(b"ALL"),
        FetchItems::Fast => buf.extend_from_slice(b"FAST"),
        FetchItems::Raw(raw) => {
            check_line("FETCH items", raw)?;
            buf.extend_from_slice(raw.trim().as_bytes());
        }
        FetchItems::Items(attrs) => {
            buf.push(b'(');
            for (i, attr) in attrs.iter().enumerate() {
                if i > 0 {
                    buf.push(b' ');
                }
                write_fetch_attribute(buf, attr)?;
            }
            buf.push(b')');
        }
    }
    Ok(())
}

/// Writes a single FETCH attribute.
pub fn write_fetch_attribute(buf: &mut Wire, attr: &FetchAttribute) -> Result<()> {
    match attr {
        FetchAttribute::Flags => buf.extend_from_slice(b"FLAGS"),
        FetchAttribute::InternalDate => buf.extend_from_slice(b"INTERNALDATE"),
        FetchAttribute::Rfc822Size => buf.extend_from_slice(b"RFC822.SIZE"),
        FetchAttribute::Uid => buf.extend_from_slice(b"UID"),
        FetchAttribute::Rfc822 => buf.extend_from_slice(b"RFC822"),
        FetchAttribute::Rfc822Header => buf.extend_from_slice(b"RFC822.HEADER"),
        FetchAttribute::Rfc822Text => buf.extend_from_slice(b"RFC822.TEXT"),
        FetchAttribute::Body {
            section,
            peek,
            partial,
        } => {
            if *peek {
                buf.extend_from_slice(b"BODY.PEEK[");
            } else {
                buf.extend_from_slice(b"BODY[");
            }
            if let Some(s) = section {
                check_line("BODY section", s)?;
                buf.extend_from_slice(s.as_bytes());
            }
            buf.push(b']');
            if let Some((start, len)) = partial {
                buf.extend_from_slice(format!("<{start}.{len}>").as_bytes());
            }
        }
    }
    Ok(())
}

/// Writes SEARCH criteria.
///
/// String arguments are always sent quoted (or as literals) so that a
/// sender such as `John Smith` stays a single search key.
pub fn write_search_criteria(buf: &mut Wire, criteria: &SearchCriteria) -> Result<()> {
    match criteria {
        SearchCriteria::All => buf.extend_from_slice(b"ALL"),
        SearchCriteria::Seen => buf.extend_from_slice(b"SEEN"),
        SearchCriteria::Unseen => buf.extend_from_slice(b"UNSEEN"),
        SearchCriteria::Subject(s) => write_keyed(buf, "SUBJECT", s)?,
        SearchCriteria::From(s) => write_keyed(buf, "FROM", s)?,
        SearchCriteria::To(s) => write_keyed(buf, "TO", s)?,
        SearchCriteria::Text(s) => write_keyed(buf, "TEXT", s)?,
        SearchCriteria::Since(date) => write_dated(buf, "SINCE", date)?,
        SearchCriteria::Before(date) => write_dated(buf, "BEFORE", date)?,
        SearchCriteria::On(date) => write_dated(buf, "ON", date)?,
        SearchCriteria::SentSince(date) => write_dated(buf, "SENTSINCE", date)?,
        SearchCriteria::SentBefore(date) => write_dated(buf, "SENTBEFORE", date)?,
        SearchCriteria::And(criteria) => {
            buf.push(b'(');
            for (i, c) in criteria.iter().enumerate() {
                if i > 0 {
                    buf.push(b' ');
                }
                write_search_criteria(buf, c)?;
            }
            buf.push(b')');
        }
        SearchCriteria::Or(a, b) => {
            buf.extend_from_slice(b"OR ");
            write_search_criteria(buf, a)?;
            buf.push(b' ');
            write_search_criteria(buf, b)?;
        }
        SearchCriteria::Not(c) => {
            buf.extend_from_slice(b"NOT ");
            write_search_criteria(buf, c)?;
        }
    }
    Ok(())
}

fn write_keyed(buf: &mut Wire, key: &str, value: &str) -> Result<()> {
    buf.extend_from_slice(key.as_bytes());
    buf.push(b' ');
    write_string(buf, key, value)
}

/// Dates go out bare, so they must be a single atom.
fn write_dated(buf: &mut Wire, key: &str, date: &str) -> Result<()> {
    if date.is_empty() || !date.bytes().all(is_atom_char) {
        return Err(Error::InvalidArgument(format!(
            "{key} date must look like 01-Jan-2021, got {date:?}"
        )));
    }
    buf.extend_from_slice(key.as_bytes());
    buf.push(b' ');
    buf.extend_from_slice(date.as_bytes());
    Ok(())
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
    use crate::parser::Lexer;
    use proptest::prelude::*;

    fn astring(s: &str) -> String {
        let mut buf = Wire::default();
        write_astring(&mut buf, "value", s).unwrap();
        String::from_utf8(buf.finish().concat()).unwrap()
    }

    fn criteria(criteria: &SearchCriteria) -> Result<Vec<Vec<u8>>> {
        let mut buf = Wire::default();
        write_search_criteria(&mut buf, criteria)?;
        Ok(buf.finish())
    }

    #[test]
    fn test_astring_quoting() {
        assert_eq!(astring("INBOX"), "INBOX\r\n");
        assert_eq!(astring(""), "\"\"\r\n");
        assert_eq!(astring("Sent Items"), "\"Sent Items\"\r\n");
        assert_eq!(astring("a\\b"), "\"a\\\\b\"\r\n");
        assert_eq!(astring("[Gmail]/All"), "\"[Gmail]/All\"\r\n");
    }

    #[test]
    fn test_eight_bit_astring_is_literal() {
        let mut buf = Wire::default();
        buf.extend_from_slice(b"A1 EXAMINE ");
        write_astring(&mut buf, "mailbox", "Café").unwrap();
        assert_eq!(
            buf.finish(),
            vec![b"A1 EXAMINE {5}\r\n".to_vec(), "Café\r\n".as_bytes().to_vec()]
        );
    }

    #[test]
    fn test_line_breaks_rejected() {
        for bad in ["u\r\nA1 LOGOUT", "x\ny", "nul\0byte", "\r"] {
            let mut buf = Wire::default();
            let err = write_astring(&mut buf, "username", bad).unwrap_err();
            assert!(matches!(err, Error::InvalidArgument(_)), "{bad:?}");
        }
    }

    #[test]
    fn test_search_value_cannot_smuggle_commands() {
        let sender = SearchCriteria::From("x\"\r\nA9999 LOGOUT\r\nA0002 NOOP".to_string());
        assert!(matches!(criteria(&sender), Err(Error::InvalidArgument(_))));

        let nested = SearchCriteria::Not(Box::new(SearchCriteria::Subject("a\nb".to_string())));
        assert!(matches!(criteria(&nested), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_dates_must_be_atoms() {
        let ok = criteria(&SearchCriteria::SentSince("01-Jan-2021".to_string())).unwrap();
        assert_eq!(ok, vec![b"SENTSINCE 01-Jan-2021\r\n".to_vec()]);

        for bad in ["", "01 Jan 2021", "01-Jan-2021\r\nA1 LOGOUT"] {
            let err = criteria(&SearchCriteria::Since(bad.to_string())).unwrap_err();
            assert!(matches!(err, Error::InvalidArgument(_)), "{bad:?}");
        }
    }

    #[test]
    fn test_fetch_items() {
        let mut buf = Wire::default();
        write_fetch_items(
            &mut buf,
            &FetchItems::Items(vec![
                FetchAttribute::Uid,
                FetchAttribute::Body {
                    section: Some("HEADER".to_string()),
                    peek: true,
                    partial: None,
                },
            ]),
        )
        .unwrap();
        assert_eq!(buf.finish(), vec![b"(UID BODY.PEEK[HEADER])\r\n".to_vec()]);
    }

    #[test]
    fn test_raw_fetch_items_checked() {
        let mut buf = Wire::default();
        let err = write_fetch_items(&mut buf, &FetchItems::Raw("(RFC822)\r\nA1 LOGOUT".into()));
        assert!(matches!(err, Err(Error::InvalidArgument(_))));
    }

    proptest! {
        #[test]
        fn test_astring_lexes_back(s in "[ -~]{0,40}") {
            prop_assume!(s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()));
            prop_assume!(!s.eq_ignore_ascii_case("NIL"));

            let mut buf = Wire::default();
            write_astring(&mut buf, "value", &s).unwrap();
            let chunks = buf.finish();
            prop_assert_eq!(chunks.len(), 1);
            let mut lexer = Lexer::new(&chunks[0]);
            prop_assert_eq!(lexer.read_astring().unwrap(), s);
            prop_assert_eq!(lexer.rest_of_line(), "");
        }

        #[test]
        fn test_one_line_per_chunk(s in "[a-z \"\\\\\r\né]{0,20}") {
            let mut buf = Wire::default();
            let written = write_string(&mut buf, "value", &s);
            prop_assert_eq!(written.is_ok(), !s.contains(['\r', '\n']));
            if written.is_ok() {
                for chunk in buf.finish() {
                    let line = chunk.strip_suffix(b"\r\n").unwrap();
                    prop_assert!(!line.contains(&b'\r') && !line.contains(&b'\n'));
                }
            }
        }
    }
}
