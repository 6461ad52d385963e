//! FETCH response parsing.

use crate::Result;
use crate::parser::lexer::{Lexer, Token};

use super::helpers::{parse_flag_list, skip_value};
use super::types::FetchItem;

/// Parses the parenthesized item list of a FETCH response.
pub fn parse_fetch_response(lexer: &mut Lexer<'_>) -> Result<Vec<FetchItem>> {
    lexer.expect(Token::LParen)?;

    let mut items = Vec::new();

    loop {
        let name = match lexer.next_token()? {
            Token::RParen => break,
            Token::Space => continue,
            Token::Atom(name) => name.to_ascii_uppercase(),
            token => {
                return Err(lexer.error(&format!("Expected FETCH item name, got {token:?}")));
            }
        };

        let item = match name.as_str() {
            "FLAGS" => {
                lexer.expect_space()?;
                FetchItem::Flags(parse_flag_list(lexer)?)
            }
            "UID" => {
                lexer.expect_space()?;
                FetchItem::Uid(lexer.read_number()?)
            }
            "RFC822.SIZE" => {
                lexer.expect_space()?;
                FetchItem::Rfc822Size(lexer.read_number()?)
            }
            "INTERNALDATE" => {
                lexer.expect_space()?;
                FetchItem::InternalDate(lexer.read_astring()?)
            }
            "RFC822" => FetchItem::Rfc822(read_data(lexer)?),
            "RFC822.HEADER" => FetchItem::Rfc822Header(read_data(lexer)?),
            "RFC822.TEXT" => FetchItem::Rfc822Text(read_data(lexer)?),
            "BODY" | "BINARY" if lexer.peek() == Some(b'[') => {
                let (section, origin) = parse_section_and_origin(lexer)?;
                FetchItem::Body {
                    section,
                    origin,
                    data: read_data(lexer)?,
                }
            }
            _ => {
                lexer.expect_space()?;
                FetchItem::Other {
                    name,
                    value: skip_value(lexer)?,
                }
            }
        };
        items.push(item);
    }

    Ok(items)
}

/// Reads ` nstring` message data: a literal, a quoted string, or NIL.
fn read_data(lexer: &mut Lexer<'_>) -> Result<Option<Vec<u8>>> {
    lexer.expect_space()?;
    match lexer.next_token()? {
        Token::Literal(data) => Ok(Some(data.to_vec())),
        Token::QuotedString(s) => Ok(Some(s.into_bytes())),
        Token::Nil => Ok(None),
        token => Err(lexer.error(&format!("Expected message data, got {token:?}"))),
    }
}

/// Parses `[section]` and an optional `<origin>` following `BODY`.
///
/// The section text is kept raw, so `HEADER.FIELDS (FROM TO)` survives
/// intact.
fn parse_section_and_origin(lexer: &mut Lexer<'_>) -> Result<(Option<String>, Option<u32>)> {
    lexer.expect(Token::LBracket)?;
    let start = lexer.position();
    lexer.take_while(|b| b != b']' && b != b'\r');
    let section = lexer.slice_from(start);
    lexer.expect(Token::RBracket)?;

    let origin = if lexer.eat(b'<') {
        let digits = lexer.take_while(|b| b.is_ascii_digit());
        let origin = std::str::from_utf8(digits).ok().and_then(|s| s.parse().ok());
        if !lexer.eat(b'>') {
            return Err(lexer.error("Expected > after partial origin"));
        }
        origin
    } else {
        None
    };

    Ok(((!section.is_empty()).then_some(section), origin))
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

    fn parse(input: &[u8]) -> Vec<FetchItem> {
        let mut lexer = Lexer::new(input);
        parse_fetch_response(&mut lexer).unwrap()
    }

    #[test]
    fn test_flags_uid_size() {
        let items = parse(b"(FLAGS (\\Seen $Label) UID 4827 RFC822.SIZE 44827)");
        assert_eq!(
            items,
            vec![
                FetchItem::Flags(vec!["\\Seen".to_string(), "$Label".to_string()]),
                FetchItem::Uid(4827),
                FetchItem::Rfc822Size(44827),
            ]
        );
    }

    #[test]
    fn test_rfc822_literal() {
        let items = parse(b"(RFC822 {11}\r\nSubject: hi)");
        assert_eq!(items, vec![FetchItem::Rfc822(Some(b"Subject: hi".to_vec()))]);
    }

    #[test]
    fn test_body_section_with_origin() {
        let items = parse(b"(BODY[HEADER.FIELDS (FROM)]<0> {4}\r\nabcd)");
        assert_eq!(
            items,
            vec![FetchItem::Body {
                section: Some("HEADER.FIELDS (FROM)".to_string()),
                origin: Some(0),
                data: Some(b"abcd".to_vec()),
            }]
        );
    }

    #[test]
    fn test_empty_section_and_nil() {
        let items = parse(b"(BODY[] NIL)");
        assert_eq!(
            items,
            vec![FetchItem::Body {
                section: None,
                origin: None,
                data: None,
            }]
        );
    }

    #[test]
    fn test_quoted_data_and_internaldate() {
        let items = parse(b"(INTERNALDATE \"17-Jul-1996 02:44:25 -0700\" RFC822.TEXT \"hi\")");
        assert_eq!(
            items,
            vec![
                FetchItem::InternalDate("17-Jul-1996 02:44:25 -0700".to_string()),
                FetchItem::Rfc822Text(Some(b"hi".to_vec())),
            ]
        );
    }

    #[test]
    fn test_unknown_items_kept_raw() {
        let items = parse(b"(ENVELOPE (\"date\" NIL ((\"a\" NIL \"b\" \"c\"))) MODSEQ (12) UID 9)");
        assert_eq!(items.len(), 3);
        assert_eq!(
            items[0],
            FetchItem::Other {
                name: "ENVELOPE".to_string(),
                value: "(\"date\" NIL ((\"a\" NIL \"b\" \"c\")))".to_string(),
            }
        );
        assert_eq!(
            items[1],
            FetchItem::Other {
                name: "MODSEQ".to_string(),
                value: "(12)".to_string(),
            }
        );
        assert_eq!(items[2], FetchItem::Uid(9));
    }
}
