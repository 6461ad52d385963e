//! IMAP response parser.
//!
//! Parses server responses according to RFC 9051 grammar.

#![allow(clippy::missing_errors_doc)]

mod fetch;
mod helpers;
mod types;

pub use types::{FetchItem, Fetched, UntaggedResponse};

use crate::parser::lexer::{Lexer, Token};
use crate::types::{ResponseCode, Status, Tag};
use crate::{Error, Result};

use helpers::{parse_capability_data, parse_flag_list, parse_resp_text, parse_search_response};

/// A parsed IMAP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Tagged response (command completion).
    Tagged {
        /// The command tag.
        tag: Tag,
        /// Response status.
        status: Status,
        /// Optional response code.
        code: Option<ResponseCode>,
        /// Human-readable text.
        text: String,
    },
    /// Untagged response (server data).
    Untagged(UntaggedResponse),
    /// Continuation request.
    Continuation {
        /// Optional text/data.
        text: Option<String>,
    },
}

/// Response parser.
pub struct ResponseParser;

impl ResponseParser {
    /// Parses one complete response, literals included.
    pub fn parse(input: &[u8]) -> Result<Response> {
        let mut lexer = Lexer::new(input);

        match lexer.next_token()? {
            Token::Asterisk => Self::parse_untagged(&mut lexer),
            Token::Plus => {
                lexer.eat(b' ');
                let text = lexer.rest_of_line();
                Ok(Response::Continuation {
                    text: (!text.is_empty()).then_some(text),
                })
            }
            Token::Atom(tag) => Self::parse_tagged(&mut lexer, tag),
            Token::Number(n) => Self::parse_tagged(&mut lexer, &n.to_string()),
            token => Err(Error::Parse {
                position: 0,
                message: format!("Expected *, +, or tag, got {token:?}"),
            }),
        }
    }

    /// Parses a tagged response.
    fn parse_tagged(lexer: &mut Lexer<'_>, tag: &str) -> Result<Response> {
        lexer.expect_space()?;
        let status = Self::parse_status(lexer)?;
        lexer.eat(b' ');
        let (code, text) = parse_resp_text(lexer)?;

        Ok(Response::Tagged {
            tag: Tag::new(tag),
            status,
            code,
            text,
        })
    }

    /// Parses an untagged response.
    fn parse_untagged(lexer: &mut Lexer<'_>) -> Result<Response> {
        lexer.expect_space()?;

        let untagged = match lexer.next_token()? {
            Token::Atom(keyword) => match keyword.to_ascii_uppercase().as_str() {
                status @ ("OK" | "NO" | "BAD" | "PREAUTH" | "BYE") => {
                    lexer.eat(b' ');
                    let (code, text) = parse_resp_text(lexer)?;
                    match status {
                        "OK" => UntaggedResponse::Ok { code, text },
                        "NO" => UntaggedResponse::No { code, text },
                        "BAD" => UntaggedResponse::Bad { code, text },
                        "PREAUTH" => UntaggedResponse::PreAuth { code, text },
                        _ => UntaggedResponse::Bye { code, text },
                    }
                }
                "CAPABILITY" => UntaggedResponse::Capability(parse_capability_data(lexer)?),
                "FLAGS" => {
                    lexer.expect_space()?;
                    UntaggedResponse::Flags(parse_flag_list(lexer)?)
                }
                "SEARCH" => UntaggedResponse::Search(parse_search_response(lexer)?),
                _ => UntaggedResponse::Other(format!("{keyword}{}", lexer.rest_of_line())),
            },
            Token::Number(n) => {
                lexer.expect_space()?;
                let keyword = lexer.read_atom_string()?;
                match keyword.to_ascii_uppercase().as_str() {
                    "EXISTS" => UntaggedResponse::Exists(n),
                    "RECENT" => UntaggedResponse::Recent(n),
                    "EXPUNGE" => UntaggedResponse::Expunge(n),
                    "FETCH" => {
                        lexer.expect_space()?;
                        let items = fetch::parse_fetch_response(lexer)?;
                        UntaggedResponse::Fetch(Fetched { seq: n, items })
                    }
                    _ => UntaggedResponse::Other(format!("{n} {keyword}{}", lexer.rest_of_line())),
                }
            }
            token => {
                return Err(lexer.error(&format!(
                    "Unexpected token in untagged response: {token:?}"
                )));
            }
        };

        Ok(Response::Untagged(untagged))
    }

    /// Parses a status keyword.
    fn parse_status(lexer: &mut Lexer<'_>) -> Result<Status> {
        let s = lexer.read_atom_string()?;
        match s.to_ascii_uppercase().as_str() {
            "OK" => Ok(Status::Ok),
            "NO" => Ok(Status::No),
            "BAD" => Ok(Status::Bad),
            "PREAUTH" => Ok(Status::PreAuth),
            "BYE" => Ok(Status::Bye),
            _ => Err(lexer.error(&format!("Invalid status: {s}"))),
        }
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
    fn test_parse_greeting() {
        let response = ResponseParser::parse(b"* OK IMAP4rev1 server ready\r\n").unwrap();
        assert_eq!(
            response,
            Response::Untagged(UntaggedResponse::Ok {
                code: None,
                text: "IMAP4rev1 server ready".to_string(),
            })
        );
    }

    #[test]
    fn test_parse_greeting_with_capabilities() {
        let response =
            ResponseParser::parse(b"* OK [CAPABILITY IMAP4rev1 LITERAL+ AUTH=PLAIN] Ready\r\n")
                .unwrap();
        match response {
            Response::Untagged(UntaggedResponse::Ok {
                code: Some(ResponseCode::Capability(caps)),
                text,
            }) => {
                assert_eq!(caps, vec!["IMAP4rev1", "LITERAL+", "AUTH=PLAIN"]);
                assert_eq!(text, "Ready");
            }
            other => panic!("Expected OK with capabilities, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_tagged_ok_with_code() {
        let response =
            ResponseParser::parse(b"A0002 OK [READ-ONLY] EXAMINE completed\r\n").unwrap();
        assert_eq!(
            response,
            Response::Tagged {
                tag: Tag::new("A0002"),
                status: Status::Ok,
                code: Some(ResponseCode::ReadOnly),
                text: "EXAMINE completed".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_tagged_no() {
        match ResponseParser::parse(b"A0001 NO [AUTHENTICATIONFAILED] Invalid credentials\r\n")
            .unwrap()
        {
            Response::Tagged {
                status, code, text, ..
            } => {
                assert_eq!(status, Status::No);
                assert_eq!(
                    code,
                    Some(ResponseCode::Unknown("AUTHENTICATIONFAILED".to_string()))
                );
                assert_eq!(text, "Invalid credentials");
            }
            other => panic!("Expected tagged NO, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_search() {
        let response = ResponseParser::parse(b"* SEARCH 245 248 257 259\r\n").unwrap();
        assert_eq!(
            response,
            Response::Untagged(UntaggedResponse::Search(vec![
                "245".to_string(),
                "248".to_string(),
                "257".to_string(),
                "259".to_string(),
            ]))
        );
    }

    #[test]
    fn test_parse_empty_search() {
        let response = ResponseParser::parse(b"* SEARCH\r\n").unwrap();
        assert_eq!(response, Response::Untagged(UntaggedResponse::Search(vec![])));
    }

    #[test]
    fn test_parse_mailbox_data() {
        assert_eq!(
            ResponseParser::parse(b"* 172 EXISTS\r\n").unwrap(),
            Response::Untagged(UntaggedResponse::Exists(172))
        );
        assert_eq!(
            ResponseParser::parse(b"* 1 RECENT\r\n").unwrap(),
            Response::Untagged(UntaggedResponse::Recent(1))
        );
        assert_eq!(
            ResponseParser::parse(b"* OK [UIDVALIDITY 3857529045] UIDs valid\r\n").unwrap(),
            Response::Untagged(UntaggedResponse::Ok {
                code: Some(ResponseCode::UidValidity(3_857_529_045)),
                text: "UIDs valid".to_string(),
            })
        );
    }

    #[test]
    fn test_parse_permanent_flags() {
        let response = ResponseParser::parse(
            b"* OK [PERMANENTFLAGS (\\Deleted \\Seen \\*)] Limited\r\n",
        )
        .unwrap();
        assert_eq!(
            response,
            Response::Untagged(UntaggedResponse::Ok {
                code: Some(ResponseCode::PermanentFlags(vec![
                    "\\Deleted".to_string(),
                    "\\Seen".to_string(),
                    "\\*".to_string(),
                ])),
                text: "Limited".to_string(),
            })
        );
    }

    #[test]
    fn test_parse_fetch_with_message() {
        let response =
            ResponseParser::parse(b"* 259 FETCH (RFC822 {12}\r\nFrom: a\r\n\r\nx)\r\n").unwrap();
        match response {
            Response::Untagged(UntaggedResponse::Fetch(fetched)) => {
                assert_eq!(fetched.seq, 259);
                assert_eq!(fetched.content(), Some(&b"From: a\r\n\r\nx"[..]));
            }
            other => panic!("Expected FETCH, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_bye_and_continuation() {
        assert!(matches!(
            ResponseParser::parse(b"* BYE Autologout; idle for too long\r\n").unwrap(),
            Response::Untagged(UntaggedResponse::Bye { .. })
        ));
        assert_eq!(
            ResponseParser::parse(b"+ Ready for literal\r\n").unwrap(),
            Response::Continuation {
                text: Some("Ready for literal".to_string())
            }
        );
        assert_eq!(
            ResponseParser::parse(b"+\r\n").unwrap(),
            Response::Continuation { text: None }
        );
    }

    #[test]
    fn test_unknown_untagged_is_kept() {
        assert_eq!(
            ResponseParser::parse(b"* ENABLED UTF8=ACCEPT\r\n").unwrap(),
            Response::Untagged(UntaggedResponse::Other("ENABLED UTF8=ACCEPT".to_string()))
        );
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(ResponseParser::parse(b"(oops\r\n").is_err());
        assert!(ResponseParser::parse(b"A1 MAYBE done\r\n").is_err());
    }
}
