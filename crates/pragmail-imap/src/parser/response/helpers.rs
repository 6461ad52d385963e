//! Parser helper functions.

use crate::parser::lexer::{Lexer, Token};
use crate::types::ResponseCode;
use crate::{Error, Result};

/// Parses a bracketed response code; the lexer must be positioned on `[`.
pub fn parse_response_code(lexer: &mut Lexer<'_>) -> Result<ResponseCode> {
    lexer.expect(Token::LBracket)?;

    let atom = lexer.read_atom_string()?;
    let code = match atom.to_ascii_uppercase().as_str() {
        "ALERT" => ResponseCode::Alert,
        "READ-ONLY" => ResponseCode::ReadOnly,
        "READ-WRITE" => ResponseCode::ReadWrite,
        "TRYCREATE" => ResponseCode::TryCreate,
        "UIDNEXT" => ResponseCode::UidNext(read_spaced_number(lexer)?),
        "UIDVALIDITY" => ResponseCode::UidValidity(read_spaced_number(lexer)?),
        "UNSEEN" => ResponseCode::Unseen(read_spaced_number(lexer)?),
        "CAPABILITY" => ResponseCode::Capability(parse_capability_data(lexer)?),
        "PERMANENTFLAGS" => {
            lexer.expect_space()?;
            ResponseCode::PermanentFlags(parse_flag_list(lexer)?)
        }
        _ => ResponseCode::Unknown(atom.to_string()),
    };

    // Skip whatever arguments remain, e.g. for unknown codes.
    lexer.take_while(|b| b != b']' && b != b'\r');
    lexer.expect(Token::RBracket)?;

    Ok(code)
}

fn read_spaced_number(lexer: &mut Lexer<'_>) -> Result<u32> {
    lexer.expect_space()?;
    lexer.read_number()
}

/// Parses space-separated capability atoms up to `]` or end of line.
pub fn parse_capability_data(lexer: &mut Lexer<'_>) -> Result<Vec<String>> {
    let mut caps = Vec::new();

    while lexer.eat(b' ') {
        match lexer.next_token()? {
            Token::Atom(s) => caps.push(s.to_string()),
            Token::Number(n) => caps.push(n.to_string()),
            token => {
                return Err(lexer.error(&format!("Unexpected token in capabilities: {token:?}")));
            }
        }
    }

    Ok(caps)
}

/// Parses a parenthesized flag list such as `(\Seen \Deleted \*)`.
pub fn parse_flag_list(lexer: &mut Lexer<'_>) -> Result<Vec<String>> {
    lexer.expect(Token::LParen)?;

    let mut flags = Vec::new();

    loop {
        match lexer.next_token()? {
            Token::RParen => break,
            Token::Space => {}
            // `\*` lexes as `\` followed by an asterisk.
            Token::Atom("\\") if lexer.eat(b'*') => flags.push("\\*".to_string()),
            Token::Atom(s) => flags.push(s.to_string()),
            token => {
                return Err(Error::Parse {
                    position: lexer.position(),
                    message: format!("Unexpected token in flag list: {token:?}"),
                });
            }
        }
    }

    Ok(flags)
}

/// Parses the identifiers of a SEARCH response.
///
/// Identifiers are returned as the exact tokens the server sent. A trailing
/// `(MODSEQ n)` group is skipped.
pub fn parse_search_response(lexer: &mut Lexer<'_>) -> Result<Vec<String>> {
    let mut ids = Vec::new();

    loop {
        match lexer.next_token()? {
            Token::Space => {}
            Token::Crlf | Token::Eof => break,
            Token::Number(n) => ids.push(n.to_string()),
            Token::Atom(s) => ids.push(s.to_string()),
            Token::LParen => {
                lexer.take_while(|b| b != b')');
                lexer.expect(Token::RParen)?;
            }
            token => {
                return Err(lexer.error(&format!("Unexpected token in SEARCH: {token:?}")));
            }
        }
    }

    Ok(ids)
}

/// Skips one protocol value (atom, string, literal or nested list) and
/// returns its raw text.
pub fn skip_value(lexer: &mut Lexer<'_>) -> Result<String> {
    let start = lexer.position();
    let mut depth = 0usize;

    loop {
        match lexer.next_token()? {
            Token::LParen => depth += 1,
            Token::RParen if depth > 0 => depth -= 1,
            Token::Crlf | Token::Eof | Token::RParen => {
                return Err(lexer.error("Unterminated value"));
            }
            _ => {}
        }
        if depth == 0 {
            break;
        }
    }

    Ok(lexer.slice_from(start))
}

/// Parses `resp-text`: an optional response code followed by free text.
pub fn parse_resp_text(lexer: &mut Lexer<'_>) -> Result<(Option<ResponseCode>, String)> {
    let code = if lexer.peek() == Some(b'[') {
        Some(parse_response_code(lexer)?)
    } else {
        None
    };

    lexer.eat(b' ');
    Ok((code, lexer.rest_of_line()))
}
