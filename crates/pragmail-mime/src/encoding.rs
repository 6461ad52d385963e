//! MIME decoding utilities.
//!
//! Supports Base64, Quoted-Printable, RFC 2047 encoded words and the
//! handful of charsets mail actually arrives in. Decoding is lenient the
//! way mail readers are: malformed escapes are kept as literal text rather
//! than failing the whole message.

use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};

use crate::error::Result;

/// Base64 engine accepting input with or without padding.
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Decodes Base64 data, ignoring embedded whitespace and line breaks.
///
/// # Errors
///
/// Returns an error if the input is not valid Base64.
pub fn decode_base64(data: &[u8]) -> Result<Vec<u8>> {
    let cleaned: Vec<u8> = data
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    LENIENT_BASE64.decode(cleaned).map_err(Into::into)
}

/// Decodes Quoted-Printable data (RFC 2045).
///
/// Soft line breaks are removed. An `=` not followed by two hex digits is
/// kept literally.
#[must_use]
pub fn decode_quoted_printable(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut i = 0;

    while i < data.len() {
        let byte = data[i];
        if byte != b'=' {
            out.push(byte);
            i += 1;
            continue;
        }

        let rest = &data[i + 1..];
        if rest.starts_with(b"\r\n") {
            i += 3;
        } else if rest.starts_with(b"\n") {
            i += 2;
        } else if let Some(value) = rest.get(..2).and_then(hex_pair) {
            out.push(value);
            i += 3;
        } else {
            out.push(b'=');
            i += 1;
        }
    }

    out
}

fn hex_pair(pair: &[u8]) -> Option<u8> {
    let hi = char::from(pair[0]).to_digit(16)?;
    let lo = char::from(pair[1]).to_digit(16)?;
    u8::try_from(hi * 16 + lo).ok()
}

/// Decodes bytes in the given charset into a string.
///
/// UTF-8 and US-ASCII decode lossily; the ISO-8859-1 family (and
/// windows-1252, approximated by it) map each byte to one character.
/// Unknown charsets are treated as UTF-8.
#[must_use]
pub fn decode_charset(data: &[u8], charset: Option<&str>) -> String {
    let charset = charset.unwrap_or("utf-8").trim().to_ascii_lowercase();
    match charset.as_str() {
        "iso-8859-1" | "iso8859-1" | "latin1" | "latin-1" | "windows-1252" | "cp1252" => {
            data.iter().map(|&b| char::from(b)).collect()
        }
        _ => String::from_utf8_lossy(data).into_owned(),
    }
}

/// Decodes RFC 2047 encoded words anywhere in a header value.
///
/// Text outside encoded words is kept as is. Whitespace separating two
/// adjacent encoded words is dropped. Malformed encoded words are left
/// untouched.
#[must_use]
pub fn decode_rfc2047(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    let mut pending_ws: Option<&str> = None;
    let mut after_word = false;

    while !rest.is_empty() {
        if let Some((decoded, consumed)) = decode_encoded_word(rest) {
            // Whitespace between two encoded words is not part of the text.
            if !after_word {
                if let Some(ws) = pending_ws {
                    out.push_str(ws);
                }
            }
            pending_ws = None;
            out.push_str(&decoded);
            rest = &rest[consumed..];
            after_word = true;
            continue;
        }

        let ws_len = rest.len() - rest.trim_start().len();
        if ws_len > 0 {
            if let Some(ws) = pending_ws.take() {
                out.push_str(ws);
            }
            pending_ws = Some(&rest[..ws_len]);
            rest = &rest[ws_len..];
            continue;
        }

        if let Some(ws) = pending_ws.take() {
            out.push_str(ws);
        }
        let next = rest
            .char_indices()
            .skip(1)
            .find(|&(_, c)| c.is_whitespace() || c == '=')
            .map_or(rest.len(), |(i, _)| i);
        out.push_str(&rest[..next]);
        rest = &rest[next..];
        after_word = false;
    }

    if let Some(ws) = pending_ws {
        out.push_str(ws);
    }
    out
}

/// Decodes one `=?charset?encoding?text?=` word at the start of `input`,
/// returning the decoded text and the number of bytes consumed.
fn decode_encoded_word(input: &str) -> Option<(String, usize)> {
    let body = input.strip_prefix("=?")?;
    let (charset, body) = body.split_once('?')?;
    let (encoding, body) = body.split_once('?')?;
    let end = body.find("?=")?;
    let payload = &body[..end];

    if charset.is_empty() || payload.contains(char::is_whitespace) {
        return None;
    }
    // RFC 2231 language suffix: `utf-8*en`.
    let charset = charset.split('*').next().unwrap_or(charset);

    let bytes = match encoding {
        "B" | "b" => decode_base64(payload.as_bytes()).ok()?,
        "Q" | "q" => decode_quoted_printable(payload.replace('_', " ").as_bytes()),
        _ => return None,
    };

    // `body` is a suffix of `input`.
    let consumed = input.len() - body.len() + end + 2;
    Some((decode_charset(&bytes, Some(charset)), consumed))
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
    use proptest::prelude::*;

    #[test]
    fn test_base64_with_line_breaks() {
        let decoded = decode_base64(b"SGVsbG8s\r\nIFdvcmxkIQ==\r\n").unwrap();
        assert_eq!(decoded, b"Hello, World!");
    }

    #[test]
    fn test_base64_missing_padding() {
        assert_eq!(decode_base64(b"SGk").unwrap(), b"Hi");
    }

    #[test]
    fn test_base64_invalid() {
        assert!(decode_base64(b"!!!!").is_err());
    }

    #[test]
    fn test_quoted_printable_decode() {
        assert_eq!(decode_quoted_printable(b"H=C3=A9llo"), "Héllo".as_bytes());
        assert_eq!(decode_quoted_printable(b"Hello=\r\nWorld"), b"HelloWorld");
        assert_eq!(decode_quoted_printable(b"Hello=\nWorld"), b"HelloWorld");
    }

    #[test]
    fn test_quoted_printable_keeps_bad_escapes() {
        assert_eq!(decode_quoted_printable(b"a=ZZb"), b"a=ZZb");
        assert_eq!(decode_quoted_printable(b"trailing="), b"trailing=");
    }

    #[test]
    fn test_decode_charset() {
        assert_eq!(decode_charset(&[0x48, 0xE9], Some("ISO-8859-1")), "Hé");
        assert_eq!(decode_charset("Hé".as_bytes(), None), "Hé");
    }

    #[test]
    fn test_rfc2047_plain_text_untouched() {
        assert_eq!(decode_rfc2047("Hello  World"), "Hello  World");
        assert_eq!(decode_rfc2047("a = b"), "a = b");
    }

    #[test]
    fn test_rfc2047_base64_and_q() {
        assert_eq!(decode_rfc2047("=?utf-8?B?SMOpbGxv?="), "Héllo");
        assert_eq!(decode_rfc2047("=?UTF-8?Q?H=C3=A9llo_there?="), "Héllo there");
        assert_eq!(decode_rfc2047("=?iso-8859-1?q?caf=E9?="), "café");
    }

    #[test]
    fn test_rfc2047_mixed_with_text() {
        assert_eq!(
            decode_rfc2047("Re: =?utf-8?B?SMOpbGxv?= world"),
            "Re: Héllo world"
        );
    }

    #[test]
    fn test_rfc2047_adjacent_words_join() {
        assert_eq!(
            decode_rfc2047("=?utf-8?Q?Daily?= =?utf-8?Q?_Digest?="),
            "Daily Digest"
        );
    }

    #[test]
    fn test_rfc2047_malformed_left_alone() {
        assert_eq!(decode_rfc2047("=?utf-8?X?abc?="), "=?utf-8?X?abc?=");
        assert_eq!(decode_rfc2047("=?broken"), "=?broken");
    }

    proptest! {
        #[test]
        fn test_rfc2047_ignores_text_without_encoded_words(s in "[^=]{0,60}") {
            prop_assert_eq!(decode_rfc2047(&s), s);
        }

        #[test]
        fn test_quoted_printable_identity_without_equals(s in "[^=]{0,60}") {
            prop_assert_eq!(decode_quoted_printable(s.as_bytes()), s.as_bytes());
        }
    }
}
