//! `Content-Type` and `Content-Disposition` handling.

use std::collections::HashMap;
use std::fmt;

use crate::encoding::{decode_charset, decode_rfc2047};
use crate::error::{Error, Result};

/// MIME content type with parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentType {
    /// Main type (e.g., "text", "image", "multipart"), lower-cased.
    pub main_type: String,
    /// Subtype (e.g., "plain", "html", "mixed"), lower-cased.
    pub sub_type: String,
    /// Parameters keyed by lower-cased name.
    pub parameters: HashMap<String, String>,
}

impl ContentType {
    /// Creates a new content type.
    #[must_use]
    pub fn new(main_type: impl Into<String>, sub_type: impl Into<String>) -> Self {
        Self {
            main_type: main_type.into(),
            sub_type: sub_type.into(),
            parameters: HashMap::new(),
        }
    }

    /// The RFC 2045 default, `text/plain`.
    #[must_use]
    pub fn text_plain() -> Self {
        Self::new("text", "plain")
    }

    /// Adds a parameter.
    #[must_use]
    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    /// Returns `type/subtype`.
    #[must_use]
    pub fn mime_type(&self) -> String {
        format!("{}/{}", self.main_type, self.sub_type)
    }

    /// Returns true if this is `type/subtype`, ignoring case.
    #[must_use]
    pub fn is(&self, main_type: &str, sub_type: &str) -> bool {
        self.main_type.eq_ignore_ascii_case(main_type)
            && self.sub_type.eq_ignore_ascii_case(sub_type)
    }

    /// Returns the charset parameter if present.
    #[must_use]
    pub fn charset(&self) -> Option<&str> {
        self.parameters.get("charset").map(String::as_str)
    }

    /// Returns the boundary parameter if present.
    #[must_use]
    pub fn boundary(&self) -> Option<&str> {
        self.parameters
            .get("boundary")
            .map(String::as_str)
            .filter(|b| !b.is_empty())
    }

    /// Returns the `name` parameter, a legacy way of naming attachments.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.parameters.get("name").map(String::as_str)
    }

    /// Checks if this is a multipart content type.
    #[must_use]
    pub fn is_multipart(&self) -> bool {
        self.main_type.eq_ignore_ascii_case("multipart")
    }

    /// Checks if this is a text content type.
    #[must_use]
    pub fn is_text(&self) -> bool {
        self.main_type.eq_ignore_ascii_case("text")
    }

    /// Parses a content type string.
    ///
    /// Format: `type/subtype; param1=value1; param2="quoted; value"`
    ///
    /// # Errors
    ///
    /// Returns an error if `type/subtype` is missing or malformed.
    pub fn parse(s: &str) -> Result<Self> {
        let (type_str, params) = s.split_once(';').unwrap_or((s, ""));

        let (main_type, sub_type) = type_str
            .trim()
            .split_once('/')
            .map(|(m, s)| (m.trim(), s.trim()))
            .filter(|(m, s)| is_token(m) && is_token(s))
            .ok_or_else(|| Error::InvalidContentType(s.trim().to_string()))?;

        Ok(Self {
            main_type: main_type.to_ascii_lowercase(),
            sub_type: sub_type.to_ascii_lowercase(),
            parameters: parse_parameters(params),
        })
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.main_type, self.sub_type)?;

        let mut params: Vec<_> = self.parameters.iter().collect();
        params.sort();
        for (key, value) in params {
            if value.is_empty() || !is_token(value) {
                let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
                write!(f, "; {key}=\"{escaped}\"")?;
            } else {
                write!(f, "; {key}={value}")?;
            }
        }

        Ok(())
    }
}

/// `Content-Disposition` header value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentDisposition {
    /// Disposition type (`inline`, `attachment`, ...), lower-cased.
    pub kind: String,
    /// Parameters keyed by lower-cased name.
    pub parameters: HashMap<String, String>,
}

impl ContentDisposition {
    /// Parses a disposition value. Never fails: an empty value yields an
    /// empty kind.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        let (kind, params) = s.split_once(';').unwrap_or((s, ""));
        Self {
            kind: kind.trim().to_ascii_lowercase(),
            parameters: parse_parameters(params),
        }
    }

    /// Returns true for `attachment`.
    #[must_use]
    pub fn is_attachment(&self) -> bool {
        self.kind == "attachment"
    }

    /// Returns the `filename` parameter.
    #[must_use]
    pub fn filename(&self) -> Option<&str> {
        self.parameters.get("filename").map(String::as_str)
    }
}

/// Returns true if `s` is a non-empty RFC 2045 token.
fn is_token(s: &str) -> bool {
    !s.is_empty()
        && s.bytes().all(|b| {
            b.is_ascii_graphic() && !b"()<>@,;:\\\"/[]?=".contains(&b)
        })
}

/// Parses `; key=value` parameters.
///
/// Values may be quoted (with backslash escapes) and may contain `;` inside
/// quotes. RFC 2231 extended values (`key*=charset'lang'percent-encoded`)
/// are decoded; RFC 2047 encoded words in plain values are decoded too,
/// since many mailers put them in `filename`.
fn parse_parameters(s: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();

    for raw in split_unquoted(s) {
        let Some((key, value)) = raw.split_once('=') else {
            continue;
        };
        let key = key.trim().to_ascii_lowercase();
        if key.is_empty() {
            continue;
        }
        let value = unquote(value.trim());

        if let Some(base) = key.strip_suffix('*') {
            params.insert(base.to_string(), decode_extended_value(&value));
        } else {
            params
                .entry(key)
                .or_insert_with(|| decode_rfc2047(&value));
        }
    }

    params
}

/// Splits on `;` outside of double quotes.
fn split_unquoted(s: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;
    let mut escaped = false;

    for (i, c) in s.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            ';' if !in_quotes => {
                parts.push(&s[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&s[start..]);
    parts
}

/// Strips surrounding quotes and resolves backslash escapes.
fn unquote(value: &str) -> String {
    let Some(inner) = value
        .strip_prefix('"')
        .map(|v| v.strip_suffix('"').unwrap_or(v))
    else {
        return value.to_string();
    };

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Decodes an RFC 2231 `charset'language'percent-encoded` value.
fn decode_extended_value(value: &str) -> String {
    let mut pieces = value.splitn(3, '\'');
    let (charset, encoded) = match (pieces.next(), pieces.next(), pieces.next()) {
        (Some(charset), Some(_lang), Some(encoded)) => (Some(charset), encoded),
        _ => (None, value),
    };

    let bytes = encoded.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let hex = bytes
            .get(i + 1..i + 3)
            .and_then(|h| std::str::from_utf8(h).ok())
            .and_then(|h| u8::from_str_radix(h, 16).ok());
        match (bytes[i], hex) {
            (b'%', Some(value)) => {
                out.push(value);
                i += 3;
            }
            (b, _) => {
                out.push(b);
                i += 1;
            }
        }
    }

    decode_charset(&out, charset.filter(|c| !c.is_empty()))
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
    fn test_content_type_parse() {
        let ct = ContentType::parse("Text/Plain; charset=utf-8").unwrap();
        assert_eq!(ct.main_type, "text");
        assert_eq!(ct.sub_type, "plain");
        assert_eq!(ct.charset(), Some("utf-8"));
        assert!(ct.is("text", "plain"));
        assert_eq!(ct.mime_type(), "text/plain");
    }

    #[test]
    fn test_content_type_quoted_boundary() {
        let ct = ContentType::parse("multipart/mixed; boundary=\"XXXXboundary text\"").unwrap();
        assert!(ct.is_multipart());
        assert_eq!(ct.boundary(), Some("XXXXboundary text"));
    }

    #[test]
    fn test_content_type_semicolon_inside_quotes() {
        let ct = ContentType::parse("multipart/mixed; boundary=\"a;b\"; charset=x").unwrap();
        assert_eq!(ct.boundary(), Some("a;b"));
        assert_eq!(ct.charset(), Some("x"));
    }

    #[test]
    fn test_content_type_trailing_semicolon() {
        let ct = ContentType::parse("text/plain;").unwrap();
        assert!(ct.parameters.is_empty());
    }

    #[test]
    fn test_content_type_invalid() {
        assert!(ContentType::parse("").is_err());
        assert!(ContentType::parse("text").is_err());
        assert!(ContentType::parse("text/").is_err());
    }

    #[test]
    fn test_content_type_display() {
        let ct = ContentType::new("multipart", "mixed")
            .with_parameter("boundary", "a b")
            .with_parameter("charset", "utf-8");
        assert_eq!(
            ct.to_string(),
            "multipart/mixed; boundary=\"a b\"; charset=utf-8"
        );
    }

    #[test]
    fn test_name_parameter_encoded_word() {
        let ct = ContentType::parse("application/pdf; name=\"=?utf-8?B?SMOpbGxvLnBkZg==?=\"")
            .unwrap();
        assert_eq!(ct.name(), Some("Héllo.pdf"));
    }

    #[test]
    fn test_disposition_parse() {
        let cd = ContentDisposition::parse("Attachment; filename=\"test.txt\"");
        assert!(cd.is_attachment());
        assert_eq!(cd.filename(), Some("test.txt"));

        let inline = ContentDisposition::parse("inline");
        assert!(!inline.is_attachment());
        assert_eq!(inline.filename(), None);
    }

    #[test]
    fn test_disposition_rfc2231_filename() {
        let cd = ContentDisposition::parse("attachment; filename*=utf-8''na%C3%AFve%20plan.txt");
        assert_eq!(cd.filename(), Some("naïve plan.txt"));
    }

    #[test]
    fn test_extended_value_wins_over_plain() {
        let cd = ContentDisposition::parse(
            "attachment; filename=\"fallback.txt\"; filename*=utf-8''real.txt",
        );
        assert_eq!(cd.filename(), Some("real.txt"));
    }

    #[test]
    fn test_quoted_escapes() {
        let cd = ContentDisposition::parse("attachment; filename=\"say \\\"hi\\\".txt\"");
        assert_eq!(cd.filename(), Some("say \"hi\".txt"));
    }
}
