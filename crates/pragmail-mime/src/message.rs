//! MIME message structure and handling.

use std::fmt;

use chrono::{DateTime, FixedOffset};

use crate::content_type::{ContentDisposition, ContentType};
use crate::encoding::{decode_base64, decode_charset, decode_quoted_printable, decode_rfc2047};
use crate::error::{Error, Result};
use crate::header::Headers;

/// Nesting depth beyond which multipart bodies are kept as opaque leaves.
const MAX_DEPTH: usize = 32;

/// Transfer encoding types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransferEncoding {
    /// 7-bit ASCII.
    #[default]
    SevenBit,
    /// 8-bit data.
    EightBit,
    /// Base64 encoding.
    Base64,
    /// Quoted-Printable encoding.
    QuotedPrintable,
    /// Binary (no encoding).
    Binary,
}

impl TransferEncoding {
    /// Parses a `Content-Transfer-Encoding` value. Unknown values fall back
    /// to 7bit, i.e. the body is taken as is.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "8bit" => Self::EightBit,
            "base64" => Self::Base64,
            "quoted-printable" => Self::QuotedPrintable,
            "binary" => Self::Binary,
            _ => Self::SevenBit,
        }
    }
}

impl fmt::Display for TransferEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::SevenBit => "7bit",
            Self::EightBit => "8bit",
            Self::Base64 => "base64",
            Self::QuotedPrintable => "quoted-printable",
            Self::Binary => "binary",
        })
    }
}

/// A single MIME entity: headers plus a still-encoded body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    /// Part headers.
    pub headers: Headers,
    /// Part body, transfer-encoded as received.
    pub body: Vec<u8>,
}

impl Part {
    /// Creates a new part.
    #[must_use]
    pub const fn new(headers: Headers, body: Vec<u8>) -> Self {
        Self { headers, body }
    }

    /// Splits raw entity bytes at the first empty line into headers and
    /// body.
    #[must_use]
    pub fn parse(raw: &[u8]) -> Self {
        let (head, body) = split_head_body(raw);
        Self {
            headers: Headers::parse(&String::from_utf8_lossy(head)),
            body: body.to_vec(),
        }
    }

    /// Gets the content type, falling back to `text/plain` when the header
    /// is missing or malformed.
    #[must_use]
    pub fn content_type(&self) -> ContentType {
        self.headers
            .get("content-type")
            .and_then(|value| ContentType::parse(value).ok())
            .unwrap_or_else(ContentType::text_plain)
    }

    /// Gets the content disposition, if present.
    #[must_use]
    pub fn disposition(&self) -> Option<ContentDisposition> {
        self.headers
            .get("content-disposition")
            .map(ContentDisposition::parse)
    }

    /// Gets the transfer encoding.
    #[must_use]
    pub fn transfer_encoding(&self) -> TransferEncoding {
        self.headers
            .get("content-transfer-encoding")
            .map_or(TransferEncoding::SevenBit, TransferEncoding::parse)
    }

    /// Returns the attachment filename: the disposition's `filename`, else
    /// the content type's `name`.
    #[must_use]
    pub fn filename(&self) -> Option<String> {
        self.disposition()
            .and_then(|d| d.filename().map(str::to_string))
            .or_else(|| self.content_type().name().map(str::to_string))
            .filter(|name| !name.is_empty())
    }

    /// Returns true if this part is an attachment: it has an `attachment`
    /// disposition or carries a filename.
    #[must_use]
    pub fn is_attachment(&self) -> bool {
        self.disposition().is_some_and(|d| d.is_attachment()) || self.filename().is_some()
    }

    /// Decodes the body according to the transfer encoding.
    ///
    /// # Errors
    ///
    /// Returns an error if a base64 body is malformed.
    pub fn decode_body(&self) -> Result<Vec<u8>> {
        match self.transfer_encoding() {
            TransferEncoding::Base64 => decode_base64(&self.body),
            TransferEncoding::QuotedPrintable => Ok(decode_quoted_printable(&self.body)),
            TransferEncoding::SevenBit | TransferEncoding::EightBit | TransferEncoding::Binary => {
                Ok(self.body.clone())
            }
        }
    }

    /// Gets the decoded body as text in the part's charset.
    ///
    /// # Errors
    ///
    /// Returns an error if transfer decoding fails.
    pub fn body_text(&self) -> Result<String> {
        let decoded = self.decode_body()?;
        Ok(decode_charset(&decoded, self.content_type().charset()))
    }
}

/// Parsed MIME message.
///
/// Multipart structure is flattened: [`leaves`](Self::leaves) lists every
/// non-multipart entity in document order, however deeply it was nested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Top-level message headers.
    pub headers: Headers,
    leaves: Vec<Part>,
}

impl Message {
    /// Parses a raw message.
    ///
    /// # Errors
    ///
    /// Returns an error if a multipart body contains no boundary delimiter.
    pub fn parse(raw: &[u8]) -> Result<Self> {
        let root = Part::parse(raw);
        let headers = root.headers.clone();
        let mut leaves = Vec::new();
        flatten(root, 0, &mut leaves)?;
        Ok(Self { headers, leaves })
    }

    /// Returns the non-multipart entities in document order.
    #[must_use]
    pub fn leaves(&self) -> &[Part] {
        &self.leaves
    }

    /// Returns the leaves that are attachments.
    pub fn attachments(&self) -> impl Iterator<Item = &Part> {
        self.leaves.iter().filter(|part| part.is_attachment())
    }

    /// Returns the first non-attachment leaf of the given text subtype.
    #[must_use]
    pub fn text_part(&self, sub_type: &str) -> Option<&Part> {
        self.leaves
            .iter()
            .find(|part| !part.is_attachment() && part.content_type().is("text", sub_type))
    }

    /// Returns the body text: the first inline `text/plain` leaf, else the
    /// first inline `text/html` leaf.
    ///
    /// # Errors
    ///
    /// Returns an error if transfer decoding of the chosen part fails.
    pub fn body_text(&self) -> Result<Option<String>> {
        self.text_part("plain")
            .or_else(|| self.text_part("html"))
            .map(Part::body_text)
            .transpose()
    }

    /// Gets the From header, decoded.
    #[must_use]
    pub fn from(&self) -> Option<String> {
        self.headers.get_decoded("from")
    }

    /// Gets the Subject header, decoded.
    #[must_use]
    pub fn subject(&self) -> Option<String> {
        self.headers.get_decoded("subject")
    }

    /// Gets the Date header parsed as RFC 2822.
    #[must_use]
    pub fn date(&self) -> Option<DateTime<FixedOffset>> {
        self.headers
            .get("date")
            .and_then(|d| DateTime::parse_from_rfc2822(d.trim()).ok())
    }
}

/// Pushes `part`, or its leaves if it is multipart, onto `out`.
fn flatten(part: Part, depth: usize, out: &mut Vec<Part>) -> Result<()> {
    let content_type = part.content_type();
    if !content_type.is_multipart() || depth >= MAX_DEPTH {
        out.push(part);
        return Ok(());
    }

    let boundary = content_type.boundary().ok_or(Error::MissingBoundary)?;
    for raw in split_multipart(&part.body, boundary)? {
        flatten(Part::parse(raw), depth + 1, out)?;
    }
    Ok(())
}

/// Splits raw bytes at the first empty line (CRLF or LF).
fn split_head_body(raw: &[u8]) -> (&[u8], &[u8]) {
    if raw.starts_with(b"\r\n") {
        return (&[], &raw[2..]);
    }
    if raw.starts_with(b"\n") {
        return (&[], &raw[1..]);
    }

    let crlf = find(raw, b"\r\n\r\n").map(|i| (i + 2, i + 4));
    let lf = find(raw, b"\n\n").map(|i| (i + 1, i + 2));
    match (crlf, lf) {
        (Some(a), Some(b)) => {
            let (head_end, body_start) = if a.0 <= b.0 { a } else { b };
            (&raw[..head_end], &raw[body_start..])
        }
        (Some((head_end, body_start)), None) | (None, Some((head_end, body_start))) => {
            (&raw[..head_end], &raw[body_start..])
        }
        (None, None) => (raw, &[]),
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Splits a multipart body into the raw bytes of its parts.
///
/// The preamble and epilogue are dropped. The line break preceding a
/// delimiter line belongs to the delimiter, not to the part before it. A
/// body whose close delimiter is missing ends at the end of input.
///
/// # Errors
///
/// Returns [`Error::InvalidMultipart`] if no delimiter line is found.
pub fn split_multipart<'a>(body: &'a [u8], boundary: &str) -> Result<Vec<&'a [u8]>> {
    let mut delimiter = Vec::with_capacity(boundary.len() + 2);
    delimiter.extend_from_slice(b"--");
    delimiter.extend_from_slice(boundary.as_bytes());

    let mut parts = Vec::new();
    // Start of the current part's content, once the first delimiter is seen.
    let mut open: Option<usize> = None;
    let mut line_start = 0;

    while line_start < body.len() {
        let line_end = body[line_start..]
            .iter()
            .position(|&b| b == b'\n')
            .map_or(body.len(), |i| line_start + i + 1);
        let line = &body[line_start..line_end];

        if let Some(kind) = delimiter_kind(line, &delimiter) {
            if let Some(start) = open {
                let end = strip_line_break(body, start, line_start);
                parts.push(&body[start..end]);
            }
            if kind == Delimiter::Close {
                return Ok(parts);
            }
            open = Some(line_end);
        }

        line_start = line_end;
    }

    match open {
        Some(start) => {
            parts.push(&body[start.min(body.len())..]);
            Ok(parts)
        }
        None => Err(Error::InvalidMultipart(format!(
            "no delimiter for boundary {boundary:?}"
        ))),
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Delimiter {
    Part,
    Close,
}

/// Classifies a line as a part or close delimiter. Trailing whitespace
/// (transport padding) is allowed after the boundary.
fn delimiter_kind(line: &[u8], delimiter: &[u8]) -> Option<Delimiter> {
    let rest = line.strip_prefix(delimiter)?;
    let (kind, rest) = rest
        .strip_prefix(b"--")
        .map_or((Delimiter::Part, rest), |r| (Delimiter::Close, r));
    rest.iter()
        .all(u8::is_ascii_whitespace)
        .then_some(kind)
}

/// Returns the end of a part that runs up to `delimiter_start`, dropping the
/// line break that belongs to the delimiter.
fn strip_line_break(body: &[u8], start: usize, delimiter_start: usize) -> usize {
    let content = &body[start..delimiter_start];
    if content.ends_with(b"\r\n") {
        delimiter_start - 2
    } else if content.ends_with(b"\n") {
        delimiter_start - 1
    } else {
        delimiter_start
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

    const MIXED: &str = concat!(
        "From: Some One <someone@example.com>\n",
        "MIME-Version: 1.0\n",
        "Content-Type: multipart/mixed; boundary=\"XXXXboundary text\"\n",
        "\n",
        "This is a multipart message in MIME format.\n",
        "\n",
        "--XXXXboundary text\n",
        "Content-Type: text/plain\n",
        "\n",
        "this is the body text\n",
        "\n",
        "--XXXXboundary text\n",
        "Content-Type: text/plain;\n",
        "Content-Disposition: attachment; filename=\"test.txt\"\n",
        "\n",
        "this is the attachment text\n",
        "--XXXXboundary text--",
    );

    #[test]
    fn test_transfer_encoding_parse() {
        assert_eq!(TransferEncoding::parse(" Base64 "), TransferEncoding::Base64);
        assert_eq!(
            TransferEncoding::parse("quoted-printable"),
            TransferEncoding::QuotedPrintable
        );
        assert_eq!(TransferEncoding::parse("x-uuencode"), TransferEncoding::SevenBit);
        assert_eq!(TransferEncoding::Binary.to_string(), "binary");
    }

    #[test]
    fn test_split_head_body() {
        assert_eq!(
            split_head_body(b"A: 1\r\n\r\nbody"),
            (&b"A: 1\r\n"[..], &b"body"[..])
        );
        assert_eq!(split_head_body(b"A: 1\n\nbody"), (&b"A: 1\n"[..], &b"body"[..]));
        assert_eq!(split_head_body(b"\nbody"), (&b""[..], &b"body"[..]));
        assert_eq!(split_head_body(b"A: 1"), (&b"A: 1"[..], &b""[..]));
    }

    #[test]
    fn test_single_part_message() {
        let message = Message::parse(
            b"Subject: Hi\r\nContent-Transfer-Encoding: quoted-printable\r\n\r\nH=C3=A9llo",
        )
        .unwrap();
        assert_eq!(message.leaves().len(), 1);
        assert_eq!(message.subject().as_deref(), Some("Hi"));
        assert_eq!(message.body_text().unwrap().as_deref(), Some("Héllo"));
    }

    #[test]
    fn test_multipart_mixed() {
        let message = Message::parse(MIXED.as_bytes()).unwrap();
        assert_eq!(message.leaves().len(), 2);
        assert_eq!(
            message.body_text().unwrap().as_deref(),
            Some("this is the body text\n")
        );

        let attachments: Vec<_> = message.attachments().collect();
        assert_eq!(attachments.len(), 1);
        assert_eq!(attachments[0].filename().as_deref(), Some("test.txt"));
        assert_eq!(
            attachments[0].body_text().unwrap(),
            "this is the attachment text"
        );
    }

    #[test]
    fn test_split_multipart_crlf() {
        let body = b"preamble\r\n--b\r\nA: 1\r\n\r\none\r\n--b\r\n\r\ntwo\r\n--b--\r\nepilogue";
        let parts = split_multipart(body, "b").unwrap();
        assert_eq!(parts, vec![&b"A: 1\r\n\r\none"[..], &b"\r\ntwo"[..]]);
    }

    #[test]
    fn test_split_multipart_ignores_longer_boundary() {
        let body = b"--b\n\nkeep\n--bb\nstill\n--b--\n";
        let parts = split_multipart(body, "b").unwrap();
        assert_eq!(parts, vec![&b"\nkeep\n--bb\nstill"[..]]);
    }

    #[test]
    fn test_split_multipart_missing_close() {
        let parts = split_multipart(b"--b\n\nunterminated\n", "b").unwrap();
        assert_eq!(parts, vec![&b"\nunterminated\n"[..]]);
    }

    #[test]
    fn test_split_multipart_without_delimiter() {
        assert!(matches!(
            split_multipart(b"just text", "b"),
            Err(Error::InvalidMultipart(_))
        ));
    }

    #[test]
    fn test_multipart_without_boundary() {
        let result = Message::parse(b"Content-Type: multipart/mixed\n\n--x\n\nhi\n--x--\n");
        assert!(matches!(result, Err(Error::MissingBoundary)));
    }

    #[test]
    fn test_nested_multipart_flattened() {
        let raw = concat!(
            "Content-Type: multipart/mixed; boundary=outer\n",
            "\n",
            "--outer\n",
            "Content-Type: multipart/alternative; boundary=inner\n",
            "\n",
            "--inner\n",
            "Content-Type: text/plain; charset=utf-8\n",
            "\n",
            "plain\n",
            "--inner\n",
            "Content-Type: text/html\n",
            "\n",
            "<p>html</p>\n",
            "--inner--\n",
            "--outer\n",
            "Content-Type: application/pdf; name=report.pdf\n",
            "Content-Transfer-Encoding: base64\n",
            "\n",
            "JVBERi0=\n",
            "--outer--\n",
        );

        let message = Message::parse(raw.as_bytes()).unwrap();
        let types: Vec<_> = message
            .leaves()
            .iter()
            .map(|p| p.content_type().mime_type())
            .collect();
        assert_eq!(types, vec!["text/plain", "text/html", "application/pdf"]);
        assert_eq!(message.body_text().unwrap().as_deref(), Some("plain"));

        let pdf = message.attachments().next().unwrap();
        assert_eq!(pdf.filename().as_deref(), Some("report.pdf"));
        assert_eq!(pdf.decode_body().unwrap(), b"%PDF-");
    }

    #[test]
    fn test_html_only_body() {
        let raw = concat!(
            "Content-Type: multipart/alternative; boundary=b\n",
            "\n",
            "--b\n",
            "Content-Type: text/html\n",
            "\n",
            "<b>hi</b>\n",
            "--b--\n",
        );
        let message = Message::parse(raw.as_bytes()).unwrap();
        assert_eq!(message.body_text().unwrap().as_deref(), Some("<b>hi</b>"));
    }

    #[test]
    fn test_date_header() {
        let message =
            Message::parse(b"Date: Tue, 1 Jul 2003 10:52:37 +0200\r\n\r\n").unwrap();
        let date = message.date().unwrap();
        assert_eq!(date.to_rfc3339(), "2003-07-01T10:52:37+02:00");
    }
}
