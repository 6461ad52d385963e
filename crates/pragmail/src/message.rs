//! Splitting a downloaded message into headers, body and attachments.

use pragmail_imap::Fetched;
use pragmail_mime::encoding::decode_rfc2047;
use pragmail_mime::{Message, Part};

use crate::error::{Error, Result};
use crate::session::FetchedMessage;

/// Raw message input accepted by [`decompose`].
#[derive(Debug, Clone, Copy)]
pub enum MessageSource<'a> {
    /// Raw message bytes.
    Bytes(&'a [u8]),
    /// Message text.
    Text(&'a str),
    /// FETCH responses; the first one carrying message data is used.
    Fetched(&'a [Fetched]),
}

impl<'a> From<&'a [u8]> for MessageSource<'a> {
    fn from(bytes: &'a [u8]) -> Self {
        Self::Bytes(bytes)
    }
}

impl<'a> From<&'a Vec<u8>> for MessageSource<'a> {
    fn from(bytes: &'a Vec<u8>) -> Self {
        Self::Bytes(bytes)
    }
}

impl<'a> From<&'a str> for MessageSource<'a> {
    fn from(text: &'a str) -> Self {
        Self::Text(text)
    }
}

impl<'a> From<&'a [Fetched]> for MessageSource<'a> {
    fn from(responses: &'a [Fetched]) -> Self {
        Self::Fetched(responses)
    }
}

impl<'a> From<&'a FetchedMessage> for MessageSource<'a> {
    fn from(message: &'a FetchedMessage) -> Self {
        Self::Fetched(&message.responses)
    }
}

impl<'a> MessageSource<'a> {
    /// Returns the raw message bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Command`] for FETCH responses without message data.
    pub fn bytes(self) -> Result<&'a [u8]> {
        match self {
            Self::Bytes(bytes) => Ok(bytes),
            Self::Text(text) => Ok(text.as_bytes()),
            Self::Fetched(responses) => responses
                .iter()
                .find_map(Fetched::content)
                .ok_or_else(|| Error::Command("FETCH response carries no message data".into())),
        }
    }
}

/// Attachment content, decoded from its transfer encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Buffer {
    /// Text of a `text/*` part, in its declared charset.
    Text(String),
    /// Bytes of any other part.
    Binary(Vec<u8>),
}

impl Buffer {
    /// Returns the content as bytes (UTF-8 for text).
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Text(text) => text.as_bytes(),
            Self::Binary(bytes) => bytes,
        }
    }

    /// Returns the length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    /// Returns true if there is no content.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One attachment of a decomposed message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// MIME type, e.g. `application/pdf`.
    pub content_type: String,
    /// Filename as given by the sender, if any.
    pub filename: Option<String>,
    /// Decoded content.
    pub buffer: Buffer,
}

/// A message split into its parts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Decomposed {
    /// Top-level header fields in order, duplicates kept, encoded words
    /// decoded.
    pub headers: Vec<(String, String)>,
    /// Body text, if the message has an inline text part.
    pub body: Option<String>,
    /// Attachments keyed `attachment_0`, `attachment_1`, ... in document
    /// order.
    pub attachments: Vec<(String, Attachment)>,
}

impl Decomposed {
    /// Returns the first value of a header, ignoring case.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Returns an attachment by key.
    #[must_use]
    pub fn attachment(&self, key: &str) -> Option<&Attachment> {
        self.attachments
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, attachment)| attachment)
    }
}

/// Parses a raw message into headers, body text and attachments.
///
/// The body is the first inline `text/plain` part, falling back to the
/// first inline `text/html` part. Every part with an `attachment`
/// disposition or a filename is an attachment.
///
/// # Errors
///
/// Returns [`Error::Command`] for FETCH responses without message data and
/// [`Error::Mime`] for messages that cannot be parsed or decoded.
pub fn decompose<'a>(source: impl Into<MessageSource<'a>>) -> Result<Decomposed> {
    let message = Message::parse(source.into().bytes()?)?;

    let headers = message
        .headers
        .iter()
        .map(|(name, value)| (name.to_string(), decode_rfc2047(value)))
        .collect();

    let attachments = message
        .attachments()
        .enumerate()
        .map(|(i, part)| attachment(part).map(|a| (format!("attachment_{i}"), a)))
        .collect::<Result<Vec<_>>>()?;

    Ok(Decomposed {
        headers,
        body: message.body_text()?,
        attachments,
    })
}

fn attachment(part: &Part) -> Result<Attachment> {
    let content_type = part.content_type();
    let buffer = if content_type.is_text() {
        Buffer::Text(part.body_text()?)
    } else {
        Buffer::Binary(part.decode_body()?)
    };

    Ok(Attachment {
        content_type: content_type.mime_type(),
        filename: part.filename(),
        buffer,
    })
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
    use pragmail_imap::FetchItem;

    const PREAMBLE: &str = concat!(
        "From: Some One <someone@example.com>\n",
        "MIME-Version: 1.0\n",
        "Content-Type: multipart/mixed; boundary=\"XXXXboundary text\"\n",
        "\n",
        "This is a multipart message in MIME format.\n",
        "\n",
    );

    fn with_preamble(parts: &str) -> String {
        format!("{PREAMBLE}{parts}")
    }

    fn mixed() -> String {
        with_preamble(concat!(
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
        ))
    }

    fn attachment_only(content_type: &str) -> String {
        with_preamble(&format!(
            "--XXXXboundary text\n\
             Content-Type: {content_type};\n\
             Content-Disposition: attachment; filename=\"test.txt\"\n\
             \n\
             this is the attachment text\n\
             --XXXXboundary text--"
        ))
    }

    #[test]
    fn test_headers_in_order() {
        let decomposed = decompose(mixed().as_str()).unwrap();
        assert_eq!(
            decomposed.headers,
            vec![
                ("From".to_string(), "Some One <someone@example.com>".to_string()),
                ("MIME-Version".to_string(), "1.0".to_string()),
                (
                    "Content-Type".to_string(),
                    "multipart/mixed; boundary=\"XXXXboundary text\"".to_string()
                ),
            ]
        );
        assert_eq!(decomposed.header("mime-version"), Some("1.0"));
    }

    #[test]
    fn test_body_and_text_attachment() {
        let decomposed = decompose(mixed().as_bytes()).unwrap();
        assert_eq!(decomposed.body.as_deref(), Some("this is the body text\n"));
        assert_eq!(decomposed.attachments.len(), 1);
        assert_eq!(
            decomposed.attachment("attachment_0"),
            Some(&Attachment {
                content_type: "text/plain".into(),
                filename: Some("test.txt".into()),
                buffer: Buffer::Text("this is the attachment text".into()),
            })
        );
    }

    #[test]
    fn test_no_body_when_only_attachment() {
        let decomposed = decompose(attachment_only("text/plain").as_str()).unwrap();
        assert_eq!(decomposed.body, None);
        assert_eq!(decomposed.attachments.len(), 1);
    }

    #[test]
    fn test_binary_attachment() {
        let decomposed = decompose(attachment_only("application/octet-stream").as_str()).unwrap();
        let attachment = decomposed.attachment("attachment_0").unwrap();
        assert_eq!(attachment.content_type, "application/octet-stream");
        assert_eq!(
            attachment.buffer,
            Buffer::Binary(b"this is the attachment text".to_vec())
        );
    }

    #[test]
    fn test_encoded_subject_decoded() {
        let decomposed =
            decompose("Subject: =?utf-8?Q?caf=C3=A9?=\r\n\r\nhello\r\n").unwrap();
        assert_eq!(decomposed.header("subject"), Some("café"));
        assert_eq!(decomposed.body.as_deref(), Some("hello\r\n"));
    }

    #[test]
    fn test_base64_attachment_keys_in_order() {
        let raw = concat!(
            "Content-Type: multipart/mixed; boundary=b\r\n",
            "\r\n",
            "--b\r\n",
            "Content-Type: image/png; name=a.png\r\n",
            "Content-Transfer-Encoding: base64\r\n",
            "\r\n",
            "iVBORw==\r\n",
            "--b\r\n",
            "Content-Type: text/csv\r\n",
            "Content-Disposition: attachment; filename=b.csv\r\n",
            "\r\n",
            "x,y\r\n",
            "--b--\r\n",
        );
        let decomposed = decompose(raw).unwrap();
        let keys: Vec<_> = decomposed.attachments.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["attachment_0", "attachment_1"]);

        let png = decomposed.attachment("attachment_0").unwrap();
        assert_eq!(png.filename.as_deref(), Some("a.png"));
        assert_eq!(png.buffer, Buffer::Binary(vec![0x89, b'P', b'N', b'G']));

        let csv = decomposed.attachment("attachment_1").unwrap();
        assert_eq!(csv.buffer, Buffer::Text("x,y".into()));
        assert_eq!(decomposed.body, None);
    }

    #[test]
    fn test_from_fetch_response() {
        let fetched = FetchedMessage {
            id: 7,
            responses: vec![Fetched {
                seq: 7,
                items: vec![
                    FetchItem::Uid(70),
                    FetchItem::Rfc822(Some(b"Subject: hi\r\n\r\nbody".to_vec())),
                ],
            }],
        };
        let decomposed = decompose(&fetched).unwrap();
        assert_eq!(decomposed.header("Subject"), Some("hi"));
        assert_eq!(decomposed.body.as_deref(), Some("body"));
    }

    #[test]
    fn test_fetch_response_without_content() {
        let responses = vec![Fetched {
            seq: 1,
            items: vec![FetchItem::Uid(1), FetchItem::Flags(vec!["\\Seen".into()])],
        }];
        let err = decompose(responses.as_slice()).unwrap_err();
        assert!(matches!(err, Error::Command(_)));
    }
}
