//! MIME header handling.

use std::fmt;

use crate::encoding::decode_rfc2047;

/// Ordered collection of header fields.
///
/// Fields keep the order and the name spelling they arrived with;
/// duplicates are preserved. Lookups are case-insensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    fields: Vec<(String, String)>,
}

impl Headers {
    /// Creates a new empty header collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a field.
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.push((name.into(), value.into()));
    }

    /// Gets the first value for a field.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Gets all values for a field, in order.
    #[must_use]
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// Gets the first value for a field with RFC 2047 encoded words decoded.
    #[must_use]
    pub fn get_decoded(&self, name: &str) -> Option<String> {
        self.get(name).map(decode_rfc2047)
    }

    /// Returns an iterator over all fields in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Returns the number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if there are no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Parses a header block.
    ///
    /// Parsing stops at the first empty line. Continuation lines (starting
    /// with a space or tab) are unfolded into the previous field with a
    /// single space. Lines that are neither a field nor a continuation are
    /// skipped.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let mut headers = Self::new();

        for line in text.split('\n') {
            let line = line.strip_suffix('\r').unwrap_or(line);
            if line.is_empty() {
                break;
            }

            if line.starts_with([' ', '\t']) {
                if let Some((_, value)) = headers.fields.last_mut() {
                    let folded = line.trim();
                    if !folded.is_empty() {
                        if !value.is_empty() {
                            value.push(' ');
                        }
                        value.push_str(folded);
                    }
                }
                continue;
            }

            if let Some((name, value)) = line.split_once(':') {
                let name = name.trim();
                if !name.is_empty() && !name.contains(' ') {
                    headers.add(name, value.trim());
                }
            }
        }

        headers
    }
}

impl fmt::Display for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in &self.fields {
            writeln!(f, "{name}: {value}")?;
        }
        Ok(())
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
    fn test_headers_add_get() {
        let mut headers = Headers::new();
        headers.add("Content-Type", "text/plain");
        assert_eq!(headers.get("Content-Type"), Some("text/plain"));
        assert_eq!(headers.get("content-type"), Some("text/plain"));
        assert_eq!(headers.get("Subject"), None);
    }

    #[test]
    fn test_headers_keep_order_and_duplicates() {
        let headers = Headers::parse(concat!(
            "Received: from a\r\n",
            "Subject: Hi\r\n",
            "Received: from b\r\n",
            "\r\n",
            "Ignored: body\r\n",
        ));

        let fields: Vec<_> = headers.iter().collect();
        assert_eq!(
            fields,
            vec![
                ("Received", "from a"),
                ("Subject", "Hi"),
                ("Received", "from b"),
            ]
        );
        assert_eq!(headers.get_all("received"), vec!["from a", "from b"]);
    }

    #[test]
    fn test_headers_parse_folded() {
        let headers = Headers::parse(concat!(
            "From: sender@example.com\n",
            "Content-Type: text/plain;\n",
            " charset=utf-8\n",
            "\t format=flowed\n",
            "\n"
        ));

        assert_eq!(headers.len(), 2);
        assert_eq!(
            headers.get("Content-Type"),
            Some("text/plain; charset=utf-8 format=flowed")
        );
    }

    #[test]
    fn test_headers_skip_garbage_lines() {
        let headers = Headers::parse("From nobody Mon Jan 1\nSubject: ok\n");
        assert_eq!(headers.iter().collect::<Vec<_>>(), vec![("Subject", "ok")]);
    }

    #[test]
    fn test_headers_decoded() {
        let headers = Headers::parse("Subject: =?utf-8?B?SMOpbGxv?= world\r\n");
        assert_eq!(headers.get_decoded("subject").unwrap(), "Héllo world");
        assert_eq!(headers.get("subject"), Some("=?utf-8?B?SMOpbGxv?= world"));
    }

    #[test]
    fn test_headers_display() {
        let mut headers = Headers::new();
        headers.add("From", "sender@example.com");
        headers.add("To", "recipient@example.com");
        assert_eq!(
            headers.to_string(),
            "From: sender@example.com\nTo: recipient@example.com\n"
        );
    }
}
