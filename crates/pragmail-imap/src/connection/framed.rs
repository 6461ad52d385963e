//! Framed I/O for the IMAP protocol.
//!
//! Responses are CRLF-terminated lines, except that a line ending in
//! `{n}` announces `n` bytes of literal data that follow verbatim, after
//! which the same response continues. [`FramedStream::read_response`]
//! returns one logical response with all of its literals inlined.

#![allow(clippy::missing_errors_doc)]

use std::io;

use bytes::{Buf, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::{Error, Result};

/// Bytes requested from the socket per read.
const READ_CHUNK: usize = 8192;

/// Maximum line length (1 MB).
pub const MAX_LINE_LENGTH: usize = 1024 * 1024;

/// Maximum literal size (100 MB).
pub const MAX_LITERAL_SIZE: usize = 100 * 1024 * 1024;

/// Buffered, literal-aware IMAP connection.
pub struct FramedStream<S> {
    stream: S,
    buffer: BytesMut,
}

impl<S> FramedStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wraps a stream.
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            buffer: BytesMut::with_capacity(READ_CHUNK),
        }
    }

    /// Reads one complete response, literals included.
    pub async fn read_response(&mut self) -> Result<Vec<u8>> {
        let mut response = Vec::new();

        loop {
            let line = self.read_line().await?;
            response.extend_from_slice(&line);

            let Some(len) = literal_length(&line) else {
                break;
            };
            if len > MAX_LITERAL_SIZE {
                return Err(Error::Protocol(format!(
                    "literal too large: {len} bytes (max {MAX_LITERAL_SIZE})"
                )));
            }
            self.fill_to(len).await?;
            response.extend_from_slice(&self.buffer[..len]);
            self.buffer.advance(len);
        }

        Ok(response)
    }

    /// Reads a single CRLF-terminated line, CRLF included.
    async fn read_line(&mut self) -> Result<BytesMut> {
        let mut scanned = 0;

        loop {
            if let Some(pos) = find_crlf(&self.buffer[scanned..]) {
                return Ok(self.buffer.split_to(scanned + pos + 2));
            }
            if self.buffer.len() > MAX_LINE_LENGTH {
                return Err(Error::Protocol("line too long".to_string()));
            }
            // Keep the last byte: it may be the CR of a split CRLF.
            scanned = self.buffer.len().saturating_sub(1);
            self.fill().await?;
        }
    }

    /// Buffers at least `len` bytes.
    async fn fill_to(&mut self, len: usize) -> Result<()> {
        while self.buffer.len() < len {
            self.fill().await?;
        }
        Ok(())
    }

    /// Reads whatever the socket has into the buffer.
    async fn fill(&mut self) -> Result<()> {
        self.buffer.reserve(READ_CHUNK);
        if self.stream.read_buf(&mut self.buffer).await? == 0 {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed",
            )));
        }
        Ok(())
    }

    /// Writes a serialized command and flushes it.
    pub async fn write_command(&mut self, data: &[u8]) -> Result<()> {
        self.stream.write_all(data).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Gets a reference to the underlying stream.
    pub const fn get_ref(&self) -> &S {
        &self.stream
    }

    /// Consumes the framed stream and returns the inner stream.
    ///
    /// Buffered but unread data is lost.
    pub fn into_inner(self) -> S {
        self.stream
    }
}

/// Finds the position of CRLF in a buffer.
fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}

/// Parses the `{n}` or `{n+}` literal announcement ending a line.
fn literal_length(line: &[u8]) -> Option<usize> {
    let line = line.strip_suffix(b"\r\n")?.strip_suffix(b"}")?;
    let line = line.strip_suffix(b"+").unwrap_or(line);
    let open = line.iter().rposition(|&b| b == b'{')?;
    let digits = &line[open + 1..];

    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    std::str::from_utf8(digits).ok()?.parse().ok()
}

/// Collects the responses to one command, up to and including the tagged
/// completion.
pub struct ResponseAccumulator {
    tag: String,
    stop_at_bye: bool,
    responses: Vec<Vec<u8>>,
}

impl ResponseAccumulator {
    /// Creates an accumulator waiting for `tag`.
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            stop_at_bye: true,
            responses: Vec::new(),
        }
    }

    /// Keeps reading past a `* BYE`, as LOGOUT expects one before its
    /// completion.
    #[must_use]
    pub const fn expecting_bye(mut self) -> Self {
        self.stop_at_bye = false;
        self
    }

    /// Returns true if `response` is the tagged completion for our tag.
    fn is_completion(&self, response: &[u8]) -> bool {
        response
            .strip_prefix(self.tag.as_bytes())
            .is_some_and(|rest| rest.first() == Some(&b' '))
    }

    /// Reads responses until the tagged completion arrives.
    ///
    /// Unless [`expecting_bye`](Self::expecting_bye) was called, a `* BYE`
    /// ends the read early, since the server will not send a completion
    /// after it; the BYE is returned as the last response.
    pub async fn read_until_tagged<S>(
        &mut self,
        framed: &mut FramedStream<S>,
    ) -> Result<Vec<Vec<u8>>>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        loop {
            let response = framed.read_response().await?;
            let done =
                self.is_completion(&response) || (self.stop_at_bye && is_bye(&response));
            self.responses.push(response);
            if done {
                break;
            }
        }

        Ok(self.take_responses())
    }

    /// Reads responses until the server asks for the next literal.
    ///
    /// Returns `false` if the command completed (or the server said BYE)
    /// instead; the completion is kept with the other responses. The
    /// continuation itself is not kept.
    pub async fn read_until_continuation<S>(
        &mut self,
        framed: &mut FramedStream<S>,
    ) -> Result<bool>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        loop {
            let response = framed.read_response().await?;
            if response.first() == Some(&b'+') {
                return Ok(true);
            }
            let done =
                self.is_completion(&response) || (self.stop_at_bye && is_bye(&response));
            self.responses.push(response);
            if done {
                return Ok(false);
            }
        }
    }

    /// Returns the responses collected so far.
    pub fn take_responses(&mut self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.responses)
    }
}

fn is_bye(response: &[u8]) -> bool {
    response
        .get(..6)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(b"* BYE "))
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
    use tokio_test::io::Builder;

    #[test]
    fn test_find_crlf() {
        assert_eq!(find_crlf(b"hello\r\n"), Some(5));
        assert_eq!(find_crlf(b"\r\n"), Some(0));
        assert_eq!(find_crlf(b"just\n"), None);
        assert_eq!(find_crlf(b"just\r"), None);
    }

    #[test]
    fn test_literal_length() {
        assert_eq!(literal_length(b"* 1 FETCH (RFC822 {123}\r\n"), Some(123));
        assert_eq!(literal_length(b"BODY {123+}\r\n"), Some(123));
        assert_eq!(literal_length(b"{0}\r\n"), Some(0));
        assert_eq!(literal_length(b"no literal\r\n"), None);
        assert_eq!(literal_length(b"incomplete {123"), None);
        assert_eq!(literal_length(b"wrong {abc}\r\n"), None);
        assert_eq!(literal_length(b"empty {}\r\n"), None);
    }

    #[tokio::test]
    async fn test_read_simple_line() {
        let mock = Builder::new().read(b"* OK ready\r\n").build();
        let mut framed = FramedStream::new(mock);

        assert_eq!(framed.read_response().await.unwrap(), b"* OK ready\r\n");
    }

    #[tokio::test]
    async fn test_read_two_responses_in_one_chunk() {
        let mock = Builder::new().read(b"* 3 EXISTS\r\nA0001 OK done\r\n").build();
        let mut framed = FramedStream::new(mock);

        assert_eq!(framed.read_response().await.unwrap(), b"* 3 EXISTS\r\n");
        assert_eq!(framed.read_response().await.unwrap(), b"A0001 OK done\r\n");
    }

    #[tokio::test]
    async fn test_crlf_split_across_reads() {
        let mock = Builder::new().read(b"* OK ready\r").read(b"\n").build();
        let mut framed = FramedStream::new(mock);

        assert_eq!(framed.read_response().await.unwrap(), b"* OK ready\r\n");
    }

    #[tokio::test]
    async fn test_read_with_literal() {
        let mock = Builder::new()
            .read(b"* 1 FETCH (RFC822 {7}\r\n")
            .read(b"a\r\n")
            .read(b"\r\nb)\r\n")
            .build();
        let mut framed = FramedStream::new(mock);

        assert_eq!(
            framed.read_response().await.unwrap(),
            b"* 1 FETCH (RFC822 {7}\r\na\r\n\r\nb)\r\n"
        );
    }

    #[tokio::test]
    async fn test_write_command() {
        let mock = Builder::new().write(b"A0001 LOGIN user pass\r\n").build();
        let mut framed = FramedStream::new(mock);

        framed
            .write_command(b"A0001 LOGIN user pass\r\n")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_eof_is_io_error() {
        let mock = Builder::new().read(b"* OK trunc").build();
        let mut framed = FramedStream::new(mock);

        assert!(matches!(framed.read_response().await, Err(Error::Io(_))));
    }

    #[tokio::test]
    async fn test_response_accumulator() {
        let mock = Builder::new()
            .read(b"* CAPABILITY IMAP4rev1\r\n")
            .read(b"* OK still here\r\n")
            .read(b"A0001 OK Success\r\n")
            .build();

        let mut framed = FramedStream::new(mock);
        let mut accumulator = ResponseAccumulator::new("A0001");
        let responses = accumulator.read_until_tagged(&mut framed).await.unwrap();

        assert_eq!(responses.len(), 3);
        assert_eq!(responses[2], b"A0001 OK Success\r\n");
    }

    #[tokio::test]
    async fn test_accumulator_ignores_longer_tag_prefix() {
        let mock = Builder::new()
            .read(b"A00010 OK other\r\n")
            .read(b"A0001 OK mine\r\n")
            .build();

        let mut framed = FramedStream::new(mock);
        let responses = ResponseAccumulator::new("A0001")
            .read_until_tagged(&mut framed)
            .await
            .unwrap();

        assert_eq!(responses.len(), 2);
    }

    #[tokio::test]
    async fn test_accumulator_stops_at_bye() {
        let mock = Builder::new().read(b"* BYE shutting down\r\n").build();

        let mut framed = FramedStream::new(mock);
        let responses = ResponseAccumulator::new("A0001")
            .read_until_tagged(&mut framed)
            .await
            .unwrap();

        assert_eq!(responses, vec![b"* BYE shutting down\r\n".to_vec()]);
    }

    #[tokio::test]
    async fn test_accumulator_expecting_bye() {
        let mock = Builder::new()
            .read(b"* BYE logging out\r\n")
            .read(b"A0002 OK LOGOUT completed\r\n")
            .build();

        let mut framed = FramedStream::new(mock);
        let responses = ResponseAccumulator::new("A0002")
            .expecting_bye()
            .read_until_tagged(&mut framed)
            .await
            .unwrap();

        assert_eq!(responses.len(), 2);
    }

    #[tokio::test]
    async fn test_literal_size_validation() {
        let header = format!("* 1 FETCH (BODY[] {{{}}}\r\n", MAX_LITERAL_SIZE + 1);
        let mock = Builder::new().read(header.as_bytes()).build();
        let mut framed = FramedStream::new(mock);

        let err = framed.read_response().await.unwrap_err();
        assert!(err.to_string().contains("literal too large"));
    }

    #[tokio::test]
    async fn test_line_length_limit() {
        let long_line = "A".repeat(MAX_LINE_LENGTH + 100);
        let mock = Builder::new().read(long_line.as_bytes()).build();
        let mut framed = FramedStream::new(mock);

        let err = framed.read_response().await.unwrap_err();
        assert!(err.to_string().contains("line too long"));
    }
}
