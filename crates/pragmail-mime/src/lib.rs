//! # pragmail-mime
//!
//! MIME message parsing for downloaded mail: header blocks, content types,
//! transfer decoding and multipart structure.
//!
//! ## Features
//!
//! - **Headers**: folded continuation lines, duplicate fields kept in order,
//!   RFC 2047 encoded words decoded on request
//! - **Content types**: quoted parameters, RFC 2231 extended values
//! - **Transfer encodings**: 7bit, 8bit, binary, Base64 and Quoted-Printable
//! - **Multipart**: nested `multipart/*` bodies flattened into leaf parts in
//!   document order
//!
//! ## Quick Start
//!
//! ```
//! use pragmail_mime::Message;
//!
//! let raw = b"Subject: Hello\r\nContent-Type: text/plain\r\n\r\nHi there";
//! let message = Message::parse(raw).unwrap();
//!
//! assert_eq!(message.subject().as_deref(), Some("Hello"));
//! assert_eq!(message.body_text().unwrap().as_deref(), Some("Hi there"));
//! assert_eq!(message.attachments().count(), 0);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod content_type;
pub mod encoding;
mod error;
pub mod header;
pub mod message;

pub use content_type::{ContentDisposition, ContentType};
pub use error::{Error, Result};
pub use header::Headers;
pub use message::{Message, Part, TransferEncoding};
