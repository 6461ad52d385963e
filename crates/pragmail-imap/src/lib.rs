//! # pragmail-imap
//!
//! A small async IMAP client covering the command surface needed to find
//! and download a single message: LOGIN, SELECT/EXAMINE, SEARCH, FETCH,
//! CLOSE and LOGOUT.
//!
//! ## Features
//!
//! - **Runtime state tracking**: every command checks the current
//!   [`ProtocolState`] before anything is written to the wire
//! - **TLS via rustls**: implicit TLS on port 993 without OpenSSL
//! - **Literal-aware framing**: `{n}` literals are read in full, so a
//!   `FETCH n (RFC822)` response carries the raw message bytes
//! - **Bounded I/O**: each command is wrapped in the configured I/O timeout
//!
//! ## Quick Start
//!
//! ```ignore
//! use pragmail_imap::{Client, Config, FetchItems, SearchCriteria};
//!
//! #[tokio::main]
//! async fn main() -> pragmail_imap::Result<()> {
//!     let config = Config::new("imap.example.com");
//!     let stream = pragmail_imap::connection::connect(&config).await?;
//!     let mut client = Client::from_stream(stream, config.io_timeout).await?;
//!
//!     client.login("user@example.com", "password").await?;
//!     let status = client.examine("INBOX").await?;
//!     println!("Messages: {}", status.exists);
//!
//!     let ids = client
//!         .search(None, &SearchCriteria::From("John Smith".into()))
//!         .await?;
//!     if let Some(last) = ids.last().and_then(|id| id.parse::<u32>().ok()) {
//!         let fetched = client.fetch(last, &FetchItems::rfc822()).await?;
//!         println!("{} bytes", fetched[0].content().map_or(0, <[u8]>::len));
//!     }
//!
//!     client.close().await?;
//!     client.logout().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Connection States
//!
//! ```text
//! NotAuthenticated ── login() ──→ Authenticated ── select()/examine() ──→ Selected
//!                                       ↑                                    │
//!                                       └────────────── close() ─────────────┘
//! any state ── logout() / BYE ──→ Logout
//! ```
//!
//! ## Modules
//!
//! - [`command`]: IMAP command builders and types
//! - [`connection`]: Configuration, streams, framing and the client
//! - [`parser`]: Sans-I/O response parser
//! - [`protocol`]: Protocol state
//! - [`types`]: Core IMAP types (status, tags, response codes, mailbox status)

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod command;
pub mod connection;
mod error;
pub mod parser;
pub mod protocol;
pub mod types;

pub use command::{Command, FetchAttribute, FetchItems, SearchCriteria, TagGenerator};
pub use connection::{Client, Config, ConfigBuilder, FramedStream, ImapStream, Security, connect};
pub use error::{Error, Result};
pub use parser::{FetchItem, Fetched, Response, ResponseParser, UntaggedResponse};
pub use protocol::{ProtocolState, SelectedState};
pub use types::{MailboxStatus, ResponseCode, Status, Tag};
