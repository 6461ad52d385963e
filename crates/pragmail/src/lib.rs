//! # pragmail
//!
//! A thin IMAP client for one job: find the most recent message from a
//! sender, download it, and optionally save its body and attachments.
//!
//! IMAP SEARCH can filter by sender and by date but cannot rank results by
//! recency. pragmail runs a `FROM` search and a `SENTSINCE` search and
//! takes the largest sequence number found by both.
//!
//! ## Quick Start
//!
//! ```ignore
//! use pragmail::{ConnectionConfig, decompose, persist, with_session};
//!
//! #[tokio::main]
//! async fn main() -> pragmail::Result<()> {
//!     let config = ConnectionConfig::new("imap.gmail.com");
//!
//!     let message = with_session(&config, async |session| {
//!         session.authenticate("user@gmail.com", "app-password").await?;
//!         session.select_mailbox("INBOX").await?;
//!         session.find_latest_message("John Smith").await
//!     })
//!     .await?;
//!
//!     let decomposed = decompose(&message)?;
//!     persist(&decomposed, "john-smith/latest.txt").await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Hosts
//!
//! [`ConnectionConfig::host`] may be an IMAP server (`imap.gmail.com`), a
//! provider name (`gmail`, pinged as `imap.gmail.com`) or an email address
//! (looked up in a public settings directory). See [`lookup`].
//!
//! ## Modules
//!
//! - [`config`]: Connection configuration and host classification
//! - [`dates`]: IMAP search date formatting
//! - [`lookup`]: Mail server discovery
//! - [`message`]: Message decomposition
//! - [`persist`]: Saving bodies and attachments, filename sanitizing
//! - [`resolver`]: Latest-message resolution
//! - [`session`]: Session lifecycle
//! - [`transport`]: The IMAP operations a session relies on

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod config;
pub mod dates;
mod error;
pub mod lookup;
pub mod message;
pub mod persist;
pub mod resolver;
pub mod session;
pub mod transport;

pub use config::{ConnectionConfig, ConnectionConfigBuilder, HostKind};
pub use dates::{date_travel, format_date, sent_since_token};
pub use error::{Error, ErrorKind, Result};
pub use message::{Attachment, Buffer, Decomposed, MessageSource, decompose};
pub use persist::{Persisted, persist, persist_attachments, sanitize_filename};
pub use pragmail_imap::{FetchAttribute, FetchItems, MailboxStatus, ProtocolState, Security};
pub use resolver::{IdentifierSet, resolve_latest};
pub use session::{FetchedMessage, ImapSession, Session, with_session};
pub use transport::Transport;
