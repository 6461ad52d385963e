//! IMAP connection management.
//!
//! - Configuration (host, port, security mode, timeouts)
//! - TLS/plaintext stream abstraction
//! - Literal-aware framed I/O
//! - The state-checked [`Client`]

mod client;
mod config;
mod framed;
mod stream;

pub use client::Client;
pub use config::{Config, ConfigBuilder, DEFAULT_TIMEOUT, IMAPS_PORT, Security};
pub use framed::{FramedStream, MAX_LINE_LENGTH, MAX_LITERAL_SIZE, ResponseAccumulator};
pub use stream::{
    ImapStream, connect, connect_plain, connect_tls, create_tls_connector, default_tls_config,
};
