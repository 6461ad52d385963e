//! Sans-I/O IMAP response parser.
//!
//! The parser operates on complete responses as returned by
//! [`FramedStream`](crate::FramedStream); it never touches the network.

pub mod lexer;
pub mod response;

pub use lexer::{Lexer, Token};
pub use response::{FetchItem, Fetched, Response, ResponseParser, UntaggedResponse};
