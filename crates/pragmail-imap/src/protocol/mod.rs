//! IMAP protocol state.
//!
//! The client keeps a [`ProtocolState`] next to the connection and checks
//! it before every command, so a command issued in the wrong state fails
//! locally instead of earning a BAD from the server.

mod state;

pub use state::{ProtocolState, SelectedState};
