//! The transport seam between the session and the IMAP client.

use pragmail_imap::{
    Client, FetchItems, Fetched, MailboxStatus, ProtocolState, Result, SearchCriteria,
};
use tokio::io::{AsyncRead, AsyncWrite};

/// IMAP operations a [`Session`](crate::Session) needs.
///
/// One operation is in flight at a time; each call completes before the
/// next is issued. Implemented by [`pragmail_imap::Client`], and by scripted
/// fakes in tests.
#[allow(async_fn_in_trait)]
pub trait Transport {
    /// Returns the current protocol state.
    fn state(&self) -> &ProtocolState;

    /// Authenticates with a username and password.
    async fn login(&mut self, username: &str, password: &str) -> Result<()>;

    /// Opens a mailbox, read-only when `read_only` is set.
    async fn select(&mut self, mailbox: &str, read_only: bool) -> Result<MailboxStatus>;

    /// Searches the selected mailbox and returns the matching identifiers.
    async fn search(
        &mut self,
        charset: Option<&str>,
        criteria: &SearchCriteria,
    ) -> Result<Vec<String>>;

    /// Fetches data items for one message.
    async fn fetch(&mut self, id: u32, items: &FetchItems) -> Result<Vec<Fetched>>;

    /// Closes the selected mailbox.
    async fn close(&mut self) -> Result<()>;

    /// Logs out.
    async fn logout(&mut self) -> Result<()>;
}

impl<S> Transport for Client<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    fn state(&self) -> &ProtocolState {
        Self::state(self)
    }

    async fn login(&mut self, username: &str, password: &str) -> Result<()> {
        Self::login(self, username, password).await
    }

    async fn select(&mut self, mailbox: &str, read_only: bool) -> Result<MailboxStatus> {
        if read_only {
            self.examine(mailbox).await
        } else {
            Self::select(self, mailbox).await
        }
    }

    async fn search(
        &mut self,
        charset: Option<&str>,
        criteria: &SearchCriteria,
    ) -> Result<Vec<String>> {
        Self::search(self, charset, criteria).await
    }

    async fn fetch(&mut self, id: u32, items: &FetchItems) -> Result<Vec<Fetched>> {
        Self::fetch(self, id, items).await
    }

    async fn close(&mut self) -> Result<()> {
        Self::close(self).await
    }

    async fn logout(&mut self) -> Result<()> {
        Self::logout(self).await
    }
}
