//! Mail server discovery.
//!
//! Turns the host a user typed into a server address:
//! - an IMAP hostname is used as is;
//! - an email address is looked up in a public settings directory;
//! - a bare provider name becomes `imap.<provider>.com`, which must answer
//!   a single ping.

use std::process::Stdio;
use std::time::Duration;

use serde::Deserialize;

use crate::config::{ConnectionConfig, HostKind, provider_host};
use crate::error::{Error, Result};

/// Settings directory queried for email addresses.
pub const SETTINGS_URL: &str = "https://emailsettings.firetrust.com/settings";

/// Upper bound on the settings lookup request.
const LOOKUP_TIMEOUT: Duration = Duration::from_secs(10);

/// One server entry of a settings lookup.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerSetting {
    /// Server hostname.
    #[serde(default)]
    pub address: String,
    /// Protocol name (`IMAP`, `POP3`, `SMTP`, ...).
    #[serde(default)]
    pub protocol: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SettingsResponse {
    settings: Settings,
}

/// The directory answers with a list of servers, or with a message when it
/// knows nothing about the domain.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Settings {
    Servers(Vec<ServerSetting>),
    Message(String),
}

/// Resolves the configured host to a server address.
///
/// # Errors
///
/// Returns [`Error::HostResolution`] if no server can be found or the
/// provider's server does not answer, and [`Error::Lookup`] or
/// [`Error::Json`] if the settings directory fails.
#[tracing::instrument(skip(config), fields(host = %config.host))]
pub async fn resolve_host(config: &ConnectionConfig) -> Result<String> {
    let server = match config.host_kind() {
        HostKind::Server(host) => host,
        HostKind::Email(email) => lookup_server(&email).await?,
        HostKind::Provider(provider) => {
            let host = provider_host(&provider);
            if !answers_ping(&host).await {
                return Err(Error::HostResolution("Name or service not known".into()));
            }
            host
        }
    };

    tracing::debug!(%server, "Resolved host");
    Ok(server)
}

/// Looks up the IMAP server for an email address.
///
/// # Errors
///
/// Returns an error if the request fails or the directory has no IMAP
/// server for the address.
pub async fn lookup_server(email: &str) -> Result<String> {
    let client = reqwest::Client::builder().timeout(LOOKUP_TIMEOUT).build()?;
    let response = client
        .get(SETTINGS_URL)
        .query(&[("q", email)])
        .send()
        .await?
        .error_for_status()?;

    let body = response.text().await?;
    imap_address(&body).map_err(|e| match e {
        Error::HostResolution(reason) => Error::HostResolution(format!("{email}: {reason}")),
        other => other,
    })
}

/// Picks the IMAP server out of a settings lookup response.
///
/// The last entry whose address mentions `imap` wins.
///
/// # Errors
///
/// Returns [`Error::Json`] if the body is not a settings response, and
/// [`Error::HostResolution`] if it lists no IMAP server.
pub fn imap_address(body: &str) -> Result<String> {
    let response: SettingsResponse = serde_json::from_str(body)?;

    match response.settings {
        Settings::Message(message) => Err(Error::HostResolution(message)),
        Settings::Servers(servers) => servers
            .into_iter()
            .rev()
            .find(|server| server.address.to_ascii_lowercase().contains("imap"))
            .map(|server| server.address)
            .ok_or_else(|| Error::HostResolution("no IMAP server listed".into())),
    }
}

/// Sends one ping to `host` and reports whether it answered.
///
/// A missing `ping` binary counts as no answer.
pub async fn answers_ping(host: &str) -> bool {
    let mut command = tokio::process::Command::new("ping");
    if cfg!(windows) {
        command.args(["-n", "1", "-w", "5000"]);
    } else {
        command.args(["-c", "1", "-W", "5"]);
    }

    match command
        .arg(host)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
    {
        Ok(status) => status.success(),
        Err(e) => {
            tracing::debug!(?e, host, "Could not run ping");
            false
        }
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
    fn test_imap_address_last_imap_entry_wins() {
        let body = r#"{"settings": [
            {"address": "imap.old.example.com", "protocol": "IMAP", "port": 993},
            {"address": "smtp.example.com", "protocol": "SMTP", "port": 465},
            {"address": "imap.example.com", "protocol": "IMAP", "port": 993},
            {"address": "pop.example.com", "protocol": "POP3", "port": 995}
        ]}"#;
        assert_eq!(imap_address(body).unwrap(), "imap.example.com");
    }

    #[test]
    fn test_imap_address_not_found_message() {
        let body = r#"{"settings": "Settings not found"}"#;
        let err = imap_address(body).unwrap_err();
        assert!(matches!(err, Error::HostResolution(ref m) if m.contains("not found")));
    }

    #[test]
    fn test_imap_address_without_imap_server() {
        let body = r#"{"settings": [{"address": "smtp.example.com"}]}"#;
        assert!(matches!(imap_address(body), Err(Error::HostResolution(_))));
    }

    #[test]
    fn test_imap_address_invalid_json() {
        assert!(matches!(imap_address("<html>"), Err(Error::Json(_))));
        assert!(matches!(imap_address("{}"), Err(Error::Json(_))));
    }

    #[tokio::test]
    async fn test_resolve_server_host_untouched() {
        let config = ConnectionConfig::new("imap.example.com");
        assert_eq!(resolve_host(&config).await.unwrap(), "imap.example.com");
    }

    #[tokio::test]
    async fn test_invalid_host_does_not_answer() {
        assert!(!answers_ping("host.invalid").await);
    }
}
