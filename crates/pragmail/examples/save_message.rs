#![allow(clippy::doc_markdown)]
//! Example: Save the latest message from a sender to disk
//!
//! Writes the body to the given path and the attachments into a directory
//! next to it named after the path's stem.
//!
//! ## Running
//!
//! ```bash
//! PRAGMAIL_HOST=imap.gmail.com \
//! PRAGMAIL_USER=user@gmail.com \
//! PRAGMAIL_PASSWORD=app-password \
//! PRAGMAIL_SENDER="John Smith" \
//! cargo run --package pragmail --example save_message -- mail/john-smith.txt
//! ```

use anyhow::Context;
use pragmail::{ConnectionConfig, FetchItems, decompose, persist, with_session};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Search window: messages sent within the last week.
const MAX_AGE_DAYS: i64 = -7;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,pragmail=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let target = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "latest-message.txt".to_string());
    let user = std::env::var("PRAGMAIL_USER").context("PRAGMAIL_USER is not set")?;
    let password = std::env::var("PRAGMAIL_PASSWORD").context("PRAGMAIL_PASSWORD is not set")?;
    let sender = std::env::var("PRAGMAIL_SENDER").context("PRAGMAIL_SENDER is not set")?;
    let host = std::env::var("PRAGMAIL_HOST").unwrap_or_else(|_| user.clone());

    let config = ConnectionConfig::new(host);
    let message = with_session(&config, async |session| {
        session.authenticate(&user, &password).await?;
        session.select_mailbox("INBOX").await?;
        session
            .find_latest(&sender, MAX_AGE_DAYS, &FetchItems::rfc822())
            .await
    })
    .await?;

    let decomposed = decompose(&message)?;
    let persisted = persist(&decomposed, &target)
        .await
        .with_context(|| format!("saving message to {target}"))?;

    match persisted.body {
        Some(path) => println!("Body: {}", path.display()),
        None => println!("Message has no text body"),
    }
    for path in persisted.attachments {
        println!("Attachment: {}", path.display());
    }

    Ok(())
}
