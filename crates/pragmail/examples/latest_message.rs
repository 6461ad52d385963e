#![allow(clippy::doc_markdown)]
//! Example: Print the latest message from a sender
//!
//! Connects, examines INBOX read-only, finds the most recent message from
//! `PRAGMAIL_SENDER` sent since yesterday and prints its subject and body.
//!
//! ## Running
//!
//! ```bash
//! PRAGMAIL_HOST=imap.gmail.com \
//! PRAGMAIL_USER=user@gmail.com \
//! PRAGMAIL_PASSWORD=app-password \
//! PRAGMAIL_SENDER="John Smith" \
//! cargo run --package pragmail --example latest_message
//! ```
//!
//! `PRAGMAIL_HOST` may also be a provider name (`gmail`) or left unset, in
//! which case the server is looked up from `PRAGMAIL_USER`.

use anyhow::Context;
use pragmail::{ConnectionConfig, decompose, with_session};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let user = std::env::var("PRAGMAIL_USER").context("PRAGMAIL_USER is not set")?;
    let password = std::env::var("PRAGMAIL_PASSWORD").context("PRAGMAIL_PASSWORD is not set")?;
    let sender = std::env::var("PRAGMAIL_SENDER").context("PRAGMAIL_SENDER is not set")?;
    let host = std::env::var("PRAGMAIL_HOST").unwrap_or_else(|_| user.clone());

    let config = ConnectionConfig::new(host);
    let message = with_session(&config, async |session| {
        session.authenticate(&user, &password).await?;
        let status = session.select_mailbox("INBOX").await?;
        tracing::info!(messages = status.exists, "INBOX examined");
        session.find_latest_message(&sender).await
    })
    .await?;

    let decomposed = decompose(&message)?;
    println!("Message {}", message.id);
    println!(
        "Subject: {}",
        decomposed.header("Subject").unwrap_or("(no subject)")
    );
    println!();
    println!("{}", decomposed.body.as_deref().unwrap_or("(no text body)"));
    for (key, attachment) in &decomposed.attachments {
        println!(
            "[{key}] {} ({}, {} bytes)",
            attachment.filename.as_deref().unwrap_or("unnamed"),
            attachment.content_type,
            attachment.buffer.len()
        );
    }

    Ok(())
}
