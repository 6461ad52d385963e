#![allow(clippy::doc_markdown)]
//! Example: List article links from the latest daily digest
//!
//! Fetches the latest "Medium Daily Digest" message and prints the links
//! that point at member stories: `https://medium.com/@author/story`.
//!
//! ## Running
//!
//! ```bash
//! PRAGMAIL_HOST=imap.gmail.com \
//! PRAGMAIL_USER=user@gmail.com \
//! PRAGMAIL_PASSWORD=app-password \
//! cargo run --package pragmail --example digest_links
//! ```

use anyhow::Context;
use pragmail::{ConnectionConfig, Error, decompose, with_session};
use pragmail_mime::Message;
use regex::Regex;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DIGEST_SENDER: &str = "Medium Daily Digest";

/// `href` target, quoted or not, up to the query string.
const HREF_PATTERN: &str = r#"href=["']?([^"'>?\s]+)"#;

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
    let host = std::env::var("PRAGMAIL_HOST").unwrap_or_else(|_| user.clone());

    let config = ConnectionConfig::new(host);
    let result = with_session(&config, async |session| {
        session.authenticate(&user, &password).await?;
        session.select_mailbox("INBOX").await?;
        session.find_latest_message(DIGEST_SENDER).await
    })
    .await;

    let message = match result {
        Ok(message) => message,
        Err(Error::MessageNotFound(_)) => {
            println!("No digest since yesterday");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    // Digests are HTML-only, so read the HTML part rather than the
    // plain-text body.
    let raw = pragmail::MessageSource::from(&message).bytes()?;
    let html = match Message::parse(raw)?.text_part("html") {
        Some(part) => part.body_text()?,
        None => decompose(&message)?.body.unwrap_or_default(),
    };

    let href = Regex::new(HREF_PATTERN)?;
    for link in story_links(&href, &html) {
        println!("{link}");
    }
    Ok(())
}

/// Extracts `href` targets that look like member stories: an `@` in the
/// path and more than three slashes.
fn story_links<'a>(href: &Regex, html: &'a str) -> Vec<&'a str> {
    let mut links = Vec::new();
    for target in href.captures_iter(html).filter_map(|c| c.get(1)) {
        let link = target.as_str();
        if link.matches('/').count() > 3 && link.contains('@') && !links.contains(&link) {
            links.push(link);
        }
    }
    links
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_story_links() {
        let html = r#"<a href="https://medium.com/@ann/a-story-1a2b?source=digest">A</a>
<a href='https://medium.com/@ann/a-story-1a2b?source=footer'>again</a>
<a href=https://medium.com/@bob/other-3c4d>B</a>
<a href="https://medium.com/@ann">profile</a>
<a href="https://medium.com/m/signin">sign in</a>"#;
        let href = Regex::new(HREF_PATTERN).unwrap();
        assert_eq!(
            story_links(&href, html),
            [
                "https://medium.com/@ann/a-story-1a2b",
                "https://medium.com/@bob/other-3c4d",
            ]
        );
    }
}
