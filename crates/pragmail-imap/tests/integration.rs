//! End-to-end tests against a scripted server on a loopback socket.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;

use pragmail_imap::{Client, Config, Error, FetchItems, SearchCriteria, Security, connect};

/// One scripted exchange: the exact command line expected from the client
/// and the raw bytes sent back.
type Exchange = (&'static str, &'static [u8]);

/// Starts a server that sends `greeting` and then plays `script`, returning
/// the port it listens on.
async fn scripted_server(greeting: &'static [u8], script: Vec<Exchange>) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        let (read, mut write) = socket.into_split();
        let mut lines = BufReader::new(read).lines();

        write.write_all(greeting).await.unwrap();
        for (expected, reply) in script {
            let line = lines.next_line().await.unwrap().unwrap();
            assert_eq!(line, expected);
            write.write_all(reply).await.unwrap();
        }
    });

    port
}

fn config(port: u16) -> Config {
    Config::builder("127.0.0.1")
        .port(port)
        .timeout(Duration::from_secs(5))
        .build()
}

#[tokio::test]
async fn test_latest_message_flow() {
    let message: &[u8] = concat!(
        "* 882 FETCH (RFC822 {39}\r\n",
        "From: john@example.com\r\n\r\nHello there\r\n)\r\n",
        "A0003 OK FETCH completed\r\n",
    )
    .as_bytes();
    let port = scripted_server(
        b"* OK IMAP4rev1 ready\r\n",
        vec![
            ("A0000 LOGIN user secret", b"A0000 OK LOGIN completed\r\n"),
            (
                "A0001 EXAMINE INBOX",
                b"* 3 EXISTS\r\n* 0 RECENT\r\nA0001 OK [READ-ONLY] EXAMINE completed\r\n",
            ),
            (
                "A0002 SEARCH (FROM \"john@example.com\" SENTSINCE 01-Jan-2021)",
                b"* SEARCH 2 84 882\r\nA0002 OK SEARCH completed\r\n",
            ),
            ("A0003 FETCH 882 (RFC822)", message),
            ("A0004 CLOSE", b"A0004 OK CLOSE completed\r\n"),
            (
                "A0005 LOGOUT",
                b"* BYE logging out\r\nA0005 OK LOGOUT completed\r\n",
            ),
        ],
    )
    .await;

    let config = config(port);
    assert_eq!(config.security, Security::None);

    let stream = connect(&config).await.unwrap();
    let mut client = Client::from_stream(stream, config.io_timeout).await.unwrap();

    client.login("user", "secret").await.unwrap();
    let status = client.examine("INBOX").await.unwrap();
    assert_eq!(status.exists, 3);
    assert!(status.read_only);

    let criteria = SearchCriteria::And(vec![
        SearchCriteria::From("john@example.com".to_string()),
        SearchCriteria::SentSince("01-Jan-2021".to_string()),
    ]);
    let ids = client.search(None, &criteria).await.unwrap();
    assert_eq!(ids, vec!["2", "84", "882"]);

    let fetched = client.fetch(882, &FetchItems::rfc822()).await.unwrap();
    let content = fetched[0].content().unwrap();
    assert!(content.starts_with(b"From: john@example.com"));
    assert!(content.ends_with(b"Hello there\r\n"));

    client.close().await.unwrap();
    client.logout().await.unwrap();
    assert!(client.state().is_logged_out());
}

#[tokio::test]
async fn test_rejected_login_keeps_connection_usable() {
    let port = scripted_server(
        b"* OK ready\r\n",
        vec![
            (
                "A0000 LOGIN user wrong",
                b"A0000 NO [AUTHENTICATIONFAILED] Invalid credentials\r\n",
            ),
            ("A0001 LOGOUT", b"* BYE bye\r\nA0001 OK done\r\n"),
        ],
    )
    .await;

    let config = config(port);
    let stream = connect(&config).await.unwrap();
    let mut client = Client::from_stream(stream, config.io_timeout).await.unwrap();

    let err = client.login("user", "wrong").await.unwrap_err();
    assert!(matches!(err, Error::No(_)));
    client.logout().await.unwrap();
}

#[tokio::test]
async fn test_connection_refused() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let result = connect(&config(port)).await;
    assert!(matches!(result, Err(Error::Io(_))));
}
