//! TLS setup with the full dependency graph linked in.
//!
//! reqwest and the IMAP transport share one rustls build here, so these
//! tests catch a connector that cannot pick a crypto provider.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use pragmail::ConnectionConfig;
use pragmail_imap::connection::{create_tls_connector, default_tls_config};

#[test]
fn test_connector_builds() {
    create_tls_connector().unwrap();
}

#[test]
fn test_connector_builds_alongside_http_client() {
    let http = reqwest::Client::builder().build();
    assert!(http.is_ok());
    create_tls_connector().unwrap();
}

#[test]
fn test_custom_config_reaches_transport() {
    let config = default_tls_config().unwrap();

    let config = ConnectionConfig::builder("imap.example.com")
        .tls_config(Arc::new(config))
        .build();
    let transport = config.transport_config("imap.example.com");
    assert!(transport.tls_config.is_some());
}
