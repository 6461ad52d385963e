//! Session behaviour against a scripted in-memory transport.

#![allow(clippy::unwrap_used)]

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::sync::{Arc, Mutex};

use pragmail::{Error, ErrorKind, FetchItems, ProtocolState, Session, Transport, decompose};
use pragmail_imap::{FetchItem, Fetched, MailboxStatus, SearchCriteria, SelectedState};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

const MESSAGE: &[u8] = b"From: John Smith <john@example.com>\r\n\
Subject: Weekly report\r\n\
\r\n\
All numbers are up.\r\n";

/// Transport that answers from canned data and records every call.
#[derive(Debug, Default)]
struct ScriptedTransport {
    state: ProtocolState,
    sender_ids: Vec<String>,
    date_ids: Vec<String>,
    messages: HashMap<u32, Vec<u8>>,
    calls: Rc<RefCell<Vec<String>>>,
    close_fails: bool,
    logout_fails: bool,
}

impl ScriptedTransport {
    fn new(sender_ids: &str, date_ids: &str) -> Self {
        Self {
            sender_ids: sender_ids.split_whitespace().map(str::to_string).collect(),
            date_ids: date_ids.split_whitespace().map(str::to_string).collect(),
            ..Self::default()
        }
    }

    fn with_message(mut self, id: u32, content: &[u8]) -> Self {
        self.messages.insert(id, content.to_vec());
        self
    }

    fn record(&self, call: String) {
        self.calls.borrow_mut().push(call);
    }

    fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    fn count(&self, call: &str) -> usize {
        self.calls.borrow().iter().filter(|c| c.starts_with(call)).count()
    }

    fn require(&self, ok: bool, command: &str) -> pragmail_imap::Result<()> {
        if ok {
            Ok(())
        } else {
            Err(pragmail_imap::Error::InvalidState(format!(
                "{command} not allowed in {}",
                self.state
            )))
        }
    }
}

impl Transport for ScriptedTransport {
    fn state(&self) -> &ProtocolState {
        &self.state
    }

    async fn login(&mut self, username: &str, password: &str) -> pragmail_imap::Result<()> {
        self.require(self.state == ProtocolState::NotAuthenticated, "LOGIN")?;
        self.record(format!("LOGIN {username}"));
        if password == "wrong" {
            return Err(pragmail_imap::Error::No(
                "[AUTHENTICATIONFAILED] Invalid credentials".into(),
            ));
        }
        self.state = ProtocolState::Authenticated;
        Ok(())
    }

    async fn select(
        &mut self,
        mailbox: &str,
        read_only: bool,
    ) -> pragmail_imap::Result<MailboxStatus> {
        self.require(self.state.is_authenticated(), "SELECT")?;
        self.record(format!(
            "{} {mailbox}",
            if read_only { "EXAMINE" } else { "SELECT" }
        ));
        self.state = ProtocolState::Selected(SelectedState {
            mailbox: mailbox.to_string(),
            read_only,
        });
        Ok(MailboxStatus {
            exists: u32::try_from(self.messages.len()).unwrap(),
            read_only,
            ..MailboxStatus::default()
        })
    }

    async fn search(
        &mut self,
        _charset: Option<&str>,
        criteria: &SearchCriteria,
    ) -> pragmail_imap::Result<Vec<String>> {
        self.require(self.state.is_selected(), "SEARCH")?;
        match criteria {
            SearchCriteria::From(sender) => {
                self.record(format!("SEARCH FROM {sender}"));
                Ok(self.sender_ids.clone())
            }
            SearchCriteria::SentSince(date) => {
                self.record(format!("SEARCH SENTSINCE {date}"));
                Ok(self.date_ids.clone())
            }
            other => Err(pragmail_imap::Error::Bad(format!("unexpected {other:?}"))),
        }
    }

    async fn fetch(&mut self, id: u32, _items: &FetchItems) -> pragmail_imap::Result<Vec<Fetched>> {
        self.require(self.state.is_selected(), "FETCH")?;
        self.record(format!("FETCH {id}"));
        Ok(self
            .messages
            .get(&id)
            .map(|content| Fetched {
                seq: id,
                items: vec![FetchItem::Rfc822(Some(content.clone()))],
            })
            .into_iter()
            .collect())
    }

    async fn close(&mut self) -> pragmail_imap::Result<()> {
        self.require(self.state.is_selected(), "CLOSE")?;
        self.record("CLOSE".into());
        if self.close_fails {
            self.state = ProtocolState::Logout;
            return Err(pragmail_imap::Error::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "connection reset",
            )));
        }
        self.state = ProtocolState::Authenticated;
        Ok(())
    }

    async fn logout(&mut self) -> pragmail_imap::Result<()> {
        if self.state.is_logged_out() {
            return Ok(());
        }
        self.record("LOGOUT".into());
        self.state = ProtocolState::Logout;
        if self.logout_fails {
            return Err(pragmail_imap::Error::Timeout(std::time::Duration::from_secs(5)));
        }
        Ok(())
    }
}

#[tokio::test]
async fn test_latest_message_end_to_end() {
    let transport = ScriptedTransport::new("245 248 257 259", "257 259 300")
        .with_message(259, MESSAGE);
    let calls = Rc::clone(&transport.calls);

    let message = Session::new(transport)
        .run(async |session: &mut Session<ScriptedTransport>| {
            session.authenticate("user@example.com", "secret").await?;
            let status = session.select_mailbox("INBOX").await?;
            assert!(status.read_only);
            session.find_latest("John Smith", -2, &FetchItems::rfc822()).await
        })
        .await
        .unwrap();

    assert_eq!(message.id, 259);
    assert!(!message.content().unwrap().is_empty());

    let calls = calls.borrow();
    assert_eq!(
        calls[..3],
        ["LOGIN user@example.com", "EXAMINE INBOX", "SEARCH FROM John Smith"]
    );
    assert!(calls[3].starts_with("SEARCH SENTSINCE "));
    assert_eq!(calls[4..], ["FETCH 259", "CLOSE", "LOGOUT"]);

    let decomposed = decompose(&message).unwrap();
    assert_eq!(decomposed.header("Subject"), Some("Weekly report"));
    assert_eq!(decomposed.body.as_deref(), Some("All numbers are up.\r\n"));
}

#[tokio::test]
async fn test_no_common_identifier_is_not_found() {
    let mut session = Session::new(ScriptedTransport::new("1 2 3", "4 5 6"));
    session.authenticate("user", "secret").await.unwrap();
    session.select_mailbox("INBOX").await.unwrap();

    let err = session.find_latest_message("John Smith").await.unwrap_err();
    assert!(matches!(err, Error::MessageNotFound(0)));
    assert_eq!(err.to_string(), "Message not found: 0");
    assert_eq!(err.kind(), ErrorKind::Operational);
    assert_eq!(session.transport().count("FETCH"), 0);
}

#[tokio::test]
async fn test_empty_search_results_are_not_found() {
    let mut session = Session::new(ScriptedTransport::new("", "1 2"));
    session.authenticate("user", "secret").await.unwrap();
    session.select_mailbox("INBOX").await.unwrap();

    let err = session.find_latest_message("nobody").await.unwrap_err();
    assert!(matches!(err, Error::MessageNotFound(0)));
}

#[tokio::test]
async fn test_non_negative_window_issues_no_search() {
    let mut session = Session::new(ScriptedTransport::new("1", "1"));
    session.authenticate("user", "secret").await.unwrap();
    session.select_mailbox("INBOX").await.unwrap();

    for days in [0, 1, 30] {
        let err = session
            .find_latest("John Smith", days, &FetchItems::rfc822())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Usage);
    }
    assert_eq!(session.transport().count("SEARCH"), 0);
}

#[tokio::test]
async fn test_malformed_identifier_is_usage_error() {
    let mut session = Session::new(ScriptedTransport::new("1 2", "2 x"));
    session.authenticate("user", "secret").await.unwrap();
    session.select_mailbox("INBOX").await.unwrap();

    let err = session.find_latest_message("John Smith").await.unwrap_err();
    assert!(matches!(err, Error::Command(_)));
}

#[tokio::test]
async fn test_search_before_select_is_usage_error() {
    let mut session = Session::new(ScriptedTransport::new("1", "1"));
    session.authenticate("user", "secret").await.unwrap();

    let err = session.find_latest_message("John Smith").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Usage);
}

#[tokio::test]
async fn test_rejected_login_is_operational() {
    let mut session = Session::new(ScriptedTransport::new("1", "1"));
    let err = session.authenticate("user", "wrong").await.unwrap_err();
    assert!(matches!(err, Error::Imap(pragmail_imap::Error::No(_))));
    assert_eq!(err.kind(), ErrorKind::Operational);
    assert_eq!(session.state(), &ProtocolState::NotAuthenticated);
}

#[tokio::test]
async fn test_close_is_idempotent() {
    let mut session = Session::new(ScriptedTransport::new("1", "1"));
    session.authenticate("user", "secret").await.unwrap();
    session.select_mailbox("INBOX").await.unwrap();

    for _ in 0..3 {
        session.close().await.unwrap();
    }

    assert_eq!(session.transport().count("CLOSE"), 1);
    assert_eq!(session.transport().count("LOGOUT"), 1);
    assert!(session.state().is_logged_out());
}

#[tokio::test]
async fn test_close_survives_dead_connection() {
    let mut transport = ScriptedTransport::new("1", "1");
    transport.close_fails = true;
    let mut session = Session::new(transport);
    session.authenticate("user", "secret").await.unwrap();
    session.select_mailbox("INBOX").await.unwrap();

    session.close().await.unwrap();
    session.close().await.unwrap();
    assert!(session.state().is_logged_out());
    assert_eq!(session.transport().count("LOGOUT"), 0);
}

#[tokio::test]
async fn test_close_before_login_logs_out() {
    let mut session = Session::new(ScriptedTransport::new("", ""));
    session.close().await.unwrap();
    assert_eq!(session.transport().calls(), ["LOGOUT"]);
}

#[tokio::test]
async fn test_run_tears_down_on_failure() {
    let transport = ScriptedTransport::new("1", "2");
    let calls = Rc::clone(&transport.calls);

    let err = Session::new(transport)
        .run(async |session: &mut Session<ScriptedTransport>| {
            session.authenticate("user", "secret").await?;
            session.select_mailbox("Archive").await?;
            session.find_latest_message("John Smith").await
        })
        .await
        .unwrap_err();

    assert!(matches!(err, Error::MessageNotFound(0)));
    let calls = calls.borrow();
    assert_eq!(calls[calls.len() - 2..], ["CLOSE", "LOGOUT"]);
}

#[tokio::test]
async fn test_run_swallows_teardown_error() {
    let mut transport = ScriptedTransport::new("1", "1");
    transport.logout_fails = true;

    let answer = Session::new(transport)
        .run(async |session: &mut Session<ScriptedTransport>| {
            session.authenticate("user", "secret").await?;
            Ok(42)
        })
        .await
        .unwrap();
    assert_eq!(answer, 42);
}

#[tokio::test]
async fn test_debug_never_shows_credentials() {
    let mut session = Session::new(ScriptedTransport::new("", ""));
    session.authenticate("user", "hunter2").await.unwrap();
    let rendered = format!("{session:?}");
    assert!(rendered.contains("Authenticated"));
    assert!(!rendered.contains("hunter2"));
}

/// One event seen by [`Captured`], with its fields rendered as text.
#[derive(Debug)]
struct CapturedEvent {
    level: Level,
    target: String,
    fields: HashMap<String, String>,
}

impl Visit for CapturedEvent {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.fields.insert(field.name().to_string(), format!("{value:?}"));
    }
}

/// Layer that keeps every event for later inspection.
#[derive(Clone, Default)]
struct Captured(Arc<Mutex<Vec<CapturedEvent>>>);

impl Captured {
    fn errors(&self) -> Vec<CapturedEvent> {
        let mut events = self.0.lock().unwrap();
        let (errors, rest): (Vec<_>, Vec<_>) =
            events.drain(..).partition(|e| e.level == Level::ERROR);
        *events = rest;
        errors
    }
}

impl<S: Subscriber> Layer<S> for Captured {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        let mut captured = CapturedEvent {
            level: *metadata.level(),
            target: metadata.target().to_string(),
            fields: HashMap::new(),
        };
        event.record(&mut captured);
        self.0.lock().unwrap().push(captured);
    }
}

#[tokio::test]
async fn test_failed_run_logs_one_error_event() {
    let captured = Captured::default();
    let _guard =
        tracing::subscriber::set_default(tracing_subscriber::registry().with(captured.clone()));

    let err = Session::new(ScriptedTransport::new("1", "1"))
        .run(async |session: &mut Session<ScriptedTransport>| {
            session.authenticate("user", "wrong").await?;
            session.select_mailbox("INBOX").await.map(|_| ())
        })
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Operational);

    let errors = captured.errors();
    assert_eq!(errors.len(), 1, "{errors:?}");
    let event = &errors[0];
    assert_eq!(event.target, "pragmail::session");
    assert_eq!(event.fields["kind"], "Operational");
    assert!(event.fields["source"].contains("AUTHENTICATIONFAILED"));
    assert!(event.fields["error"].starts_with("IMAP error"));
}

#[tokio::test]
async fn test_usage_failure_is_logged_with_kind() {
    let captured = Captured::default();
    let _guard =
        tracing::subscriber::set_default(tracing_subscriber::registry().with(captured.clone()));

    let err = Session::new(ScriptedTransport::new("1", "1"))
        .run(async |session: &mut Session<ScriptedTransport>| {
            session.authenticate("user", "secret").await?;
            session.find_latest_message("John Smith").await.map(|_| ())
        })
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Usage);

    let errors = captured.errors();
    assert_eq!(errors.len(), 1, "{errors:?}");
    assert_eq!(errors[0].target, "pragmail::session");
    assert_eq!(errors[0].fields["kind"], "Usage");
    assert_eq!(errors[0].fields["source"], "[]");
}

#[tokio::test]
async fn test_successful_run_logs_no_error_event() {
    let captured = Captured::default();
    let _guard =
        tracing::subscriber::set_default(tracing_subscriber::registry().with(captured.clone()));

    let mut transport = ScriptedTransport::new("1", "1");
    transport.logout_fails = true;
    Session::new(transport)
        .run(async |session: &mut Session<ScriptedTransport>| {
            session.authenticate("user", "secret").await?;
            session.select_mailbox("INBOX").await.map(|_| ())
        })
        .await
        .unwrap();

    assert!(captured.errors().is_empty());
}
