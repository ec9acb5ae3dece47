//! Connection dispatcher tests over real loopback sockets.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use backstore::accounts::TomlAccountStore;
use backstore::net::session::{HandshakeRole, TlsSession};
use backstore::protocol::context::ConnectionContext;
use backstore::protocol::dispatch::Dispatcher;
use backstore::protocol::handler::{HandlerError, ProtocolHandler};

mod common;
use common::{socket_pair, TestPki};

const HS_TIMEOUT: Duration = Duration::from_secs(10);

/// Handler that records what it saw and optionally fails.
#[derive(Clone)]
struct RecordingHandler {
    calls: Arc<AtomicUsize>,
    saw_account: Arc<AtomicUsize>,
    fail: bool,
}

impl RecordingHandler {
    fn new(fail: bool) -> Self {
        Self {
            calls: Arc::new(AtomicUsize::new(0)),
            saw_account: Arc::new(AtomicUsize::new(0)),
            fail,
        }
    }
}

impl ProtocolHandler for RecordingHandler {
    async fn serve(
        &self,
        _session: &mut TlsSession,
        ctx: &mut ConnectionContext,
    ) -> Result<(), HandlerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if ctx.has_account() {
            self.saw_account.fetch_add(1, Ordering::SeqCst);
        }
        if self.fail {
            return Err("handler exploded".into());
        }
        Ok(())
    }
}

fn test_store() -> TomlAccountStore {
    TomlAccountStore::parse(
        r#"
        [[account]]
        id = "1a2b"
        root = "/srv/backstore/1a2b"
        disc_set = 2
        "#,
    )
    .unwrap()
}

/// Establish a server session against a client presenting `client_cn`.
/// The client immediately performs a TLS shutdown so handler reads finish.
async fn accepted_session(pki: &TestPki, client_cn: &str) -> TlsSession {
    let (server_sock, client_sock) = socket_pair().await;
    let server_tls = pki.server_context();
    let client_tls = pki.client_context(client_cn);

    let mut server = TlsSession::new(server_sock);
    let mut client = TlsSession::new(client_sock);

    let (server_result, client_result) = tokio::join!(
        server.handshake(HandshakeRole::Acceptor, &server_tls, HS_TIMEOUT),
        client.handshake(
            HandshakeRole::Initiator {
                server_name: "localhost",
            },
            &client_tls,
            HS_TIMEOUT,
        ),
    );
    server_result.expect("server handshake");
    client_result.expect("client handshake");

    tokio::spawn(async move {
        let _ = client.shutdown().await;
        // Hold the socket open briefly so the server side can finish.
        tokio::time::sleep(Duration::from_millis(200)).await;
        let _ = client.close();
    });

    server
}

#[tokio::test]
async fn unrecognised_identity_is_dropped_quietly() {
    let pki = TestPki::new();
    let handler = RecordingHandler::new(false);
    let dispatcher = Dispatcher::new(test_store(), handler.clone());

    let mut session = accepted_session(&pki, "random scanner").await;
    dispatcher.dispatch(&mut session).await.unwrap();

    assert_eq!(handler.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn known_account_reaches_handler_with_context() {
    let pki = TestPki::new();
    let handler = RecordingHandler::new(false);
    let dispatcher = Dispatcher::new(test_store(), handler.clone());

    let mut session = accepted_session(&pki, "BACKUP-1a2b").await;
    dispatcher.dispatch(&mut session).await.unwrap();

    assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
    assert_eq!(handler.saw_account.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn unknown_account_still_reaches_handler_unauthenticated() {
    let pki = TestPki::new();
    let handler = RecordingHandler::new(false);
    let dispatcher = Dispatcher::new(test_store(), handler.clone());

    let mut session = accepted_session(&pki, "BACKUP-dead").await;
    dispatcher.dispatch(&mut session).await.unwrap();

    assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
    assert_eq!(handler.saw_account.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn handler_errors_propagate_after_accounting() {
    let pki = TestPki::new();
    let handler = RecordingHandler::new(true);
    let dispatcher = Dispatcher::new(test_store(), handler.clone());

    let mut session = accepted_session(&pki, "BACKUP-1a2b").await;
    let err = dispatcher.dispatch(&mut session).await.unwrap_err();

    assert!(err.to_string().contains("handler exploded"));
    assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn case_insensitive_identity_resolves_same_account() {
    let pki = TestPki::new();
    let handler = RecordingHandler::new(false);
    let dispatcher = Dispatcher::new(test_store(), handler.clone());

    let mut session = accepted_session(&pki, "backup-1A2B").await;
    dispatcher.dispatch(&mut session).await.unwrap();

    assert_eq!(handler.saw_account.load(Ordering::SeqCst), 1);
}
