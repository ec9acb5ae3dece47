//! Protocol handler seam and the daemon's default handler.
//!
//! The store protocol's request/response model plugs in behind
//! [`ProtocolHandler`]; the dispatcher calls it with an established session
//! and the resolved connection context and guarantees accounting around it.

use std::time::Duration;

use crate::net::session::TlsSession;
use crate::protocol::context::ConnectionContext;

/// Opaque error raised by a protocol handler.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// One store-protocol conversation over an established session.
pub trait ProtocolHandler {
    /// Serve the connection until the client is done.
    ///
    /// Any error propagates to the accept loop after the dispatcher has
    /// logged the connection's byte accounting.
    fn serve(
        &self,
        session: &mut TlsSession,
        ctx: &mut ConnectionContext,
    ) -> impl std::future::Future<Output = Result<(), HandlerError>>;
}

/// Default handler wired into the daemon binary.
///
/// Enforces the account contract (a connection with no resolved account is
/// rejected before any request is served) and drains the client stream
/// until it closes cleanly or goes idle past the configured timeout. Real
/// request execution replaces this behind the same trait.
pub struct StoreHandler {
    idle_timeout: Duration,
}

impl StoreHandler {
    pub fn new(idle_timeout: Duration) -> Self {
        Self { idle_timeout }
    }
}

impl ProtocolHandler for StoreHandler {
    async fn serve(
        &self,
        session: &mut TlsSession,
        ctx: &mut ConnectionContext,
    ) -> Result<(), HandlerError> {
        let Some(account) = ctx.account() else {
            return Err(format!("no account for identity {}", ctx.identity()).into());
        };

        tracing::info!(
            account = %account.id,
            root = %account.root.display(),
            disc_set = account.disc_set,
            "Client connected"
        );

        let mut buf = [0u8; 4096];
        loop {
            let n = session.read(&mut buf, self.idle_timeout).await?;
            if n == 0 {
                if session.read_closed() {
                    return Ok(());
                }
                return Err("client went idle past the timeout".into());
            }
        }
    }
}
