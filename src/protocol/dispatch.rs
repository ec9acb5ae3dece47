//! Connection dispatcher: from accepted session to routed protocol call.
//!
//! # Responsibilities
//! - Extract and parse the peer identity; drop unidentifiable peers quietly
//! - Resolve the account and build the connection context
//! - Invoke the protocol handler
//! - Guarantee the audit line and context cleanup on every path
//!
//! # Design Decisions
//! - The audit line is owned by a Drop guard created before the handler
//!   runs, so it fires exactly once whether the handler returns, errors, or
//!   panics
//! - Handler errors are never swallowed: they propagate to the accept loop
//!   after the audit line is emitted

use std::sync::Arc;
use thiserror::Error;

use crate::accounts::AccountStore;
use crate::net::session::{ByteCounters, TlsSession};
use crate::protocol::context::ConnectionContext;
use crate::protocol::handler::{HandlerError, ProtocolHandler};
use crate::protocol::identity::PeerIdentity;

/// Error type for dispatched connections.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("protocol handler failed: {0}")]
    Handler(#[source] HandlerError),
}

/// Emits the per-connection audit line exactly once, on drop.
///
/// Created before the protocol handler is invoked; whatever path the
/// connection takes out of the handler, the operator sees one line with the
/// peer identity and the byte counters.
struct ConnectionAudit {
    identity: PeerIdentity,
    counters: Arc<ByteCounters>,
}

impl Drop for ConnectionAudit {
    fn drop(&mut self) {
        tracing::info!(
            peer = %self.identity,
            bytes_read = self.counters.bytes_read(),
            bytes_written = self.counters.bytes_written(),
            bytes_total = self.counters.bytes_total(),
            "Connection closed"
        );
    }
}

/// Routes established sessions into the protocol handler.
pub struct Dispatcher<S, H> {
    accounts: S,
    handler: H,
}

impl<S: AccountStore, H: ProtocolHandler> Dispatcher<S, H> {
    pub fn new(accounts: S, handler: H) -> Self {
        Self { accounts, handler }
    }

    /// Handle one established session to completion.
    ///
    /// A peer without a parseable `BACKUP-<hex>` identity is dropped with a
    /// debug trace only; scanners hitting the port must not fill the log.
    pub async fn dispatch(&self, session: &mut TlsSession) -> Result<(), DispatchError> {
        let common_name = match session.peer_common_name() {
            Ok(cn) => cn,
            Err(e) => {
                tracing::debug!(error = %e, "Dropping connection without usable peer certificate");
                return Ok(());
            }
        };

        let Some(identity) = PeerIdentity::parse(&common_name) else {
            tracing::debug!(common_name = %common_name, "Dropping connection with unrecognised identity");
            return Ok(());
        };

        let mut ctx = match self.accounts.account_root(identity.account_id()) {
            Some(root) => ConnectionContext::authenticated(identity, root),
            None => ConnectionContext::unauthenticated(identity),
        };

        let _audit = ConnectionAudit {
            identity,
            counters: session.counters(),
        };

        // Context cleanup happens when `ctx` drops, after the audit guard
        // has logged; errors pass through untouched.
        self.handler
            .serve(session, &mut ctx)
            .await
            .map_err(DispatchError::Handler)
    }
}
