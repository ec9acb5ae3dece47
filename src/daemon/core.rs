//! Daemon core: the one-time role split and the server role's accept loop.
//!
//! # Responsibilities
//! - Split the daemon into a server role and a housekeeping role exactly
//!   once, however many reload passes the run loop makes
//! - Drive the accept loop: handshake, dispatch, audit, next connection
//! - Forward reload/terminate to the housekeeping role before acting on
//!   either signal
//!
//! # Design Decisions
//! - The split is a supervised subprocess of the same binary rather than a
//!   raw fork; the child's piped stdin is the control channel, closed on
//!   both sides automatically when either process exits
//! - `ForkState` is explicit, singly-set state owned by the daemon, so the
//!   exactly-once guarantee is testable without spawning anything
//! - One connection is handled fully before the next accept; a failed
//!   connection never ends the loop

use std::path::PathBuf;
use std::process::Stdio;

use thiserror::Error;
use tokio::process::{Child, ChildStdin, Command};

use crate::accounts::{AccountStoreError, TomlAccountStore};
use crate::config::{load_config, ConfigError, StoreConfig};
use crate::daemon::control::{ControlMessage, ControlSender};
use crate::daemon::signals::{ExitReason, SignalListener};
use crate::net::listener::{Listener, ListenerError};
use crate::net::session::{HandshakeRole, SessionError, TlsSession};
use crate::net::tls::{TlsContext, TlsError};
use crate::protocol::dispatch::{DispatchError, Dispatcher};
use crate::protocol::handler::StoreHandler;

/// Command-line flag the server role passes to its housekeeping child.
pub const HOUSEKEEPING_FLAG: &str = "--housekeeping";

/// Which half of the split daemon a process is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Serves client connections.
    Server,
    /// Runs periodic account maintenance.
    Housekeeping,
}

/// One-shot record of the daemon's role split.
///
/// Assigned exactly once per process; a reload pass through the run loop
/// observes the role already set and skips the split.
#[derive(Debug, Default)]
pub struct ForkState {
    role: Option<Role>,
}

impl ForkState {
    pub fn new() -> Self {
        Self::default()
    }

    /// The assigned role, if the split has happened.
    pub fn role(&self) -> Option<Role> {
        self.role
    }

    pub fn is_forked(&self) -> bool {
        self.role.is_some()
    }

    /// Record the role. Fails if a role was already assigned.
    pub fn assign(&mut self, role: Role) -> Result<(), DaemonError> {
        if let Some(existing) = self.role {
            return Err(DaemonError::AlreadyForked(existing));
        }
        self.role = Some(role);
        Ok(())
    }
}

/// Error type for daemon lifecycle operations.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("role already assigned: {0:?}")]
    AlreadyForked(Role),

    #[error("failed to spawn housekeeping process: {0}")]
    Spawn(std::io::Error),

    #[error("housekeeping process has no control channel")]
    NoControlChannel,

    #[error("failed to install signal handlers: {0}")]
    Signals(std::io::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Tls(#[from] TlsError),

    #[error(transparent)]
    Accounts(#[from] AccountStoreError),

    #[error(transparent)]
    Listener(#[from] ListenerError),
}

/// The server role's daemon object.
pub struct Daemon {
    config_path: PathBuf,
    config: StoreConfig,
    fork: ForkState,
    control: Option<ControlSender<ChildStdin>>,
    housekeeping: Option<Child>,
}

impl Daemon {
    pub fn new(config_path: PathBuf, config: StoreConfig) -> Self {
        Self {
            config_path,
            config,
            fork: ForkState::new(),
            control: None,
            housekeeping: None,
        }
    }

    /// The assigned role, if the split has happened.
    pub fn role(&self) -> Option<Role> {
        self.fork.role()
    }

    /// Split off the housekeeping process, exactly once.
    ///
    /// Spawn failure or a missing stdin pipe is startup-fatal; a second call
    /// after the split is a no-op.
    pub fn ensure_forked(&mut self) -> Result<(), DaemonError> {
        if self.fork.is_forked() {
            return Ok(());
        }

        let exe = std::env::current_exe().map_err(DaemonError::Spawn)?;
        let mut child = Command::new(exe)
            .arg(HOUSEKEEPING_FLAG)
            .arg("--config")
            .arg(&self.config_path)
            .stdin(Stdio::piped())
            .spawn()
            .map_err(DaemonError::Spawn)?;

        let stdin = child.stdin.take().ok_or(DaemonError::NoControlChannel)?;
        tracing::info!(pid = ?child.id(), "Housekeeping process started");

        self.control = Some(ControlSender::new(stdin));
        self.housekeeping = Some(child);
        self.fork.assign(Role::Server)
    }

    /// Run the server role until terminated.
    ///
    /// Each pass of the outer loop serves connections until a signal
    /// arrives; SIGHUP forwards `'h'` and reloads, SIGTERM/SIGINT forwards
    /// `'t'` and exits.
    pub async fn run(&mut self) -> Result<(), DaemonError> {
        self.ensure_forked()?;
        let mut signals = SignalListener::new().map_err(DaemonError::Signals)?;

        loop {
            match self.serve(&mut signals).await? {
                ExitReason::Reload => {
                    tracing::info!("SIGHUP received; reloading configuration");
                    self.forward(ControlMessage::Reload).await;
                    self.reload_config();
                }
                ExitReason::Terminate => {
                    tracing::info!("Termination signal received; shutting down");
                    self.forward(ControlMessage::Terminate).await;
                    return Ok(());
                }
            }
        }
    }

    /// One serve pass: bind, accept, handle, until a signal arrives.
    async fn serve(&mut self, signals: &mut SignalListener) -> Result<ExitReason, DaemonError> {
        let tls = TlsContext::from_config(&self.config.tls)?;
        let accounts = TomlAccountStore::load(&self.config.accounts.file)?;
        let listener = Listener::bind(&self.config.listener).await?;
        let handler = StoreHandler::new(self.config.timeouts.idle());
        let dispatcher = Dispatcher::new(accounts, handler);
        let handshake_timeout = self.config.timeouts.handshake();

        loop {
            tokio::select! {
                reason = signals.recv() => return Ok(reason),
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, addr)) => {
                            // Sequential by design: the next accept waits for
                            // this connection to finish.
                            if let Err(e) =
                                handle_connection(stream, &tls, &dispatcher, handshake_timeout).await
                            {
                                tracing::warn!(peer_addr = %addr, error = %e, "Connection failed");
                            }
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "Accept failed");
                        }
                    }
                }
            }
        }
    }

    /// Best-effort forward to the housekeeping role.
    async fn forward(&mut self, message: ControlMessage) {
        if let Some(control) = self.control.as_mut() {
            if let Err(e) = control.send(message).await {
                tracing::warn!(error = %e, "Failed to forward control message to housekeeping");
            }
        }
    }

    /// Re-read configuration, keeping the current one on failure.
    fn reload_config(&mut self) {
        match load_config(&self.config_path) {
            Ok(config) => {
                tracing::info!("Configuration reloaded");
                self.config = config;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to reload config; keeping current configuration");
            }
        }
    }
}

/// Errors one connection can die with; the accept loop logs and moves on.
#[derive(Debug, Error)]
enum ConnectionError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

/// Handshake, dispatch, shutdown, close — one connection, start to finish.
async fn handle_connection<S, H>(
    stream: tokio::net::TcpStream,
    tls: &TlsContext,
    dispatcher: &Dispatcher<S, H>,
    handshake_timeout: std::time::Duration,
) -> Result<(), ConnectionError>
where
    S: crate::accounts::AccountStore,
    H: crate::protocol::handler::ProtocolHandler,
{
    let mut session = TlsSession::new(stream);
    session
        .handshake(HandshakeRole::Acceptor, tls, handshake_timeout)
        .await?;

    let result = dispatcher.dispatch(&mut session).await;

    // Best-effort TLS shutdown; the session is closed either way.
    if let Err(e) = session.shutdown().await {
        tracing::debug!(error = %e, "TLS shutdown failed");
    }
    if let Err(e) = session.close() {
        tracing::debug!(error = %e, "Session close failed");
    }

    result.map_err(ConnectionError::Dispatch)
}
