//! OS signal handling.
//!
//! # Responsibilities
//! - Server role: translate SIGHUP into a reload and SIGTERM/SIGINT into a
//!   terminate, both of which end the accept loop
//! - Housekeeping role: swallow those same signals, so the process reacts
//!   only to forwarded control-channel messages
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - SIGHUP triggers config reload, not shutdown
//! - The housekeeping process drains its signal streams in a background
//!   task; external supervisors terminate it via the control channel

use std::io;

use tokio::signal::unix::{signal, SignalKind};

/// Why the server role's accept loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// SIGHUP: reload configuration and serve again.
    Reload,
    /// SIGTERM or SIGINT: shut the daemon down.
    Terminate,
}

/// Signal streams for the server role.
pub struct SignalListener {
    hangup: tokio::signal::unix::Signal,
    terminate: tokio::signal::unix::Signal,
    interrupt: tokio::signal::unix::Signal,
}

impl SignalListener {
    /// Install the server role's signal handlers.
    pub fn new() -> io::Result<Self> {
        Ok(Self {
            hangup: signal(SignalKind::hangup())?,
            terminate: signal(SignalKind::terminate())?,
            interrupt: signal(SignalKind::interrupt())?,
        })
    }

    /// Wait for the next externally delivered signal.
    pub async fn recv(&mut self) -> ExitReason {
        tokio::select! {
            _ = self.hangup.recv() => ExitReason::Reload,
            _ = self.terminate.recv() => ExitReason::Terminate,
            _ = self.interrupt.recv() => ExitReason::Terminate,
        }
    }
}

/// Make the housekeeping process ignore reload/terminate signals.
///
/// The streams are drained forever in a background task; only control-channel
/// messages move the housekeeping loop.
pub fn ignore_external_signals() -> io::Result<()> {
    let mut hangup = signal(SignalKind::hangup())?;
    let mut terminate = signal(SignalKind::terminate())?;
    let mut interrupt = signal(SignalKind::interrupt())?;

    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = hangup.recv() => {
                    tracing::debug!("Ignoring SIGHUP; waiting for control channel");
                }
                _ = terminate.recv() => {
                    tracing::debug!("Ignoring SIGTERM; waiting for control channel");
                }
                _ = interrupt.recv() => {
                    tracing::debug!("Ignoring SIGINT; waiting for control channel");
                }
            }
        }
    });

    Ok(())
}
