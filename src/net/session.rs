//! TLS session wrapper: authenticated, timeout-bounded I/O over one socket.
//!
//! # Responsibilities
//! - Drive the rustls engine over a non-blocking socket, turning its
//!   wants-read/wants-write retry semantics into explicit readiness waits
//! - Bound the handshake and reads by caller-supplied timeouts
//! - Extract the peer identity after the handshake
//! - Count plaintext bytes for the per-connection audit line
//!
//! # Design Decisions
//! - The engine handle is created at most once per session; a second
//!   handshake attempt is an error, not a no-op
//! - A read timeout returns 0 bytes without closing anything; only a clean
//!   peer close sets the `read_closed` flag
//! - Writes wait for socket writability without a timeout: a write either
//!   completes in full or fails terminally
//! - Close releases the engine and the socket exactly once; a second close
//!   fails loudly with `NoSession`

use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rustls::pki_types::ServerName;
use rustls::{ClientConnection, ServerConnection};
use thiserror::Error;
use tokio::io::Interest;
use tokio::net::TcpStream;
use tokio::time::Instant;

use crate::net::tls::TlsContext;

/// Default handshake timeout: five minutes.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(300);

/// Which side of the handshake this session plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeRole<'a> {
    /// Server side: accept an incoming handshake.
    Acceptor,
    /// Client side: initiate the handshake against `server_name`.
    Initiator {
        /// Name the server certificate must be valid for.
        server_name: &'a str,
    },
}

/// Session lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Handshaking,
    Established,
    Closed,
    Failed,
}

/// Error type for TLS session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("TLS handshake timed out after {0:?}")]
    HandshakeTimeout(Duration),

    #[error("TLS handshake failed: {0}")]
    HandshakeFailed(String),

    #[error("session has already performed a handshake")]
    AlreadyHandshaken,

    #[error("TLS read failed: {0}")]
    ReadFailed(String),

    #[error("TLS write failed: {0}")]
    WriteFailed(String),

    #[error("connection closed while writing")]
    ClosedWhileWriting,

    #[error("no session object")]
    NoSession,

    #[error("session is not established")]
    NotEstablished,

    #[error("peer presented no certificate")]
    NoPeerCertificate,

    #[error("peer certificate has no usable common name")]
    NoCommonName,

    #[error("socket error: {0}")]
    Socket(#[from] io::Error),
}

/// Cumulative plaintext byte counters for one session.
///
/// Shared with the dispatcher's audit guard, which reads them after the
/// protocol handler is done with the session.
#[derive(Debug, Default)]
pub struct ByteCounters {
    read: AtomicU64,
    written: AtomicU64,
}

impl ByteCounters {
    pub fn bytes_read(&self) -> u64 {
        self.read.load(Ordering::Relaxed)
    }

    pub fn bytes_written(&self) -> u64 {
        self.written.load(Ordering::Relaxed)
    }

    pub fn bytes_total(&self) -> u64 {
        self.bytes_read() + self.bytes_written()
    }

    fn add_read(&self, n: usize) {
        self.read.fetch_add(n as u64, Ordering::Relaxed);
    }

    fn add_written(&self, n: usize) {
        self.written.fetch_add(n as u64, Ordering::Relaxed);
    }
}

/// Outcome of one bounded readiness wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WaitOutcome {
    Ready,
    TimedOut,
}

/// `io::Read`/`io::Write` over a tokio socket's non-blocking try-I/O.
///
/// rustls pulls and pushes TLS records through this adapter; `WouldBlock`
/// is the signal to go wait for readiness.
struct NonBlockingIo<'a>(&'a TcpStream);

impl Read for NonBlockingIo<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.try_read(buf)
    }
}

impl Write for NonBlockingIo<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.try_write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// One authenticated TLS-wrapped connection.
pub struct TlsSession {
    stream: Option<TcpStream>,
    engine: Option<rustls::Connection>,
    state: SessionState,
    handshake_done: bool,
    read_closed: bool,
    counters: Arc<ByteCounters>,
}

impl TlsSession {
    /// Wrap an accepted or connected socket. No TLS engine exists yet;
    /// call [`handshake`](Self::handshake) next.
    pub fn new(stream: TcpStream) -> Self {
        Self {
            stream: Some(stream),
            engine: None,
            state: SessionState::Idle,
            handshake_done: false,
            read_closed: false,
            counters: Arc::new(ByteCounters::default()),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Whether the peer has cleanly closed its write side.
    pub fn read_closed(&self) -> bool {
        self.read_closed
    }

    /// Shared byte counters for this session.
    pub fn counters(&self) -> Arc<ByteCounters> {
        self.counters.clone()
    }

    /// Perform the TLS handshake, bounded by `timeout`.
    ///
    /// The engine is created here, exactly once per session; a second call
    /// fails with [`SessionError::AlreadyHandshaken`] whatever the outcome
    /// of the first.
    pub async fn handshake(
        &mut self,
        role: HandshakeRole<'_>,
        tls: &TlsContext,
        timeout: Duration,
    ) -> Result<(), SessionError> {
        if self.handshake_done || self.engine.is_some() || self.state != SessionState::Idle {
            return Err(SessionError::AlreadyHandshaken);
        }
        let stream = self.stream.as_ref().ok_or(SessionError::NoSession)?;

        let mut engine: rustls::Connection = match role {
            HandshakeRole::Acceptor => ServerConnection::new(tls.server_config())
                .map_err(|e| SessionError::HandshakeFailed(e.to_string()))?
                .into(),
            HandshakeRole::Initiator { server_name } => {
                let name = ServerName::try_from(server_name.to_string())
                    .map_err(|e| SessionError::HandshakeFailed(e.to_string()))?;
                ClientConnection::new(tls.client_config(), name)
                    .map_err(|e| SessionError::HandshakeFailed(e.to_string()))?
                    .into()
            }
        };

        self.state = SessionState::Handshaking;
        let deadline = Instant::now() + timeout;
        let result = Self::drive_handshake(stream, &mut engine, deadline, timeout).await;

        // The engine handle stays either way: created at most once.
        self.engine = Some(engine);
        match result {
            Ok(()) => {
                self.handshake_done = true;
                self.state = SessionState::Established;
                Ok(())
            }
            Err(e) => {
                self.state = SessionState::Failed;
                tracing::debug!(error = %e, "TLS handshake failed");
                Err(e)
            }
        }
    }

    async fn drive_handshake(
        stream: &TcpStream,
        engine: &mut rustls::Connection,
        deadline: Instant,
        timeout: Duration,
    ) -> Result<(), SessionError> {
        loop {
            // Flush whatever the engine wants on the wire first.
            while engine.wants_write() {
                match engine.write_tls(&mut NonBlockingIo(stream)) {
                    Ok(_) => {}
                    Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                        match Self::wait_ready(stream, Interest::WRITABLE, deadline).await? {
                            WaitOutcome::Ready => {}
                            WaitOutcome::TimedOut => {
                                return Err(SessionError::HandshakeTimeout(timeout))
                            }
                        }
                    }
                    Err(e) => return Err(SessionError::HandshakeFailed(e.to_string())),
                }
            }

            if !engine.is_handshaking() {
                return Ok(());
            }

            // The engine needs more bytes from the peer.
            match engine.read_tls(&mut NonBlockingIo(stream)) {
                Ok(0) => {
                    return Err(SessionError::HandshakeFailed(
                        "peer closed during handshake".into(),
                    ))
                }
                Ok(_) => {
                    engine
                        .process_new_packets()
                        .map_err(|e| SessionError::HandshakeFailed(e.to_string()))?;
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    match Self::wait_ready(stream, Interest::READABLE, deadline).await? {
                        WaitOutcome::Ready => {}
                        WaitOutcome::TimedOut => {
                            return Err(SessionError::HandshakeTimeout(timeout))
                        }
                    }
                }
                Err(e) => return Err(SessionError::HandshakeFailed(e.to_string())),
            }
        }
    }

    /// Read up to `buf.len()` plaintext bytes, waiting at most `timeout`.
    ///
    /// Returns 0 on an empty buffer, on timeout, and on clean peer close;
    /// only the last sets [`read_closed`](Self::read_closed). A peer that
    /// drops the socket without a TLS close is a read failure.
    pub async fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, SessionError> {
        if buf.is_empty() {
            return Ok(0);
        }
        let stream = self.stream.as_ref().ok_or(SessionError::NoSession)?;
        let engine = self.engine.as_mut().ok_or(SessionError::NoSession)?;
        let deadline = Instant::now() + timeout;

        loop {
            match engine.reader().read(buf) {
                Ok(0) => {
                    // Peer sent close_notify: the read side is done.
                    self.read_closed = true;
                    return Ok(0);
                }
                Ok(n) => {
                    self.counters.add_read(n);
                    return Ok(n);
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    return Err(SessionError::ReadFailed(
                        "peer closed without TLS shutdown".into(),
                    ));
                }
                Err(e) => return Err(SessionError::ReadFailed(e.to_string())),
            }

            // No plaintext buffered. Flush pending engine output (the engine
            // may owe the peer records before it can make progress), then
            // pull more from the wire.
            while engine.wants_write() {
                match engine.write_tls(&mut NonBlockingIo(stream)) {
                    Ok(_) => {}
                    Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                        match Self::wait_ready(stream, Interest::WRITABLE, deadline).await? {
                            WaitOutcome::Ready => {}
                            WaitOutcome::TimedOut => return Ok(0),
                        }
                    }
                    Err(e) => return Err(SessionError::ReadFailed(e.to_string())),
                }
            }

            match Self::wait_ready(stream, Interest::READABLE, deadline).await? {
                WaitOutcome::Ready => {}
                // Soft timeout: no data, stream still open.
                WaitOutcome::TimedOut => return Ok(0),
            }

            match engine.read_tls(&mut NonBlockingIo(stream)) {
                // Socket EOF: let the engine decide whether the TLS stream
                // ended cleanly; the next reader() call is terminal.
                Ok(0) => {
                    engine
                        .process_new_packets()
                        .map_err(|e| SessionError::ReadFailed(e.to_string()))?;
                }
                Ok(_) => {
                    engine
                        .process_new_packets()
                        .map_err(|e| SessionError::ReadFailed(e.to_string()))?;
                }
                // Spurious readiness; wait again.
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
                Err(e) => return Err(SessionError::ReadFailed(e.to_string())),
            }
        }
    }

    /// Write the whole buffer.
    ///
    /// The engine completes the buffer atomically; this waits for socket
    /// writability without a timeout, so the call either finishes the full
    /// write or fails terminally.
    pub async fn write(&mut self, buf: &[u8]) -> Result<(), SessionError> {
        if buf.is_empty() {
            return Ok(());
        }
        let stream = self.stream.as_ref().ok_or(SessionError::NoSession)?;
        let engine = self.engine.as_mut().ok_or(SessionError::NoSession)?;

        engine
            .writer()
            .write_all(buf)
            .map_err(|e| SessionError::WriteFailed(e.to_string()))?;
        self.counters.add_written(buf.len());

        Self::flush_engine(stream, engine).await
    }

    /// Push all pending TLS records onto the wire, waiting as needed.
    async fn flush_engine(
        stream: &TcpStream,
        engine: &mut rustls::Connection,
    ) -> Result<(), SessionError> {
        while engine.wants_write() {
            match engine.write_tls(&mut NonBlockingIo(stream)) {
                Ok(_) => {}
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    stream.writable().await.map_err(SessionError::Socket)?;
                }
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::BrokenPipe
                            | io::ErrorKind::ConnectionReset
                            | io::ErrorKind::ConnectionAborted
                    ) =>
                {
                    return Err(SessionError::ClosedWhileWriting);
                }
                Err(e) => return Err(SessionError::WriteFailed(e.to_string())),
            }
        }
        Ok(())
    }

    /// TLS-level shutdown: queue a close_notify and flush it.
    ///
    /// The socket stays open; [`close`](Self::close) releases it.
    pub async fn shutdown(&mut self) -> Result<(), SessionError> {
        let stream = self.stream.as_ref().ok_or(SessionError::NoSession)?;
        let engine = self.engine.as_mut().ok_or(SessionError::NoSession)?;
        engine.send_close_notify();
        Self::flush_engine(stream, engine).await
    }

    /// Release the engine and the socket, exactly once.
    ///
    /// A second close fails with [`SessionError::NoSession`] rather than
    /// silently succeeding.
    pub fn close(&mut self) -> Result<(), SessionError> {
        if self.engine.take().is_none() {
            return Err(SessionError::NoSession);
        }
        drop(self.stream.take());
        self.state = SessionState::Closed;
        Ok(())
    }

    /// The peer certificate's subject common name.
    ///
    /// Only available once the session is established. Distinguishes "no
    /// certificate presented" from "certificate without a usable subject".
    pub fn peer_common_name(&self) -> Result<String, SessionError> {
        if self.state != SessionState::Established {
            return Err(SessionError::NotEstablished);
        }
        let engine = self.engine.as_ref().ok_or(SessionError::NoSession)?;
        let certs = engine
            .peer_certificates()
            .filter(|certs| !certs.is_empty())
            .ok_or(SessionError::NoPeerCertificate)?;

        let (_, cert) = x509_parser::parse_x509_certificate(certs[0].as_ref())
            .map_err(|_| SessionError::NoCommonName)?;
        let cn = cert
            .subject()
            .iter_common_name()
            .next()
            .and_then(|attr| attr.as_str().ok())
            .ok_or(SessionError::NoCommonName)?;
        Ok(cn.to_string())
    }

    /// Wait for the socket to become ready, bounded by `deadline`.
    ///
    /// "Interrupted" poll errors re-evaluate the remaining budget instead
    /// of failing; any other poll error is fatal.
    async fn wait_ready(
        stream: &TcpStream,
        interest: Interest,
        deadline: Instant,
    ) -> Result<WaitOutcome, SessionError> {
        loop {
            if Instant::now() >= deadline {
                return Ok(WaitOutcome::TimedOut);
            }
            match tokio::time::timeout_at(deadline, stream.ready(interest)).await {
                Err(_) => return Ok(WaitOutcome::TimedOut),
                Ok(Ok(_)) => return Ok(WaitOutcome::Ready),
                Ok(Err(e)) if e.kind() == io::ErrorKind::Interrupted => continue,
                Ok(Err(e)) => return Err(SessionError::Socket(e)),
            }
        }
    }
}

impl std::fmt::Debug for TlsSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsSession")
            .field("state", &self.state)
            .field("read_closed", &self.read_closed)
            .field("bytes_read", &self.counters.bytes_read())
            .field("bytes_written", &self.counters.bytes_written())
            .finish()
    }
}
