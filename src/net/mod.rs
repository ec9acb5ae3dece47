//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (bind, accept)
//!     → tls.rs (shared certificate/key/trust-root context)
//!     → session.rs (handshake state machine, timeout-bounded I/O,
//!                   peer identity, byte accounting)
//!     → Hand off to the connection dispatcher
//!
//! Session states:
//!     Idle → Handshaking → Established → {Closed | Failed}
//! ```
//!
//! # Design Decisions
//! - One rustls configuration per process, shared by every session
//! - The engine's retry classification is explicit control flow, not hidden
//!   behind a buffered stream type
//! - Connections are handled sequentially; a slow handshake delays the next
//!   accept by at most the handshake timeout

pub mod listener;
pub mod session;
pub mod tls;
