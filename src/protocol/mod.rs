//! Store protocol subsystem.
//!
//! # Data Flow
//! ```text
//! Established TLS session
//!     → identity.rs (certificate common name → account id)
//!     → context.rs (account resolution state for the connection)
//!     → dispatch.rs (routing + guaranteed audit/cleanup)
//!     → handler.rs (the protocol conversation itself)
//! ```
//!
//! # Design Decisions
//! - Malformed identities drop the connection quietly; they are routine
//! - A valid identity with no account still reaches the handler, which owns
//!   the rejection (account creation is valid without a prior account)
//! - The audit line is emitted on every exit path, exactly once

pub mod context;
pub mod dispatch;
pub mod handler;
pub mod identity;

pub use context::ConnectionContext;
pub use dispatch::Dispatcher;
pub use handler::{ProtocolHandler, StoreHandler};
pub use identity::PeerIdentity;
