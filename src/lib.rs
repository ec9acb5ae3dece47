//! Backup store daemon library.
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌────────────────────────────────────────────┐
//!                        │                 backstored                  │
//!                        │                                            │
//!   Client connection    │  ┌─────────┐   ┌─────────┐   ┌──────────┐ │
//!   ─────────────────────┼─▶│   net   │──▶│   net   │──▶│ protocol │ │
//!                        │  │listener │   │ session │   │ dispatch │ │
//!                        │  └─────────┘   └─────────┘   └────┬─────┘ │
//!                        │                                    │       │
//!                        │                                    ▼       │
//!                        │                              ┌──────────┐  │
//!                        │                              │ accounts │  │
//!                        │                              └──────────┘  │
//!                        │                                            │
//!                        │  ┌──────────────────────────────────────┐  │
//!                        │  │            daemon core               │  │
//!                        │  │  server role ──'h'/'t'──▶ housekeeping│  │
//!                        │  │  (accept loop)    child   (maintenance)│ │
//!                        │  └──────────────────────────────────────┘  │
//!                        │                                            │
//!                        │  config ─ observability ─ tls context      │
//!                        └────────────────────────────────────────────┘
//! ```

pub mod accounts;
pub mod config;
pub mod daemon;
pub mod net;
pub mod observability;
pub mod protocol;

pub use config::StoreConfig;
pub use daemon::Daemon;
pub use net::session::TlsSession;
pub use net::tls::TlsContext;
