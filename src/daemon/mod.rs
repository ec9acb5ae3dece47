//! Daemon lifecycle subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (core.rs):
//!     Load config → spawn housekeeping child (exactly once) → accept loop
//!
//! Signals (signals.rs):
//!     SIGHUP  → forward 'h' → reload config → serve again
//!     SIGTERM/SIGINT → forward 't' → exit
//!
//! Control channel (control.rs):
//!     Server role ──single bytes──▶ housekeeping child's stdin
//!
//! Housekeeping (housekeeping.rs):
//!     maintenance pass → poll control → {reload | terminate | keep going}
//! ```
//!
//! # Design Decisions
//! - Two processes, not threads: the roles share nothing after the split,
//!   and the housekeeping role ignores OS signals by design
//! - The split happens exactly once per process tree; reloads never
//!   re-spawn

pub mod control;
pub mod core;
pub mod housekeeping;
pub mod signals;

pub use control::{ControlMessage, ControlPoll, ControlReceiver, ControlSender};
pub use core::{Daemon, DaemonError, ForkState, Role, HOUSEKEEPING_FLAG};
pub use housekeeping::{AccountSweep, HousekeepingLoop, MaintenanceTask};
pub use signals::{ignore_external_signals, ExitReason, SignalListener};
