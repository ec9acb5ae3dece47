//! Observability subsystem.
//!
//! Structured logging only: the daemon's operational surface is one audit
//! line per connection plus lifecycle events, all through `tracing`.

pub mod logging;

pub use logging::init_logging;
