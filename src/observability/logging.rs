//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber once per process
//! - Pick the log filter from `RUST_LOG`, with a sensible default
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - Both daemon roles initialize identically; the role shows up as a field
//!   on the events themselves, not in subscriber configuration

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the global tracing subscriber.
///
/// Safe to call once per process; later calls are ignored.
pub fn init_logging() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "backstore=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
