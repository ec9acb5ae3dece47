//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the daemon.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration for the backup store daemon.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct StoreConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// TLS material: certificate, key, trust roots.
    pub tls: TlsConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Account store settings.
    pub accounts: AccountsConfig,

    /// Housekeeping process settings.
    pub housekeeping: HousekeepingConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:2201").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:2201".to_string(),
        }
    }
}

/// TLS material for the shared session context.
///
/// All three files are PEM. Client certificates are mandatory and must chain
/// to `trusted_cas_file`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TlsConfig {
    /// Path to the server certificate file (PEM).
    pub certificate_file: PathBuf,

    /// Path to the server private key file (PEM).
    pub private_key_file: PathBuf,

    /// Path to the trusted CA bundle used to verify client certificates (PEM).
    pub trusted_cas_file: PathBuf,
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            certificate_file: PathBuf::from("/etc/backstore/server.pem"),
            private_key_file: PathBuf::from("/etc/backstore/server-key.pem"),
            trusted_cas_file: PathBuf::from("/etc/backstore/client-ca.pem"),
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// TLS handshake timeout in seconds.
    pub handshake_secs: u64,

    /// Idle timeout for protocol reads in seconds.
    pub idle_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            handshake_secs: 300,
            idle_secs: 600,
        }
    }
}

impl TimeoutConfig {
    /// Handshake timeout as a [`Duration`].
    pub fn handshake(&self) -> Duration {
        Duration::from_secs(self.handshake_secs)
    }

    /// Idle read timeout as a [`Duration`].
    pub fn idle(&self) -> Duration {
        Duration::from_secs(self.idle_secs)
    }
}

/// Account store settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AccountsConfig {
    /// Path to the accounts file (TOML).
    pub file: PathBuf,
}

impl Default for AccountsConfig {
    fn default() -> Self {
        Self {
            file: PathBuf::from("/etc/backstore/accounts.toml"),
        }
    }
}

/// Housekeeping process settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HousekeepingConfig {
    /// Seconds between maintenance passes.
    pub interval_secs: u64,

    /// Granularity of control-channel polling between passes, in seconds.
    pub poll_secs: u64,
}

impl Default for HousekeepingConfig {
    fn default() -> Self {
        Self {
            interval_secs: 900,
            poll_secs: 10,
        }
    }
}

impl HousekeepingConfig {
    /// Maintenance interval as a [`Duration`].
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Control poll granularity as a [`Duration`].
    pub fn poll(&self) -> Duration {
        Duration::from_secs(self.poll_secs)
    }
}
