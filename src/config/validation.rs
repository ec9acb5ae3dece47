//! Configuration validation rules.

use crate::config::schema::StoreConfig;
use std::net::SocketAddr;

/// A single validation failure, with enough context to fix the config file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field (e.g., "listener.bind_address").
    pub field: String,
    /// Human-readable description of the problem.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a loaded configuration, collecting all failures.
pub fn validate_config(config: &StoreConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError {
            field: "listener.bind_address".into(),
            message: format!("not a valid socket address: {}", config.listener.bind_address),
        });
    }

    if config.timeouts.handshake_secs == 0 {
        errors.push(ValidationError {
            field: "timeouts.handshake_secs".into(),
            message: "must be greater than zero".into(),
        });
    }

    if config.timeouts.idle_secs == 0 {
        errors.push(ValidationError {
            field: "timeouts.idle_secs".into(),
            message: "must be greater than zero".into(),
        });
    }

    if config.housekeeping.interval_secs == 0 {
        errors.push(ValidationError {
            field: "housekeeping.interval_secs".into(),
            message: "must be greater than zero".into(),
        });
    }

    if config.housekeeping.poll_secs == 0 {
        errors.push(ValidationError {
            field: "housekeeping.poll_secs".into(),
            message: "must be greater than zero".into(),
        });
    }

    if config.housekeeping.poll_secs > config.housekeeping.interval_secs {
        errors.push(ValidationError {
            field: "housekeeping.poll_secs".into(),
            message: "must not exceed housekeeping.interval_secs".into(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(validate_config(&StoreConfig::default()).is_ok());
    }

    #[test]
    fn rejects_bad_bind_address() {
        let mut config = StoreConfig::default();
        config.listener.bind_address = "not-an-address".into();
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(|e| e.field == "listener.bind_address"));
    }

    #[test]
    fn rejects_zero_timeouts() {
        let mut config = StoreConfig::default();
        config.timeouts.handshake_secs = 0;
        config.housekeeping.poll_secs = 0;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn rejects_poll_longer_than_interval() {
        let mut config = StoreConfig::default();
        config.housekeeping.interval_secs = 5;
        config.housekeeping.poll_secs = 30;
        assert!(validate_config(&config).is_err());
    }
}
