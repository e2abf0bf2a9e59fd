//! Configuration validation
//!
//! Validates mailslot configuration for correctness:
//! - At least one mailbox, and no more than a device can number
//! - Non-zero buffer limits
//! - Non-zero lock timeout when one is set

use super::mailslot_config::MailslotConfig;
use crate::MailslotError;

/// Largest number of mailboxes a single device can expose (20 minor bits)
pub const MAX_MINORS: usize = 1 << 20;

/// Validation error details
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validation result
pub type ValidationResult = std::result::Result<(), Vec<ValidationError>>;

/// Validate a mailslot configuration, collecting every problem
pub fn validate_config(config: &MailslotConfig) -> ValidationResult {
    let mut errors = Vec::new();

    if config.instances == 0 {
        errors.push(ValidationError::new(
            "instances",
            "At least one mailbox must be configured",
        ));
    } else if config.instances > MAX_MINORS {
        errors.push(ValidationError::new(
            "instances",
            format!(
                "{} mailboxes exceed the device limit of {}",
                config.instances, MAX_MINORS
            ),
        ));
    }

    if config.buffer.storage == 0 {
        errors.push(ValidationError::new(
            "buffer.storage",
            "Mailboxes must hold at least one message",
        ));
    }

    if config.buffer.message_size == 0 {
        errors.push(ValidationError::new(
            "buffer.message_size",
            "Message size must be greater than 0",
        ));
    }

    if config.lock_timeout_ms == Some(0) {
        errors.push(ValidationError::new(
            "lock_timeout_ms",
            "Lock timeout must be greater than 0 (omit it to wait until interrupted)",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate configuration and return a Result
pub fn validate_config_result(config: &MailslotConfig) -> crate::Result<()> {
    validate_config(config).map_err(|errors| {
        let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        MailslotError::Config(format!(
            "Configuration validation failed:\n  - {}",
            messages.join("\n  - ")
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_config() {
        assert!(validate_config(&MailslotConfig::new()).is_ok());
    }

    #[test]
    fn test_zero_instances() {
        let mut config = MailslotConfig::new();
        config.instances = 0;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "instances");
    }

    #[test]
    fn test_too_many_instances() {
        let mut config = MailslotConfig::new();
        config.instances = MAX_MINORS + 1;

        let errors = validate_config(&config).unwrap_err();
        assert!(errors[0].message.contains("device limit"));
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = MailslotConfig::new();
        config.buffer.storage = 0;
        config.buffer.message_size = 0;
        config.lock_timeout_ms = Some(0);

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn test_validate_config_result_message() {
        let mut config = MailslotConfig::new();
        config.buffer.storage = 0;

        let err = validate_config_result(&config).unwrap_err();
        assert!(err.to_string().contains("buffer.storage"));
    }
}
