//! Configuration system
//!
//! Loads ~/.config/mailslot/config.yaml with support for:
//! - Number of mailbox instances
//! - Per-mailbox buffer limits, delivery order and oversize handling
//! - Clearing mailboxes on close
//! - Bounded lock waits

mod mailslot_config;
pub mod validation;

pub use mailslot_config::MailslotConfig;
pub use validation::{validate_config, validate_config_result, ValidationError, MAX_MINORS};
