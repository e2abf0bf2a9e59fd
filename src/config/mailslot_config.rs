//! Mailslot configuration file handling
//!
//! Loads and manages the ~/.config/mailslot/config.yaml file.

use crate::Result;
use mailslot_core::{BufferConfig, INSTANCES};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Mailslot configuration
///
/// Every field has a default, so an empty file yields the reference setup of
/// 256 mailboxes holding up to 256 messages of up to 256 bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailslotConfig {
    /// Number of mailboxes (valid ids are `0..instances`)
    #[serde(default = "default_instances")]
    pub instances: usize,

    /// Buffer limits and policies shared by every mailbox
    #[serde(default)]
    pub buffer: BufferConfig,

    /// Drop queued messages when a mailbox is closed
    #[serde(default)]
    pub clear_on_close: bool,

    /// Give up on a lock wait after this many milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lock_timeout_ms: Option<u64>,
}

fn default_instances() -> usize {
    INSTANCES
}

impl MailslotConfig {
    /// Create a configuration with every default
    pub fn new() -> Self {
        Self {
            instances: default_instances(),
            buffer: BufferConfig::default(),
            clear_on_close: false,
            lock_timeout_ms: None,
        }
    }

    /// Load configuration from the default path (~/.config/mailslot/config.yaml)
    pub fn load_default() -> Result<Self> {
        let path = Self::default_path();
        Self::load(&path)
    }

    /// Load configuration from a specific path
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(crate::MailslotError::Config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }

        tracing::info!(path = %path.display(), "Loading mailslot configuration");

        let content = fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;

        tracing::debug!(
            instances = config.instances,
            message_size = config.buffer.message_size,
            storage = config.buffer.storage,
            "Configuration loaded successfully"
        );

        Ok(config)
    }

    /// Load from `path` if given, otherwise from the default path, falling back to
    /// defaults when the default file does not exist
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => {
                if Self::default_path().exists() {
                    Self::load_default()
                } else {
                    tracing::debug!("No configuration file, using defaults");
                    Ok(Self::new())
                }
            }
        }
    }

    /// Save configuration to the default path
    pub fn save_default(&self) -> Result<()> {
        let path = Self::default_path();
        self.save(&path)
    }

    /// Save configuration to a specific path
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        tracing::info!(path = %path.display(), "Saving mailslot configuration");

        let yaml = serde_yaml::to_string(self)?;
        fs::write(path, yaml)?;

        Ok(())
    }

    /// Get the default config path (~/.config/mailslot/config.yaml)
    pub fn default_path() -> PathBuf {
        let mut path = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push(".config");
        path.push("mailslot");
        path.push("config.yaml");
        path
    }

    /// Lock wait bound as a duration
    pub fn lock_timeout(&self) -> Option<Duration> {
        self.lock_timeout_ms.map(Duration::from_millis)
    }
}

impl Default for MailslotConfig {
    fn default() -> Self {
        Self::new()
    }
}
