//! Bus configuration.
//!
//! Channels are declared up front and never change afterwards. The
//! configuration is plain JSON:
//!
//! ```json
//! { "channels": ["Damaged", "CounterReached"] }
//! ```

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Declared channels for an [`EventBus`](crate::EventBus).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// Channel names, in declaration order.
    pub channels: Vec<String>,
}

impl BusConfig {
    /// Create a config declaring the given channels.
    #[must_use]
    pub fn with_channels<I, S>(channels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            channels: channels.into_iter().map(Into::into).collect(),
        }
    }

    /// Parse and validate a JSON configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed JSON and
    /// [`ConfigError::EmptyChannelName`] for a blank channel name.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that every channel name is non-empty.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EmptyChannelName`] with the offending position.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.channels.iter().position(|c| c.trim().is_empty()) {
            Some(pos) => Err(ConfigError::EmptyChannelName(pos)),
            None => Ok(()),
        }
    }
}
