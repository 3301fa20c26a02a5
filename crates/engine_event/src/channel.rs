//! Channel identity.
//!
//! A [`ChannelId`] is derived from the channel's name with FNV-1a 64-bit, the
//! same hash the engine uses for every other name-derived identifier, so any
//! tool can compute the id of a channel it only knows by name.

use std::collections::HashMap;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::BusConfig;

/// Name-derived identifier of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChannelId(pub u64);

impl ChannelId {
    /// FNV-1a 64-bit offset basis.
    const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;

    /// FNV-1a 64-bit prime.
    const FNV_PRIME: u64 = 0x0100_0000_01b3;

    /// Compute the id for a channel name.
    ///
    /// ```text
    /// hash = 0xcbf29ce484222325
    /// for each byte in name.as_bytes():
    ///     hash = hash XOR byte
    ///     hash = hash * 0x00000100000001b3
    /// ```
    #[must_use]
    pub const fn from_name(name: &str) -> Self {
        let bytes = name.as_bytes();
        let mut hash = Self::FNV_OFFSET_BASIS;
        let mut i = 0;
        while i < bytes.len() {
            hash ^= bytes[i] as u64;
            hash = hash.wrapping_mul(Self::FNV_PRIME);
            i += 1;
        }
        Self(hash)
    }
}

/// A named event topic.
///
/// Channels are immutable once created. Two channels are equal when their ids
/// are equal.
#[derive(Debug, Clone)]
pub struct Channel {
    id: ChannelId,
    name: Rc<str>,
}

impl Channel {
    /// Create a channel from its name.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            id: ChannelId::from_name(name),
            name: Rc::from(name),
        }
    }

    /// Returns the channel id.
    #[must_use]
    pub fn id(&self) -> ChannelId {
        self.id
    }

    /// Returns the channel name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl PartialEq for Channel {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Channel {}

impl std::hash::Hash for Channel {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

/// The set of channels declared by configuration.
#[derive(Debug, Default)]
pub struct ChannelCatalog {
    channels: HashMap<ChannelId, Channel>,
}

impl ChannelCatalog {
    /// Create an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog from the channels listed in `config`.
    #[must_use]
    pub fn from_config(config: &BusConfig) -> Self {
        let mut catalog = Self::new();
        for name in &config.channels {
            catalog.declare(name);
        }
        debug!(channels = catalog.len(), "channel catalog built");
        catalog
    }

    /// Declare a channel, returning the existing one if already declared.
    pub fn declare(&mut self, name: &str) -> Channel {
        let id = ChannelId::from_name(name);
        if let Some(existing) = self.channels.get(&id) {
            if existing.name() != name {
                warn!(
                    existing = existing.name(),
                    requested = name,
                    "channel id collision, keeping the first declaration"
                );
            }
            return existing.clone();
        }
        let channel = Channel::new(name);
        self.channels.insert(id, channel.clone());
        channel
    }

    /// Look up a declared channel by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Channel> {
        self.channels
            .get(&ChannelId::from_name(name))
            .filter(|c| c.name() == name)
            .cloned()
    }

    /// Returns `true` if a channel with this name was declared.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Iterate all declared channels.
    pub fn iter(&self) -> impl Iterator<Item = &Channel> {
        self.channels.values()
    }

    /// Returns the number of declared channels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// Returns `true` if nothing was declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fnv1a_known_vector() {
        assert_eq!(ChannelId::from_name(""), ChannelId(0xcbf2_9ce4_8422_2325));
    }

    #[test]
    fn test_channel_id_is_deterministic() {
        assert_eq!(
            ChannelId::from_name("Damaged"),
            ChannelId::from_name("Damaged")
        );
        assert_ne!(
            ChannelId::from_name("Damaged"),
            ChannelId::from_name("Healed")
        );
    }

    #[test]
    fn test_channel_equality_by_id() {
        let a = Channel::new("CounterIncremented");
        let b = Channel::new("CounterIncremented");
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "CounterIncremented");
    }

    #[test]
    fn test_catalog_declare_is_idempotent() {
        let mut catalog = ChannelCatalog::new();
        let first = catalog.declare("NodeReached");
        let second = catalog.declare("NodeReached");
        assert_eq!(first, second);
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn test_catalog_unknown_channel() {
        let catalog = ChannelCatalog::new();
        assert!(catalog.get("Nope").is_none());
        assert!(!catalog.contains("Nope"));
        assert!(catalog.is_empty());
    }

    #[test]
    fn test_catalog_from_config() {
        let config = BusConfig {
            channels: vec!["Damaged".into(), "Healed".into(), "Damaged".into()],
        };
        let catalog = ChannelCatalog::from_config(&config);
        assert_eq!(catalog.len(), 2);
        assert!(catalog.contains("Healed"));
    }
}
