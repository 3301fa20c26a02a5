//! # engine_event
//!
//! In-process publish/subscribe for gameplay behaviors.
//!
//! Behaviors never hold references to one another. A behavior that wants to
//! react registers a [`Listener`] against a [`Channel`]; a behavior that
//! detects something dispatches that channel with a [`TargetMode`] and an
//! optional activator entity. The [`EventBus`] resolves the targeted
//! subscribers, snapshots them, and calls each one in turn. Every listener
//! then applies its own [`Acceptance`] filter before acting.
//!
//! This crate provides:
//!
//! - [`channel`]: channel identity and the configured [`ChannelCatalog`].
//! - [`request`]: [`TargetMode`] and [`DispatchRequest`].
//! - [`listener`]: the [`Listener`] trait and the [`Event`] it receives.
//! - [`filter`]: [`Acceptance`] filters and the [`Filtered`] listener.
//! - [`bus`]: the [`EventBus`] and its RAII [`Subscription`] guard.
//! - [`diagnostics`]: where isolated listener failures are reported.
//! - [`config`]: JSON channel declarations.
//! - [`error`]: error types.

pub mod bus;
pub mod channel;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod filter;
pub mod listener;
pub mod request;

pub use bus::{EventBus, Subscription};
pub use channel::{Channel, ChannelCatalog, ChannelId};
pub use config::BusConfig;
pub use diagnostics::{DiagnosticSink, Failure, RecordingSink, TracingSink};
pub use error::{ConfigError, ListenerError};
pub use filter::{Acceptance, Filtered};
pub use listener::{Event, Listener};
pub use request::{DispatchRequest, TargetMode};
