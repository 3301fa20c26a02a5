//! Scene-building error types.

use engine_event::ConfigError;

/// Errors raised while turning a [`SceneConfig`](crate::SceneConfig) into a world.
#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    /// The scene file was not valid JSON for the expected shape.
    #[error("failed to parse scene: {0}")]
    Parse(#[from] serde_json::Error),

    /// The bus section of the scene was invalid.
    #[error(transparent)]
    Bus(#[from] ConfigError),

    /// The tick rate was zero, negative or not a finite number.
    #[error("tick rate must be a positive finite number, got {0}")]
    InvalidTickRate(f64),

    /// A behavior referred to a channel the scene never declared.
    #[error("entity #{entity} refers to undeclared channel '{channel}'")]
    UnknownChannel {
        /// Position of the entity in the scene's entity list.
        entity: usize,
        /// The undeclared channel name.
        channel: String,
    },
}
