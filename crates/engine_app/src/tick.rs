//! Fixed-timestep tick loop.
//!
//! Each tick:
//!
//! 1. Update every attached behavior (events are dispatched synchronously).
//! 2. Flush structural changes queued during the updates.
//! 3. Advance the tick counter.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::SceneError;
use crate::world::World;

/// Configuration for the tick loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TickConfig {
    /// Target ticks per second.
    pub tick_rate: f64,
    /// Maximum number of ticks to run (0 = unlimited).
    pub max_ticks: u64,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            tick_rate: 60.0,
            max_ticks: 0,
        }
    }
}

impl TickConfig {
    /// Check that `tick_rate` is a positive finite number.
    ///
    /// # Errors
    ///
    /// Returns [`SceneError::InvalidTickRate`] otherwise.
    pub fn validate(&self) -> Result<(), SceneError> {
        if self.tick_rate.is_finite() && self.tick_rate > 0.0 {
            Ok(())
        } else {
            Err(SceneError::InvalidTickRate(self.tick_rate))
        }
    }
}

/// The simulation's tick loop state.
#[derive(Debug)]
pub struct TickLoop {
    /// Current tick counter.
    tick_id: u64,
    /// Tick configuration.
    config: TickConfig,
    /// The simulation context.
    world: World,
}

impl TickLoop {
    /// Create a new tick loop driving `world`.
    #[must_use]
    pub fn new(config: TickConfig, world: World) -> Self {
        Self {
            tick_id: 0,
            config,
            world,
        }
    }

    /// Returns the current tick counter.
    #[must_use]
    pub fn tick_id(&self) -> u64 {
        self.tick_id
    }

    /// Returns a reference to the world.
    #[must_use]
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Returns a mutable reference to the world.
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// Run one tick of the simulation.
    pub fn tick(&mut self, dt: f32) {
        self.tick_id += 1;
        self.world.update(dt);
        let applied = self.world.flush();
        debug!(
            tick_id = self.tick_id,
            dt,
            applied,
            entities = self.world.entity_count(),
            "tick complete"
        );
    }

    /// Run the tick loop for the configured number of ticks, or indefinitely.
    ///
    /// Sleeps between ticks to hold the configured rate. Does nothing if the
    /// tick rate does not give a valid tick duration.
    pub fn run(&mut self) {
        let Ok(tick_duration) = Duration::try_from_secs_f64(1.0 / self.config.tick_rate) else {
            warn!(tick_rate = self.config.tick_rate, "invalid tick rate, not running");
            return;
        };
        let mut tick_count = 0u64;

        info!(
            tick_rate = self.config.tick_rate,
            max_ticks = self.config.max_ticks,
            "starting tick loop"
        );

        loop {
            let start = Instant::now();

            let dt = tick_duration.as_secs_f32();
            self.tick(dt);

            tick_count += 1;
            if self.config.max_ticks > 0 && tick_count >= self.config.max_ticks {
                info!(ticks = tick_count, "tick loop complete");
                break;
            }

            let elapsed = start.elapsed();
            if elapsed < tick_duration {
                std::thread::sleep(tick_duration - elapsed);
            } else {
                warn!(
                    tick_id = self.tick_id,
                    elapsed_ms = elapsed.as_millis() as u64,
                    budget_ms = tick_duration.as_millis() as u64,
                    "tick exceeded time budget"
                );
            }
        }
    }

    /// Consume the loop and return the world.
    #[must_use]
    pub fn into_world(self) -> World {
        self.world
    }
}
