//! # engine_app: Scene runner
//!
//! Loads a scene description, builds the world and drives it with the
//! fixed-timestep tick loop.
//!
//! ## Startup Sequence
//!
//! 1. Parse the command line (`--config`, `--ticks`).
//! 2. Load the scene, falling back to the bundled demo scene.
//! 3. Build the world and enter the tick loop.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use engine_app::{SceneConfig, TickLoop};

const DEMO_SCENE: &str = include_str!("../scenes/demo.json");

/// Runs a gameplay scene built on the event bus and label registry.
#[derive(Parser, Debug)]
#[command(name = "engine_app", version, about)]
struct Args {
    /// Path to a scene JSON file. The bundled demo scene is used if omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of ticks to run, overriding the scene's `max_ticks`.
    #[arg(short, long)]
    ticks: Option<u64>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("engine_app=info".parse()?))
        .init();

    let args = Args::parse();

    let source = match &args.config {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read scene {}", path.display()))?,
        None => DEMO_SCENE.to_owned(),
    };
    let mut scene = SceneConfig::from_json(&source).context("invalid scene")?;
    if let Some(ticks) = args.ticks {
        scene.tick.max_ticks = ticks;
    }

    info!(
        scene = %args.config.as_deref().map_or("demo".into(), |p| p.display().to_string()),
        "scene runner starting"
    );

    let world = scene.build()?;
    let mut tick_loop = TickLoop::new(scene.tick.clone(), world);
    tick_loop.run();

    let world = tick_loop.world();
    info!(
        ticks = tick_loop.tick_id(),
        entities = world.entity_count(),
        labels = world.label_registry().label_count(),
        subscriptions = world.behaviors().subscription_count(),
        "scene runner shut down"
    );
    Ok(())
}
