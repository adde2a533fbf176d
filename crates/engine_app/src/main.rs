//! # engine_app: Frame loop
//!
//! Builds the demo corridor and drives it through the fixed-timestep frame
//! loop.
//!
//! ## Startup Sequence
//!
//! 1. Parse the command line (`--tick-rate`, `--frames`, `--log`).
//! 2. Initialise `tracing`; `RUST_LOG` wins over `--log`.
//! 3. Build the demo scene and register the walker, chunk and draw-list
//!    systems, in that order.
//! 4. Enter the frame loop.

mod config;
mod demo;
mod draw_list;
mod registry;
mod scheduler;
mod tick;

use anyhow::{Context, Result};
use clap::Parser;
use engine_scene::ChunkSystem;
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::{Cli, EngineConfig};
use demo::{DemoLayout, WalkerSystem};
use draw_list::DrawListSystem;
use tick::FrameLoop;

fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = EngineConfig::default();
    config.apply_cli_overrides(&cli);

    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.log_filter)
            .with_context(|| format!("invalid log filter '{}'", config.log_filter))?,
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!(tick_rate = config.tick_rate, max_frames = config.max_frames, "engine starting");

    let layout = DemoLayout::default();
    let scene = demo::build(layout).context("building demo scene")?;

    let mut frame_loop = FrameLoop::new(config, scene.ctx);
    frame_loop.add_system(Box::new(WalkerSystem::new(scene.player, layout.walk_speed)));
    frame_loop.add_system(Box::new(ChunkSystem::new()));
    frame_loop.add_system(Box::new(DrawListSystem::new()));
    frame_loop.run();

    info!(
        frames = frame_loop.frame_id(),
        systems = frame_loop.registry().system_count(),
        entities = frame_loop.context().ecs().entity_count(),
        "engine shut down"
    );
    Ok(())
}
