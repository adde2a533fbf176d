//! Frame loop configuration.
//!
//! Defaults are overridden by the command line, which in turn falls back to
//! `ENGINE_TICK_RATE` and `ENGINE_LOG`.

use clap::Parser;

/// Configuration for the engine process.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Target frames per second.
    pub tick_rate: f64,
    /// Number of frames to run (0 = unlimited).
    pub max_frames: u64,
    /// Default `tracing` filter directive when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl EngineConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_tick_rate(mut self, tick_rate: f64) -> Self {
        self.tick_rate = tick_rate;
        self
    }

    #[must_use]
    pub fn with_max_frames(mut self, max_frames: u64) -> Self {
        self.max_frames = max_frames;
        self
    }

    #[must_use]
    pub fn with_log_filter(mut self, filter: impl Into<String>) -> Self {
        self.log_filter = filter.into();
        self
    }

    /// Apply command-line overrides.
    pub fn apply_cli_overrides(&mut self, cli: &Cli) {
        if let Some(rate) = cli.tick_rate {
            self.tick_rate = rate;
        }
        if let Some(frames) = cli.frames {
            self.max_frames = frames;
        }
        if let Some(ref filter) = cli.log {
            self.log_filter = filter.clone();
        }
    }

    /// Seconds per frame.
    ///
    /// # Panics
    ///
    /// Panics if the tick rate is not a positive finite number.
    #[must_use]
    pub fn frame_seconds(&self) -> f64 {
        assert!(
            self.tick_rate.is_finite() && self.tick_rate > 0.0,
            "tick rate must be positive, got {}",
            self.tick_rate
        );
        1.0 / self.tick_rate
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_rate: 60.0,
            max_frames: 0,
            log_filter: "info".to_owned(),
        }
    }
}

/// Command-line arguments.
#[derive(Parser, Debug, Default)]
#[command(name = "engine_app", about = "Runs the demo scene through the frame loop")]
pub struct Cli {
    /// Target frames per second.
    #[arg(long, env = "ENGINE_TICK_RATE")]
    pub tick_rate: Option<f64>,

    /// Stop after this many frames (0 = run forever).
    #[arg(long)]
    pub frames: Option<u64>,

    /// Default log filter, e.g. `debug` or `engine_scene=trace`.
    #[arg(long, env = "ENGINE_LOG")]
    pub log: Option<String>,
}
