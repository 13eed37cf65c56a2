//! Fixed-timestep tick loop.
//!
//! Runs the composed system pipeline against the world once per tick,
//! sleeping off the remainder of each tick's time budget and warning when a
//! tick overruns it.

use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use nexus_ecs::{Pipeline, World};

/// Configuration for the tick loop.
#[derive(Debug, Clone)]
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

/// The tick loop: owns the world and the pipeline driven against it.
#[derive(Debug)]
pub struct TickLoop {
    tick_id: u64,
    config: TickConfig,
    world: World,
    pipeline: Pipeline,
}

impl TickLoop {
    /// Create a tick loop over a world and its system pipeline.
    #[must_use]
    pub fn new(config: TickConfig, world: World, pipeline: Pipeline) -> Self {
        Self {
            tick_id: 0,
            config,
            world,
            pipeline,
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

    /// Run one tick: the whole pipeline, in order, to completion.
    pub fn tick(&mut self, dt: f64) {
        self.tick_id += 1;
        debug!(tick_id = self.tick_id, dt, "tick start");
        self.pipeline.run(&mut self.world, dt);
    }

    /// Run the loop for the configured number of ticks, or indefinitely.
    pub fn run(&mut self) {
        let tick_duration = Duration::from_secs_f64(1.0 / self.config.tick_rate);
        let mut tick_count = 0u64;

        info!(
            tick_rate = self.config.tick_rate,
            max_ticks = self.config.max_ticks,
            "starting tick loop"
        );

        loop {
            let start = Instant::now();

            self.tick(tick_duration.as_secs_f64());

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
}

#[cfg(test)]
mod tests {
    use super::*;
    use nexus_ecs::System;

    #[test]
    fn test_tick_advances_counter() {
        let mut tick_loop = TickLoop::new(TickConfig::default(), World::new(), Pipeline::new());
        assert_eq!(tick_loop.tick_id(), 0);
        tick_loop.tick(1.0 / 60.0);
        assert_eq!(tick_loop.tick_id(), 1);
        tick_loop.tick(1.0 / 60.0);
        assert_eq!(tick_loop.tick_id(), 2);
    }

    #[test]
    fn test_run_limited_ticks() {
        let config = TickConfig {
            tick_rate: 1000.0, // fast for testing
            max_ticks: 5,
        };
        let pipeline = Pipeline::new().with(System::new("noop", |_world, _dt| {}));
        let mut tick_loop = TickLoop::new(config, World::new(), pipeline);
        tick_loop.run();
        assert_eq!(tick_loop.tick_id(), 5);
    }
}
