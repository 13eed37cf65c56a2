//! # nexus_app — demo driver
//!
//! Builds a procedural "network of devices" world, composes the layout
//! pipeline, and drives it with a fixed-timestep tick loop. The settled
//! device positions are logged at the end of the run.

mod demo;
mod tick;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use tick::{TickConfig, TickLoop};

#[derive(Debug, Parser)]
#[command(name = "nexus_app", about = "Device-network layout demo")]
struct Args {
    /// Number of devices in the network.
    #[arg(long, default_value_t = 12)]
    devices: usize,

    /// Target ticks per second.
    #[arg(long, default_value_t = 60.0)]
    tick_rate: f64,

    /// Number of ticks to run (0 = run until interrupted).
    #[arg(long, default_value_t = 300)]
    max_ticks: u64,

    /// Seed for topology generation and layout placement.
    #[arg(long, default_value_t = 7)]
    seed: u64,

    /// Print the world's component/query description as JSON and exit.
    #[arg(long)]
    dump_schema: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("nexus_app=info".parse()?))
        .init();

    let args = Args::parse();
    info!(devices = args.devices, seed = args.seed, "building demo world");

    let demo = demo::build(args.devices, args.seed)?;

    if args.dump_schema {
        println!("{}", serde_json::to_string_pretty(&demo.world.describe())?);
        return Ok(());
    }

    let config = TickConfig {
        tick_rate: args.tick_rate,
        max_ticks: args.max_ticks,
    };
    let mut tick_loop = TickLoop::new(config, demo.world, demo.pipeline);
    tick_loop.run();

    let engine = demo.engine.borrow();
    if let Some(layout) = engine.layout(u64::from(demo::SCENE_ID)) {
        info!(
            settled = layout.is_settled(),
            energy = layout.energy(),
            nodes = layout.node_count(),
            edges = layout.edge_count(),
            "layout state after run"
        );
    }
    for &device in &demo.devices {
        let x = tick_loop.world().get::<f32>(demo.pos_x, device)?;
        let y = tick_loop.world().get::<f32>(demo.pos_y, device)?;
        info!(device = device.id(), x, y, "device position");
    }

    Ok(())
}
