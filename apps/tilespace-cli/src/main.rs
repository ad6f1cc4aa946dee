use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use tilespace_common::Region;
use tilespace_persist::{load_world_file, WorldFile};
use tilespace_stream::{CameraFeed, StreamingDriver, WorldConfig, WorldHandle, WorldRepresentation};
use tilespace_tools::WorldInspector;

#[derive(Parser)]
#[command(name = "tilespace-cli", about = "CLI tool for tilespace operations")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print engine version and crate info
    Info,
    /// Load a world file and report its contents
    Validate {
        /// Path to the world JSON file
        file: PathBuf,
    },
    /// Load a world and run streaming ticks around a camera position
    Stream {
        /// Path to the world JSON file
        file: PathBuf,
        /// Number of cadence ticks to run
        #[arg(short, long, default_value = "3")]
        ticks: u32,
        /// Camera center x
        #[arg(short = 'x', long, default_value = "0")]
        camera_x: i32,
        /// Camera center y
        #[arg(short = 'y', long, default_value = "0")]
        camera_y: i32,
        /// Camera neighborhood half-extent
        #[arg(short, long, default_value = "512")]
        radius: i32,
    },
    /// Load a world, stream around a point, and answer point queries there
    Query {
        /// Path to the world JSON file
        file: PathBuf,
        /// Query x
        x: i32,
        /// Query y
        y: i32,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match cli.command {
        Commands::Info => {
            println!("tilespace-cli v{}", env!("CARGO_PKG_VERSION"));
            println!("stream: {}", tilespace_stream::crate_info());
            println!("persist: {}", tilespace_persist::crate_info());
            println!("tools: {}", tilespace_tools::crate_info());
        }
        Commands::Validate { file } => {
            let world_file = load_world_file(&file)?;
            println!(
                "{}: {}x{} world, {} entities",
                file.display(),
                world_file.world_size_x,
                world_file.world_size_y,
                world_file.entities.len()
            );
            for (index, spec) in world_file.entities.iter().enumerate() {
                println!("  [{index}] {spec:?}");
            }
            println!("OK");
        }
        Commands::Stream {
            file,
            ticks,
            camera_x,
            camera_y,
            radius,
        } => {
            let world_file = load_world_file(&file)?;
            let handle = build_world(&world_file)?;

            let camera = CameraFeed::new(Region::new(
                camera_x - radius,
                camera_y - radius,
                camera_x + radius,
                camera_y + radius,
            ));
            let driver = StreamingDriver::new(
                handle.clone(),
                camera,
                StreamingDriver::DEFAULT_CADENCE,
            );

            for tick in 0..ticks {
                driver.run_once();
                let summary = handle.synchronize(|world| WorldInspector::summary(world));
                println!("tick {tick}: {summary}");
            }
        }
        Commands::Query { file, x, y } => {
            let world_file = load_world_file(&file)?;
            let handle = build_world(&world_file)?;

            let camera = CameraFeed::new(Region::new(x - 256, y - 256, x + 256, y + 256));
            let driver = StreamingDriver::new(
                handle.clone(),
                camera,
                StreamingDriver::DEFAULT_CADENCE,
            );
            driver.run_once();

            handle.synchronize(|world| {
                println!("({x},{y}):");
                println!("  collision: {}", world.is_collision_at(x, y));
                println!("  ladder:    {}", world.is_ladder_at(x, y));
                println!("  solid:     {}", world.is_solid_at(x, y));
                println!(
                    "  flow:      ({}, {})",
                    world.vector_x_at(x, y),
                    world.vector_y_at(x, y)
                );
            });
        }
    }

    Ok(())
}

/// Build the orchestrator from a validated world file and register its
/// entities.
fn build_world(file: &WorldFile) -> anyhow::Result<WorldHandle> {
    let mut world = WorldRepresentation::new(WorldConfig {
        world_width: file.world_size_x,
        world_height: file.world_size_y,
        ..WorldConfig::default()
    })?;
    for entity in file.build_entities() {
        world.register_entity(entity);
    }
    Ok(WorldHandle::new(world))
}
