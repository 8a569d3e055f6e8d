use clap::{Parser, Subcommand};
use std::path::Path;
use tracing_subscriber::EnvFilter;

use windfield::cli::commands;
use windfield::config::simulation::SimulationConfig;

#[derive(Parser)]
#[command(name = "windfield")]
#[command(about = "A player-centred dynamic wind field driven by tileable curl noise")]
#[command(version)]
struct Cli {
    /// Path to the configuration file (defaults are used if it does not exist)
    #[arg(short, long, default_value = "windfield.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Bake the density and curl textures and print their statistics
    Bake,

    /// Run the headless frame loop with a scripted player
    Run {
        /// Path to a specific field snapshot to resume from
        #[arg(short, long)]
        snapshot: Option<String>,
    },

    /// Print a grid of wind vectors as JSON lines
    Sample {
        /// Lower corner of the square grid (X and Z)
        #[arg(long, default_value_t = -8.0, allow_hyphen_values = true)]
        min: f32,

        /// Upper corner of the square grid (X and Z)
        #[arg(long, default_value_t = 8.0, allow_hyphen_values = true)]
        max: f32,

        /// Grid spacing in world units
        #[arg(long, default_value_t = 1.0)]
        step: f32,

        /// Frames to simulate before sampling
        #[arg(long, default_value_t = 60)]
        frames: u32,
    },

    /// Manage field snapshots
    Snapshots {
        #[command(subcommand)]
        action: SnapshotAction,
    },
}

#[derive(Subcommand)]
enum SnapshotAction {
    /// List available snapshots
    List {
        /// Snapshot directory (defaults to the configured one)
        #[arg(short, long)]
        dir: Option<String>,
    },

    /// Load a snapshot file and print its summary
    Restore {
        /// Path to the snapshot file
        file: String,
    },
}

fn init_logging(config: &SimulationConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if config.log_json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn exit_on_error(result: Result<(), String>) {
    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match SimulationConfig::from_file_or_default(Path::new(&cli.config)) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            std::process::exit(1);
        }
    };
    init_logging(&config);

    match cli.command {
        Commands::Bake => {
            exit_on_error(commands::bake_summary(&config).map(|s| commands::print_bake_summary(&s)));
        }

        Commands::Run { snapshot } => {
            if let Err(e) = commands::run_simulation(&config, snapshot.as_deref()).await {
                eprintln!("Simulation error: {}", e);
                std::process::exit(1);
            }
        }

        Commands::Sample { min, max, step, frames } => {
            let grid = commands::sample_grid(&config, min, max, step, frames);
            exit_on_error(grid.and_then(|vectors| {
                for v in &vectors {
                    let line = serde_json::to_string(v).map_err(|e| e.to_string())?;
                    println!("{}", line);
                }
                Ok(())
            }));
        }

        Commands::Snapshots { action } => match action {
            SnapshotAction::List { dir } => {
                let dir = dir.unwrap_or_else(|| config.snapshot_directory.clone());
                exit_on_error(commands::print_snapshot_list(Path::new(&dir)));
            }
            SnapshotAction::Restore { file } => {
                exit_on_error(commands::print_snapshot_summary(Path::new(&file)));
            }
        },
    }
}
