//! Sinter CLI: simulation, benchmarking and output inspection.

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "sinter")]
#[command(version, about = "Sinter: two-dimensional solid-state sintering by the thermodynamic extremal principle")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a simulation from a config file.
    Simulate {
        /// Path to simulation config (TOML).
        #[arg(short, long, default_value = "simulation.toml")]
        config: String,

        /// JSON-lines output file, overriding the config.
        #[arg(short, long)]
        output: Option<String>,

        /// Print a progress line every N accepted steps.
        #[arg(long, default_value_t = 100)]
        progress: u64,
    },

    /// Run benchmark suite.
    Benchmark {
        /// Which scenario to run (two_particle_neck, three_particle_pore, all).
        #[arg(short, long, default_value = "all")]
        scenario: String,

        /// Output CSV file path.
        #[arg(short, long)]
        output: Option<String>,

        /// Material preset (alumina, copper, zirconia).
        #[arg(short, long)]
        material: Option<String>,

        /// Simulated time in multiples of the characteristic time.
        #[arg(short, long)]
        duration: Option<f64>,

        /// Run the scenarios concurrently.
        #[arg(long)]
        parallel: bool,
    },

    /// Summarize a JSON-lines output file.
    Inspect {
        /// Path to output file.
        path: String,
    },

    /// Validate a simulation config or a state file.
    Validate {
        /// Path to config (.toml) or state (.json) file.
        path: String,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Simulate {
            config,
            output,
            progress,
        } => commands::simulate(&config, output.as_deref(), progress),
        Commands::Benchmark {
            scenario,
            output,
            material,
            duration,
            parallel,
        } => commands::benchmark(
            &scenario,
            output.as_deref(),
            material.as_deref(),
            duration,
            parallel,
        ),
        Commands::Inspect { path } => commands::inspect(&path),
        Commands::Validate { path } => commands::validate(&path),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
