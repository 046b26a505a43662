use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

use commands::{
    build::{handle_build_command, BuildArgs},
    doctor::{handle_doctor_command, DoctorArgs},
    init::{handle_init_command, InitArgs},
};

#[derive(Parser)]
#[command(name = "dexpack")]
#[command(about = "Packages Android test-fixture APKs via the SDK toolchain", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the packaging pipeline
    Build(BuildArgs),

    /// Check that the required external tools are available
    Doctor(DoctorArgs),

    /// Write a starter dexpack.yaml in the current directory
    Init(InitArgs),

    /// Show the CLI version
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (doesn't override existing env vars)
    let _ = dotenvy::dotenv();

    // Initialize tracing for better error context
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Build(args) => handle_build_command(args).await?,
        Commands::Doctor(args) => handle_doctor_command(args)?,
        Commands::Init(args) => handle_init_command(args)?,
        Commands::Version => println!("dexpack {}", dexpack_core::VERSION),
    }

    Ok(())
}
