//! `dexpack init` command: writes a starter project file.

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;

use dexpack_core::project::STARTER_TEMPLATE;

/// Write a starter dexpack.yaml in the current directory
#[derive(Args)]
pub struct InitArgs {
    /// Overwrite an existing dexpack.yaml
    #[arg(long)]
    force: bool,
}

pub fn handle_init_command(args: InitArgs) -> Result<()> {
    let path = Path::new("dexpack.yaml");

    if path.exists() && !args.force {
        anyhow::bail!("dexpack.yaml already exists (use --force to overwrite)");
    }

    std::fs::write(path, STARTER_TEMPLATE).context("Failed to write dexpack.yaml")?;

    println!("Wrote dexpack.yaml");
    println!();
    println!("Next steps:");
    println!("  1. Point sources/manifest at your fixture app");
    println!("  2. Set DEXPACK_SDK_PLATFORM and DEXPACK_BUILD_TOOLS");
    println!("  3. Run 'dexpack build'");

    Ok(())
}
