//! `dexpack doctor` command: verifies the external toolchain.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use dexpack_core::config::{find_on_path, SdkPaths};

/// Check that the required external tools are available
#[derive(Args)]
pub struct DoctorArgs {
    /// SDK platform directory containing android.jar
    #[arg(long, env = "DEXPACK_SDK_PLATFORM")]
    sdk_platform: Option<PathBuf>,

    /// SDK build-tools directory containing aapt2, d8 and apksigner
    #[arg(long, env = "DEXPACK_BUILD_TOOLS")]
    build_tools: Option<PathBuf>,
}

pub fn handle_doctor_command(args: DoctorArgs) -> Result<()> {
    let mut healthy = true;

    println!("Dexpack Toolchain Status");
    println!("========================");
    println!();

    println!("PATH tools:");
    for tool in ["javac", "keytool", "zip"] {
        match find_on_path(tool) {
            Some(path) => println!("  {:<10} {}", tool, path.display()),
            None => {
                println!("  {:<10} not found", tool);
                healthy = false;
            }
        }
    }
    println!();

    println!("Android SDK:");
    match (args.sdk_platform, args.build_tools) {
        (Some(platform), Some(build_tools)) => {
            let sdk = SdkPaths::new(platform, build_tools);
            match sdk.validate() {
                Ok(()) => {
                    println!("  android.jar {}", sdk.android_jar().display());
                    for tool in [sdk.aapt2(), sdk.d8(), sdk.apksigner()] {
                        let name = tool
                            .file_name()
                            .map(|n| n.to_string_lossy().into_owned())
                            .unwrap_or_default();
                        println!("  {:<10} {}", name, tool.display());
                    }
                }
                Err(e) => {
                    println!("  {}", e);
                    healthy = false;
                }
            }
        }
        _ => {
            println!("  Not configured");
            println!("  Set DEXPACK_SDK_PLATFORM and DEXPACK_BUILD_TOOLS (or pass the flags)");
            healthy = false;
        }
    }

    if !healthy {
        anyhow::bail!("Toolchain incomplete");
    }

    println!();
    println!("All required tools found");
    Ok(())
}
