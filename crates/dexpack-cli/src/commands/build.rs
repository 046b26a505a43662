//! `dexpack build` command: runs the packaging pipeline.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;

use dexpack_core::pipeline::{BuildReport, PipelineRunner, ProcessExecutor};
use dexpack_core::project::{load_project, resolve_build_config, ApkProject, ProjectKeystore};
use dexpack_core::signing;

/// Run the packaging pipeline
#[derive(Args)]
pub struct BuildArgs {
    /// Java source files (may also come from the project file)
    #[arg(value_name = "SOURCE")]
    sources: Vec<PathBuf>,

    /// Resource file fed to aapt2 compile (repeatable)
    #[arg(long = "res", value_name = "FILE")]
    resources: Vec<PathBuf>,

    /// AndroidManifest.xml path
    #[arg(long)]
    manifest: Option<PathBuf>,

    /// SDK platform directory containing android.jar
    #[arg(long, env = "DEXPACK_SDK_PLATFORM")]
    sdk_platform: Option<PathBuf>,

    /// SDK build-tools directory containing aapt2, d8 and apksigner
    #[arg(long, env = "DEXPACK_BUILD_TOOLS")]
    build_tools: Option<PathBuf>,

    /// Output path of the signed APK
    #[arg(long)]
    out: Option<PathBuf>,

    /// Directory for per-run intermediates and logs
    #[arg(long, default_value = ".dexpack")]
    work_dir: PathBuf,

    /// Keystore to sign with (a debug keystore is generated when omitted)
    #[arg(long)]
    keystore: Option<PathBuf>,

    /// Keystore password
    #[arg(long, env = "DEXPACK_KS_PASS", hide_env_values = true)]
    ks_pass: Option<String>,

    /// Key alias within the keystore
    #[arg(long)]
    ks_alias: Option<String>,

    /// Project file (defaults to ./dexpack.yaml when present)
    #[arg(long)]
    project: Option<PathBuf>,

    /// Print the run report as JSON
    #[arg(long)]
    json: bool,
}

pub async fn handle_build_command(args: BuildArgs) -> Result<()> {
    let mut file = match &args.project {
        Some(path) => Some(load_project(path)?),
        None => {
            let default = Path::new("dexpack.yaml");
            if default.exists() {
                Some(load_project(default)?)
            } else {
                None
            }
        }
    };

    if let Some(project) = &mut file {
        apply_keystore_flags(project, &args.ks_pass, &args.ks_alias);
    }

    let keystore = args.keystore.map(|path| ProjectKeystore {
        path,
        password: args.ks_pass.clone(),
        alias: args.ks_alias.clone(),
    });

    let overrides = ApkProject {
        resources: args.resources,
        sources: args.sources,
        manifest: args.manifest,
        sdk_platform: args.sdk_platform,
        build_tools: args.build_tools,
        out: args.out,
        keystore,
    };

    let android_home = std::env::var_os("ANDROID_HOME").map(PathBuf::from);
    let config = resolve_build_config(file, overrides, args.work_dir, android_home)?;

    // Surface bad keystore credentials before spending time on the build.
    if let Some(keystore) = &config.keystore {
        signing::validate_keystore(keystore)
            .await
            .context("Keystore validation failed")?;
    }

    let executor = Arc::new(ProcessExecutor::new());
    let runner = PipelineRunner::new(config, executor);
    let report = runner.run().await?;

    if args.json {
        println!("{}", report.to_json()?);
    } else {
        print_report(&report);
    }

    Ok(())
}

/// Folds `--ks-pass` / `--ks-alias` into a keystore named in the project
/// file. A flag always wins over the file value, so secrets never have to
/// live in a checked-in file.
fn apply_keystore_flags(
    project: &mut ApkProject,
    ks_pass: &Option<String>,
    ks_alias: &Option<String>,
) {
    if let Some(keystore) = &mut project.keystore {
        if ks_pass.is_some() {
            keystore.password = ks_pass.clone();
        }
        if ks_alias.is_some() {
            keystore.alias = ks_alias.clone();
        }
    }
}

fn print_report(report: &BuildReport) {
    println!("Pipeline run {}", report.run_id);
    for stage in &report.stages {
        let duration = stage
            .duration_ms()
            .map(|ms| format!(" ({} ms)", ms))
            .unwrap_or_default();
        println!(
            "  {:<18} {:<9} {}{}",
            stage.kind.to_string(),
            stage.tool,
            stage.status,
            duration
        );
    }
    if let Some(artifact) = &report.artifact {
        println!();
        println!("Artifact: {}", artifact.display());
    }
}
