//! Pipeline runner: executes the packaging stages in fixed order.
//!
//! Each stage's output directory feeds the next stage's input discovery;
//! the first failing tool aborts the whole run. There is no retry and no
//! rollback of already-created directories.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;

use crate::config::BuildConfig;
use crate::error::{DexpackError, Result};
use crate::pipeline::discovery;
use crate::pipeline::executor::{ToolExecutor, ToolInvocation, ToolOutput};
use crate::pipeline::stage::{BuildReport, RunId, StageKind, StageStatus};
use crate::signing;

/// Per-run directory layout under the work dir.
///
/// Every run gets a fresh, disposable set of directories keyed by run ID.
struct RunDirs {
    root: PathBuf,
    flat: PathBuf,
    gen: PathBuf,
    classes: PathBuf,
    dex: PathBuf,
    logs: PathBuf,
    base_apk: PathBuf,
}

impl RunDirs {
    fn new(work_dir: &Path, run_id: &RunId) -> Self {
        let root = work_dir.join(run_id.to_string());
        Self {
            flat: root.join("flat"),
            gen: root.join("gen"),
            classes: root.join("classes"),
            dex: root.join("dex"),
            logs: root.join("logs"),
            base_apk: root.join("base.apk"),
            root,
        }
    }

    async fn create(&self) -> Result<()> {
        for dir in [&self.flat, &self.gen, &self.classes, &self.dex, &self.logs] {
            tokio::fs::create_dir_all(dir).await?;
        }
        Ok(())
    }
}

/// Executes the six packaging stages in fixed order, fail-fast.
pub struct PipelineRunner {
    config: BuildConfig,
    executor: Arc<dyn ToolExecutor>,
}

impl PipelineRunner {
    pub fn new(config: BuildConfig, executor: Arc<dyn ToolExecutor>) -> Self {
        Self { config, executor }
    }

    /// Runs the whole pipeline.
    ///
    /// On success the report carries the signed artifact path. On failure
    /// the partial report is still written to `<run dir>/report.json`
    /// before the error propagates, so callers can see where the run
    /// stopped.
    pub async fn run(&self) -> Result<BuildReport> {
        self.config.validate()?;

        let run_id = RunId::new();
        let dirs = RunDirs::new(&self.config.work_dir, &run_id);
        dirs.create().await?;

        if let Some(parent) = self.config.out.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        tracing::info!("Starting pipeline run {}", run_id);

        let mut report = BuildReport::new(run_id);
        let result = self.run_stages(&mut report, &dirs).await;

        let report_path = dirs.root.join("report.json");
        if let Ok(json) = report.to_json() {
            let _ = tokio::fs::write(&report_path, json).await;
        }

        match result {
            Ok(()) => {
                tracing::info!(
                    "Pipeline run {} produced {}",
                    report.run_id,
                    self.config.out.display()
                );
                Ok(report)
            }
            Err(e) => Err(e),
        }
    }

    async fn run_stages(&self, report: &mut BuildReport, dirs: &RunDirs) -> Result<()> {
        // Stage 1: compile resources to .flat intermediates.
        if self.config.resources.is_empty() {
            report.stage_mut(StageKind::CompileResources).status = StageStatus::Skipped;
            tracing::debug!("No resource files, skipping compile_resources");
        } else {
            let invocation = ToolInvocation::new(self.config.sdk.aapt2())
                .arg("compile")
                .arg("-o")
                .arg(dirs.flat.display().to_string())
                .args(self.config.resources.iter().map(|p| p.display().to_string()));
            self.run_stage(report, StageKind::CompileResources, invocation, &dirs.logs)
                .await?;
        }

        // Stage 2: link resources into the base APK and emit R.java.
        let flats = discovery::find_by_extension(&dirs.flat, "flat")?;
        let invocation = ToolInvocation::new(self.config.sdk.aapt2())
            .arg("link")
            .arg("-I")
            .arg(self.config.sdk.android_jar().display().to_string())
            .arg("--manifest")
            .arg(self.config.manifest.display().to_string())
            .arg("--java")
            .arg(dirs.gen.display().to_string())
            .arg("-o")
            .arg(dirs.base_apk.display().to_string())
            .args(flats.iter().map(|p| p.display().to_string()));
        self.run_stage(report, StageKind::LinkResources, invocation, &dirs.logs)
            .await?;

        // Stage 3: compile sources plus the single generated R.java.
        let generated = discovery::expect_single(&dirs.gen, "java", "generated source file")?;
        let invocation = ToolInvocation::new("javac")
            .arg("-classpath")
            .arg(self.config.sdk.android_jar().display().to_string())
            .arg("-d")
            .arg(dirs.classes.display().to_string())
            .args(self.config.sources.iter().map(|p| p.display().to_string()))
            .arg(generated.display().to_string());
        self.run_stage(report, StageKind::CompileSources, invocation, &dirs.logs)
            .await?;

        // Stage 4: dex all compiled classes.
        let classes = discovery::find_by_extension(&dirs.classes, "class")?;
        if classes.is_empty() {
            return Err(DexpackError::ArtifactDiscovery(format!(
                "expected at least one .class file under {}",
                dirs.classes.display()
            )));
        }
        let invocation = ToolInvocation::new(self.config.sdk.d8())
            .arg("--lib")
            .arg(self.config.sdk.android_jar().display().to_string())
            .arg("--output")
            .arg(dirs.dex.display().to_string())
            .args(classes.iter().map(|p| p.display().to_string()));
        self.run_stage(report, StageKind::Dex, invocation, &dirs.logs)
            .await?;

        // Stage 5: add the dex output into the base APK.
        let dex_file = discovery::expect_single(&dirs.dex, "dex", "dex file")?;
        let invocation = ToolInvocation::new("zip")
            .arg("-uj")
            .arg(dirs.base_apk.display().to_string())
            .arg(dex_file.display().to_string());
        self.run_stage(report, StageKind::Package, invocation, &dirs.logs)
            .await?;

        // Stage 6: sign into the final artifact path.
        let keystore = match &self.config.keystore {
            Some(keystore) => keystore.clone(),
            None => signing::ensure_debug_keystore(&dirs.root).await?,
        };
        let invocation = ToolInvocation::new(self.config.sdk.apksigner()).args(
            signing::sign_args(&keystore, &dirs.base_apk, &self.config.out),
        );
        self.run_stage(report, StageKind::Sign, invocation, &dirs.logs)
            .await?;

        if !self.config.out.is_file() {
            return Err(DexpackError::ArtifactDiscovery(format!(
                "signed artifact missing at {}",
                self.config.out.display()
            )));
        }
        report.artifact = Some(self.config.out.clone());

        Ok(())
    }

    /// Runs a single stage and records its outcome in the report.
    async fn run_stage(
        &self,
        report: &mut BuildReport,
        kind: StageKind,
        invocation: ToolInvocation,
        log_dir: &Path,
    ) -> Result<ToolOutput> {
        tracing::info!("Running stage {} ({})", kind, invocation.tool_name());
        {
            let stage = report.stage_mut(kind);
            stage.status = StageStatus::Running;
            stage.started_at = Some(Utc::now());
        }

        let result = self.executor.run(kind, &invocation, log_dir).await;

        let stage = report.stage_mut(kind);
        stage.finished_at = Some(Utc::now());

        match result {
            Ok(output) => {
                stage.status = StageStatus::Success;
                stage.exit_code = Some(output.exit_code);
                stage.stdout_path = Some(output.stdout_path.clone());
                stage.stderr_path = Some(output.stderr_path.clone());
                Ok(output)
            }
            Err(e) => {
                stage.status = StageStatus::Failure;
                if let DexpackError::ToolFailed { exit_code, .. } = &e {
                    stage.exit_code = Some(*exit_code);
                }
                tracing::error!("Stage {} failed: {}", kind, e);
                Err(e)
            }
        }
    }
}
