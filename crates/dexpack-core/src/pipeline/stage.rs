//! Stage model and per-run reporting.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::error::Result;

/// Unique identifier for one pipeline run.
///
/// Keys the run's disposable workspace and log directories.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Ulid);

impl RunId {
    /// Creates a new random run ID.
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The fixed stage sequence of the packaging pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    CompileResources,
    LinkResources,
    CompileSources,
    Dex,
    Package,
    Sign,
}

impl StageKind {
    /// Execution order. Stages have no identity beyond their position here.
    pub const SEQUENCE: [StageKind; 6] = [
        StageKind::CompileResources,
        StageKind::LinkResources,
        StageKind::CompileSources,
        StageKind::Dex,
        StageKind::Package,
        StageKind::Sign,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StageKind::CompileResources => "compile_resources",
            StageKind::LinkResources => "link_resources",
            StageKind::CompileSources => "compile_sources",
            StageKind::Dex => "dex",
            StageKind::Package => "package",
            StageKind::Sign => "sign",
        }
    }

    /// The external tool this stage invokes.
    pub fn tool(&self) -> &'static str {
        match self {
            StageKind::CompileResources | StageKind::LinkResources => "aapt2",
            StageKind::CompileSources => "javac",
            StageKind::Dex => "d8",
            StageKind::Package => "zip",
            StageKind::Sign => "apksigner",
        }
    }

    /// Position within the fixed sequence.
    pub fn index(&self) -> usize {
        Self::SEQUENCE
            .iter()
            .position(|k| k == self)
            .expect("stage is part of the sequence")
    }
}

impl std::fmt::Display for StageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Status of a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    Pending,
    Running,
    Success,
    Failure,
    Skipped,
}

impl StageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageStatus::Pending => "pending",
            StageStatus::Running => "running",
            StageStatus::Success => "success",
            StageStatus::Failure => "failure",
            StageStatus::Skipped => "skipped",
        }
    }

}

impl std::fmt::Display for StageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Execution record of a single stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageReport {
    pub kind: StageKind,
    /// External tool this stage invokes.
    pub tool: String,
    pub status: StageStatus,
    pub exit_code: Option<i32>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub stdout_path: Option<PathBuf>,
    pub stderr_path: Option<PathBuf>,
}

impl StageReport {
    pub fn new(kind: StageKind) -> Self {
        Self {
            kind,
            tool: kind.tool().to_string(),
            status: StageStatus::Pending,
            exit_code: None,
            started_at: None,
            finished_at: None,
            stdout_path: None,
            stderr_path: None,
        }
    }

    /// Wall-clock duration, if the stage both started and finished.
    pub fn duration_ms(&self) -> Option<i64> {
        match (self.started_at, self.finished_at) {
            (Some(start), Some(end)) => Some((end - start).num_milliseconds()),
            _ => None,
        }
    }
}

/// Full record of one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildReport {
    pub run_id: RunId,
    pub stages: Vec<StageReport>,
    /// Path of the signed APK; set only when the whole pipeline succeeded.
    pub artifact: Option<PathBuf>,
    pub created_at: DateTime<Utc>,
}

impl BuildReport {
    pub fn new(run_id: RunId) -> Self {
        Self {
            run_id,
            stages: StageKind::SEQUENCE.iter().map(|k| StageReport::new(*k)).collect(),
            artifact: None,
            created_at: Utc::now(),
        }
    }

    pub fn stage_mut(&mut self, kind: StageKind) -> &mut StageReport {
        &mut self.stages[kind.index()]
    }

    pub fn stage(&self, kind: StageKind) -> &StageReport {
        &self.stages[kind.index()]
    }

    /// True when every stage ended in success or was skipped.
    pub fn succeeded(&self) -> bool {
        self.stages
            .iter()
            .all(|s| matches!(s.status, StageStatus::Success | StageStatus::Skipped))
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
