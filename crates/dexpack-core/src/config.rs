//! Build configuration: SDK tool locations and execution limits.

use std::path::{Path, PathBuf};

use crate::error::{DexpackError, Result};
use crate::signing::KeystoreConfig;

/// Locations of the Android SDK pieces the pipeline shells out to.
#[derive(Debug, Clone)]
pub struct SdkPaths {
    /// SDK platform directory containing `android.jar`.
    pub platform: PathBuf,
    /// Build-tools directory containing `aapt2`, `d8`, and `apksigner`.
    pub build_tools: PathBuf,
}

impl SdkPaths {
    pub fn new(platform: PathBuf, build_tools: PathBuf) -> Self {
        Self {
            platform,
            build_tools,
        }
    }

    /// Path to the platform `android.jar` used as the compile classpath.
    pub fn android_jar(&self) -> PathBuf {
        self.platform.join("android.jar")
    }

    pub fn aapt2(&self) -> PathBuf {
        self.build_tools.join("aapt2")
    }

    pub fn d8(&self) -> PathBuf {
        self.build_tools.join("d8")
    }

    pub fn apksigner(&self) -> PathBuf {
        self.build_tools.join("apksigner")
    }

    /// Checks that the platform jar and the required build tools exist.
    pub fn validate(&self) -> Result<()> {
        if !self.android_jar().is_file() {
            return Err(DexpackError::Configuration(format!(
                "android.jar not found under SDK platform '{}'",
                self.platform.display()
            )));
        }

        for tool in [self.aapt2(), self.d8(), self.apksigner()] {
            if !tool.is_file() {
                return Err(DexpackError::ToolNotFound(format!(
                    "{} (expected under build-tools '{}')",
                    tool.display(),
                    self.build_tools.display()
                )));
            }
        }

        Ok(())
    }
}

/// Derives SDK paths from an `ANDROID_HOME` root.
///
/// Picks the highest-versioned entry under `platforms/` and `build-tools/`,
/// the layout a stock SDK install uses. Returns `None` if either directory
/// is missing or empty.
pub fn sdk_from_android_home(root: &Path) -> Option<SdkPaths> {
    let platform = newest_entry(&root.join("platforms"))?;
    let build_tools = newest_entry(&root.join("build-tools"))?;
    Some(SdkPaths::new(platform, build_tools))
}

fn newest_entry(dir: &Path) -> Option<PathBuf> {
    let mut entries: Vec<PathBuf> = std::fs::read_dir(dir)
        .ok()?
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    entries.sort_by_key(|p| version_key(p));
    entries.pop()
}

/// Numeric components of a directory name, so `android-34` sorts above
/// `android-9` and `34.0.0` above `9.0.0`.
fn version_key(path: &Path) -> Vec<u32> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    name.split(|c: char| !c.is_ascii_digit())
        .filter_map(|s| s.parse().ok())
        .collect()
}

/// Stage execution limits configuration.
#[derive(Debug, Clone)]
pub struct StageLimits {
    /// Maximum stage duration in seconds (default: 1800 = 30 min).
    pub max_stage_duration_secs: u64,
    /// Maximum log file size in bytes (default: 50MB).
    pub max_log_size_bytes: u64,
}

impl Default for StageLimits {
    fn default() -> Self {
        Self {
            max_stage_duration_secs: 1800,
            max_log_size_bytes: 50 * 1024 * 1024,
        }
    }
}

impl StageLimits {
    /// Loads limits from environment variables with defaults.
    pub fn from_env() -> Self {
        let mut limits = Self::default();

        if let Ok(val) = std::env::var("DEXPACK_MAX_STAGE_DURATION_SECS") {
            if let Ok(v) = val.parse() {
                limits.max_stage_duration_secs = v;
            }
        }

        if let Ok(val) = std::env::var("DEXPACK_MAX_LOG_SIZE_BYTES") {
            if let Ok(v) = val.parse() {
                limits.max_log_size_bytes = v;
            }
        }

        limits
    }
}

/// Fully resolved input set for one pipeline run.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Resource files fed to `aapt2 compile` (may be empty).
    pub resources: Vec<PathBuf>,
    /// Java source files fed to `javac`.
    pub sources: Vec<PathBuf>,
    /// AndroidManifest.xml path.
    pub manifest: PathBuf,
    pub sdk: SdkPaths,
    /// Base directory for per-run intermediate output.
    pub work_dir: PathBuf,
    /// Path of the final signed APK.
    pub out: PathBuf,
    /// Keystore to sign with; `None` means a debug keystore is
    /// bootstrapped under the work dir.
    pub keystore: Option<KeystoreConfig>,
}

impl BuildConfig {
    /// Validates inputs before the first stage runs.
    ///
    /// Catches the local precondition failures early so the pipeline
    /// does not fail halfway through with a tool error instead.
    pub fn validate(&self) -> Result<()> {
        if self.sources.is_empty() {
            return Err(DexpackError::Configuration(
                "no source files given (pass them on the command line or set sources in dexpack.yaml)".to_string(),
            ));
        }

        for source in &self.sources {
            if !source.is_file() {
                return Err(DexpackError::Configuration(format!(
                    "source file not found: {}",
                    source.display()
                )));
            }
        }

        for resource in &self.resources {
            if !resource.is_file() {
                return Err(DexpackError::Configuration(format!(
                    "resource file not found: {}",
                    resource.display()
                )));
            }
        }

        if !self.manifest.is_file() {
            return Err(DexpackError::Configuration(format!(
                "manifest not found: {}",
                self.manifest.display()
            )));
        }

        self.sdk.validate()?;

        if let Some(keystore) = &self.keystore {
            if !keystore.path.is_file() {
                return Err(DexpackError::Configuration(format!(
                    "keystore not found: {}",
                    keystore.path.display()
                )));
            }
        }

        Ok(())
    }
}

/// Resolves a bare tool name against the `PATH` environment variable.
///
/// Used for the JDK tools (`javac`, `keytool`) and `zip`, which are not
/// part of the SDK build-tools directory.
pub fn find_on_path(name: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    for dir in std::env::split_paths(&path_var) {
        let candidate = dir.join(name);
        if candidate.is_file() {
            return Some(candidate);
        }
    }
    None
}
