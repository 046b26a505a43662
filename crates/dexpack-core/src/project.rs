//! Project file parsing and input resolution.
//!
//! A `dexpack.yaml` file may carry the input set for a build; command-line
//! flags take precedence over it field by field.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::{sdk_from_android_home, BuildConfig, SdkPaths};
use crate::error::{DexpackError, Result};
use crate::signing::KeystoreConfig;

/// Supported `dexpack.yaml` fields.
///
/// ```yaml
/// resources:
///   - res/layout/main.xml
/// sources:
///   - src/org/example/MainActivity.java
/// manifest: AndroidManifest.xml
/// sdk_platform: /opt/android-sdk/platforms/android-34
/// build_tools: /opt/android-sdk/build-tools/34.0.0
/// out: out/app-debug.apk
/// keystore:
///   path: keys/release.jks
///   alias: release
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApkProject {
    #[serde(default)]
    pub resources: Vec<PathBuf>,
    #[serde(default)]
    pub sources: Vec<PathBuf>,
    #[serde(default)]
    pub manifest: Option<PathBuf>,
    #[serde(default)]
    pub sdk_platform: Option<PathBuf>,
    #[serde(default)]
    pub build_tools: Option<PathBuf>,
    #[serde(default)]
    pub out: Option<PathBuf>,
    #[serde(default)]
    pub keystore: Option<ProjectKeystore>,
}

/// Keystore section of the project file.
///
/// The password is deliberately optional here: it normally arrives via
/// `--ks-pass` or `DEXPACK_KS_PASS` so it never lands in a checked-in file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectKeystore {
    pub path: PathBuf,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub alias: Option<String>,
}

/// Starter content written by `dexpack init`.
pub const STARTER_TEMPLATE: &str = "\
# dexpack project file
#
# Relative paths are resolved against this file's directory.
resources: []
sources:
  - src/Main.java
manifest: AndroidManifest.xml
# sdk_platform: /opt/android-sdk/platforms/android-34
# build_tools: /opt/android-sdk/build-tools/34.0.0
out: out/app-debug.apk
";

/// Parses a `dexpack.yaml` string.
pub fn parse_project(yaml_content: &str) -> Result<ApkProject> {
    let parsed: ApkProject = serde_yaml::from_str(yaml_content)
        .map_err(|e| DexpackError::Project(format!("Invalid YAML: {}", e)))?;

    warn_unknown_fields(yaml_content);

    Ok(parsed)
}

/// Loads a project file from disk, rebasing its relative paths onto the
/// file's parent directory.
pub fn load_project(path: &Path) -> Result<ApkProject> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        DexpackError::Project(format!("Failed to read {}: {}", path.display(), e))
    })?;
    let mut project = parse_project(&content)?;

    if let Some(base) = path.parent() {
        project.rebase(base);
    }

    Ok(project)
}

impl ApkProject {
    /// Rebases all relative paths onto `base`.
    pub fn rebase(&mut self, base: &Path) {
        let rebase_one = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };

        self.resources.iter_mut().for_each(rebase_one);
        self.sources.iter_mut().for_each(rebase_one);
        self.manifest.iter_mut().for_each(rebase_one);
        self.sdk_platform.iter_mut().for_each(rebase_one);
        self.build_tools.iter_mut().for_each(rebase_one);
        self.out.iter_mut().for_each(rebase_one);
        if let Some(keystore) = &mut self.keystore {
            rebase_one(&mut keystore.path);
        }
    }
}

/// Logs warnings for unrecognized top-level fields.
fn warn_unknown_fields(yaml_content: &str) {
    let Ok(value) = serde_yaml::from_str::<serde_yaml::Value>(yaml_content) else {
        return;
    };

    let known = [
        "resources",
        "sources",
        "manifest",
        "sdk_platform",
        "build_tools",
        "out",
        "keystore",
    ];

    if let Some(mapping) = value.as_mapping() {
        for key in mapping.keys() {
            if let Some(name) = key.as_str() {
                if !known.contains(&name) {
                    tracing::warn!("Unknown dexpack.yaml field '{}' will be ignored", name);
                }
            }
        }
    }
}

/// Merges CLI-provided values over the project file and produces the
/// resolved input set for a run.
///
/// Priority per field: CLI flag (or its env fallback), then project file.
/// SDK paths still unresolved after that fall back to the newest entries
/// under `android_home` (the caller passes `ANDROID_HOME` when set).
/// Anything still missing that has no safe default is an error.
pub fn resolve_build_config(
    file: Option<ApkProject>,
    overrides: ApkProject,
    work_dir: PathBuf,
    android_home: Option<PathBuf>,
) -> Result<BuildConfig> {
    let file = file.unwrap_or_default();
    let derived = android_home.as_deref().and_then(sdk_from_android_home);

    let resources = if overrides.resources.is_empty() {
        file.resources
    } else {
        overrides.resources
    };
    let sources = if overrides.sources.is_empty() {
        file.sources
    } else {
        overrides.sources
    };

    let manifest = overrides.manifest.or(file.manifest).ok_or_else(|| {
        DexpackError::Configuration(
            "manifest not set (pass --manifest or set it in dexpack.yaml)".to_string(),
        )
    })?;

    let sdk_platform = overrides
        .sdk_platform
        .or(file.sdk_platform)
        .or_else(|| derived.as_ref().map(|sdk| sdk.platform.clone()))
        .ok_or_else(|| {
            DexpackError::Configuration(
                "SDK platform not set (pass --sdk-platform, DEXPACK_SDK_PLATFORM, or ANDROID_HOME)"
                    .to_string(),
            )
        })?;

    let build_tools = overrides
        .build_tools
        .or(file.build_tools)
        .or_else(|| derived.as_ref().map(|sdk| sdk.build_tools.clone()))
        .ok_or_else(|| {
            DexpackError::Configuration(
                "build-tools not set (pass --build-tools, DEXPACK_BUILD_TOOLS, or ANDROID_HOME)"
                    .to_string(),
            )
        })?;

    let out = overrides
        .out
        .or(file.out)
        .unwrap_or_else(|| PathBuf::from("out/app-debug.apk"));

    let keystore = match overrides.keystore.or(file.keystore) {
        None => None,
        Some(ks) => {
            let password = ks.password.ok_or_else(|| {
                DexpackError::Configuration(
                    "keystore password not set (pass --ks-pass or DEXPACK_KS_PASS)".to_string(),
                )
            })?;
            let alias = ks.alias.ok_or_else(|| {
                DexpackError::Configuration(
                    "key alias not set (pass --ks-alias or set keystore.alias)".to_string(),
                )
            })?;
            Some(KeystoreConfig {
                path: ks.path,
                password,
                alias,
            })
        }
    };

    Ok(BuildConfig {
        resources,
        sources,
        manifest,
        sdk: SdkPaths::new(sdk_platform, build_tools),
        work_dir,
        out,
        keystore,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_project() {
        let yaml = r#"
sources:
  - src/Main.java
manifest: AndroidManifest.xml
"#;

        let project = parse_project(yaml).unwrap();
        assert_eq!(project.sources, vec![PathBuf::from("src/Main.java")]);
        assert_eq!(project.manifest, Some(PathBuf::from("AndroidManifest.xml")));
        assert!(project.resources.is_empty());
        assert!(project.keystore.is_none());
    }

    #[test]
    fn test_parse_full_project() {
        let yaml = r#"
resources:
  - res/layout/main.xml
  - res/values/strings.xml
sources:
  - src/Main.java
manifest: AndroidManifest.xml
sdk_platform: /sdk/platforms/android-34
build_tools: /sdk/build-tools/34.0.0
out: out/fixture.apk
keystore:
  path: keys/release.jks
  alias: release
"#;

        let project = parse_project(yaml).unwrap();
        assert_eq!(project.resources.len(), 2);
        assert_eq!(project.sdk_platform, Some(PathBuf::from("/sdk/platforms/android-34")));
        assert_eq!(project.out, Some(PathBuf::from("out/fixture.apk")));

        let keystore = project.keystore.unwrap();
        assert_eq!(keystore.path, PathBuf::from("keys/release.jks"));
        assert_eq!(keystore.alias, Some("release".to_string()));
        assert!(keystore.password.is_none());
    }

    #[test]
    fn test_parse_invalid_yaml_fails() {
        let yaml = "sources:\n  - one\n manifest bad";
        let result = parse_project(yaml);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Invalid YAML"));
    }

    #[test]
    fn test_parse_starter_template() {
        let project = parse_project(STARTER_TEMPLATE).unwrap();
        assert_eq!(project.sources.len(), 1);
        assert!(project.manifest.is_some());
        assert!(project.out.is_some());
    }

    #[test]
    fn test_rebase_relative_paths() {
        let mut project = parse_project(
            r#"
sources:
  - src/Main.java
manifest: AndroidManifest.xml
sdk_platform: /sdk/platforms/android-34
"#,
        )
        .unwrap();

        project.rebase(Path::new("/repo/app"));

        assert_eq!(project.sources[0], PathBuf::from("/repo/app/src/Main.java"));
        assert_eq!(project.manifest, Some(PathBuf::from("/repo/app/AndroidManifest.xml")));
        // Absolute paths are left alone
        assert_eq!(project.sdk_platform, Some(PathBuf::from("/sdk/platforms/android-34")));
    }

    #[test]
    fn test_load_project_rebases() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dexpack.yaml");
        std::fs::write(&path, "sources:\n  - src/Main.java\n").unwrap();

        let project = load_project(&path).unwrap();
        assert_eq!(project.sources[0], dir.path().join("src/Main.java"));
    }

    #[test]
    fn test_load_project_missing_file_fails() {
        let result = load_project(Path::new("/nonexistent/dexpack.yaml"));
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Failed to read"));
    }

    fn full_file_project() -> ApkProject {
        parse_project(
            r#"
sources:
  - /repo/src/Main.java
manifest: /repo/AndroidManifest.xml
sdk_platform: /sdk/platform
build_tools: /sdk/build-tools
out: /repo/out/app.apk
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_resolve_from_file_only() {
        let config = resolve_build_config(
            Some(full_file_project()),
            ApkProject::default(),
            PathBuf::from("/tmp/work"),
            None,
        )
        .unwrap();

        assert_eq!(config.sources, vec![PathBuf::from("/repo/src/Main.java")]);
        assert_eq!(config.manifest, PathBuf::from("/repo/AndroidManifest.xml"));
        assert_eq!(config.out, PathBuf::from("/repo/out/app.apk"));
        assert!(config.keystore.is_none());
    }

    #[test]
    fn test_resolve_flags_override_file() {
        let overrides = ApkProject {
            sources: vec![PathBuf::from("/other/Main.java")],
            out: Some(PathBuf::from("/dist/custom.apk")),
            ..Default::default()
        };

        let config = resolve_build_config(
            Some(full_file_project()),
            overrides,
            PathBuf::from("/tmp/work"),
            None,
        )
        .unwrap();

        assert_eq!(config.sources, vec![PathBuf::from("/other/Main.java")]);
        assert_eq!(config.out, PathBuf::from("/dist/custom.apk"));
        // Untouched fields fall through to the file
        assert_eq!(config.manifest, PathBuf::from("/repo/AndroidManifest.xml"));
    }

    #[test]
    fn test_resolve_missing_manifest_fails() {
        let overrides = ApkProject {
            sources: vec![PathBuf::from("/repo/Main.java")],
            sdk_platform: Some(PathBuf::from("/sdk/platform")),
            build_tools: Some(PathBuf::from("/sdk/build-tools")),
            ..Default::default()
        };

        let result = resolve_build_config(None, overrides, PathBuf::from("/tmp/work"), None);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("manifest not set"));
    }

    #[test]
    fn test_resolve_missing_sdk_fails() {
        let overrides = ApkProject {
            sources: vec![PathBuf::from("/repo/Main.java")],
            manifest: Some(PathBuf::from("/repo/AndroidManifest.xml")),
            ..Default::default()
        };

        let result = resolve_build_config(None, overrides, PathBuf::from("/tmp/work"), None);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("SDK platform not set"));
    }

    #[test]
    fn test_resolve_default_out() {
        let mut file = full_file_project();
        file.out = None;

        let config =
            resolve_build_config(Some(file), ApkProject::default(), PathBuf::from("/w"), None).unwrap();
        assert_eq!(config.out, PathBuf::from("out/app-debug.apk"));
    }

    #[test]
    fn test_resolve_keystore_requires_password() {
        let mut file = full_file_project();
        file.keystore = Some(ProjectKeystore {
            path: PathBuf::from("/keys/release.jks"),
            password: None,
            alias: Some("release".to_string()),
        });

        let result = resolve_build_config(Some(file), ApkProject::default(), PathBuf::from("/w"), None);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("keystore password not set"));
    }

    #[test]
    fn test_resolve_keystore_requires_alias() {
        let mut file = full_file_project();
        file.keystore = Some(ProjectKeystore {
            path: PathBuf::from("/keys/release.jks"),
            password: Some("secret".to_string()),
            alias: None,
        });

        let result = resolve_build_config(Some(file), ApkProject::default(), PathBuf::from("/w"), None);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("key alias not set"));
    }

    #[test]
    fn test_resolve_keystore_complete() {
        let mut file = full_file_project();
        file.keystore = Some(ProjectKeystore {
            path: PathBuf::from("/keys/release.jks"),
            password: Some("secret".to_string()),
            alias: Some("release".to_string()),
        });

        let config =
            resolve_build_config(Some(file), ApkProject::default(), PathBuf::from("/w"), None).unwrap();
        let keystore = config.keystore.unwrap();
        assert_eq!(keystore.password, "secret");
        assert_eq!(keystore.alias, "release");
    }

    #[test]
    fn test_resolve_no_file_all_flags() {
        let overrides = ApkProject {
            sources: vec![PathBuf::from("/repo/Main.java")],
            manifest: Some(PathBuf::from("/repo/AndroidManifest.xml")),
            sdk_platform: Some(PathBuf::from("/sdk/platform")),
            build_tools: Some(PathBuf::from("/sdk/build-tools")),
            ..Default::default()
        };

        let config = resolve_build_config(None, overrides, PathBuf::from("/w"), None).unwrap();
        assert_eq!(config.work_dir, PathBuf::from("/w"));
        assert_eq!(config.sdk.platform, PathBuf::from("/sdk/platform"));
    }

    fn fake_android_home() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("platforms/android-34")).unwrap();
        std::fs::create_dir_all(dir.path().join("build-tools/34.0.0")).unwrap();
        dir
    }

    #[test]
    fn test_resolve_android_home_fallback() {
        let home = fake_android_home();
        let overrides = ApkProject {
            sources: vec![PathBuf::from("/repo/Main.java")],
            manifest: Some(PathBuf::from("/repo/AndroidManifest.xml")),
            ..Default::default()
        };

        let config = resolve_build_config(
            None,
            overrides,
            PathBuf::from("/w"),
            Some(home.path().to_path_buf()),
        )
        .unwrap();

        assert_eq!(config.sdk.platform, home.path().join("platforms/android-34"));
        assert_eq!(config.sdk.build_tools, home.path().join("build-tools/34.0.0"));
    }

    #[test]
    fn test_resolve_flags_beat_android_home() {
        let home = fake_android_home();
        let overrides = ApkProject {
            sources: vec![PathBuf::from("/repo/Main.java")],
            manifest: Some(PathBuf::from("/repo/AndroidManifest.xml")),
            sdk_platform: Some(PathBuf::from("/sdk/platform")),
            build_tools: Some(PathBuf::from("/sdk/build-tools")),
            ..Default::default()
        };

        let config = resolve_build_config(
            None,
            overrides,
            PathBuf::from("/w"),
            Some(home.path().to_path_buf()),
        )
        .unwrap();

        assert_eq!(config.sdk.platform, PathBuf::from("/sdk/platform"));
        assert_eq!(config.sdk.build_tools, PathBuf::from("/sdk/build-tools"));
    }

    #[test]
    fn test_resolve_empty_android_home_still_fails() {
        // An SDK root without platforms/build-tools yields no defaults
        let home = tempfile::tempdir().unwrap();
        let overrides = ApkProject {
            sources: vec![PathBuf::from("/repo/Main.java")],
            manifest: Some(PathBuf::from("/repo/AndroidManifest.xml")),
            ..Default::default()
        };

        let result = resolve_build_config(
            None,
            overrides,
            PathBuf::from("/w"),
            Some(home.path().to_path_buf()),
        );
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("SDK platform not set"));
    }
}
