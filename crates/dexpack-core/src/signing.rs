//! Keystore handling for the sign stage.
//!
//! Covers keystore type detection, debug-keystore bootstrap via `keytool`,
//! and assembly of the `apksigner` argument list.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

use crate::error::{DexpackError, Result};

/// Type of a keystore file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeystoreType {
    Jks,
    Pkcs12,
}

/// Keystore parameters used by the sign stage.
#[derive(Debug, Clone)]
pub struct KeystoreConfig {
    pub path: PathBuf,
    pub password: String,
    pub alias: String,
}

impl KeystoreConfig {
    /// The debug keystore parameters the Android tooling conventionally uses.
    pub fn debug(path: PathBuf) -> Self {
        Self {
            path,
            password: "android".to_string(),
            alias: "androiddebugkey".to_string(),
        }
    }
}

/// Detects the keystore type from its magic bytes.
///
/// JKS files start with 0xFEEDFEED; anything else is treated as PKCS12
/// (ASN.1 SEQUENCE, 0x30).
pub fn detect_keystore_type(data: &[u8]) -> KeystoreType {
    if data.len() >= 4 && data[0] == 0xFE && data[1] == 0xED && data[2] == 0xFE && data[3] == 0xED {
        return KeystoreType::Jks;
    }

    KeystoreType::Pkcs12
}

/// Validates that a keystore can be opened and the alias exists.
///
/// Uses the `keytool` CLI so validation matches what `apksigner` will
/// later accept.
pub async fn validate_keystore(keystore: &KeystoreConfig) -> Result<KeystoreType> {
    let data = tokio::fs::read(&keystore.path)
        .await
        .map_err(|e| DexpackError::Signing(format!("Failed to read keystore: {}", e)))?;
    let keystore_type = detect_keystore_type(&data);

    let keystore_path = keystore.path.to_str().ok_or_else(|| {
        DexpackError::Signing("Keystore path is not valid UTF-8".to_string())
    })?;

    let output = Command::new("keytool")
        .args([
            "-list",
            "-keystore",
            keystore_path,
            "-storepass",
            &keystore.password,
            "-alias",
            &keystore.alias,
        ])
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| DexpackError::Signing(format!("Failed to run keytool: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);

        if stderr.contains("keystore password was incorrect") {
            return Err(DexpackError::Signing("Invalid keystore password".to_string()));
        }
        if stderr.contains("does not exist") {
            return Err(DexpackError::Signing(format!(
                "Alias '{}' not found in keystore",
                keystore.alias
            )));
        }
        if stderr.contains("Invalid keystore format") {
            return Err(DexpackError::Signing("Invalid keystore format".to_string()));
        }

        return Err(DexpackError::Signing(format!(
            "Failed to validate keystore: {}",
            redact_passwords(&stderr)
        )));
    }

    Ok(keystore_type)
}

/// Ensures a debug keystore exists under the work directory.
///
/// Generates one with `keytool -genkeypair` on first use; subsequent runs
/// reuse the existing file.
pub async fn ensure_debug_keystore(work_dir: &Path) -> Result<KeystoreConfig> {
    tokio::fs::create_dir_all(work_dir).await?;

    let keystore = KeystoreConfig::debug(work_dir.join("debug.keystore"));
    if keystore.path.is_file() {
        tracing::debug!("Reusing debug keystore at {}", keystore.path.display());
        return Ok(keystore);
    }

    let keystore_path = keystore.path.to_str().ok_or_else(|| {
        DexpackError::Signing("Keystore path is not valid UTF-8".to_string())
    })?;

    let output = Command::new("keytool")
        .args([
            "-genkeypair",
            "-keystore",
            keystore_path,
            "-storepass",
            &keystore.password,
            "-keypass",
            &keystore.password,
            "-alias",
            &keystore.alias,
            "-keyalg",
            "RSA",
            "-keysize",
            "2048",
            "-validity",
            "10000",
            "-dname",
            "CN=Android Debug,O=Android,C=US",
        ])
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| DexpackError::Signing(format!("Failed to run keytool: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(DexpackError::Signing(format!(
            "Failed to generate debug keystore: {}",
            redact_passwords(&stderr)
        )));
    }

    tracing::debug!("Generated debug keystore at {}", keystore.path.display());

    Ok(keystore)
}

/// Builds the `apksigner sign` argument list.
///
/// Key password is assumed equal to the store password, which holds for
/// both the generated debug keystore and PKCS12 stores.
pub fn sign_args(keystore: &KeystoreConfig, input: &Path, out: &Path) -> Vec<String> {
    vec![
        "sign".to_string(),
        "--ks".to_string(),
        keystore.path.display().to_string(),
        "--ks-pass".to_string(),
        format!("pass:{}", keystore.password),
        "--ks-key-alias".to_string(),
        keystore.alias.clone(),
        "--out".to_string(),
        out.display().to_string(),
        input.display().to_string(),
    ]
}

/// Redacts `pass:` password arguments from text destined for logs or errors.
pub fn redact_passwords(text: &str) -> String {
    let re = regex_lite::Regex::new(r"pass:\S+").unwrap_or_else(|_| {
        regex_lite::Regex::new(r"$^").unwrap() // Never matches
    });
    re.replace_all(text, "pass:***").to_string()
}
