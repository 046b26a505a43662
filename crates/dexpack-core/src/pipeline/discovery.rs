//! Inter-stage artifact discovery.
//!
//! Stages communicate purely through the filesystem: each stage writes
//! files with a known extension into its output directory and the next
//! stage finds them by recursive glob.

use std::path::{Path, PathBuf};

use crate::error::{DexpackError, Result};

/// Finds all files with the given extension under `dir`, recursively.
///
/// Results are sorted so downstream command lines are deterministic.
pub fn find_by_extension(dir: &Path, ext: &str) -> Result<Vec<PathBuf>> {
    let pattern = format!("{}/**/*.{}", dir.display(), ext);
    let entries = glob::glob(&pattern).map_err(|e| {
        DexpackError::ArtifactDiscovery(format!("invalid glob pattern '{}': {}", pattern, e))
    })?;

    let mut matches: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .filter(|path| path.is_file())
        .collect();
    matches.sort();

    Ok(matches)
}

/// Finds exactly one file with the given extension under `dir`.
///
/// Zero or multiple matches is a reported error, never a silent pick.
pub fn expect_single(dir: &Path, ext: &str, what: &str) -> Result<PathBuf> {
    let mut matches = find_by_extension(dir, ext)?;

    match matches.len() {
        1 => Ok(matches.remove(0)),
        0 => Err(DexpackError::ArtifactDiscovery(format!(
            "expected exactly one {} under {}, found none",
            what,
            dir.display()
        ))),
        n => Err(DexpackError::ArtifactDiscovery(format!(
            "expected exactly one {} under {}, found {}",
            what,
            dir.display(),
            n
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, b"").unwrap();
    }

    #[test]
    fn test_find_by_extension_recursive() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("a.flat"));
        touch(&dir.path().join("sub/b.flat"));
        touch(&dir.path().join("sub/deep/c.flat"));
        touch(&dir.path().join("unrelated.txt"));

        let found = find_by_extension(dir.path(), "flat").unwrap();
        assert_eq!(found.len(), 3);
        assert!(found.iter().all(|p| p.extension().unwrap() == "flat"));
    }

    #[test]
    fn test_find_by_extension_sorted() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("z.class"));
        touch(&dir.path().join("a.class"));
        touch(&dir.path().join("m.class"));

        let found = find_by_extension(dir.path(), "class").unwrap();
        let names: Vec<_> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap())
            .collect();
        assert_eq!(names, vec!["a.class", "m.class", "z.class"]);
    }

    #[test]
    fn test_find_by_extension_empty_dir() {
        let dir = tempfile::tempdir().unwrap();
        let found = find_by_extension(dir.path(), "dex").unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn test_find_by_extension_ignores_directories() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("weird.dex")).unwrap();
        touch(&dir.path().join("real/classes.dex"));

        let found = find_by_extension(dir.path(), "dex").unwrap();
        assert_eq!(found.len(), 1);
        assert!(found[0].ends_with("real/classes.dex"));
    }

    #[test]
    fn test_expect_single_ok() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("gen/org/example/R.java"));

        let found = expect_single(dir.path(), "java", "generated source").unwrap();
        assert!(found.ends_with("R.java"));
    }

    #[test]
    fn test_expect_single_none_fails() {
        let dir = tempfile::tempdir().unwrap();

        let err = expect_single(dir.path(), "java", "generated source").unwrap_err();
        assert!(matches!(err, DexpackError::ArtifactDiscovery(_)));
        assert!(err.to_string().contains("found none"));
    }

    #[test]
    fn test_expect_single_multiple_fails() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("a/R.java"));
        touch(&dir.path().join("b/R.java"));

        let err = expect_single(dir.path(), "java", "generated source").unwrap_err();
        assert!(err.to_string().contains("found 2"));
    }
}
