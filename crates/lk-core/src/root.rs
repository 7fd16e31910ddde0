//! Log root preparation.

use std::io;
use std::path::Path;

/// Ensure the log root exists, creating missing ancestors.
///
/// Idempotent: an already-present directory is success. Both the writer
/// (at construction) and the deploy-time `prepare` step go through
/// here.
pub fn ensure_root(path: &Path) -> io::Result<()> {
    std::fs::create_dir_all(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_creates_nested_root() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("var").join("log").join("svc");

        ensure_root(&root).unwrap();
        assert!(root.is_dir());
    }

    #[test]
    fn test_existing_root_is_success() {
        let tmp = TempDir::new().unwrap();

        ensure_root(tmp.path()).unwrap();
        ensure_root(tmp.path()).unwrap();
        assert!(tmp.path().is_dir());
    }
}
