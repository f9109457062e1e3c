use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const AQ_DIR: &str = ".aq";
pub const CONFIG_FILE: &str = ".aq/config.yaml";
pub const STORE_FILE: &str = ".aq/queue.db";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn aq_dir(root: &Path) -> PathBuf {
    root.join(AQ_DIR)
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

/// Resolve a configured store path. Relative paths are taken from `root`.
pub fn store_path(root: &Path, configured: &str) -> PathBuf {
    let path = Path::new(configured);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_store_paths_live_under_root() {
        let root = Path::new("/tmp/project");
        assert_eq!(
            store_path(root, STORE_FILE),
            PathBuf::from("/tmp/project/.aq/queue.db")
        );
        assert_eq!(
            store_path(root, "/var/lib/aq.db"),
            PathBuf::from("/var/lib/aq.db")
        );
        assert_eq!(config_path(root), PathBuf::from("/tmp/project/.aq/config.yaml"));
    }
}
