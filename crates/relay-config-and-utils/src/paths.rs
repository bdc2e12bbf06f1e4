//! File system paths for the relay daemon.

use crate::{CoreError, CoreResult};
use std::path::PathBuf;

/// Manages file system paths for the daemon.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Base directory for runtime files (~/.relay)
    base_dir: PathBuf,
}

impl Paths {
    /// Create a new Paths instance rooted at `~/.relay`.
    pub fn new() -> CoreResult<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| CoreError::Path("Could not determine home directory".to_string()))?;

        Ok(Self {
            base_dir: home.join(".relay"),
        })
    }

    /// Create a new Paths instance with a custom base directory.
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Get the base directory.
    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    /// Get the config file path (`<base>/config.json`).
    pub fn config_file(&self) -> PathBuf {
        self.base_dir.join("config.json")
    }

    /// Get the message database path (`<base>/relay.db`).
    pub fn database_file(&self) -> PathBuf {
        self.base_dir.join("relay.db")
    }

    /// Ensure all required directories exist.
    pub fn ensure_dirs(&self) -> CoreResult<()> {
        std::fs::create_dir_all(&self.base_dir)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_with_base_dir() {
        let paths = Paths::with_base_dir(PathBuf::from("/tmp/relay-test"));
        assert_eq!(paths.base_dir(), &PathBuf::from("/tmp/relay-test"));
        assert_eq!(
            paths.config_file(),
            PathBuf::from("/tmp/relay-test/config.json")
        );
        assert_eq!(
            paths.database_file(),
            PathBuf::from("/tmp/relay-test/relay.db")
        );
    }

    #[test]
    fn test_ensure_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().join("nested").join("base"));
        paths.ensure_dirs().unwrap();
        assert!(paths.base_dir().exists());
    }
}
