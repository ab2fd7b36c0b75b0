//! Shared test utilities for imagebot integration tests.

use std::fs;
use std::path::PathBuf;

use tempfile::TempDir;

use imagebot::{Builder, ConfigStore, Orchestrator};

/// Test environment with a temporary definitions file and workdirs.
pub struct TestEnv {
    /// Temporary directory (kept alive for the lifetime of TestEnv)
    pub _temp_dir: TempDir,
    /// Root of the temporary directory
    pub base_dir: PathBuf,
    /// Path of the image definitions file
    pub config_path: PathBuf,
}

impl TestEnv {
    /// Create a test environment holding the given definitions document.
    pub fn new(config: &str) -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let base_dir = temp_dir.path().to_path_buf();
        let config_path = base_dir.join("imagebot.toml");

        fs::write(&config_path, config).expect("failed to write definitions file");

        Self {
            _temp_dir: temp_dir,
            base_dir,
            config_path,
        }
    }

    /// Create a build context directory containing a Dockerfile.
    pub fn workdir(&self, name: &str, dockerfile: &str) -> PathBuf {
        let dir = self.base_dir.join(name);
        fs::create_dir_all(&dir).expect("failed to create workdir");
        fs::write(dir.join("Dockerfile"), dockerfile).expect("failed to write Dockerfile");
        dir
    }

    /// Load an orchestrator over the environment's definitions, with the
    /// build tool replaced by a stub program.
    pub fn orchestrator(&self, tool: &str) -> Orchestrator {
        let store = ConfigStore::load(&self.config_path).expect("failed to load definitions");
        Orchestrator::with_builder(store, Builder::with_tool(tool))
    }

    /// Re-read the definitions file from disk.
    pub fn reload(&self) -> ConfigStore {
        ConfigStore::load(&self.config_path).expect("failed to reload definitions")
    }

    /// Read a file under the environment root.
    pub fn read(&self, rel: &str) -> String {
        fs::read_to_string(self.base_dir.join(rel)).expect("failed to read file")
    }
}
