//! Throwaway workspaces for tests

use std::path::Path;
use tender_config::Config;

/// A temp directory shaped like a TenderDesk workspace
///
/// Dropped along with everything inside when it goes out of scope.
pub struct TempWorkspace {
    temp: tempfile::TempDir,
}

impl TempWorkspace {
    pub fn new() -> Self {
        let temp = tempfile::tempdir().expect("failed to create temp workspace");
        Self { temp }
    }

    pub fn root(&self) -> &Path {
        self.temp.path()
    }

    /// Load the workspace config (defaults unless `write_config` ran)
    pub fn config(&self) -> Config {
        Config::load(self.root()).expect("failed to load workspace config")
    }

    /// Write a `.tenderdesk/config.toml` with the given contents
    pub fn write_config(&self, contents: &str) {
        let dir = self.root().join(".tenderdesk");
        std::fs::create_dir_all(&dir).expect("failed to create .tenderdesk");
        std::fs::write(dir.join("config.toml"), contents).expect("failed to write config");
    }
}

impl Default for TempWorkspace {
    fn default() -> Self {
        Self::new()
    }
}
