//! Application directories / 应用目录

use anyhow::Context;
use std::path::{Path, PathBuf};

const APP_DIR_NAME: &str = "webrecorder";

/// Well-known locations under the application data root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    pub app_data_root: PathBuf,
    pub config_path: PathBuf,
    pub logs_dir: PathBuf,
}

impl AppPaths {
    pub fn from_root(root: &Path) -> Self {
        Self {
            app_data_root: root.to_path_buf(),
            config_path: root.join("config.toml"),
            logs_dir: root.join("logs"),
        }
    }

    /// Resolve the per-user data directory (`dirs::data_local_dir()/webrecorder`).
    pub fn resolve() -> anyhow::Result<Self> {
        let base = dirs::data_local_dir().context("Failed to resolve local data directory")?;
        Ok(Self::from_root(&base.join(APP_DIR_NAME)))
    }
}
