//! # Configuration Loader / 配置加载器
//!
//! Reads the TOML file and maps it onto [`RecorderConfig`]. A missing file means
//! defaults; a malformed one is an error.
//!
//! 读取 TOML 文件并映射为 [`RecorderConfig`]。文件不存在时使用默认值。

use anyhow::Context;
use std::path::Path;
use tracing::info;
use wr_core::config::RecorderConfig;

/// Load configuration from a TOML file
/// 从 TOML 文件加载配置
///
/// Default paths (sandbox, database, output) are rooted at `base_dir`.
///
/// # Errors / 错误
///
/// Returns error if:
/// - File exists but cannot be read (I/O error)
/// - Content is not valid TOML (parse error)
/// - An enum key holds an unknown value (e.g. `quality = "extreme"`)
pub fn load_config(config_path: &Path, base_dir: &Path) -> anyhow::Result<RecorderConfig> {
    if !config_path.exists() {
        info!(path = %config_path.display(), "Config file not found, using defaults");
        return Ok(RecorderConfig::defaults(base_dir));
    }

    let content = std::fs::read_to_string(config_path)
        .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;
    let toml_value: toml::Value =
        toml::from_str(&content).context("Failed to parse config as TOML")?;
    RecorderConfig::from_toml(&toml_value, base_dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;
    use std::time::Duration;
    use tempfile::{NamedTempFile, TempDir};
    use wr_core::config::{ProbeBackend, QualityPreset};

    fn write_config(content: &str) -> NamedTempFile {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(content.as_bytes()).unwrap();
        temp_file
    }

    /// Test that valid TOML is parsed correctly
    /// 测试有效 TOML 被正确解析
    #[test]
    fn test_load_config_reads_valid_toml() {
        let temp_file = write_config(
            r#"
            [recording]
            flush_threshold_mb = 2.5
            timeslice_ms = 250
            quality = "high"
            window_name = "Demo"

            [storage]
            sandbox_dir = "/tmp/wr/sandbox"
            enable_indexed_store = false

            [validation]
            timeout_secs = 9
            probe = "structural"

            [output]
            output_dir = "/tmp/wr/out"
        "#,
        );

        let config = load_config(temp_file.path(), Path::new("/base")).unwrap();

        assert_eq!(config.recording.flush_threshold_bytes, 2_621_440);
        assert_eq!(config.recording.timeslice_ms, 250);
        assert_eq!(config.recording.quality, QualityPreset::High);
        assert_eq!(config.recording.window_name, "Demo");
        assert_eq!(config.storage.sandbox_dir, PathBuf::from("/tmp/wr/sandbox"));
        assert!(config.storage.enable_sandbox);
        assert!(!config.storage.enable_indexed_store);
        assert_eq!(config.validation.timeout, Duration::from_secs(9));
        assert_eq!(config.validation.probe, ProbeBackend::Structural);
        assert_eq!(config.output_dir, PathBuf::from("/tmp/wr/out"));
    }

    /// 测试缺失的文件使用默认值
    #[test]
    fn test_load_config_defaults_when_file_missing() {
        let dir = TempDir::new().unwrap();
        let config = load_config(&dir.path().join("absent.toml"), dir.path()).unwrap();
        assert_eq!(config, RecorderConfig::defaults(dir.path()));
    }

    #[test]
    fn test_load_config_rejects_malformed_toml() {
        let temp_file = write_config("[recording\nquality = ");
        let err = load_config(temp_file.path(), Path::new("/base")).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config as TOML"));
    }

    #[test]
    fn test_load_config_rejects_unknown_quality() {
        let temp_file = write_config("[recording]\nquality = \"extreme\"\n");
        assert!(load_config(temp_file.path(), Path::new("/base")).is_err());
    }
}
