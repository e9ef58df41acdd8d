//! # Recorder configuration / 录制配置
//!
//! Configuration data structures and the TOML → DTO mapping. Missing keys fall back to
//! the documented defaults; values are not validated here.

mod quality;

pub use quality::{available_quality_options, QualityOption, QualityPreset, QualitySettings};

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::recording::{mib_to_bytes, DEFAULT_FLUSH_THRESHOLD_BYTES};

/// Default encoder timeslice: one fragment per second.
pub const DEFAULT_TIMESLICE_MS: u64 = 1_000;
/// Default interval of the periodic status update while data is buffered.
pub const DEFAULT_STATUS_TICK_MS: u64 = 500;
/// Default bounded wait for the active validation pass.
pub const DEFAULT_VALIDATION_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_AUDIO_BITS_PER_SECOND: u32 = 128_000;
pub const DEFAULT_FRAME_RATE: u32 = 30;
pub const DEFAULT_WINDOW_NAME: &str = "webrecorder";

const SANDBOX_DIR_NAME: &str = "sandbox";
const DATABASE_FILE_NAME: &str = "parts.sqlite3";
const OUTPUT_DIR_NAME: &str = "recordings";

/// Which media decoder backs validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProbeBackend {
    /// `ffprobe` when installed, structural parsing otherwise.
    #[default]
    Auto,
    Ffprobe,
    Structural,
}

impl std::str::FromStr for ProbeBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(ProbeBackend::Auto),
            "ffprobe" => Ok(ProbeBackend::Ffprobe),
            "structural" => Ok(ProbeBackend::Structural),
            other => Err(format!("invalid probe backend: {other}")),
        }
    }
}

/// Capture-side settings.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingSettings {
    pub flush_threshold_bytes: u64,
    pub timeslice_ms: u64,
    pub status_tick_ms: u64,
    pub quality: QualityPreset,
    pub frame_rate: u32,
    pub audio_bits_per_second: u32,
    pub window_name: String,
}

/// Persistence tier settings.
#[derive(Debug, Clone, PartialEq)]
pub struct StorageSettings {
    pub sandbox_dir: PathBuf,
    pub database_path: PathBuf,
    pub enable_sandbox: bool,
    pub enable_indexed_store: bool,
}

/// Reassembly validation settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationSettings {
    pub timeout: Duration,
    pub probe: ProbeBackend,
}

/// Recorder configuration DTO.
///
/// 录制器配置 DTO。
#[derive(Debug, Clone, PartialEq)]
pub struct RecorderConfig {
    pub recording: RecordingSettings,
    pub storage: StorageSettings,
    pub validation: ValidationSettings,
    pub output_dir: PathBuf,
}

impl RecorderConfig {
    /// Defaults with every path placed under `base_dir`.
    /// 所有路径位于 `base_dir` 下的默认配置。
    pub fn defaults(base_dir: &Path) -> Self {
        Self {
            recording: RecordingSettings {
                flush_threshold_bytes: DEFAULT_FLUSH_THRESHOLD_BYTES,
                timeslice_ms: DEFAULT_TIMESLICE_MS,
                status_tick_ms: DEFAULT_STATUS_TICK_MS,
                quality: QualityPreset::default(),
                frame_rate: DEFAULT_FRAME_RATE,
                audio_bits_per_second: DEFAULT_AUDIO_BITS_PER_SECOND,
                window_name: DEFAULT_WINDOW_NAME.to_string(),
            },
            storage: StorageSettings {
                sandbox_dir: base_dir.join(SANDBOX_DIR_NAME),
                database_path: base_dir.join(DATABASE_FILE_NAME),
                enable_sandbox: true,
                enable_indexed_store: true,
            },
            validation: ValidationSettings {
                timeout: DEFAULT_VALIDATION_TIMEOUT,
                probe: ProbeBackend::Auto,
            },
            output_dir: base_dir.join(OUTPUT_DIR_NAME),
        }
    }

    /// Map a parsed TOML document onto the defaults rooted at `base_dir`.
    /// 将 TOML 文档映射到以 `base_dir` 为根的默认配置之上。
    ///
    /// Only type mismatches on recognised enum keys are errors; unknown keys are ignored.
    pub fn from_toml(toml_value: &toml::Value, base_dir: &Path) -> anyhow::Result<Self> {
        let mut config = Self::defaults(base_dir);

        let recording = toml_value.get("recording");
        if let Some(mib) = float_at(recording, "flush_threshold_mb") {
            config.recording.flush_threshold_bytes = mib_to_bytes(mib);
        }
        if let Some(ms) = int_at(recording, "timeslice_ms") {
            config.recording.timeslice_ms = ms.max(1) as u64;
        }
        if let Some(ms) = int_at(recording, "status_tick_ms") {
            config.recording.status_tick_ms = ms.max(0) as u64;
        }
        if let Some(quality) = str_at(recording, "quality") {
            config.recording.quality = quality.parse().map_err(anyhow::Error::msg)?;
        }
        if let Some(fps) = int_at(recording, "frame_rate") {
            config.recording.frame_rate = fps.max(1) as u32;
        }
        if let Some(bps) = int_at(recording, "audio_bits_per_second") {
            config.recording.audio_bits_per_second = bps.max(0) as u32;
        }
        if let Some(name) = str_at(recording, "window_name") {
            config.recording.window_name = name.to_string();
        }

        let storage = toml_value.get("storage");
        if let Some(dir) = str_at(storage, "sandbox_dir") {
            config.storage.sandbox_dir = PathBuf::from(dir);
        }
        if let Some(path) = str_at(storage, "database_path") {
            config.storage.database_path = PathBuf::from(path);
        }
        if let Some(enabled) = bool_at(storage, "enable_sandbox") {
            config.storage.enable_sandbox = enabled;
        }
        if let Some(enabled) = bool_at(storage, "enable_indexed_store") {
            config.storage.enable_indexed_store = enabled;
        }

        let validation = toml_value.get("validation");
        if let Some(secs) = float_at(validation, "timeout_secs") {
            if secs.is_finite() && secs > 0.0 {
                config.validation.timeout = Duration::from_secs_f64(secs);
            }
        }
        if let Some(probe) = str_at(validation, "probe") {
            config.validation.probe = probe.parse().map_err(anyhow::Error::msg)?;
        }

        if let Some(dir) = str_at(toml_value.get("output"), "output_dir") {
            config.output_dir = PathBuf::from(dir);
        }

        Ok(config)
    }
}

fn str_at<'a>(section: Option<&'a toml::Value>, key: &str) -> Option<&'a str> {
    section.and_then(|s| s.get(key)).and_then(|v| v.as_str())
}

fn int_at(section: Option<&toml::Value>, key: &str) -> Option<i64> {
    section.and_then(|s| s.get(key)).and_then(|v| v.as_integer())
}

fn bool_at(section: Option<&toml::Value>, key: &str) -> Option<bool> {
    section.and_then(|s| s.get(key)).and_then(|v| v.as_bool())
}

/// Accepts both `5` and `5.0`.
fn float_at(section: Option<&toml::Value>, key: &str) -> Option<f64> {
    let value = section.and_then(|s| s.get(key))?;
    value.as_float().or_else(|| value.as_integer().map(|i| i as f64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_live_under_base_dir() {
        let config = RecorderConfig::defaults(Path::new("/data/wr"));
        assert_eq!(config.storage.sandbox_dir, PathBuf::from("/data/wr/sandbox"));
        assert_eq!(
            config.storage.database_path,
            PathBuf::from("/data/wr/parts.sqlite3")
        );
        assert_eq!(config.recording.flush_threshold_bytes, 5 * 1024 * 1024);
        assert_eq!(config.validation.timeout, Duration::from_secs(5));
    }

    #[test]
    fn toml_overrides_defaults() {
        let value: toml::Value = toml::from_str(
            r#"
            [recording]
            flush_threshold_mb = 2.5
            timeslice_ms = 250
            quality = "high"
            window_name = "Slides"

            [storage]
            enable_sandbox = false
            database_path = "/tmp/parts.db"

            [validation]
            timeout_secs = 2
            probe = "structural"
            "#,
        )
        .expect("valid toml");

        let config = RecorderConfig::from_toml(&value, Path::new("/base")).expect("mapped");
        assert_eq!(config.recording.flush_threshold_bytes, 2_621_440);
        assert_eq!(config.recording.timeslice_ms, 250);
        assert_eq!(config.recording.quality, QualityPreset::High);
        assert_eq!(config.recording.window_name, "Slides");
        assert!(!config.storage.enable_sandbox);
        assert!(config.storage.enable_indexed_store);
        assert_eq!(config.storage.database_path, PathBuf::from("/tmp/parts.db"));
        assert_eq!(config.validation.timeout, Duration::from_secs(2));
        assert_eq!(config.validation.probe, ProbeBackend::Structural);
        assert_eq!(config.output_dir, PathBuf::from("/base/recordings"));
    }

    #[test]
    fn rejects_unknown_quality() {
        let value: toml::Value = toml::from_str("[recording]\nquality = \"8k\"").expect("toml");
        assert!(RecorderConfig::from_toml(&value, Path::new("/base")).is_err());
    }
}
