use serde::{Deserialize, Serialize};

/// Capture quality preset.
///
/// 录制质量预设。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityPreset {
    Low,
    #[default]
    Medium,
    High,
    Ultra,
}

/// Resolution and video bitrate requested for a preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QualitySettings {
    pub width: u32,
    pub height: u32,
    pub video_bits_per_second: u32,
    pub label: &'static str,
}

impl QualityPreset {
    pub const ALL: [QualityPreset; 4] = [
        QualityPreset::Low,
        QualityPreset::Medium,
        QualityPreset::High,
        QualityPreset::Ultra,
    ];

    pub fn settings(&self) -> QualitySettings {
        match self {
            QualityPreset::Low => QualitySettings {
                width: 854,
                height: 480,
                video_bits_per_second: 1_000_000,
                label: "480p",
            },
            QualityPreset::Medium => QualitySettings {
                width: 1280,
                height: 720,
                video_bits_per_second: 2_500_000,
                label: "720p",
            },
            QualityPreset::High => QualitySettings {
                width: 1920,
                height: 1080,
                video_bits_per_second: 5_000_000,
                label: "1080p",
            },
            QualityPreset::Ultra => QualitySettings {
                width: 3840,
                height: 2160,
                video_bits_per_second: 20_000_000,
                label: "4K",
            },
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QualityPreset::Low => "low",
            QualityPreset::Medium => "medium",
            QualityPreset::High => "high",
            QualityPreset::Ultra => "ultra",
        }
    }
}

impl std::fmt::Display for QualityPreset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for QualityPreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        QualityPreset::ALL
            .into_iter()
            .find(|preset| preset.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("invalid quality preset: {s}"))
    }
}

/// One entry of the quality picker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QualityOption {
    pub value: QualityPreset,
    pub label: &'static str,
    pub resolution: String,
    pub bitrate: u32,
}

pub fn available_quality_options() -> Vec<QualityOption> {
    QualityPreset::ALL
        .into_iter()
        .map(|preset| {
            let settings = preset.settings();
            QualityOption {
                value: preset,
                label: settings.label,
                resolution: format!("{}x{}", settings.width, settings.height),
                bitrate: settings.video_bits_per_second,
            }
        })
        .collect()
}
