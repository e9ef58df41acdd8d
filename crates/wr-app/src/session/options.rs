use std::time::Duration;

use wr_core::config::{
    RecordingSettings, DEFAULT_AUDIO_BITS_PER_SECOND, DEFAULT_FRAME_RATE, DEFAULT_STATUS_TICK_MS,
    DEFAULT_TIMESLICE_MS, DEFAULT_WINDOW_NAME,
};

/// Per-session knobs that are fixed once a session is constructed.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionOptions {
    pub window_name: String,
    pub timeslice: Duration,
    /// Interval of the periodic status update while data is buffered.
    pub status_tick: Duration,
    pub frame_rate: u32,
    pub audio_bits_per_second: u32,
    pub capture_audio: bool,
}

impl SessionOptions {
    pub fn from_settings(settings: &RecordingSettings) -> Self {
        Self {
            window_name: settings.window_name.clone(),
            timeslice: Duration::from_millis(settings.timeslice_ms),
            status_tick: Duration::from_millis(settings.status_tick_ms),
            frame_rate: settings.frame_rate,
            audio_bits_per_second: settings.audio_bits_per_second,
            capture_audio: true,
        }
    }
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            window_name: DEFAULT_WINDOW_NAME.to_string(),
            timeslice: Duration::from_millis(DEFAULT_TIMESLICE_MS),
            status_tick: Duration::from_millis(DEFAULT_STATUS_TICK_MS),
            frame_rate: DEFAULT_FRAME_RATE,
            audio_bits_per_second: DEFAULT_AUDIO_BITS_PER_SECOND,
            capture_audio: true,
        }
    }
}
