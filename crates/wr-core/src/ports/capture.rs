use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Resolution/framerate asked of the capture device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureRequest {
    pub width: u32,
    pub height: u32,
    pub frame_rate: u32,
    pub capture_audio: bool,
}

/// Settings actually granted on the video track.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoTrackSettings {
    pub width: u32,
    pub height: u32,
    pub frame_rate: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioTrackSettings {
    pub sample_rate: u32,
    pub channel_count: u16,
}

#[derive(Debug, Error)]
pub enum AcquisitionError {
    #[error("capture permission denied: {0}")]
    PermissionDenied(String),

    #[error("capture device unavailable: {0}")]
    Unavailable(String),
}

/// Live media handle returned by the capture device.
#[async_trait]
pub trait CaptureHandle: Send + Sync {
    fn video_settings(&self) -> Option<VideoTrackSettings>;

    fn audio_settings(&self) -> Option<AudioTrackSettings>;

    /// Stop and release every track. Must be idempotent.
    async fn stop(&self);
}

#[async_trait]
pub trait CaptureDevicePort: Send + Sync {
    async fn acquire(
        &self,
        request: &CaptureRequest,
    ) -> Result<Arc<dyn CaptureHandle>, AcquisitionError>;
}
