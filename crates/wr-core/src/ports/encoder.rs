use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use super::CaptureHandle;
use crate::media::MimeType;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderOptions {
    pub mime_type: MimeType,
    pub video_bits_per_second: u32,
    pub audio_bits_per_second: u32,
}

/// Items delivered on the encoder channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncoderEvent {
    /// Data produced for one timeslice. May be empty near session boundaries.
    Fragment(Bytes),
    /// Recoverable encoder failure; already-delivered data stays valid.
    Error(String),
}

/// Media encoder emitting fragments on a fixed interval.
///
/// After [`EncoderPort::stop`] the encoder delivers any final fragment and then drops
/// its sender, which closes the channel returned by [`EncoderPort::start`].
#[async_trait]
pub trait EncoderPort: Send + Sync {
    fn is_type_supported(&self, mime_type: &str) -> bool;

    async fn start(
        &self,
        handle: Arc<dyn CaptureHandle>,
        options: EncoderOptions,
        timeslice: Duration,
    ) -> anyhow::Result<mpsc::Receiver<EncoderEvent>>;

    async fn stop(&self) -> anyhow::Result<()>;
}
