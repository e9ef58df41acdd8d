use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tokio::sync::{mpsc, watch, Mutex, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use wr_core::media::ContainerKind;
use wr_core::ports::{
    AcquisitionError, AudioTrackSettings, CaptureDevicePort, CaptureHandle, CaptureRequest,
    EncoderEvent, EncoderOptions, EncoderPort, VideoTrackSettings,
};

const FRAGMENT_CHANNEL_CAPACITY: usize = 64;
const SNIFF_LEN: usize = 16;
const MIN_TIMESLICE: Duration = Duration::from_millis(1);

/// Capture device whose "screen" is a media file on disk.
///
/// The granted resolution is the requested one clamped to the configured display size,
/// which lets callers exercise the lower-resolution warning path.
pub struct ReplayCaptureDevice {
    source: PathBuf,
    display_width: u32,
    display_height: u32,
}

impl ReplayCaptureDevice {
    pub fn new(source: PathBuf) -> Self {
        Self {
            source,
            display_width: u32::MAX,
            display_height: u32::MAX,
        }
    }

    pub fn with_display_size(mut self, width: u32, height: u32) -> Self {
        self.display_width = width;
        self.display_height = height;
        self
    }
}

#[async_trait]
impl CaptureDevicePort for ReplayCaptureDevice {
    async fn acquire(
        &self,
        request: &CaptureRequest,
    ) -> Result<Arc<dyn CaptureHandle>, AcquisitionError> {
        let metadata = tokio::fs::metadata(&self.source).await.map_err(|err| {
            let reason = format!("{}: {err}", self.source.display());
            match err.kind() {
                ErrorKind::PermissionDenied => AcquisitionError::PermissionDenied(reason),
                _ => AcquisitionError::Unavailable(reason),
            }
        })?;
        if !metadata.is_file() {
            return Err(AcquisitionError::Unavailable(format!(
                "{} is not a file",
                self.source.display()
            )));
        }

        let video = VideoTrackSettings {
            width: request.width.min(self.display_width),
            height: request.height.min(self.display_height),
            frame_rate: f64::from(request.frame_rate),
        };
        let audio = request.capture_audio.then_some(AudioTrackSettings {
            sample_rate: 48_000,
            channel_count: 2,
        });

        debug!(source = %self.source.display(), ?video, "Replay capture acquired");
        Ok(Arc::new(ReplayCaptureHandle {
            video,
            audio,
            stopped: AtomicBool::new(false),
        }))
    }
}

pub struct ReplayCaptureHandle {
    video: VideoTrackSettings,
    audio: Option<AudioTrackSettings>,
    stopped: AtomicBool,
}

impl ReplayCaptureHandle {
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CaptureHandle for ReplayCaptureHandle {
    fn video_settings(&self) -> Option<VideoTrackSettings> {
        (!self.is_stopped()).then_some(self.video)
    }

    fn audio_settings(&self) -> Option<AudioTrackSettings> {
        if self.is_stopped() {
            None
        } else {
            self.audio
        }
    }

    async fn stop(&self) {
        if !self.stopped.swap(true, Ordering::SeqCst) {
            debug!("Replay capture tracks released");
        }
    }
}

struct RunningReplay {
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// Encoder that slices the source file into fixed-size fragments, one per timeslice.
///
/// The container is sniffed from the file itself and only matching MIME types are
/// reported as supported.
pub struct ReplayEncoder {
    source: PathBuf,
    container: ContainerKind,
    fragment_bytes: usize,
    exhausted: Arc<Notify>,
    running: Mutex<Option<RunningReplay>>,
}

impl ReplayEncoder {
    pub async fn open(source: PathBuf, fragment_bytes: usize) -> Result<Self> {
        let mut file = File::open(&source)
            .await
            .with_context(|| format!("Failed to open replay source: {}", source.display()))?;
        let mut head = [0u8; SNIFF_LEN];
        let read = file
            .read(&mut head)
            .await
            .with_context(|| format!("Failed to read replay source: {}", source.display()))?;
        let container = ContainerKind::sniff(&head[..read]).with_context(|| {
            format!("Unrecognised container in replay source: {}", source.display())
        })?;

        Ok(Self {
            source,
            container,
            fragment_bytes: fragment_bytes.max(1),
            exhausted: Arc::new(Notify::new()),
            running: Mutex::new(None),
        })
    }

    pub fn container(&self) -> ContainerKind {
        self.container
    }

    /// Notified once the whole source has been delivered.
    pub fn exhausted(&self) -> Arc<Notify> {
        self.exhausted.clone()
    }
}

#[async_trait]
impl EncoderPort for ReplayEncoder {
    fn is_type_supported(&self, mime_type: &str) -> bool {
        ContainerKind::from_mime(mime_type) == self.container
    }

    async fn start(
        &self,
        handle: Arc<dyn CaptureHandle>,
        options: EncoderOptions,
        timeslice: Duration,
    ) -> Result<mpsc::Receiver<EncoderEvent>> {
        let mut running = self.running.lock().await;
        if running.is_some() {
            anyhow::bail!("replay encoder already started");
        }
        if handle.video_settings().is_none() {
            anyhow::bail!("capture handle has no live video track");
        }

        let file = File::open(&self.source)
            .await
            .with_context(|| format!("Failed to open replay source: {}", self.source.display()))?;

        info!(
            mime_type = %options.mime_type.as_str(),
            video_bps = options.video_bits_per_second,
            audio_bps = options.audio_bits_per_second,
            timeslice_ms = timeslice.as_millis() as u64,
            fragment_bytes = self.fragment_bytes,
            "Replay encoder started"
        );

        let (tx, rx) = mpsc::channel(FRAGMENT_CHANNEL_CAPACITY);
        let (stop_tx, stop_rx) = watch::channel(false);
        let task = tokio::spawn(run_replay(
            file,
            tx,
            self.fragment_bytes,
            timeslice,
            stop_rx,
            self.exhausted.clone(),
        ));

        *running = Some(RunningReplay { stop_tx, task });
        Ok(rx)
    }

    async fn stop(&self) -> Result<()> {
        let Some(RunningReplay { stop_tx, task }) = self.running.lock().await.take() else {
            return Ok(());
        };
        // The task may already have exited on a closed channel.
        let _ = stop_tx.send(true);
        task.await.context("Replay encoder task panicked")?;
        debug!("Replay encoder stopped");
        Ok(())
    }
}

async fn read_fragment(file: &mut File, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = file.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

async fn run_replay(
    mut file: File,
    tx: mpsc::Sender<EncoderEvent>,
    fragment_bytes: usize,
    timeslice: Duration,
    mut stop_rx: watch::Receiver<bool>,
    exhausted: Arc<Notify>,
) {
    let mut ticker = tokio::time::interval(timeslice.max(MIN_TIMESLICE));
    let mut buf = vec![0u8; fragment_bytes];
    let mut at_eof = false;

    loop {
        tokio::select! {
            _ = stop_rx.changed() => break,
            _ = ticker.tick(), if !at_eof => {
                match read_fragment(&mut file, &mut buf).await {
                    Ok(0) => {
                        at_eof = true;
                        exhausted.notify_one();
                        debug!("Replay source exhausted");
                    }
                    Ok(n) => {
                        let fragment = Bytes::copy_from_slice(&buf[..n]);
                        if tx.send(EncoderEvent::Fragment(fragment)).await.is_err() {
                            warn!("Fragment receiver dropped, ending replay");
                            break;
                        }
                    }
                    Err(err) => {
                        let _ = tx.send(EncoderEvent::Error(err.to_string())).await;
                        at_eof = true;
                        exhausted.notify_one();
                    }
                }
            }
        }
    }
}
