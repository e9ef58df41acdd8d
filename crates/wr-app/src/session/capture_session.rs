use anyhow::Context;
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use super::SessionOptions;
use crate::persistence::{PersistenceError, PersistenceTier};
use crate::reassembly::{MergeOutcome, MergeRequest, Reassembler, ReassemblyError};
use wr_core::config::{QualityPreset, QualitySettings};
use wr_core::events::{status, FileSaved, RecorderEvent, RecordingComplete, StatusUpdate};
use wr_core::ids::SessionId;
use wr_core::media::{MimeType, PREFERRED_MIME_TYPES};
use wr_core::ports::{
    CaptureDevicePort, CaptureHandle, CaptureRequest, ClockPort, EncoderEvent, EncoderOptions,
    EncoderPort, RecorderEventPort,
};
use wr_core::recording::{
    ChunkBuffer, DrainedChunks, FlushThreshold, Fragment, Part, Session, SessionEvent,
    SessionSnapshot, SessionState, SessionStateMachine, TransitionError,
};

const MIN_TICK: Duration = Duration::from_millis(1);

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error("no session metadata is available")]
    NoSession,

    #[error(transparent)]
    Reassembly(#[from] ReassemblyError),
}

/// Result of [`CaptureSession::stop`].
#[derive(Debug, Clone)]
pub struct RecordingOutcome {
    pub session_id: SessionId,
    pub final_file_name: String,
    /// `None` when nothing was recorded.
    pub output: Option<MergeOutcome>,
    pub total_files: usize,
    /// All-time recorded bytes.
    pub total_bytes: u64,
    pub duration_ms: Option<i64>,
    /// The encoder reported an error during the session.
    pub errored: bool,
}

impl RecordingOutcome {
    pub fn is_valid(&self) -> bool {
        self.output.as_ref().map_or(true, |output| output.valid)
    }

    pub fn status_message(&self) -> &'static str {
        if self.is_valid() {
            status::COMPLETED
        } else {
            status::COMPLETED_WITH_ISSUES
        }
    }
}

/// Collaborators injected into a [`CaptureSession`].
pub struct CaptureSessionDeps {
    pub device: Arc<dyn CaptureDevicePort>,
    pub encoder: Arc<dyn EncoderPort>,
    pub persistence: Arc<PersistenceTier>,
    pub reassembler: Arc<Reassembler>,
    pub events: Arc<dyn RecorderEventPort>,
    pub clock: Arc<dyn ClockPort>,
}

struct SessionShared {
    state: SessionState,
    session: Option<Session>,
    buffer: ChunkBuffer,
    in_flight: Option<JoinHandle<()>>,
}

impl SessionShared {
    fn apply(&mut self, event: SessionEvent) -> Result<SessionState, TransitionError> {
        let next = SessionStateMachine::transition(self.state, event)?;
        debug!(from = ?self.state, to = ?next, ?event, "Session transition");
        self.state = next;
        Ok(next)
    }

    fn flush_in_flight(&self) -> bool {
        self.in_flight
            .as_ref()
            .is_some_and(|flush| !flush.is_finished())
    }

    fn status_update(&self, status: &str) -> StatusUpdate {
        let (sandbox_files, total_size, saved_files_size) = match &self.session {
            Some(session) => (
                session.parts.len(),
                session.all_time_bytes(),
                session.saved_bytes(),
            ),
            None => (0, 0, 0),
        };
        StatusUpdate {
            status: status.to_string(),
            chunks: self.buffer.fragment_count(),
            size: self.buffer.total_bytes(),
            sandbox_files,
            total_size,
            saved_files_size,
        }
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.state,
            session_id: self.session.as_ref().map(|s| s.session_id.clone()),
            buffered_chunks: self.buffer.fragment_count(),
            buffered_bytes: self.buffer.total_bytes(),
            saved_parts: self.session.as_ref().map_or(0, |s| s.parts.len()),
            saved_bytes: self.session.as_ref().map_or(0, |s| s.saved_bytes()),
            total_bytes: self.session.as_ref().map_or(0, |s| s.all_time_bytes()),
            errored: self.session.as_ref().is_some_and(|s| s.errored),
        }
    }
}

/// State shared between the caller-facing session and its background tasks.
struct SessionCore {
    encoder: Arc<dyn EncoderPort>,
    persistence: Arc<PersistenceTier>,
    events: Arc<dyn RecorderEventPort>,
    threshold: FlushThreshold,
    shared: Mutex<SessionShared>,
}

impl SessionCore {
    fn emit_status(&self, shared: &SessionShared, status: &str) {
        self.events
            .emit(RecorderEvent::StatusUpdate(shared.status_update(status)));
    }

    fn status_for(state: SessionState) -> &'static str {
        match state {
            SessionState::Stopping => status::STOPPING,
            _ => status::RECORDING,
        }
    }

    async fn run_pump(
        self: Arc<Self>,
        mut rx: mpsc::Receiver<EncoderEvent>,
        status_tick: Duration,
    ) {
        let mut ticker = tokio::time::interval(status_tick.max(MIN_TICK));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            tokio::select! {
                biased;
                event = rx.recv() => match event {
                    Some(EncoderEvent::Fragment(bytes)) => self.on_fragment(bytes).await,
                    Some(EncoderEvent::Error(message)) => self.on_encoder_error(message).await,
                    None => break,
                },
                _ = ticker.tick() => self.on_status_tick().await,
            }
        }
        debug!("Fragment channel closed, pump finished");
    }

    async fn on_fragment(self: &Arc<Self>, bytes: Bytes) {
        let mut shared = self.shared.lock().await;
        let fragment = Fragment::new(bytes);
        let size = fragment.len() as u64;
        if !shared.buffer.push(fragment) {
            debug!("Dropped empty fragment");
            return;
        }
        if let Some(session) = shared.session.as_mut() {
            session.record_fragment(size);
        }
        self.emit_status(&shared, Self::status_for(shared.state));

        if !shared.buffer.should_flush(self.threshold.get()) {
            return;
        }
        if shared.flush_in_flight() {
            debug!(
                buffered = shared.buffer.total_bytes(),
                "Flush in flight, still accumulating"
            );
            return;
        }

        let drained = shared.buffer.drain();
        debug!(
            chunks = drained.fragments.len(),
            size = drained.total_bytes,
            "Threshold reached, flushing"
        );
        shared.in_flight = Some(tokio::spawn(Arc::clone(self).flush(drained)));
    }

    async fn on_encoder_error(&self, message: String) {
        error!(error = %message, "Encoder reported an error, session continues");
        let mut shared = self.shared.lock().await;
        if let Some(session) = shared.session.as_mut() {
            session.errored = true;
        }
        self.emit_status(&shared, status::ENCODER_ERROR);
    }

    async fn on_status_tick(&self) {
        let shared = self.shared.lock().await;
        if shared.state == SessionState::Recording && !shared.buffer.is_empty() {
            self.emit_status(&shared, status::RECORDING);
        }
    }

    async fn flush(self: Arc<Self>, drained: DrainedChunks) {
        let size = drained.total_bytes;
        if let Err(err) = self.persist(drained.into_bytes()).await {
            error!(size, error = %err, "Flush lost, session continues");
        }
    }

    /// Save one payload as the next part and publish the result.
    async fn persist(&self, bytes: Bytes) -> Result<Part, PersistenceError> {
        let (extension, mime) = {
            let shared = self.shared.lock().await;
            let session = shared.session.as_ref().ok_or(PersistenceError::NoSession)?;
            (
                session.container().extension(),
                session.mime_type.as_str().to_string(),
            )
        };

        let part = self.persistence.save(&bytes, extension, &mime).await?;

        let mut shared = self.shared.lock().await;
        if let Some(session) = shared.session.as_mut() {
            session.add_part(part.clone());
            let saved = FileSaved {
                file_name: part.file_name(extension),
                size: part.byte_size,
                total_size: session.all_time_bytes(),
                saved_files_size: session.saved_bytes(),
                total_files: session.parts.len(),
            };
            info!(
                file_name = %saved.file_name,
                size = saved.size,
                tier = %part.tier,
                total_files = saved.total_files,
                "Part saved"
            );
            self.events.emit(RecorderEvent::FileSaved(saved));
        }
        self.emit_status(&shared, Self::status_for(shared.state));
        Ok(part)
    }
}

struct RunningCapture {
    handle: Arc<dyn CaptureHandle>,
    pump: JoinHandle<()>,
}

/// One recorder instance: acquires the device, pumps fragments into the buffer, flushes
/// parts through the persistence chain and reassembles them on stop.
///
/// 录制会话：获取设备、接收分片、按阈值刷盘，停止时合并输出。
pub struct CaptureSession {
    core: Arc<SessionCore>,
    device: Arc<dyn CaptureDevicePort>,
    reassembler: Arc<Reassembler>,
    clock: Arc<dyn ClockPort>,
    options: SessionOptions,
    running: Mutex<Option<RunningCapture>>,
}

impl CaptureSession {
    pub fn new(
        deps: CaptureSessionDeps,
        options: SessionOptions,
        threshold: FlushThreshold,
    ) -> Self {
        let CaptureSessionDeps {
            device,
            encoder,
            persistence,
            reassembler,
            events,
            clock,
        } = deps;

        Self {
            core: Arc::new(SessionCore {
                encoder,
                persistence,
                events,
                threshold,
                shared: Mutex::new(SessionShared {
                    state: SessionState::Idle,
                    session: None,
                    buffer: ChunkBuffer::new(),
                    in_flight: None,
                }),
            }),
            device,
            reassembler,
            clock,
            options,
            running: Mutex::new(None),
        }
    }

    /// Shared threshold handle; changes apply from the next fragment on.
    pub fn flush_threshold(&self) -> FlushThreshold {
        self.core.threshold.clone()
    }

    pub async fn state(&self) -> SessionState {
        self.core.shared.lock().await.state
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        self.core.shared.lock().await.snapshot()
    }

    /// Begin a new recording. Returns `false` if anything on the way fails; the device
    /// is released in that case.
    pub async fn start(&self, quality: QualityPreset) -> bool {
        let mut running = self.running.lock().await;
        {
            let mut shared = self.core.shared.lock().await;
            if let Err(err) = shared.apply(SessionEvent::StartRequested) {
                warn!(error = %err, "Start ignored");
                return false;
            }
            shared.session = None;
            shared.buffer = ChunkBuffer::new();
            shared.in_flight = None;
        }

        match self.acquire_and_start(quality).await {
            Ok(capture) => {
                *running = Some(capture);
                true
            }
            Err(err) => {
                error!(
                    quality = %quality,
                    error = %format!("{err:#}"),
                    "Recording failed to start"
                );
                let mut shared = self.core.shared.lock().await;
                if let Err(err) = shared.apply(SessionEvent::AcquisitionFailed) {
                    warn!(error = %err, "Unexpected state after failed start");
                }
                self.core.emit_status(&shared, status::START_FAILED);
                false
            }
        }
    }

    async fn acquire_and_start(&self, quality: QualityPreset) -> anyhow::Result<RunningCapture> {
        let settings = quality.settings();
        let request = CaptureRequest {
            width: settings.width,
            height: settings.height,
            frame_rate: self.options.frame_rate,
            capture_audio: self.options.capture_audio,
        };
        let handle = self
            .device
            .acquire(&request)
            .await
            .context("Failed to acquire capture device")?;

        match self.start_encoder(settings, handle.clone()).await {
            Ok(pump) => Ok(RunningCapture { handle, pump }),
            Err(err) => {
                handle.stop().await;
                Err(err)
            }
        }
    }

    async fn start_encoder(
        &self,
        settings: QualitySettings,
        handle: Arc<dyn CaptureHandle>,
    ) -> anyhow::Result<JoinHandle<()>> {
        if let Some(granted) = handle.video_settings() {
            if granted.width < settings.width || granted.height < settings.height {
                warn!(
                    requested = %format!("{}x{}", settings.width, settings.height),
                    granted = %format!("{}x{}", granted.width, granted.height),
                    "Capture resolution lower than requested"
                );
            }
        }

        let mime_type = PREFERRED_MIME_TYPES
            .iter()
            .copied()
            .find(|candidate| self.core.encoder.is_type_supported(candidate))
            .map(MimeType::from)
            .context("No supported recording container")?;

        let started_at_ms = self.clock.now_ms();
        let session_id = SessionId::from_timestamp_ms(started_at_ms);
        self.core
            .persistence
            .begin_session(session_id.clone())
            .await
            .context("No storage tier available")?;

        let options = EncoderOptions {
            mime_type: mime_type.clone(),
            video_bits_per_second: settings.video_bits_per_second,
            audio_bits_per_second: self.options.audio_bits_per_second,
        };
        let rx = self
            .core
            .encoder
            .start(handle, options, self.options.timeslice)
            .await
            .context("Encoder refused to start")?;

        {
            let mut shared = self.core.shared.lock().await;
            shared.session = Some(Session::new(
                session_id.clone(),
                self.options.window_name.clone(),
                mime_type.clone(),
                started_at_ms,
            ));
            shared.apply(SessionEvent::CaptureLive)?;
        }

        info!(
            session_id = %session_id,
            mime_type = %mime_type,
            quality = settings.label,
            threshold = self.core.threshold.get(),
            "Recording started"
        );
        Ok(tokio::spawn(
            Arc::clone(&self.core).run_pump(rx, self.options.status_tick),
        ))
    }

    /// Stop the encoder and release the device, without touching the fragment state.
    async fn release_capture(&self, capture: RunningCapture) {
        if let Err(err) = self.core.encoder.stop().await {
            warn!(error = %format!("{err:#}"), "Encoder stop failed");
        }
        capture.handle.stop().await;
        if let Err(err) = capture.pump.await {
            warn!(error = %err, "Fragment pump ended abnormally");
        }
    }

    async fn await_in_flight(&self) {
        let in_flight = self.core.shared.lock().await.in_flight.take();
        if let Some(flush) = in_flight {
            if let Err(err) = flush.await {
                warn!(error = %err, "In-flight flush ended abnormally");
            }
        }
    }

    /// Stop recording, flush what is left and reassemble the final file.
    pub async fn stop(&self) -> Result<RecordingOutcome, SessionError> {
        let mut running = self.running.lock().await;
        {
            let mut shared = self.core.shared.lock().await;
            shared.apply(SessionEvent::StopRequested)?;
            self.core.emit_status(&shared, status::STOPPING);
        }

        if let Some(capture) = running.take() {
            self.release_capture(capture).await;
        }
        self.await_in_flight().await;

        let drained = self.core.shared.lock().await.buffer.drain();
        let leftover = if drained.is_empty() {
            None
        } else {
            let bytes = drained.into_bytes();
            match self.core.persist(bytes.clone()).await {
                Ok(_) => None,
                Err(err) => {
                    warn!(
                        size = bytes.len(),
                        error = %err,
                        "Final flush failed, merging from memory"
                    );
                    Some(bytes)
                }
            }
        };

        let request = {
            let mut shared = self.core.shared.lock().await;
            let session = shared.session.as_mut().ok_or(SessionError::NoSession)?;
            session.ended_at_ms = Some(self.clock.now_ms());
            MergeRequest {
                parts: session.parts.clone(),
                leftover,
                container: session.container(),
                file_name: session.final_file_name(),
            }
        };
        let final_file_name = request.file_name.clone();
        let merged = self.reassembler.merge_all(request).await;

        let mut shared = self.core.shared.lock().await;
        shared.apply(SessionEvent::ReassemblyFinished)?;
        let output = match merged {
            Ok(output) => output,
            Err(err) => {
                self.core.emit_status(&shared, status::COMPLETED_WITH_ISSUES);
                return Err(err.into());
            }
        };

        let session = shared.session.as_ref().ok_or(SessionError::NoSession)?;
        let outcome = RecordingOutcome {
            session_id: session.session_id.clone(),
            final_file_name,
            output,
            total_files: session.parts.len(),
            total_bytes: session.all_time_bytes(),
            duration_ms: session.duration_ms(),
            errored: session.errored,
        };

        info!(
            session_id = %outcome.session_id,
            total_files = outcome.total_files,
            total_bytes = outcome.total_bytes,
            valid = outcome.is_valid(),
            "Recording completed"
        );
        self.core.emit_status(&shared, outcome.status_message());
        self.core
            .events
            .emit(RecorderEvent::RecordingComplete(RecordingComplete {
                total_files: outcome.total_files,
                final_file_name: outcome.final_file_name.clone(),
            }));
        Ok(outcome)
    }

    /// Release the device and drop all session state without reassembling.
    /// Persisted parts are deleted.
    pub async fn cleanup(&self) {
        if let Some(capture) = self.running.lock().await.take() {
            self.release_capture(capture).await;
        }
        self.await_in_flight().await;

        let parts = {
            let mut shared = self.core.shared.lock().await;
            if let Err(err) = shared.apply(SessionEvent::Released) {
                warn!(error = %err, "Cleanup from unexpected state");
            }
            shared.buffer.drain();
            shared
                .session
                .take()
                .map(|session| session.parts)
                .unwrap_or_default()
        };
        for part in &parts {
            self.core.persistence.delete(part).await;
        }
        info!(parts = parts.len(), "Session cleaned up");
    }
}
