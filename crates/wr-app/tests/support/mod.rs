//! Hand-written port fakes shared by the integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use std::future::pending;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::{mpsc, Mutex, Semaphore};

use wr_app::{
    CaptureSession, CaptureSessionDeps, PersistenceTier, Reassembler, SessionOptions,
};
use wr_core::events::{FileSaved, RecorderEvent, RecordingComplete, StatusUpdate};
use wr_core::media::{ContainerKind, MediaMetadata};
use wr_core::ports::{
    AcquisitionError, AudioTrackSettings, CaptureDevicePort, CaptureHandle, CaptureRequest,
    ClockPort, EncoderEvent, EncoderOptions, EncoderPort, MediaProbePort, PartStoreError,
    PartStorePort, ProbeError, RecorderEventPort, VideoTrackSettings,
};
use wr_core::recording::{FlushThreshold, PartWrite, SessionSnapshot, StorageTier, TierHandle};
use wr_infra::{MemoryPartStore, StructuralMediaProbe};

pub const MIB: usize = 1024 * 1024;

// ---------------------------------------------------------------------------
// Clock / events
// ---------------------------------------------------------------------------

pub struct FixedClock(pub i64);

impl ClockPort for FixedClock {
    fn now_ms(&self) -> i64 {
        self.0
    }
}

#[derive(Default)]
pub struct RecordingEvents {
    events: StdMutex<Vec<RecorderEvent>>,
}

impl RecordingEvents {
    pub fn all(&self) -> Vec<RecorderEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn file_saved(&self) -> Vec<FileSaved> {
        self.all()
            .into_iter()
            .filter_map(|event| match event {
                RecorderEvent::FileSaved(saved) => Some(saved),
                _ => None,
            })
            .collect()
    }

    pub fn statuses(&self) -> Vec<StatusUpdate> {
        self.all()
            .into_iter()
            .filter_map(|event| match event {
                RecorderEvent::StatusUpdate(update) => Some(update),
                _ => None,
            })
            .collect()
    }

    pub fn completed(&self) -> Vec<RecordingComplete> {
        self.all()
            .into_iter()
            .filter_map(|event| match event {
                RecorderEvent::RecordingComplete(done) => Some(done),
                _ => None,
            })
            .collect()
    }
}

impl RecorderEventPort for RecordingEvents {
    fn emit(&self, event: RecorderEvent) {
        self.events.lock().unwrap().push(event);
    }
}

// ---------------------------------------------------------------------------
// Capture device
// ---------------------------------------------------------------------------

pub struct MockHandle {
    video: VideoTrackSettings,
    stopped: AtomicBool,
}

impl MockHandle {
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CaptureHandle for MockHandle {
    fn video_settings(&self) -> Option<VideoTrackSettings> {
        Some(self.video)
    }

    fn audio_settings(&self) -> Option<AudioTrackSettings> {
        None
    }

    async fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct MockDevice {
    pub deny: bool,
    /// Granted `(width, height)`; the requested size when `None`.
    pub grant: Option<(u32, u32)>,
    pub last_handle: StdMutex<Option<Arc<MockHandle>>>,
}

impl MockDevice {
    pub fn last_handle(&self) -> Option<Arc<MockHandle>> {
        self.last_handle.lock().unwrap().clone()
    }
}

#[async_trait]
impl CaptureDevicePort for MockDevice {
    async fn acquire(
        &self,
        request: &CaptureRequest,
    ) -> Result<Arc<dyn CaptureHandle>, AcquisitionError> {
        if self.deny {
            return Err(AcquisitionError::PermissionDenied("user dismissed".into()));
        }
        let (width, height) = self.grant.unwrap_or((request.width, request.height));
        let handle = Arc::new(MockHandle {
            video: VideoTrackSettings {
                width,
                height,
                frame_rate: f64::from(request.frame_rate),
            },
            stopped: AtomicBool::new(false),
        });
        *self.last_handle.lock().unwrap() = Some(handle.clone());
        Ok(handle)
    }
}

// ---------------------------------------------------------------------------
// Encoder
// ---------------------------------------------------------------------------

/// Encoder driven by the test: fragments are pushed with [`ScriptedEncoder::deliver`].
pub struct ScriptedEncoder {
    container: ContainerKind,
    sender: Mutex<Option<mpsc::Sender<EncoderEvent>>>,
    final_fragment: StdMutex<Option<Bytes>>,
    pub started_with: StdMutex<Option<EncoderOptions>>,
}

impl ScriptedEncoder {
    pub fn new(container: ContainerKind) -> Arc<Self> {
        Arc::new(Self {
            container,
            sender: Mutex::new(None),
            final_fragment: StdMutex::new(None),
            started_with: StdMutex::new(None),
        })
    }

    /// Fragment handed out when the encoder is stopped.
    pub fn set_final_fragment(&self, bytes: &[u8]) {
        *self.final_fragment.lock().unwrap() = Some(Bytes::copy_from_slice(bytes));
    }

    pub async fn deliver(&self, bytes: Vec<u8>) {
        self.send(EncoderEvent::Fragment(Bytes::from(bytes))).await;
    }

    pub async fn report_error(&self, message: &str) {
        self.send(EncoderEvent::Error(message.to_string())).await;
    }

    async fn send(&self, event: EncoderEvent) {
        let tx = self.sender.lock().await.clone().expect("encoder not started");
        tx.send(event).await.expect("pump dropped the receiver");
    }
}

#[async_trait]
impl EncoderPort for ScriptedEncoder {
    fn is_type_supported(&self, mime_type: &str) -> bool {
        ContainerKind::from_mime(mime_type) == self.container
    }

    async fn start(
        &self,
        _handle: Arc<dyn CaptureHandle>,
        options: EncoderOptions,
        _timeslice: Duration,
    ) -> anyhow::Result<mpsc::Receiver<EncoderEvent>> {
        let (tx, rx) = mpsc::channel(16);
        *self.sender.lock().await = Some(tx);
        *self.started_with.lock().unwrap() = Some(options);
        Ok(rx)
    }

    async fn stop(&self) -> anyhow::Result<()> {
        let tx = self.sender.lock().await.take();
        let last = self.final_fragment.lock().unwrap().take();
        if let (Some(tx), Some(bytes)) = (tx, last) {
            tx.send(EncoderEvent::Fragment(bytes)).await?;
        }
        Ok(())
    }
}

/// Encoder that supports no container at all.
pub struct NoCodecEncoder;

#[async_trait]
impl EncoderPort for NoCodecEncoder {
    fn is_type_supported(&self, _mime_type: &str) -> bool {
        false
    }

    async fn start(
        &self,
        _handle: Arc<dyn CaptureHandle>,
        _options: EncoderOptions,
        _timeslice: Duration,
    ) -> anyhow::Result<mpsc::Receiver<EncoderEvent>> {
        anyhow::bail!("no codec")
    }

    async fn stop(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Part stores
// ---------------------------------------------------------------------------

/// Store whose saves always fail; probing succeeds.
pub struct FailingStore(pub StorageTier);

#[async_trait]
impl PartStorePort for FailingStore {
    fn tier(&self) -> StorageTier {
        self.0
    }

    async fn probe(&self) -> Result<(), PartStoreError> {
        Ok(())
    }

    async fn save(&self, _write: PartWrite<'_>) -> Result<TierHandle, PartStoreError> {
        Err(PartStoreError::Storage("disk full".into()))
    }

    async fn read(&self, _handle: &TierHandle) -> Result<Bytes, PartStoreError> {
        Err(PartStoreError::NotFound("never saved".into()))
    }

    async fn delete(&self, _handle: &TierHandle) -> Result<(), PartStoreError> {
        Ok(())
    }
}

/// Memory store whose saves wait for a permit.
pub struct GatedStore {
    inner: MemoryPartStore,
    gate: Semaphore,
    pub waiting: AtomicUsize,
}

impl GatedStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: MemoryPartStore::new(),
            gate: Semaphore::new(0),
            waiting: AtomicUsize::new(0),
        })
    }

    pub fn open(&self, saves: usize) {
        self.gate.add_permits(saves);
    }
}

#[async_trait]
impl PartStorePort for GatedStore {
    fn tier(&self) -> StorageTier {
        StorageTier::Memory
    }

    async fn probe(&self) -> Result<(), PartStoreError> {
        Ok(())
    }

    async fn save(&self, write: PartWrite<'_>) -> Result<TierHandle, PartStoreError> {
        self.waiting.fetch_add(1, Ordering::SeqCst);
        self.gate
            .acquire()
            .await
            .map_err(|_| PartStoreError::Unavailable("gate closed".into()))?
            .forget();
        self.waiting.fetch_sub(1, Ordering::SeqCst);
        self.inner.save(write).await
    }

    async fn read(&self, handle: &TierHandle) -> Result<Bytes, PartStoreError> {
        self.inner.read(handle).await
    }

    async fn delete(&self, handle: &TierHandle) -> Result<(), PartStoreError> {
        self.inner.delete(handle).await
    }
}

// ---------------------------------------------------------------------------
// Media probes
// ---------------------------------------------------------------------------

/// Probe that never answers.
pub struct HangingProbe;

#[async_trait]
impl MediaProbePort for HangingProbe {
    async fn load_metadata(
        &self,
        _bytes: Bytes,
        _container: ContainerKind,
    ) -> Result<MediaMetadata, ProbeError> {
        pending().await
    }
}

/// Probe that rejects everything.
pub struct RejectingProbe;

#[async_trait]
impl MediaProbePort for RejectingProbe {
    async fn load_metadata(
        &self,
        _bytes: Bytes,
        _container: ContainerKind,
    ) -> Result<MediaMetadata, ProbeError> {
        Err(ProbeError::Decode("cannot decode".into()))
    }
}

// ---------------------------------------------------------------------------
// Media fixtures
// ---------------------------------------------------------------------------

fn ebml_element(id: &[u8], payload: &[u8]) -> Vec<u8> {
    assert!(payload.len() < 0x7F, "fixture elements use 1-byte sizes");
    let mut out = id.to_vec();
    out.push(0x80 | payload.len() as u8);
    out.extend_from_slice(payload);
    out
}

/// Single-segment WebM document.
pub fn webm_document(cluster_payload: u8) -> Vec<u8> {
    let mut out = ebml_element(&[0x1A, 0x45, 0xDF, 0xA3], &ebml_element(&[0x42, 0x82], b"webm"));

    let mut video = ebml_element(&[0xB0], &[0x05, 0x00]);
    video.extend(ebml_element(&[0xBA], &[0x02, 0xD0]));
    let tracks = ebml_element(
        &[0x16, 0x54, 0xAE, 0x6B],
        &ebml_element(&[0xAE], &ebml_element(&[0xE0], &video)),
    );
    let cluster = webm_cluster(cluster_payload);

    let mut segment = tracks;
    segment.extend(cluster);
    out.extend(ebml_element(&[0x18, 0x53, 0x80, 0x67], &segment));
    out
}

/// A bare `Cluster` element, as emitted by later encoder timeslices.
pub fn webm_cluster(payload: u8) -> Vec<u8> {
    let mut body = ebml_element(&[0xE7], &[0x00]);
    body.extend(ebml_element(&[0xA3], &[0x81, 0x00, 0x00, 0x80, payload]));
    ebml_element(&[0x1F, 0x43, 0xB6, 0x75], &body)
}

fn mp4_box(kind: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut out = ((payload.len() + 8) as u32).to_be_bytes().to_vec();
    out.extend_from_slice(kind);
    out.extend_from_slice(payload);
    out
}

/// Self-contained fragmented MP4 file.
pub fn mp4_file(payload: u8) -> Vec<u8> {
    let mut mvhd = vec![0u8; 12];
    mvhd.extend_from_slice(&1000u32.to_be_bytes());
    mvhd.extend_from_slice(&1000u32.to_be_bytes());
    mvhd.resize(100, 0);

    let mut out = mp4_box(b"ftyp", b"isomiso6");
    out.extend(mp4_box(b"moov", &mp4_box(b"mvhd", &mvhd)));
    out.extend(mp4_box(b"moof", &[0u8; 8]));
    out.extend(mp4_box(b"mdat", &[payload; 16]));
    out
}

// ---------------------------------------------------------------------------
// Wiring
// ---------------------------------------------------------------------------

pub const CLOCK_MS: i64 = 1_735_689_600_000;

pub fn persistence(stores: Vec<Arc<dyn PartStorePort>>) -> Arc<PersistenceTier> {
    Arc::new(PersistenceTier::new(stores, Arc::new(FixedClock(CLOCK_MS))))
}

pub fn reassembler(
    persistence: Arc<PersistenceTier>,
    probe: Arc<dyn MediaProbePort>,
) -> Arc<Reassembler> {
    Arc::new(Reassembler::new(persistence, probe, Duration::from_millis(200)))
}

pub struct Harness {
    pub session: CaptureSession,
    pub device: Arc<MockDevice>,
    pub encoder: Arc<ScriptedEncoder>,
    pub events: Arc<RecordingEvents>,
    pub persistence: Arc<PersistenceTier>,
}

pub struct HarnessBuilder {
    pub device: MockDevice,
    pub container: ContainerKind,
    pub stores: Vec<Arc<dyn PartStorePort>>,
    pub probe: Arc<dyn MediaProbePort>,
    pub threshold_bytes: u64,
    pub status_tick: Duration,
}

impl HarnessBuilder {
    pub fn new(container: ContainerKind) -> Self {
        Self {
            device: MockDevice::default(),
            container,
            stores: vec![Arc::new(MemoryPartStore::new())],
            probe: Arc::new(StructuralMediaProbe::new()),
            threshold_bytes: 5 * MIB as u64,
            // Keep periodic ticks out of event assertions.
            status_tick: Duration::from_secs(3600),
        }
    }

    pub fn stores(mut self, stores: Vec<Arc<dyn PartStorePort>>) -> Self {
        self.stores = stores;
        self
    }

    pub fn threshold(mut self, bytes: u64) -> Self {
        self.threshold_bytes = bytes;
        self
    }

    pub fn status_tick(mut self, tick: Duration) -> Self {
        self.status_tick = tick;
        self
    }

    pub fn device(mut self, device: MockDevice) -> Self {
        self.device = device;
        self
    }

    pub fn build(self) -> Harness {
        let device = Arc::new(self.device);
        let encoder = ScriptedEncoder::new(self.container);
        let events = Arc::new(RecordingEvents::default());
        let persistence = persistence(self.stores);
        let reassembler = reassembler(persistence.clone(), self.probe);

        let session = CaptureSession::new(
            CaptureSessionDeps {
                device: device.clone(),
                encoder: encoder.clone(),
                persistence: persistence.clone(),
                reassembler,
                events: events.clone(),
                clock: Arc::new(FixedClock(CLOCK_MS)),
            },
            SessionOptions {
                window_name: "demo".to_string(),
                status_tick: self.status_tick,
                ..SessionOptions::default()
            },
            FlushThreshold::new(self.threshold_bytes),
        );

        Harness {
            session,
            device,
            encoder,
            events,
            persistence,
        }
    }
}

/// Poll the session until `condition` holds, failing after a few seconds.
pub async fn wait_for_snapshot(
    session: &CaptureSession,
    condition: impl Fn(&SessionSnapshot) -> bool,
) -> SessionSnapshot {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let snapshot = session.snapshot().await;
            if condition(&snapshot) {
                return snapshot;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await
    .expect("session never reached the expected state")
}
