//! # Dependency Injection / 依赖注入模块
//!
//! The only place that depends on `wr-infra` and `wr-app` at the same time. It builds
//! the adapters from [`RecorderConfig`] and hands them to the use cases through ports.
//!
//! 仅负责"组装"，不做业务决策。

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};
use wr_app::{CaptureSession, CaptureSessionDeps, PersistenceTier, Reassembler, SessionOptions};
use wr_core::config::{ProbeBackend, RecorderConfig, StorageSettings};
use wr_core::events::RecorderEvent;
use wr_core::ports::{ClockPort, MediaProbePort, PartStorePort, RecorderEventPort};
use wr_core::recording::FlushThreshold;
use wr_core::ContainerKind;
use wr_infra::db::{init_db_pool, DieselSqliteExecutor};
use wr_infra::media::{ffprobe_available, DEFAULT_FFPROBE_BINARY};
use wr_infra::{
    DieselIndexedPartStore, FfprobeMediaProbe, FsPartStore, MemoryPartStore, ReplayCaptureDevice,
    ReplayEncoder, StructuralMediaProbe, SystemClock,
};

/// Result type for wiring operations
pub type WiringResult<T> = Result<T, WiringError>;

/// Errors during dependency injection
/// 依赖注入错误（基础设施初始化失败）
#[derive(Debug, thiserror::Error)]
pub enum WiringError {
    #[error("Replay source initialization failed: {0}")]
    ReplaySource(String),
}

/// Build the storage tiers in fallback order: sandbox, indexed store, memory.
///
/// A tier that cannot even be constructed is left out; the rest are probed per session.
pub fn build_part_stores(storage: &StorageSettings) -> Vec<Arc<dyn PartStorePort>> {
    let mut stores: Vec<Arc<dyn PartStorePort>> = Vec::new();

    if storage.enable_sandbox {
        stores.push(Arc::new(FsPartStore::new(storage.sandbox_dir.clone())));
    }

    if storage.enable_indexed_store {
        match open_indexed_store(&storage.database_path) {
            Ok(store) => stores.push(Arc::new(store)),
            Err(err) => {
                warn!(
                    path = %storage.database_path.display(),
                    error = %err,
                    "Indexed part store disabled"
                );
            }
        }
    }

    stores.push(Arc::new(MemoryPartStore::new()));
    stores
}

fn open_indexed_store(database_path: &Path) -> anyhow::Result<DieselIndexedPartStore> {
    if let Some(parent) = database_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let pool = init_db_pool(&database_path.to_string_lossy())?;
    Ok(DieselIndexedPartStore::new(DieselSqliteExecutor::new(pool)))
}

/// Select the validation decoder.
///
/// `Auto` uses `ffprobe` when it answers `-version`, structural parsing otherwise.
pub async fn build_media_probe(backend: ProbeBackend) -> Arc<dyn MediaProbePort> {
    let use_ffprobe = match backend {
        ProbeBackend::Ffprobe => true,
        ProbeBackend::Structural => false,
        ProbeBackend::Auto => ffprobe_available(DEFAULT_FFPROBE_BINARY).await,
    };

    if use_ffprobe {
        info!("Validating with ffprobe");
        Arc::new(FfprobeMediaProbe::default())
    } else {
        info!("Validating with structural parser");
        Arc::new(StructuralMediaProbe::new())
    }
}

/// Event sink that records every session event as a structured log line.
#[derive(Debug, Default)]
pub struct TracingEventSink;

impl RecorderEventPort for TracingEventSink {
    fn emit(&self, event: RecorderEvent) {
        match event {
            RecorderEvent::StatusUpdate(update) => info!(
                status = %update.status,
                chunks = update.chunks,
                size = update.size,
                sandbox_files = update.sandbox_files,
                total_size = update.total_size,
                "Recording status"
            ),
            RecorderEvent::FileSaved(saved) => info!(
                file_name = %saved.file_name,
                size = saved.size,
                total_files = saved.total_files,
                saved_files_size = saved.saved_files_size,
                "Part saved"
            ),
            RecorderEvent::RecordingComplete(complete) => info!(
                total_files = complete.total_files,
                final_file_name = %complete.final_file_name,
                "Recording complete"
            ),
        }
    }
}

/// A persistence chain plus the reassembler that reads from it.
pub struct Pipeline {
    pub persistence: Arc<PersistenceTier>,
    pub reassembler: Arc<Reassembler>,
    pub clock: Arc<dyn ClockPort>,
}

/// Wire the persistence chain and reassembler over `stores`.
pub async fn build_pipeline(
    config: &RecorderConfig,
    stores: Vec<Arc<dyn PartStorePort>>,
) -> Pipeline {
    let clock: Arc<dyn ClockPort> = Arc::new(SystemClock);
    let persistence = Arc::new(PersistenceTier::new(stores, clock.clone()));
    let probe = build_media_probe(config.validation.probe).await;
    let reassembler = Arc::new(Reassembler::new(
        persistence.clone(),
        probe,
        config.validation.timeout,
    ));
    Pipeline {
        persistence,
        reassembler,
        clock,
    }
}

/// A capture session fed by a replayed media file.
pub struct ReplayRecorder {
    pub session: CaptureSession,
    pub container: ContainerKind,
    /// Notified once the replayed file has been fully delivered.
    pub exhausted: Arc<tokio::sync::Notify>,
}

/// Wire a full recording pipeline around a replayed source file.
pub async fn wire_replay_recorder(
    config: &RecorderConfig,
    source: PathBuf,
    fragment_bytes: usize,
) -> WiringResult<ReplayRecorder> {
    let encoder = ReplayEncoder::open(source.clone(), fragment_bytes)
        .await
        .map_err(|err| WiringError::ReplaySource(format!("{err:#}")))?;
    let container = encoder.container();
    let exhausted = encoder.exhausted();

    let pipeline = build_pipeline(config, build_part_stores(&config.storage)).await;
    let deps = CaptureSessionDeps {
        device: Arc::new(ReplayCaptureDevice::new(source)),
        encoder: Arc::new(encoder),
        persistence: pipeline.persistence,
        reassembler: pipeline.reassembler,
        events: Arc::new(TracingEventSink),
        clock: pipeline.clock,
    };

    let session = CaptureSession::new(
        deps,
        SessionOptions::from_settings(&config.recording),
        FlushThreshold::new(config.recording.flush_threshold_bytes),
    );

    Ok(ReplayRecorder {
        session,
        container,
        exhausted,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use wr_core::recording::StorageTier;

    fn storage(dir: &Path) -> StorageSettings {
        RecorderConfig::defaults(dir).storage
    }

    #[test]
    fn all_tiers_in_fallback_order() {
        let dir = TempDir::new().unwrap();
        let tiers: Vec<StorageTier> = build_part_stores(&storage(dir.path()))
            .iter()
            .map(|store| store.tier())
            .collect();
        assert_eq!(
            tiers,
            vec![StorageTier::SandboxedFs, StorageTier::IndexedStore, StorageTier::Memory]
        );
    }

    #[test]
    fn disabled_tiers_are_skipped_but_memory_remains() {
        let dir = TempDir::new().unwrap();
        let mut settings = storage(dir.path());
        settings.enable_sandbox = false;
        settings.enable_indexed_store = false;

        let stores = build_part_stores(&settings);
        assert_eq!(stores.len(), 1);
        assert_eq!(stores[0].tier(), StorageTier::Memory);
    }

    #[test]
    fn unopenable_database_drops_the_indexed_tier() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"file").unwrap();

        let mut settings = storage(dir.path());
        settings.database_path = blocker.join("parts.sqlite3");

        let tiers: Vec<StorageTier> = build_part_stores(&settings)
            .iter()
            .map(|store| store.tier())
            .collect();
        assert_eq!(tiers, vec![StorageTier::SandboxedFs, StorageTier::Memory]);
    }
}
