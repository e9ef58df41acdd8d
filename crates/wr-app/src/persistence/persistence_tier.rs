//! Capability-ordered fallback chain that turns flushed buffers into numbered parts.
//!
//! 按能力排序的持久化回退链：沙盒文件系统 → 索引存储 → 内存。

use bytes::Bytes;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use wr_core::ids::{PartNumber, SessionId};
use wr_core::ports::{ClockPort, PartStoreError, PartStorePort};
use wr_core::recording::{Part, PartWrite, StorageTier};

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("no persistence session has been started")]
    NoSession,

    #[error("no storage tier is available")]
    NoCapability,

    #[error("every storage tier failed to persist {file_name}: {source}")]
    AllTiersFailed {
        file_name: String,
        #[source]
        source: PartStoreError,
    },

    #[error("part not found: {0}")]
    PartNotFound(String),

    #[error("storage tier {0} is not configured")]
    TierNotConfigured(StorageTier),

    #[error(transparent)]
    Store(#[from] PartStoreError),
}

/// Highest usable tier, resolved once per session by probing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageCapability {
    pub tier: StorageTier,
    position: usize,
}

struct ChainState {
    session_id: Option<SessionId>,
    capability: Option<StorageCapability>,
    saved_count: u32,
}

/// Persistence fallback chain.
///
/// Stores are kept in fallback order. A save starts at the session's resolved tier and
/// walks down on failure for that save only; the next save starts at the resolved tier
/// again.
pub struct PersistenceTier {
    stores: Vec<Arc<dyn PartStorePort>>,
    clock: Arc<dyn ClockPort>,
    state: Mutex<ChainState>,
}

impl PersistenceTier {
    pub fn new(stores: Vec<Arc<dyn PartStorePort>>, clock: Arc<dyn ClockPort>) -> Self {
        Self {
            stores,
            clock,
            state: Mutex::new(ChainState {
                session_id: None,
                capability: None,
                saved_count: 0,
            }),
        }
    }

    /// Reset the part counter and resolve the storage capability for a new session.
    pub async fn begin_session(
        &self,
        session_id: SessionId,
    ) -> Result<StorageCapability, PersistenceError> {
        let mut state = self.state.lock().await;
        state.session_id = Some(session_id.clone());
        state.saved_count = 0;
        state.capability = None;

        for (position, store) in self.stores.iter().enumerate() {
            match store.probe().await {
                Ok(()) => {
                    let capability = StorageCapability {
                        tier: store.tier(),
                        position,
                    };
                    info!(
                        session_id = %session_id,
                        tier = %capability.tier,
                        "Storage capability resolved"
                    );
                    state.capability = Some(capability);
                    return Ok(capability);
                }
                Err(err) => {
                    warn!(tier = %store.tier(), error = %err, "Storage tier unavailable");
                }
            }
        }

        error!(session_id = %session_id, "No storage tier available");
        Err(PersistenceError::NoCapability)
    }

    pub async fn capability(&self) -> Option<StorageCapability> {
        self.state.lock().await.capability
    }

    /// Parts persisted in the current session; the next part is numbered one higher.
    pub async fn saved_count(&self) -> u32 {
        self.state.lock().await.saved_count
    }

    /// Persist one flushed buffer as the next numbered part.
    pub async fn save(
        &self,
        bytes: &[u8],
        extension: &str,
        mime_hint: &str,
    ) -> Result<Part, PersistenceError> {
        let mut state = self.state.lock().await;
        let session_id = state.session_id.clone().ok_or(PersistenceError::NoSession)?;
        let capability = state.capability.ok_or(PersistenceError::NoCapability)?;
        let number = PartNumber::after(state.saved_count);

        let mut last_error = None;
        for store in &self.stores[capability.position..] {
            let write = PartWrite {
                session_id: &session_id,
                number,
                extension,
                mime_hint,
                bytes,
            };
            match store.save(write).await {
                Ok(handle) => {
                    state.saved_count += 1;
                    let part = Part {
                        session_id: session_id.clone(),
                        number,
                        byte_size: bytes.len() as u64,
                        tier: store.tier(),
                        handle,
                        created_at_ms: self.clock.now_ms(),
                    };
                    if part.tier != capability.tier {
                        info!(
                            part = %part.file_name(extension),
                            tier = %part.tier,
                            "Part saved on degraded tier"
                        );
                    } else {
                        debug!(part = %part.file_name(extension), tier = %part.tier, "Part saved");
                    }
                    return Ok(part);
                }
                Err(err) => {
                    warn!(
                        part = %number.file_name(extension),
                        tier = %store.tier(),
                        error = %err,
                        "Part save failed, degrading to next tier"
                    );
                    last_error = Some(err);
                }
            }
        }

        let file_name = number.file_name(extension);
        error!(part = %file_name, "All storage tiers failed, flush lost");
        Err(PersistenceError::AllTiersFailed {
            file_name,
            source: last_error
                .unwrap_or_else(|| PartStoreError::Unavailable("no tier to try".to_string())),
        })
    }

    fn store_for(&self, tier: StorageTier) -> Result<&Arc<dyn PartStorePort>, PersistenceError> {
        self.stores
            .iter()
            .find(|store| store.tier() == tier)
            .ok_or(PersistenceError::TierNotConfigured(tier))
    }

    pub async fn read(&self, part: &Part) -> Result<Bytes, PersistenceError> {
        let store = self.store_for(part.tier)?;
        match store.read(&part.handle).await {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.is_not_found() => Err(PersistenceError::PartNotFound(
                part.number.stem(),
            )),
            Err(err) => Err(err.into()),
        }
    }

    /// Best-effort removal; failures are logged and swallowed.
    pub async fn delete(&self, part: &Part) {
        let result = match self.store_for(part.tier) {
            Ok(store) => store.delete(&part.handle).await.map_err(PersistenceError::from),
            Err(err) => Err(err),
        };
        if let Err(err) = result {
            warn!(part = %part.number, tier = %part.tier, error = %err, "Part cleanup failed");
        }
    }
}
