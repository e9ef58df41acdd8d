use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;
use tracing::debug;

use wr_core::ports::{PartStoreError, PartStorePort};
use wr_core::recording::{PartWrite, StorageTier, TierHandle};

#[derive(Default)]
struct Slots {
    parts: HashMap<u64, Bytes>,
    total_bytes: u64,
}

/// Last-resort tier keeping raw parts in process memory.
///
/// 内存存储层，作为最后的回退。
pub struct MemoryPartStore {
    slots: Mutex<Slots>,
    next_slot: AtomicU64,
    capacity_bytes: Option<u64>,
}

impl MemoryPartStore {
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(Slots::default()),
            next_slot: AtomicU64::new(1),
            capacity_bytes: None,
        }
    }

    /// Cap the total retained bytes; saves beyond the cap fail as allocation failures.
    pub fn with_capacity_limit(mut self, capacity_bytes: u64) -> Self {
        self.capacity_bytes = Some(capacity_bytes);
        self
    }

    pub async fn retained_bytes(&self) -> u64 {
        self.slots.lock().await.total_bytes
    }

    fn slot_of(handle: &TierHandle) -> Result<u64, PartStoreError> {
        match handle {
            TierHandle::Memory { slot } => Ok(*slot),
            other => Err(PartStoreError::ForeignHandle(other.clone())),
        }
    }
}

impl Default for MemoryPartStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PartStorePort for MemoryPartStore {
    fn tier(&self) -> StorageTier {
        StorageTier::Memory
    }

    async fn probe(&self) -> Result<(), PartStoreError> {
        Ok(())
    }

    async fn save(&self, write: PartWrite<'_>) -> Result<TierHandle, PartStoreError> {
        let size = write.bytes.len() as u64;
        let mut slots = self.slots.lock().await;

        if let Some(capacity) = self.capacity_bytes {
            if slots.total_bytes.saturating_add(size) > capacity {
                return Err(PartStoreError::AllocationFailed(size));
            }
        }

        let mut data = Vec::new();
        data.try_reserve_exact(write.bytes.len())
            .map_err(|_| PartStoreError::AllocationFailed(size))?;
        data.extend_from_slice(write.bytes);

        let slot = self.next_slot.fetch_add(1, Ordering::Relaxed);
        slots.parts.insert(slot, Bytes::from(data));
        slots.total_bytes += size;

        debug!(slot, file_name = %write.file_name(), size, "Part retained in memory");
        Ok(TierHandle::Memory { slot })
    }

    async fn read(&self, handle: &TierHandle) -> Result<Bytes, PartStoreError> {
        let slot = Self::slot_of(handle)?;
        self.slots
            .lock()
            .await
            .parts
            .get(&slot)
            .cloned()
            .ok_or_else(|| PartStoreError::NotFound(format!("memory slot {slot}")))
    }

    async fn delete(&self, handle: &TierHandle) -> Result<(), PartStoreError> {
        let slot = Self::slot_of(handle)?;
        let mut slots = self.slots.lock().await;
        if let Some(bytes) = slots.parts.remove(&slot) {
            slots.total_bytes = slots.total_bytes.saturating_sub(bytes.len() as u64);
        }
        Ok(())
    }
}
