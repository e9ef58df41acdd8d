use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use thiserror::Error;

use crate::recording::{PartWrite, StorageTier, TierHandle};

#[derive(Debug, Error)]
pub enum PartStoreError {
    #[error("part not found: {0}")]
    NotFound(String),

    #[error("storage capability unavailable: {0}")]
    Unavailable(String),

    #[error("handle {0:?} does not belong to this tier")]
    ForeignHandle(TierHandle),

    #[error("failed to allocate {0} bytes")]
    AllocationFailed(u64),

    #[error("storage error: {0}")]
    Storage(String),
}

impl PartStoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, PartStoreError::NotFound(_))
    }
}

/// One storage backend of the persistence fallback chain.
///
/// 持久化回退链中的单个存储层。
#[async_trait]
pub trait PartStorePort: Send + Sync {
    fn tier(&self) -> StorageTier;

    /// Check that the capability exists and is writable.
    async fn probe(&self) -> Result<(), PartStoreError>;

    async fn save(&self, write: PartWrite<'_>) -> Result<TierHandle, PartStoreError>;

    async fn read(&self, handle: &TierHandle) -> Result<Bytes, PartStoreError>;

    async fn delete(&self, handle: &TierHandle) -> Result<(), PartStoreError>;
}

#[async_trait]
impl<T: PartStorePort + ?Sized> PartStorePort for Arc<T> {
    fn tier(&self) -> StorageTier {
        (**self).tier()
    }

    async fn probe(&self) -> Result<(), PartStoreError> {
        (**self).probe().await
    }

    async fn save(&self, write: PartWrite<'_>) -> Result<TierHandle, PartStoreError> {
        (**self).save(write).await
    }

    async fn read(&self, handle: &TierHandle) -> Result<Bytes, PartStoreError> {
        (**self).read(handle).await
    }

    async fn delete(&self, handle: &TierHandle) -> Result<(), PartStoreError> {
        (**self).delete(handle).await
    }
}
