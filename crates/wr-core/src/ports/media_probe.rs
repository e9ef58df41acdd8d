use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

use crate::media::{ContainerKind, MediaMetadata};

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("media could not be decoded: {0}")]
    Decode(String),

    #[error("media decoder unavailable: {0}")]
    Unavailable(String),
}

/// Media decoder used purely for validation: can it load duration/dimensions?
///
/// Callers bound the wait themselves; implementations may take arbitrarily long.
#[async_trait]
pub trait MediaProbePort: Send + Sync {
    async fn load_metadata(
        &self,
        bytes: Bytes,
        container: ContainerKind,
    ) -> Result<MediaMetadata, ProbeError>;
}
