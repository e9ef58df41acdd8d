use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;

use super::{ebml, isobmff};
use wr_core::media::{ContainerKind, MediaMetadata};
use wr_core::ports::{MediaProbePort, ProbeError};

/// Pure-Rust container parser standing in for a media decoder.
///
/// Loading "succeeds" when the container structure is coherent enough for a player to
/// read duration and dimensions: a single EBML document for WebM, a box tree with
/// `ftyp` + `moov` for MP4.
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuralMediaProbe;

impl StructuralMediaProbe {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MediaProbePort for StructuralMediaProbe {
    async fn load_metadata(
        &self,
        bytes: Bytes,
        container: ContainerKind,
    ) -> Result<MediaMetadata, ProbeError> {
        let parsed = tokio::task::spawn_blocking(move || match container {
            ContainerKind::Mp4 => isobmff::inspect(&bytes),
            ContainerKind::WebM => ebml::inspect(&bytes),
        })
        .await
        .map_err(|err| ProbeError::Unavailable(format!("probe task failed: {err}")))?;

        match parsed {
            Ok(metadata) => {
                debug!(%container, ?metadata, "Structural probe loaded metadata");
                Ok(metadata)
            }
            Err(reason) => Err(ProbeError::Decode(reason)),
        }
    }
}
