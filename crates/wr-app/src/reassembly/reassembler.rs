use bytes::{Bytes, BytesMut};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::repair::{noop_repair, remediation_hint, synthesize_ebml_header};
use crate::persistence::PersistenceTier;
use wr_core::media::{has_ebml_signature, ContainerKind, RepairStrategy};
use wr_core::ports::MediaProbePort;
use wr_core::recording::Part;

#[derive(Debug, Error)]
pub enum ReassemblyError {
    #[error("none of the {attempted} persisted parts could be read")]
    NoReadableParts { attempted: usize },
}

/// Everything needed to produce the final file of one session.
#[derive(Debug, Clone)]
pub struct MergeRequest {
    pub parts: Vec<Part>,
    /// Fragments still buffered at stop time that could not be persisted.
    pub leftover: Option<Bytes>,
    pub container: ContainerKind,
    pub file_name: String,
}

/// Final deliverable of a session.
///
/// 会话最终产物。`valid == false` 时仍可交付，但播放可能有问题。
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub file_name: String,
    pub bytes: Bytes,
    pub container: ContainerKind,
    pub valid: bool,
    /// Repair pass that ran, if any.
    pub repair: Option<RepairStrategy>,
    pub parts_merged: usize,
    pub parts_skipped: usize,
    pub remediation: Option<String>,
}

/// Reads parts back in order and turns them into one deliverable blob.
pub struct Reassembler {
    persistence: Arc<PersistenceTier>,
    probe: Arc<dyn MediaProbePort>,
    validation_timeout: Duration,
}

impl Reassembler {
    pub fn new(
        persistence: Arc<PersistenceTier>,
        probe: Arc<dyn MediaProbePort>,
        validation_timeout: Duration,
    ) -> Self {
        Self {
            persistence,
            probe,
            validation_timeout,
        }
    }

    /// Active metadata load with a bounded wait. Timeouts count as failures.
    async fn metadata_loads(&self, bytes: &Bytes, container: ContainerKind) -> bool {
        match tokio::time::timeout(
            self.validation_timeout,
            self.probe.load_metadata(bytes.clone(), container),
        )
        .await
        {
            Ok(Ok(metadata)) => {
                debug!(?metadata, "Merged media metadata loaded");
                true
            }
            Ok(Err(err)) => {
                debug!(error = %err, "Merged media metadata failed to load");
                false
            }
            Err(_) => {
                warn!(
                    timeout_ms = self.validation_timeout.as_millis() as u64,
                    "Metadata load timed out"
                );
                false
            }
        }
    }

    /// Size, container signature, then an active metadata load.
    pub async fn validate(&self, bytes: &Bytes, container: ContainerKind) -> bool {
        if bytes.is_empty() {
            return false;
        }
        if !container.has_signature(bytes) {
            debug!(%container, "Container signature missing");
            return false;
        }
        self.metadata_loads(bytes, container).await
    }

    /// Read every part concurrently, returning readable payloads in part order.
    async fn read_parts(&self, parts: &[Part]) -> (Vec<Bytes>, usize) {
        let mut ordered: Vec<&Part> = parts.iter().collect();
        ordered.sort_by_key(|part| part.number);

        let results = join_all(ordered.iter().map(|part| self.persistence.read(part))).await;

        let mut units = Vec::with_capacity(results.len());
        let mut skipped = 0;
        for (part, result) in ordered.iter().zip(results) {
            match result {
                Ok(bytes) => units.push(bytes),
                Err(err) => {
                    error!(
                        part = %part.number,
                        tier = %part.tier,
                        error = %err,
                        "Skipping unreadable part"
                    );
                    skipped += 1;
                }
            }
        }
        (units, skipped)
    }

    async fn cleanup(&self, parts: &[Part]) {
        for part in parts {
            self.persistence.delete(part).await;
        }
        debug!(parts = parts.len(), "Part cleanup finished");
    }

    /// Merge all parts plus the leftover into the final blob.
    ///
    /// Returns `Ok(None)` when nothing was recorded. Parts are deleted once the blob has
    /// been produced.
    pub async fn merge_all(
        &self,
        request: MergeRequest,
    ) -> Result<Option<MergeOutcome>, ReassemblyError> {
        let MergeRequest {
            parts,
            leftover,
            container,
            file_name,
        } = request;
        let leftover = leftover.filter(|bytes| !bytes.is_empty());

        if parts.is_empty() && leftover.is_none() {
            info!("Nothing recorded, skipping reassembly");
            return Ok(None);
        }

        let (mut units, parts_skipped) = self.read_parts(&parts).await;
        let parts_merged = units.len();
        units.extend(leftover);

        if units.is_empty() {
            error!(attempted = parts.len(), "No readable parts to merge");
            return Err(ReassemblyError::NoReadableParts {
                attempted: parts.len(),
            });
        }

        let (bytes, valid, repair) = if units.len() == 1 {
            debug!("Single unit, passing bytes through unchanged");
            (units.remove(0), true, None)
        } else {
            let joined = concat(&units);
            info!(
                units = units.len(),
                size = joined.len(),
                %container,
                "Parts concatenated"
            );
            match container.repair_strategy() {
                RepairStrategy::NoOpRepair => self.finish_fragmented(joined, container).await,
                RepairStrategy::HeaderSynthesisRepair => self.finish_segmented(joined).await,
            }
        };

        let valid = valid && parts_skipped == 0;
        let remediation = (!valid).then(|| remediation_hint(&file_name));
        if let Some(hint) = &remediation {
            warn!(file_name = %file_name, hint = %hint, "Merged file may not play correctly");
        }

        let outcome = MergeOutcome {
            file_name,
            bytes,
            container,
            valid,
            repair,
            parts_merged,
            parts_skipped,
            remediation,
        };

        self.cleanup(&parts).await;
        Ok(Some(outcome))
    }

    /// ISO-BMFF: validate, otherwise run the no-op repair and flag the result.
    async fn finish_fragmented(
        &self,
        joined: Bytes,
        container: ContainerKind,
    ) -> (Bytes, bool, Option<RepairStrategy>) {
        if self.validate(&joined, container).await {
            return (joined, true, None);
        }
        warn!("Concatenated MP4 failed validation, running structural repair");
        let repaired = noop_repair(joined, container);
        (repaired, false, Some(RepairStrategy::NoOpRepair))
    }

    /// EBML: metadata load, then header presence, then header synthesis, then raw.
    async fn finish_segmented(&self, joined: Bytes) -> (Bytes, bool, Option<RepairStrategy>) {
        if self.metadata_loads(&joined, ContainerKind::WebM).await {
            return (joined, true, None);
        }
        if has_ebml_signature(&joined) {
            info!("Concatenated WebM keeps its EBML header, accepting as-is");
            return (joined, true, None);
        }
        if let Some(repaired) = synthesize_ebml_header(&joined) {
            warn!("EBML header missing, prepended synthesized header");
            return (repaired, false, Some(RepairStrategy::HeaderSynthesisRepair));
        }
        warn!("Header synthesis could not run, delivering raw bytes");
        (joined, false, None)
    }
}

fn concat(units: &[Bytes]) -> Bytes {
    let total = units.iter().map(Bytes::len).sum();
    let mut out = BytesMut::with_capacity(total);
    for unit in units {
        out.extend_from_slice(unit);
    }
    out.freeze()
}
