//! CLI command handlers / 命令处理
//!
//! Each handler owns one use case end to end: wire, run, write the result.

use anyhow::{bail, Context};
use bytes::Bytes;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::bootstrap::wiring::{build_pipeline, wire_replay_recorder};
use wr_app::{MergeOutcome, MergeRequest, RecordingOutcome};
use wr_core::config::{available_quality_options, QualityOption, QualityPreset, RecorderConfig};
use wr_core::ids::SessionId;
use wr_core::ports::{ClockPort, PartStorePort};
use wr_core::recording::final_file_name;
use wr_core::ContainerKind;
use wr_infra::MemoryPartStore;

pub const DEFAULT_FRAGMENT_BYTES: usize = 64 * 1024;

/// Replay `input` through capture, chunked persistence and reassembly.
///
/// Stops when the source is exhausted or on Ctrl-C. Returns the outcome and the path
/// of the written file, if anything was recorded.
pub async fn record(
    config: &RecorderConfig,
    input: PathBuf,
    quality: QualityPreset,
    fragment_bytes: usize,
) -> anyhow::Result<(RecordingOutcome, Option<PathBuf>)> {
    let recorder = wire_replay_recorder(config, input.clone(), fragment_bytes).await?;
    info!(
        input = %input.display(),
        container = %recorder.container,
        quality = quality.as_str(),
        "Replaying source"
    );

    if !recorder.session.start(quality).await {
        recorder.session.cleanup().await;
        bail!("Recording failed to start");
    }

    tokio::select! {
        _ = recorder.exhausted.notified() => info!("Source fully delivered"),
        signal = tokio::signal::ctrl_c() => {
            if let Err(err) = signal {
                warn!(error = %err, "Failed to listen for Ctrl-C");
            } else {
                info!("Interrupted, stopping recording");
            }
        }
    }

    let outcome = recorder.session.stop().await?;
    let written = match &outcome.output {
        Some(output) => Some(write_output(&config.output_dir, output).await?),
        None => {
            warn!("Nothing was recorded");
            None
        }
    };
    Ok((outcome, written))
}

/// Reassemble existing part files, in the order given.
pub async fn merge(
    config: &RecorderConfig,
    part_files: &[PathBuf],
    container: Option<ContainerKind>,
) -> anyhow::Result<Option<(MergeOutcome, PathBuf)>> {
    let mut payloads = Vec::with_capacity(part_files.len());
    for path in part_files {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read part file: {}", path.display()))?;
        payloads.push(bytes);
    }

    let container = match container {
        Some(container) => container,
        None => payloads
            .first()
            .and_then(|first| ContainerKind::sniff(first))
            .context("Cannot detect container, pass --container")?,
    };

    let stores: Vec<Arc<dyn PartStorePort>> = vec![Arc::new(MemoryPartStore::new())];
    let pipeline = build_pipeline(config, stores).await;
    let session_id = SessionId::from_timestamp_ms(pipeline.clock.now_ms());
    pipeline.persistence.begin_session(session_id.clone()).await?;

    let mut parts = Vec::with_capacity(payloads.len());
    for payload in payloads {
        let part = pipeline
            .persistence
            .save(&payload, container.extension(), container.default_mime().as_str())
            .await?;
        parts.push(part);
    }

    let request = MergeRequest {
        parts,
        leftover: None,
        container,
        file_name: final_file_name(&config.recording.window_name, &session_id, container),
    };
    let Some(output) = pipeline.reassembler.merge_all(request).await? else {
        return Ok(None);
    };
    let path = write_output(&config.output_dir, &output).await?;
    Ok(Some((output, path)))
}

/// Run the validation pass over a single file.
pub async fn validate(
    config: &RecorderConfig,
    file: &Path,
    container: Option<ContainerKind>,
) -> anyhow::Result<(ContainerKind, bool)> {
    let bytes = Bytes::from(
        tokio::fs::read(file)
            .await
            .with_context(|| format!("Failed to read media file: {}", file.display()))?,
    );
    let container = container
        .or_else(|| ContainerKind::sniff(&bytes))
        .context("Cannot detect container, pass --container")?;

    let pipeline = build_pipeline(config, Vec::new()).await;
    let valid = pipeline.reassembler.validate(&bytes, container).await;
    Ok((container, valid))
}

pub fn qualities() -> Vec<QualityOption> {
    available_quality_options()
}

async fn write_output(output_dir: &Path, output: &MergeOutcome) -> anyhow::Result<PathBuf> {
    tokio::fs::create_dir_all(output_dir)
        .await
        .with_context(|| format!("Failed to create output dir: {}", output_dir.display()))?;
    let path = output_dir.join(&output.file_name);
    tokio::fs::write(&path, &output.bytes)
        .await
        .with_context(|| format!("Failed to write output file: {}", path.display()))?;
    info!(
        path = %path.display(),
        size = output.bytes.len(),
        valid = output.valid,
        "Output written"
    );
    Ok(path)
}
