use async_trait::async_trait;
use bytes::Bytes;
use serde::Deserialize;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

use wr_core::media::{ContainerKind, MediaMetadata};
use wr_core::ports::{MediaProbePort, ProbeError};

pub const DEFAULT_FFPROBE_BINARY: &str = "ffprobe";

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    streams: Vec<FfprobeStream>,
    format: Option<FfprobeFormat>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

impl FfprobeOutput {
    fn into_metadata(self) -> MediaMetadata {
        let video = self
            .streams
            .iter()
            .find(|stream| stream.width.is_some() && stream.height.is_some());
        MediaMetadata {
            duration_secs: self
                .format
                .and_then(|format| format.duration)
                .and_then(|raw| raw.parse::<f64>().ok())
                .filter(|secs| secs.is_finite() && *secs > 0.0),
            width: video.and_then(|stream| stream.width),
            height: video.and_then(|stream| stream.height),
        }
    }
}

/// Media probe that pipes the blob into an `ffprobe` child process.
///
/// 通过 ffprobe 子进程加载媒体元数据。超时由调用方控制，drop 时子进程会被终止。
#[derive(Debug, Clone)]
pub struct FfprobeMediaProbe {
    binary: PathBuf,
}

impl FfprobeMediaProbe {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn format_hint(container: ContainerKind) -> &'static str {
        match container {
            ContainerKind::Mp4 => "mov",
            ContainerKind::WebM => "matroska",
        }
    }
}

impl Default for FfprobeMediaProbe {
    fn default() -> Self {
        Self::new(DEFAULT_FFPROBE_BINARY)
    }
}

#[async_trait]
impl MediaProbePort for FfprobeMediaProbe {
    async fn load_metadata(
        &self,
        bytes: Bytes,
        container: ContainerKind,
    ) -> Result<MediaMetadata, ProbeError> {
        let mut child = Command::new(&self.binary)
            .args([
                "-v",
                "error",
                "-f",
                Self::format_hint(container),
                "-show_entries",
                "format=duration:stream=width,height",
                "-of",
                "json",
                "-i",
                "pipe:0",
            ])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| {
                ProbeError::Unavailable(format!("failed to spawn {}: {err}", self.binary.display()))
            })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| ProbeError::Unavailable("ffprobe stdin not captured".to_string()))?;
        let writer = tokio::spawn(async move {
            // ffprobe may stop reading once it has seen enough; a broken pipe is expected.
            if let Err(err) = stdin.write_all(&bytes).await {
                debug!(error = %err, "ffprobe closed stdin early");
            }
            drop(stdin);
        });

        let output = child
            .wait_with_output()
            .await
            .map_err(|err| ProbeError::Unavailable(format!("ffprobe did not finish: {err}")))?;
        writer.abort();

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ProbeError::Decode(stderr.trim().to_string()));
        }

        let parsed: FfprobeOutput = serde_json::from_slice(&output.stdout)
            .map_err(|err| ProbeError::Decode(format!("unreadable ffprobe output: {err}")))?;

        if parsed.streams.is_empty() {
            return Err(ProbeError::Decode("no streams found".to_string()));
        }
        Ok(parsed.into_metadata())
    }
}

/// Whether an `ffprobe` binary can be executed.
pub async fn ffprobe_available(binary: &str) -> bool {
    match Command::new(binary)
        .arg("-version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .status()
        .await
    {
        Ok(status) => status.success(),
        Err(err) => {
            warn!(binary, error = %err, "ffprobe not available");
            false
        }
    }
}
