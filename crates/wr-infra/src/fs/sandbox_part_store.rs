use anyhow::Context;
use async_trait::async_trait;
use bytes::Bytes;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

use wr_core::ports::{PartStoreError, PartStorePort};
use wr_core::recording::{PartWrite, StorageTier, TierHandle};

const PROBE_FILE_NAME: &str = ".probe";

/// Sandboxed filesystem tier: `<root>/<session_id>/partNNN.<ext>`.
///
/// 沙盒文件系统存储层，每个会话一个私有目录。
pub struct FsPartStore {
    root: PathBuf,
}

impl FsPartStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn session_dir(&self, session_id: &str) -> PathBuf {
        self.root.join(session_id)
    }

    async fn ensure_private_dir(path: &Path) -> anyhow::Result<()> {
        fs::create_dir_all(path)
            .await
            .with_context(|| format!("Failed to create sandbox dir: {}", path.display()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))
                .await
                .with_context(|| {
                    format!("Failed to set sandbox dir permissions: {}", path.display())
                })?;
        }

        Ok(())
    }

    async fn write_private_file(path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
        fs::write(path, bytes)
            .await
            .with_context(|| format!("Failed to write part file: {}", path.display()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
                .await
                .with_context(|| {
                    format!("Failed to set part file permissions: {}", path.display())
                })?;
        }

        Ok(())
    }

    fn path_of(handle: &TierHandle) -> Result<&Path, PartStoreError> {
        match handle {
            TierHandle::File { path } => Ok(path.as_path()),
            other => Err(PartStoreError::ForeignHandle(other.clone())),
        }
    }
}

#[async_trait]
impl PartStorePort for FsPartStore {
    fn tier(&self) -> StorageTier {
        StorageTier::SandboxedFs
    }

    async fn probe(&self) -> Result<(), PartStoreError> {
        let marker = self.root.join(PROBE_FILE_NAME);
        let result: anyhow::Result<()> = async {
            Self::ensure_private_dir(&self.root).await?;
            Self::write_private_file(&marker, b"ok").await?;
            fs::remove_file(&marker)
                .await
                .with_context(|| format!("Failed to remove probe file: {}", marker.display()))?;
            Ok(())
        }
        .await;

        result.map_err(|err| PartStoreError::Unavailable(format!("{err:#}")))
    }

    async fn save(&self, write: PartWrite<'_>) -> Result<TierHandle, PartStoreError> {
        let dir = self.session_dir(write.session_id.as_str());
        let path = dir.join(write.file_name());

        let result: anyhow::Result<()> = async {
            Self::ensure_private_dir(&dir).await?;
            Self::write_private_file(&path, write.bytes).await
        }
        .await;
        result.map_err(|err| PartStoreError::Storage(format!("{err:#}")))?;

        debug!(path = %path.display(), size = write.bytes.len(), "Part written to sandbox");
        Ok(TierHandle::File { path })
    }

    async fn read(&self, handle: &TierHandle) -> Result<Bytes, PartStoreError> {
        let path = Self::path_of(handle)?;
        match fs::read(path).await {
            Ok(bytes) => Ok(Bytes::from(bytes)),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                Err(PartStoreError::NotFound(path.display().to_string()))
            }
            Err(err) => Err(PartStoreError::Storage(format!(
                "Failed to read part file {}: {err}",
                path.display()
            ))),
        }
    }

    async fn delete(&self, handle: &TierHandle) -> Result<(), PartStoreError> {
        let path = Self::path_of(handle)?;
        match fs::remove_file(path).await {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => {
                return Err(PartStoreError::Storage(format!(
                    "Failed to delete part file {}: {err}",
                    path.display()
                )))
            }
        }

        // Drop the session directory once its last part is gone.
        if let Some(parent) = path.parent() {
            if parent != self.root && parent.starts_with(&self.root) {
                if let Err(err) = fs::remove_dir(parent).await {
                    if err.kind() != ErrorKind::NotFound {
                        debug!(dir = %parent.display(), error = %err, "Session dir kept");
                    }
                }
            }
        } else {
            warn!(path = %path.display(), "Part path has no parent directory");
        }

        Ok(())
    }
}
