use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::ids::{PartNumber, SessionId};

/// Storage backend holding a persisted part, in fallback order.
///
/// 持久化分片所在的存储层（按回退顺序排列）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageTier {
    /// Private per-origin directory on the local filesystem.
    SandboxedFs,
    /// Transactional key-indexed local store.
    IndexedStore,
    /// Raw in-process retention.
    Memory,
}

impl StorageTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageTier::SandboxedFs => "sandboxed_fs",
            StorageTier::IndexedStore => "indexed_store",
            StorageTier::Memory => "memory",
        }
    }
}

impl std::fmt::Display for StorageTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tier-specific locator returned by a part store on save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TierHandle {
    File { path: PathBuf },
    Key { key: i64 },
    Memory { slot: u64 },
}

/// A durably persisted, numbered flush result.
///
/// 一次刷盘后持久化的编号分片。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Part {
    pub session_id: SessionId,
    pub number: PartNumber,
    pub byte_size: u64,
    pub tier: StorageTier,
    pub handle: TierHandle,
    pub created_at_ms: i64,
}

impl Part {
    /// Display name such as `part002.webm`.
    pub fn file_name(&self, extension: &str) -> String {
        self.number.file_name(extension)
    }
}

/// Save request handed to a single tier store.
#[derive(Debug, Clone)]
pub struct PartWrite<'a> {
    pub session_id: &'a SessionId,
    pub number: PartNumber,
    pub extension: &'a str,
    pub mime_hint: &'a str,
    pub bytes: &'a [u8],
}

impl PartWrite<'_> {
    pub fn file_name(&self) -> String {
        self.number.file_name(self.extension)
    }
}
