use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// 1-based sequence number of a persisted part within a session.
///
/// 会话内已持久化分片的序号（从 1 开始）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PartNumber(u32);

impl PartNumber {
    pub const FIRST: PartNumber = PartNumber(1);

    pub fn new(value: u32) -> Self {
        Self(value)
    }

    /// Number assigned to the part saved after `saved_count` earlier parts.
    pub fn after(saved_count: u32) -> Self {
        Self(saved_count.saturating_add(1))
    }

    pub fn value(&self) -> u32 {
        self.0
    }

    /// Storage name without extension: `part001`, `part002`, … (`part1000` past 999).
    pub fn stem(&self) -> String {
        format!("part{:03}", self.0)
    }

    pub fn file_name(&self, extension: &str) -> String {
        format!("{}.{}", self.stem(), extension)
    }
}

impl Display for PartNumber {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.stem())
    }
}
