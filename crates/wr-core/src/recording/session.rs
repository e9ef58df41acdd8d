use serde::{Deserialize, Serialize};

use crate::ids::SessionId;
use crate::media::{ContainerKind, MimeType};
use crate::recording::{Part, SessionState};

/// Suffix of the delivered file name (`完整录制` = "complete recording").
pub const FINAL_FILE_SUFFIX: &str = "完整录制";

/// Metadata of one recording session.
///
/// 单次录制会话的元数据。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub session_id: SessionId,
    pub window_name: String,
    pub mime_type: MimeType,
    pub started_at_ms: i64,
    pub ended_at_ms: Option<i64>,
    pub parts: Vec<Part>,
    pub errored: bool,
    all_time_bytes: u64,
}

impl Session {
    pub fn new(
        session_id: SessionId,
        window_name: impl Into<String>,
        mime_type: MimeType,
        started_at_ms: i64,
    ) -> Self {
        Self {
            session_id,
            window_name: window_name.into(),
            mime_type,
            started_at_ms,
            ended_at_ms: None,
            parts: Vec::new(),
            errored: false,
            all_time_bytes: 0,
        }
    }

    pub fn container(&self) -> ContainerKind {
        self.mime_type.container()
    }

    /// Count an accepted fragment. Called exactly once per fragment arrival.
    /// 记录一个已接收分片的大小（每个分片只调用一次）。
    pub fn record_fragment(&mut self, size: u64) {
        self.all_time_bytes = self.all_time_bytes.saturating_add(size);
    }

    /// Everything ever recorded in this session, independent of flush and cleanup.
    pub fn all_time_bytes(&self) -> u64 {
        self.all_time_bytes
    }

    pub fn saved_bytes(&self) -> u64 {
        self.parts.iter().map(|p| p.byte_size).sum()
    }

    pub fn add_part(&mut self, part: Part) {
        self.parts.push(part);
    }

    pub fn final_file_name(&self) -> String {
        final_file_name(&self.window_name, &self.session_id, self.container())
    }

    pub fn duration_ms(&self) -> Option<i64> {
        self.ended_at_ms
            .map(|end| end.saturating_sub(self.started_at_ms).max(0))
    }
}

/// `<window>_<session>_完整录制.<ext>`, with path separators in the window name replaced.
pub fn final_file_name(
    window_name: &str,
    session_id: &SessionId,
    container: ContainerKind,
) -> String {
    let window: String = window_name
        .chars()
        .map(|c| if matches!(c, '/' | '\\') { '_' } else { c })
        .collect();
    format!(
        "{}_{}_{}.{}",
        window,
        session_id,
        FINAL_FILE_SUFFIX,
        container.extension()
    )
}

/// Point-in-time view of a session for status reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub session_id: Option<SessionId>,
    pub buffered_chunks: usize,
    pub buffered_bytes: u64,
    pub saved_parts: usize,
    pub saved_bytes: u64,
    pub total_bytes: u64,
    pub errored: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::PartNumber;
    use crate::recording::{StorageTier, TierHandle};

    fn session() -> Session {
        Session::new(
            SessionId::from("20250101_101010"),
            "Demo",
            MimeType::from("video/webm;codecs=vp8,opus"),
            1_000,
        )
    }

    #[test]
    fn final_file_name_follows_container() {
        let s = session();
        assert_eq!(s.final_file_name(), "Demo_20250101_101010_完整录制.webm");

        let name = final_file_name("a/b", &SessionId::from("x"), ContainerKind::Mp4);
        assert_eq!(name, "a_b_x_完整录制.mp4");
    }

    #[test]
    fn all_time_total_is_independent_of_parts() {
        let mut s = session();
        s.record_fragment(10);
        s.record_fragment(5);
        s.add_part(Part {
            session_id: s.session_id.clone(),
            number: PartNumber::FIRST,
            byte_size: 15,
            tier: StorageTier::Memory,
            handle: TierHandle::Memory { slot: 1 },
            created_at_ms: 0,
        });
        s.parts.clear();
        assert_eq!(s.all_time_bytes(), 15);
        assert_eq!(s.saved_bytes(), 0);
    }

    #[test]
    fn duration_requires_end() {
        let mut s = session();
        assert_eq!(s.duration_ms(), None);
        s.ended_at_ms = Some(4_000);
        assert_eq!(s.duration_ms(), Some(3_000));
    }
}
