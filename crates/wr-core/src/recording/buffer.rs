//! In-memory accumulator of capture fragments.
//! 录制分片的内存缓冲区。

use bytes::{Bytes, BytesMut};

/// One unit of media data delivered by the encoder at a timeslice tick.
///
/// 编码器在每个时间片产生的一段媒体数据。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    bytes: Bytes,
}

impl Fragment {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn into_bytes(self) -> Bytes {
        self.bytes
    }
}

/// Ordered fragments accumulated since the last drain.
///
/// `total_bytes` is recomputed from the fragment list on every mutation.
#[derive(Debug, Default)]
pub struct ChunkBuffer {
    fragments: Vec<Fragment>,
    total_bytes: u64,
}

/// Contents moved out of a [`ChunkBuffer`] by [`ChunkBuffer::drain`].
#[derive(Debug, Default)]
pub struct DrainedChunks {
    pub fragments: Vec<Fragment>,
    pub total_bytes: u64,
}

impl ChunkBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a fragment. Zero-size fragments are dropped and `false` is returned.
    /// 追加分片；空分片被丢弃并返回 `false`。
    pub fn push(&mut self, fragment: Fragment) -> bool {
        if fragment.is_empty() {
            return false;
        }
        self.fragments.push(fragment);
        self.recompute();
        true
    }

    pub fn should_flush(&self, threshold_bytes: u64) -> bool {
        self.total_bytes >= threshold_bytes
    }

    /// Move the buffered fragments out and reset the buffer to empty.
    /// 取出全部分片并清空缓冲区。
    pub fn drain(&mut self) -> DrainedChunks {
        let fragments = std::mem::take(&mut self.fragments);
        self.recompute();
        let total_bytes = fragments.iter().map(|f| f.len() as u64).sum();
        DrainedChunks {
            fragments,
            total_bytes,
        }
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    pub fn fragment_count(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    fn recompute(&mut self) {
        self.total_bytes = self.fragments.iter().map(|f| f.len() as u64).sum();
    }
}

impl DrainedChunks {
    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// Concatenate the drained fragments in arrival order.
    pub fn into_bytes(self) -> Bytes {
        if self.fragments.len() == 1 {
            return self
                .fragments
                .into_iter()
                .next()
                .map(Fragment::into_bytes)
                .unwrap_or_default();
        }
        let mut out = BytesMut::with_capacity(self.total_bytes as usize);
        for fragment in self.fragments {
            out.extend_from_slice(fragment.bytes());
        }
        out.freeze()
    }
}
