use bytes::{Bytes, BytesMut};

use wr_core::media::{ContainerKind, EBML_HEADER_SKELETON};

/// Stream-copy re-mux command suggested when a merged file may not play correctly.
pub fn remediation_hint(file_name: &str) -> String {
    format!("ffmpeg -i \"{file_name}\" -c copy -avoid_negative_ts make_zero \"fixed_{file_name}\"")
}

/// Identity pass for ISO-BMFF output; kept as the hook for a structural fix-up.
pub(crate) fn noop_repair(bytes: Bytes, container: ContainerKind) -> Bytes {
    tracing::info!(%container, size = bytes.len(), "Structural repair is a no-op passthrough");
    bytes
}

/// Prepend the EBML header skeleton to headerless WebM data.
///
/// The surviving payload may start anywhere, e.g. mid-cluster when the first part was
/// lost. Returns `None` only when there is nothing to prepend the header to.
pub(crate) fn synthesize_ebml_header(bytes: &[u8]) -> Option<Bytes> {
    if bytes.is_empty() {
        return None;
    }
    let mut out = BytesMut::with_capacity(EBML_HEADER_SKELETON.len() + bytes.len());
    out.extend_from_slice(&EBML_HEADER_SKELETON);
    out.extend_from_slice(bytes);
    Some(out.freeze())
}
