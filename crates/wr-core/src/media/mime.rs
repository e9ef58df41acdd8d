use serde::{Deserialize, Serialize};

use super::ContainerKind;

/// Capture MIME candidates in preference order.
///
/// MP4 variants come first: independently flushed MP4 fragments concatenate into a
/// structurally valid file far more often than WebM clusters do.
pub const PREFERRED_MIME_TYPES: &[&str] = &[
    "video/mp4;codecs=h264,aac",
    "video/mp4;codecs=h264,mp4a.40.2",
    "video/mp4",
    "video/webm;codecs=vp8,opus",
    "video/webm;codecs=vp9,opus",
    "video/webm;codecs=h264,opus",
    "video/webm",
];

/// Negotiated container+codec string, e.g. `video/webm;codecs=vp8,opus`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MimeType(pub String);

impl MimeType {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Container family implied by this MIME type.
    pub fn container(&self) -> ContainerKind {
        ContainerKind::from_mime(&self.0)
    }

    /// MIME type without codec parameters (`video/webm`).
    pub fn essence(&self) -> &str {
        self.0.split(';').next().unwrap_or_default().trim()
    }
}

impl std::fmt::Display for MimeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MimeType {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preference_list_puts_mp4_first() {
        let first_webm = PREFERRED_MIME_TYPES
            .iter()
            .position(|m| m.contains("webm"))
            .expect("webm candidate");
        assert!(PREFERRED_MIME_TYPES[..first_webm]
            .iter()
            .all(|m| m.contains("mp4")));
    }

    #[test]
    fn essence_strips_codecs() {
        let mime = MimeType::from("video/webm;codecs=vp8,opus");
        assert_eq!(mime.essence(), "video/webm");
        assert_eq!(mime.container(), ContainerKind::WebM);
    }
}
