use serde::{Deserialize, Serialize};

use super::MimeType;

/// EBML element ID that opens every WebM/Matroska file.
pub const EBML_MAGIC: [u8; 4] = [0x1A, 0x45, 0xDF, 0xA3];

/// Fixed EBML header skeleton prepended by the header-synthesis repair.
///
/// The size fields are not recomputed for the payload that follows, so the result is
/// not guaranteed to be a well-formed document. Files repaired with it are always
/// reported as invalid and should go through an external re-mux.
pub const EBML_HEADER_SKELETON: [u8; 36] = [
    0x1A, 0x45, 0xDF, 0xA3, // EBML ID
    0x9F, 0x42, 0x86, 0x81, // EBML size
    0x01, 0x42, 0xF7, 0x81, // EBMLVersion
    0x01, 0x42, 0xF2, 0x81, // EBMLReadVersion
    0x01, 0x42, 0xF3, 0x81, // EBMLMaxIDLength
    0x01, 0x42, 0xF4, 0x81, // EBMLMaxSizeLength
    0x01, 0x42, 0xF9, 0x81, // DocType
    0x01, 0x42, 0xFA, 0x81, // DocTypeVersion
    0x01, 0x42, 0xFB, 0x81, // DocTypeReadVersion
];

/// Box types accepted at offset 4 of an ISO base media file.
const ISO_BMFF_LEADING_BOXES: [&[u8; 4]; 4] = [b"ftyp", b"styp", b"moov", b"moof"];

/// Container family of a recording.
///
/// 录制所使用的容器族。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerKind {
    /// ISO base media (MP4). Fragment-friendly: every flushed fragment carries its own
    /// self-describing boxes.
    Mp4,
    /// EBML/WebM. Segment-fragile: assumes a single header per file.
    WebM,
}

/// Post-concatenation repair applied to a container family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairStrategy {
    NoOpRepair,
    HeaderSynthesisRepair,
}

impl ContainerKind {
    /// Anything mentioning `mp4` is ISO-BMFF, everything else is treated as WebM.
    pub fn from_mime(mime: &str) -> Self {
        if mime.to_ascii_lowercase().contains("mp4") {
            ContainerKind::Mp4
        } else {
            ContainerKind::WebM
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ContainerKind::Mp4 => "mp4",
            ContainerKind::WebM => "webm",
        }
    }

    pub fn default_mime(&self) -> MimeType {
        match self {
            ContainerKind::Mp4 => MimeType::from("video/mp4;codecs=h264,aac"),
            ContainerKind::WebM => MimeType::from("video/webm;codecs=vp8,opus"),
        }
    }

    /// Self-contained fragments that can be concatenated without rewriting headers.
    pub fn is_fragment_friendly(&self) -> bool {
        matches!(self, ContainerKind::Mp4)
    }

    pub fn repair_strategy(&self) -> RepairStrategy {
        if self.is_fragment_friendly() {
            RepairStrategy::NoOpRepair
        } else {
            RepairStrategy::HeaderSynthesisRepair
        }
    }

    /// Whether `bytes` start with this container's signature.
    pub fn has_signature(&self, bytes: &[u8]) -> bool {
        match self {
            ContainerKind::Mp4 => has_iso_bmff_signature(bytes),
            ContainerKind::WebM => has_ebml_signature(bytes),
        }
    }

    /// Detect the container family from leading bytes.
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if has_ebml_signature(bytes) {
            Some(ContainerKind::WebM)
        } else if has_iso_bmff_signature(bytes) {
            Some(ContainerKind::Mp4)
        } else {
            None
        }
    }
}

impl std::fmt::Display for ContainerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

impl std::str::FromStr for ContainerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mp4" => Ok(ContainerKind::Mp4),
            "webm" => Ok(ContainerKind::WebM),
            other => Err(format!("unknown container: {other}")),
        }
    }
}

pub fn has_ebml_signature(bytes: &[u8]) -> bool {
    bytes.starts_with(&EBML_MAGIC)
}

pub fn has_iso_bmff_signature(bytes: &[u8]) -> bool {
    if bytes.len() < 8 {
        return false;
    }
    ISO_BMFF_LEADING_BOXES
        .iter()
        .any(|box_type| &bytes[4..8] == box_type.as_slice())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mime_selects_container() {
        assert_eq!(
            ContainerKind::from_mime("video/mp4;codecs=h264,aac"),
            ContainerKind::Mp4
        );
        assert_eq!(ContainerKind::from_mime("video/webm"), ContainerKind::WebM);
        assert_eq!(ContainerKind::from_mime(""), ContainerKind::WebM);
    }

    #[test]
    fn repair_strategy_per_family() {
        assert_eq!(
            ContainerKind::Mp4.repair_strategy(),
            RepairStrategy::NoOpRepair
        );
        assert_eq!(
            ContainerKind::WebM.repair_strategy(),
            RepairStrategy::HeaderSynthesisRepair
        );
        assert!(ContainerKind::Mp4.is_fragment_friendly());
        assert!(!ContainerKind::WebM.is_fragment_friendly());
    }

    #[test]
    fn signatures_are_detected() {
        let mp4 = [0, 0, 0, 0x18, b'f', b't', b'y', b'p', b'i', b's', b'o', b'm'];
        assert!(ContainerKind::Mp4.has_signature(&mp4));
        assert!(!ContainerKind::WebM.has_signature(&mp4));
        assert_eq!(ContainerKind::sniff(&mp4), Some(ContainerKind::Mp4));

        assert!(ContainerKind::WebM.has_signature(&EBML_HEADER_SKELETON));
        assert_eq!(ContainerKind::sniff(&[1, 2, 3]), None);
    }

    #[test]
    fn parses_from_str() {
        assert_eq!("WebM".parse::<ContainerKind>(), Ok(ContainerKind::WebM));
        assert!("avi".parse::<ContainerKind>().is_err());
    }
}
