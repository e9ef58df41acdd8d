//! Media container rules: MIME negotiation, container families, signatures and repair
//! strategies.

mod container;
mod metadata;
mod mime;

pub use container::{
    has_ebml_signature, has_iso_bmff_signature, ContainerKind, RepairStrategy,
    EBML_HEADER_SKELETON, EBML_MAGIC,
};
pub use metadata::MediaMetadata;
pub use mime::{MimeType, PREFERRED_MIME_TYPES};
