//! # wr-core
//!
//! Core domain models and port definitions for the chunked screen recorder.
//!
//! This crate contains the recording buffer, part/session models, the session state
//! machine, container rules and the port traits. It has no infrastructure dependencies.

pub mod config;
pub mod events;
pub mod ids;
pub mod media;
pub mod ports;
pub mod recording;

// Re-export commonly used types at the crate root
pub use config::{QualityPreset, QualitySettings, RecorderConfig};
pub use events::RecorderEvent;
pub use ids::{PartNumber, SessionId};
pub use media::{ContainerKind, MimeType, RepairStrategy};
pub use recording::{ChunkBuffer, Fragment, Part, SessionState, StorageTier};
