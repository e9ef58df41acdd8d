//! Capture source replaying an existing media file through the recording pipeline.

mod replay;

pub use replay::{ReplayCaptureDevice, ReplayCaptureHandle, ReplayEncoder};
