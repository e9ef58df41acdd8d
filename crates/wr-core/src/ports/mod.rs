//! Port interfaces for the application layer
//!
//! Ports define the contract between the recording use cases and infrastructure
//! implementations (capture device, encoder, storage tiers, media decoder, clock).
//! This follows Hexagonal Architecture principles, so the pipeline can be driven by
//! real devices in production and by in-memory fakes in tests.

mod capture;
mod clock;
mod encoder;
mod events;
mod media_probe;
mod part_store;

pub use capture::{
    AcquisitionError, AudioTrackSettings, CaptureDevicePort, CaptureHandle, CaptureRequest,
    VideoTrackSettings,
};
pub use clock::ClockPort;
pub use encoder::{EncoderEvent, EncoderOptions, EncoderPort};
pub use events::RecorderEventPort;
pub use media_probe::{MediaProbePort, ProbeError};
pub use part_store::{PartStoreError, PartStorePort};
