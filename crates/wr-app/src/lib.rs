//! Recorder application layer
//!
//! Orchestrates the recording pipeline on top of the `wr-core` ports: the tiered
//! persistence chain, the capture session lifecycle and post-stop reassembly.

pub mod persistence;
pub mod reassembly;
pub mod session;

pub use persistence::{PersistenceError, PersistenceTier, StorageCapability};
pub use reassembly::{MergeOutcome, MergeRequest, Reassembler, ReassemblyError};
pub use session::{
    CaptureSession, CaptureSessionDeps, RecordingOutcome, SessionError, SessionOptions,
};
