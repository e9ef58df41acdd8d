//! Capture session lifecycle: acquisition, fragment pump, flushing and stop.

mod capture_session;
mod options;

pub use capture_session::{
    CaptureSession, CaptureSessionDeps, RecordingOutcome, SessionError,
};
pub use options::SessionOptions;
