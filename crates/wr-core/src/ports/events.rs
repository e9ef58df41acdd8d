use crate::events::RecorderEvent;

/// Sink for session events (status, saved part, completion).
///
/// Called synchronously from the recording pipeline; implementations must not block.
pub trait RecorderEventPort: Send + Sync {
    fn emit(&self, event: RecorderEvent);
}
