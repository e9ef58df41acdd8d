//! Capture session state machine.
//!
//! Defines a pure state transition function for the recording lifecycle.

use thiserror::Error;

/// Capture session lifecycle state.
///
/// 录制会话生命周期状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum SessionState {
    /// No recording in progress.
    ///
    /// 空闲。
    Idle,
    /// Acquiring the device and negotiating the encoder.
    ///
    /// 正在获取设备并协商编码器。
    Starting,
    /// Fragments are being delivered.
    ///
    /// 录制中。
    Recording,
    /// Device released; flushing and reassembling.
    ///
    /// 正在停止：刷盘与合并。
    Stopping,
    /// Reassembly finished.
    ///
    /// 已停止。
    Stopped,
}

/// Events that drive the session lifecycle.
///
/// 驱动会话生命周期的事件。
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum SessionEvent {
    /// Caller asked to start a recording.
    StartRequested,
    /// Device handle and encoder both confirmed live.
    CaptureLive,
    /// Permission denied, no supported container, or encoder refused to start.
    AcquisitionFailed,
    /// Caller asked to stop.
    StopRequested,
    /// Final flush and reassembly completed.
    ReassemblyFinished,
    /// Session torn down without reassembly.
    Released,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid session transition: {event:?} in state {state:?}")]
pub struct TransitionError {
    pub state: SessionState,
    pub event: SessionEvent,
}

/// Pure session state machine.
///
/// 纯状态机：不包含副作用。
pub struct SessionStateMachine;

impl SessionStateMachine {
    pub fn transition(
        state: SessionState,
        event: SessionEvent,
    ) -> Result<SessionState, TransitionError> {
        use SessionEvent::*;
        use SessionState::*;

        match (state, event) {
            (Idle | Stopped, StartRequested) => Ok(Starting),
            (Starting, CaptureLive) => Ok(Recording),
            (Starting, AcquisitionFailed) => Ok(Idle),
            (Recording, StopRequested) => Ok(Stopping),
            (Stopping, ReassemblyFinished) => Ok(Stopped),
            (_, Released) => Ok(Idle),
            (state, event) => {
                tracing::warn!(?state, ?event, "rejected session transition");
                Err(TransitionError { state, event })
            }
        }
    }
}
