//! Events published by a capture session.

use serde::{Deserialize, Serialize};

/// Human-readable status strings carried by [`StatusUpdate`].
pub mod status {
    pub const RECORDING: &str = "Recording...";
    pub const START_FAILED: &str = "Recording failed to start";
    pub const ENCODER_ERROR: &str = "Recording error";
    pub const STOPPING: &str = "Recording stopped, merging parts...";
    pub const COMPLETED: &str = "Recording completed";
    pub const COMPLETED_WITH_ISSUES: &str =
        "Processing completed, playback may have issues";
}

/// Fired on every fragment arrival and on flush.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub status: String,
    /// Fragments currently buffered.
    pub chunks: usize,
    /// Bytes currently buffered.
    pub size: u64,
    /// Parts persisted so far.
    pub sandbox_files: usize,
    /// All-time recorded bytes.
    pub total_size: u64,
    pub saved_files_size: u64,
}

/// Fired after each successful flush.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSaved {
    pub file_name: String,
    pub size: u64,
    pub total_size: u64,
    pub saved_files_size: u64,
    pub total_files: usize,
}

/// Fired once, after the merge completes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordingComplete {
    pub total_files: usize,
    pub final_file_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RecorderEvent {
    StatusUpdate(StatusUpdate),
    FileSaved(FileSaved),
    RecordingComplete(RecordingComplete),
}
