//! webrecorder library
//!
//! 分片录制：边录边落盘，停止后重组为单个文件

pub mod bootstrap;
pub mod commands;

pub use wr_app::{CaptureSession, MergeOutcome, RecordingOutcome};
pub use wr_core::config::RecorderConfig;
