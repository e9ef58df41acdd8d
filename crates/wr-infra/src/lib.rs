//! # wr-infra
//!
//! Infrastructure adapters for the chunked screen recorder: the three persistence tiers
//! (sandboxed filesystem, diesel/SQLite indexed store, in-process memory), media probes
//! used for validation, a file-replay capture device and the system clock.

pub mod capture;
pub mod db;
pub mod fs;
pub mod media;
pub mod memory;
pub mod time;

pub use capture::{ReplayCaptureDevice, ReplayEncoder};
pub use db::DieselIndexedPartStore;
pub use fs::FsPartStore;
pub use media::{FfprobeMediaProbe, StructuralMediaProbe};
pub use memory::MemoryPartStore;
pub use time::SystemClock;
