//! Media probes used by the validation pass.

mod ebml;
mod ffprobe;
mod isobmff;
mod structural_probe;

pub use ffprobe::{ffprobe_available, FfprobeMediaProbe, DEFAULT_FFPROBE_BINARY};
pub use structural_probe::StructuralMediaProbe;
