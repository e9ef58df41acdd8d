//! Recording domain: fragment buffer, parts, session metadata and lifecycle.

mod buffer;
mod part;
mod session;
mod state_machine;
mod threshold;

pub use buffer::{ChunkBuffer, DrainedChunks, Fragment};
pub use part::{Part, PartWrite, StorageTier, TierHandle};
pub use session::{final_file_name, Session, SessionSnapshot, FINAL_FILE_SUFFIX};
pub use state_machine::{SessionEvent, SessionState, SessionStateMachine, TransitionError};
pub use threshold::{mib_to_bytes, FlushThreshold, DEFAULT_FLUSH_THRESHOLD_BYTES};
