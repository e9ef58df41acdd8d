//! Post-stop reassembly: read parts back, concatenate, repair and validate.

mod reassembler;
mod repair;

pub use reassembler::{MergeOutcome, MergeRequest, Reassembler, ReassemblyError};
pub use repair::remediation_hint;
