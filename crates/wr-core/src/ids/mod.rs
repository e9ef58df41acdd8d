//! ID type wrappers for type safety.

pub mod part_number;
pub mod session_id;

pub use part_number::PartNumber;
pub use session_id::SessionId;
