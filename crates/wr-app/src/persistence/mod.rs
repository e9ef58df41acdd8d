mod persistence_tier;

pub use persistence_tier::{PersistenceError, PersistenceTier, StorageCapability};
