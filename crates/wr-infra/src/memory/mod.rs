mod memory_part_store;

pub use memory_part_store::MemoryPartStore;
