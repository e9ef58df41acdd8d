mod sandbox_part_store;

pub use sandbox_part_store::FsPartStore;
