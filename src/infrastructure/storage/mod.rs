pub mod memory_store;
pub mod sqlite_store;

pub use memory_store::MemoryKeyValueStore;
pub use sqlite_store::SqliteKeyValueStore;
