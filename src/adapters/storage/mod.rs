//! Analysis store implementations
//!
//! - `SqliteStore`: embedded SQLite database used by the engine
//! - `MemoryStore`: in-process store for tests and dry runs

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
