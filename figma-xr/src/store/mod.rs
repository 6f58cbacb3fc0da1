//! Local persistence and the project cache.

mod projects;
mod snapshot;
mod storage;

pub use projects::{parse_file_id, ProjectCache};
#[cfg(test)]
pub use storage::MemoryStore;
pub use storage::{FileStore, KeyValueStore, SESSION_KEY};
