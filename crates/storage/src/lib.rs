#![forbid(unsafe_code)]

pub mod document;
pub mod memory;
pub mod repository;
pub mod seed;
pub mod sqlite;
pub mod subscription;

pub use memory::InMemoryStore;
pub use repository::{ContentStore, Storage, StorageError};
pub use subscription::Subscription;
