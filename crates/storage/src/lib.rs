#![forbid(unsafe_code)]

pub mod feed;
pub mod memory;
pub mod repository;
pub mod sqlite;

pub use feed::{FeedHub, SessionChange, SessionChangeSender, SessionWatch};
pub use memory::InMemoryRepository;
pub use repository::{Storage, StorageError};
