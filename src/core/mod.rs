//! Core types, configuration and the per-chat message buffers

pub mod buffer;
pub mod config;
pub mod models;
pub mod persistence;

pub use buffer::{AppendOutcome, BufferStore};
pub use models::{ChatId, Message};
pub use persistence::{BufferPersistence, JsonFilePersistence, MemoryPersistence, StoreImage};
