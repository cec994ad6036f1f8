//! Database layer: pool initialization and the item store

pub mod init;
pub mod items;

pub use init::{init_database, init_memory_database};
pub use items::{Item, ItemStore};
