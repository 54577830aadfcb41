//! Persistence layer: store traits, their Postgres implementations,
//! and an in-memory implementation for tests and local tooling.

pub mod connection;
pub mod memory;
pub mod migration;
pub mod repositories;
pub mod store;

pub use connection::DatabasePool;
pub use memory::MemoryStore;
pub use store::{ActivitySink, EntryFilter, EntryStore, PurgedTree, QuotaLedger, ShareStore};
