//! In-process store backend for tests and embedded deployments.

pub mod store;

pub use store::MemoryStore;
