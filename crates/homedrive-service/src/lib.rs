//! Business logic over the store traits: hierarchy management,
//! uploads and downloads, share links, and storage reporting.

pub mod context;
pub mod file;
pub mod hierarchy;
pub mod share;
pub mod storage;

pub use context::RequestContext;
