//! Blob storage backends.

pub mod providers;

pub use providers::local::LocalBlobStore;
