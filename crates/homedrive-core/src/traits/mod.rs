//! Trait seams defined in `homedrive-core` and implemented by the
//! infrastructure crates. The record-store traits live next to their
//! implementations in `homedrive-database`; the blob-store seam has no
//! entity dependencies and so lives here.

pub mod blob;

pub use blob::{BlobStore, ByteStream, StoredBlob};
