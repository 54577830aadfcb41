//! File and folder entry entities.

pub mod kind;
pub mod model;

pub use kind::EntryKind;
pub use model::{CreateEntry, Entry};
