//! Shared value types used across the HomeDrive crates.

pub mod location;

pub use location::Location;
