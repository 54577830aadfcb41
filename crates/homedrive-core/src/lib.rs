//! # homedrive-core
//!
//! Core crate for HomeDrive. Contains the unified error type, configuration
//! schemas, the [`Location`](types::location::Location) path model, and the
//! blob-store trait seam shared by every other crate in the workspace.

pub mod config;
pub mod error;
pub mod result;
pub mod traits;
pub mod types;

pub use error::{AppError, ErrorKind};
pub use result::AppResult;
