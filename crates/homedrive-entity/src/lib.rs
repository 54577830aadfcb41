//! # homedrive-entity
//!
//! Domain entity models for HomeDrive. Every struct in this crate
//! represents a database table row or a domain value object. All entities
//! derive `Debug`, `Clone`, `Serialize`, `Deserialize`, and database
//! entities additionally derive `sqlx::FromRow`.

pub mod activity;
pub mod entry;
pub mod quota;
pub mod share;
pub mod user;
