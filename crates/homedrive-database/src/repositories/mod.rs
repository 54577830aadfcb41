//! Postgres-backed store implementations.

pub mod activity;
pub mod entry;
pub mod share;
pub mod user;

pub use activity::ActivityRepository;
pub use entry::EntryRepository;
pub use share::ShareRepository;
pub use user::UserRepository;
