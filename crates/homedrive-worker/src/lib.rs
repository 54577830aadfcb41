//! Background maintenance: the trash reaper.

pub mod reaper;
pub mod runner;

pub use reaper::TrashReaper;
pub use runner::ReaperRunner;
