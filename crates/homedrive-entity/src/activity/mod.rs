pub mod model;

pub use model::{ActivityAction, ActivityLog};
