pub mod model;

pub use model::{CreateShareLink, ShareLink, ShareLinkStatus, SharePermission};
