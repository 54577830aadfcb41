pub mod access;
pub mod link;
pub mod password;
pub mod service;

pub use access::ShareAccessService;
pub use service::{CreateShareRequest, ShareService};
