pub mod service;

pub use service::StorageService;
