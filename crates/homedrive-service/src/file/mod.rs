pub mod download;
pub mod upload;

pub use download::DownloadService;
pub use upload::UploadService;
