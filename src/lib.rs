pub mod download;

pub use download::client::{HttpClient, ReqwestClient};
pub use download::config::{ChunkFailurePolicy, Config, DownloadConfig};
pub use download::downloader::Downloader;
pub use download::error::DownloadError;
pub use download::file::{ext_by_content_type, ChunkFailure, DownloadedFile};
