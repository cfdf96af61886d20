pub mod chunk_collection;
pub mod chunk_item;
pub mod chunk_manager;
pub mod chunk_range;
pub mod client;
pub mod config;
pub mod downloader;
pub mod error;
pub mod file;
pub mod logger;
pub mod util;

#[cfg(test)]
pub(crate) mod test_util;
