use crate::download::chunk_range::ChunkRange;
use crate::download::error::DownloadError;

/// 下载完成的文件
#[derive(Debug, Default)]
pub struct DownloadedFile {
    pub data: Vec<u8>,
    /// 由 `Content-Type` 推断的后缀，如 `.json`，未知类型为空
    pub file_type: String,
    pub failed_chunks: Vec<ChunkFailure>,
}

impl DownloadedFile {
    /// 存在失败的 chunk 时数据不完整
    pub fn is_partial(&self) -> bool {
        !self.failed_chunks.is_empty()
    }
}

#[derive(Debug)]
pub struct ChunkFailure {
    pub index: usize,
    pub range: ChunkRange,
    pub error: DownloadError,
}

pub fn ext_by_content_type(content_type: &str) -> &'static str {
    match content_type {
        "application/json" | "application/json; charset=UTF-8" => ".json",
        "image/jpeg" => ".jpeg",
        _ => "",
    }
}
