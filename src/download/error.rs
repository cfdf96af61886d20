use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;

/// 下载中发生的错误
#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("Head request failed: {0:#}")]
    HeadRequestFailed(anyhow::Error),

    #[error("Unknown `Accept-Ranges` unit: {0:?}")]
    UnknownAcceptRange(String),

    #[error("Unknown content size: {0:?}")]
    UnknownSize(String),

    #[error("Chunk {index}: request generation failed: {source:#}")]
    RequestGenerationFailed {
        index: usize,
        source: anyhow::Error,
    },

    #[error("Chunk {index}: http request failed: {source:#}")]
    RequestFailed {
        index: usize,
        source: anyhow::Error,
    },

    #[error("Chunk {index}: request timed out after {timeout:?}")]
    Timeout {
        index: usize,
        timeout: Duration,
    },

    #[error("Chunk {index}: bad status code {status} ({status_text})")]
    BadStatusCode {
        index: usize,
        status: StatusCode,
        status_text: String,
    },

    #[error("Chunk {index}: reading body failed: {source:#}")]
    BodyReadFailed {
        index: usize,
        #[source]
        source: reqwest::Error,
    },

    #[error("Chunk {index}: response ({status}) is longer than the requested {limit} bytes")]
    OversizedBody {
        index: usize,
        status: StatusCode,
        limit: u64,
    },

    #[error("Download cancelled")]
    Cancelled,
}

impl DownloadError {
    /// 是否值得对该 chunk 重试
    pub fn is_retryable(&self) -> bool {
        match self {
            DownloadError::RequestFailed { .. }
            | DownloadError::BodyReadFailed { .. }
            | DownloadError::Timeout { .. } => true,
            DownloadError::BadStatusCode { status, .. } => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
            _ => false,
        }
    }

    pub fn chunk_index(&self) -> Option<usize> {
        match self {
            DownloadError::RequestGenerationFailed { index, .. }
            | DownloadError::RequestFailed { index, .. }
            | DownloadError::Timeout { index, .. }
            | DownloadError::BadStatusCode { index, .. }
            | DownloadError::BodyReadFailed { index, .. }
            | DownloadError::OversizedBody { index, .. } => Some(*index),
            _ => None,
        }
    }
}
