use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use futures_util::StreamExt;
use headers::HeaderMapExt;
use log::{debug, warn};
use reqwest::header::HeaderMap;
use reqwest::{Method, Request, StatusCode};
use tokio::select;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::download::chunk_range::ChunkInfo;
use crate::download::client::HttpClient;
use crate::download::config::DownloadConfig;
use crate::download::error::DownloadError;
use crate::download::util::{apply_config, clone_request};

// 预分配的上限，超出后按需增长
const MAX_BUFFER_CAPACITY: u64 = 4 * 1024 * 1024;

/// 负责下载单个 chunk
pub struct ChunkItem<C> {
    client: Arc<C>,
    config: Arc<DownloadConfig>,
    cancel_token: CancellationToken,
    // 累计已接收的字节数
    len_sender: watch::Sender<u64>,
    // HEAD 请求得到的文件大小
    content_length: u64,
    pub chunk_info: ChunkInfo,
}

impl<C: HttpClient> ChunkItem<C> {
    pub fn new(
        chunk_info: ChunkInfo,
        client: Arc<C>,
        config: Arc<DownloadConfig>,
        cancel_token: CancellationToken,
        len_sender: watch::Sender<u64>,
        content_length: u64,
    ) -> Self {
        Self {
            client,
            config,
            cancel_token,
            len_sender,
            content_length,
            chunk_info,
        }
    }

    /// 下载并交回 chunk 信息，结果由调用方按下标写入
    pub async fn run(self, url: &str, extra_headers: Option<&HeaderMap>) -> (ChunkInfo, Result<Bytes, DownloadError>) {
        let result = self.download(url, extra_headers).await;
        (self.chunk_info, result)
    }

    /// 执行下载 chunk，可重试的错误最多重试 `retry_count` 次
    pub async fn download(&self, url: &str, extra_headers: Option<&HeaderMap>) -> Result<Bytes, DownloadError> {
        let request = self.create_range_request(url)?;
        let index = self.chunk_info.index;
        let mut attempts = 0u32;

        loop {
            let result = select! {
                result = self.send(clone_request(&request), extra_headers) => result,
                _ = self.cancel_token.cancelled() => return Err(DownloadError::Cancelled),
            };

            match result {
                Ok((bytes, status)) => {
                    debug!("Chunk {} finished: {} bytes, status {}", index, bytes.len(), status);
                    self.len_sender.send_modify(|len| *len += bytes.len() as u64);
                    return Ok(bytes);
                }
                Err(err) if err.is_retryable() && attempts < u32::from(self.config.retry_count) => {
                    attempts += 1;
                    let delay = self.config.backoff_delay(attempts);
                    warn!(
                        "Download chunk failed, try again {}/{} in {:?}: {}",
                        attempts, self.config.retry_count, delay, err
                    );

                    select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = self.cancel_token.cancelled() => return Err(DownloadError::Cancelled),
                    }
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// 单次请求，不重试
    pub async fn fetch_chunk(&self, url: &str, extra_headers: Option<&HeaderMap>) -> Result<(Bytes, StatusCode), DownloadError> {
        let request = self.create_range_request(url)?;
        self.send(request, extra_headers).await
    }

    fn create_range_request(&self, url: &str) -> Result<Request, DownloadError> {
        let index = self.chunk_info.index;
        let mut request = self
            .client
            .generate_request(Method::GET, url, None)
            .map_err(|source| DownloadError::RequestGenerationFailed { index, source })?;
        apply_config(&mut request, &self.config);

        let range = self.chunk_info.range.to_range_header().map_err(|err| {
            DownloadError::RequestGenerationFailed {
                index,
                source: anyhow::anyhow!("Invalid range {:?}: {}", self.chunk_info.range, err),
            }
        })?;
        request.headers_mut().typed_insert(range);

        Ok(request)
    }

    async fn send(&self, request: Request, extra_headers: Option<&HeaderMap>) -> Result<(Bytes, StatusCode), DownloadError> {
        let future = self.send_and_read(request, extra_headers);
        match self.config.request_timeout {
            Some(timeout) => tokio::time::timeout(timeout, future)
                .await
                .map_err(|_| DownloadError::Timeout { index: self.chunk_info.index, timeout })?,
            None => future.await,
        }
    }

    async fn send_and_read(&self, request: Request, extra_headers: Option<&HeaderMap>) -> Result<(Bytes, StatusCode), DownloadError> {
        let index = self.chunk_info.index;
        let response = self
            .client
            .execute(request, extra_headers)
            .await
            .map_err(|source| DownloadError::RequestFailed { index, source })?;

        let status = response.status();
        // 空文件只有一个 `bytes=0-0` 占位 chunk，服务端通常回 416
        if status == StatusCode::RANGE_NOT_SATISFIABLE && self.content_length == 0 {
            debug!("Chunk {} of empty content answered {}, treating it as empty", index, status);
            return Ok((Bytes::new(), status));
        }
        if status.as_u16() >= 400 {
            return Err(DownloadError::BadStatusCode {
                index,
                status,
                status_text: status.canonical_reason().unwrap_or_default().to_string(),
            });
        }

        // 读取 chunk 数据，超出请求范围说明服务端忽略了 Range
        let limit = self.chunk_info.range.len();
        let mut buffer = BytesMut::with_capacity(buffer_capacity(limit));
        let mut stream = response.bytes_stream();
        while let Some(bytes) = stream.next().await {
            let bytes = bytes.map_err(|source| DownloadError::BodyReadFailed { index, source })?;
            if buffer.len() as u64 + bytes.len() as u64 > limit {
                return Err(DownloadError::OversizedBody { index, status, limit });
            }
            buffer.extend_from_slice(&bytes);
        }

        Ok((buffer.freeze(), status))
    }
}

fn buffer_capacity(range_len: u64) -> usize {
    range_len.min(MAX_BUFFER_CAPACITY) as usize
}
