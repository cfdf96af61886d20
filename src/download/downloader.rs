use std::sync::Arc;

use futures_util::Stream;
use log::{info, warn};
use reqwest::header::{HeaderMap, HeaderName, ACCEPT_RANGES, CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::Method;
use tokio::select;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::download::chunk_manager::{ChunkDownload, ChunkManager};
use crate::download::chunk_range::ChunkRangeIterator;
use crate::download::client::{HttpClient, ReqwestClient};
use crate::download::config::DownloadConfig;
use crate::download::error::DownloadError;
use crate::download::file::{ext_by_content_type, DownloadedFile};
use crate::download::util::apply_config;

/// HEAD 请求得到的文件信息
#[derive(Debug, Clone, PartialEq, Eq)]
struct ProbeInfo {
    content_length: u64,
    content_type: String,
}

pub struct Downloader<C = ReqwestClient> {
    client: Arc<C>,
    config: Arc<DownloadConfig>,
    // 取消后该下载器的所有下载都会结束
    cancel_token: CancellationToken,
    // 发送接收数据接收长度
    downloaded_len_sender: watch::Sender<u64>,
    downloaded_len_receiver: watch::Receiver<u64>,
}

impl Downloader<ReqwestClient> {
    pub fn with_reqwest(config: DownloadConfig) -> Self {
        Self::new(ReqwestClient::default(), config)
    }
}

impl<C: HttpClient> Downloader<C> {
    pub fn new(client: C, config: DownloadConfig) -> Self {
        let (downloaded_len_sender, downloaded_len_receiver) = watch::channel(0);

        Self {
            client: Arc::new(client),
            config: Arc::new(config),
            cancel_token: CancellationToken::new(),
            downloaded_len_sender,
            downloaded_len_receiver,
        }
    }

    pub fn config(&self) -> &DownloadConfig {
        &self.config
    }

    /// 当前下载已接收的字节数，每次下载开始时归零
    pub fn downloaded_len_stream(&self) -> impl Stream<Item = u64> + 'static {
        let mut receiver = self.downloaded_len_receiver.clone();

        async_stream::stream! {
            let len = *receiver.borrow_and_update();
            yield len;

            while receiver.changed().await.is_ok() {
                let len = *receiver.borrow_and_update();
                yield len;
            }
        }
    }

    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// 分片下载 `url`，按下标顺序拼接后返回
    pub async fn download(&self, url: &str, extra_headers: Option<&HeaderMap>) -> Result<DownloadedFile, DownloadError> {
        // 每次下载使用子 token，失败中止时不影响下载器本身
        let cancel_token = self.cancel_token.child_token();
        if cancel_token.is_cancelled() {
            return Err(DownloadError::Cancelled);
        }

        let probe = select! {
            probe = self.probe(url, extra_headers) => probe?,
            _ = cancel_token.cancelled() => return Err(DownloadError::Cancelled),
        };

        let chunk_iter = ChunkRangeIterator::new(self.config.chunk_size, probe.content_length);
        let chunk_count = chunk_iter.chunk_count();
        info!(
            "Start downloading {}: {} bytes in {} chunks of {} bytes",
            url, probe.content_length, chunk_count, self.config.chunk_size
        );

        self.downloaded_len_sender.send_replace(0);
        let chunk_manager = ChunkManager::new(
            self.client.clone(),
            self.config.clone(),
            cancel_token,
            self.downloaded_len_sender.clone(),
        );
        let ChunkDownload { collection, failures } = chunk_manager.download(url, extra_headers, chunk_iter).await?;

        let data = collection.join();
        if failures.is_empty() {
            info!("Download completed: {} ({} bytes)", url, data.len());
        } else {
            warn!(
                "Download finished with {} of {} chunks missing: {} ({} bytes)",
                failures.len(),
                chunk_count,
                url,
                data.len()
            );
        }

        Ok(DownloadedFile {
            data,
            file_type: ext_by_content_type(&probe.content_type).to_string(),
            failed_chunks: failures,
        })
    }

    async fn probe(&self, url: &str, extra_headers: Option<&HeaderMap>) -> Result<ProbeInfo, DownloadError> {
        let mut request = self
            .client
            .generate_request(Method::HEAD, url, None)
            .map_err(DownloadError::HeadRequestFailed)?;
        apply_config(&mut request, &self.config);

        let execute = self.client.execute(request, extra_headers);
        let response = match self.config.request_timeout {
            Some(timeout) => tokio::time::timeout(timeout, execute)
                .await
                .map_err(|_| DownloadError::HeadRequestFailed(anyhow::anyhow!("Timed out after {:?}", timeout)))?,
            None => execute.await,
        }
        .map_err(DownloadError::HeadRequestFailed)?;

        if !response.status().is_success() {
            warn!("Head request returned {}: {}", response.status(), url);
        }

        let headers = response.headers();
        let unit = header_str(headers, ACCEPT_RANGES);
        if unit != "bytes" {
            return Err(DownloadError::UnknownAcceptRange(unit));
        }

        let content_length = header_str(headers, CONTENT_LENGTH);
        let content_length = content_length
            .parse::<u64>()
            .map_err(|_| DownloadError::UnknownSize(content_length))?;

        Ok(ProbeInfo {
            content_length,
            content_type: header_str(headers, CONTENT_TYPE),
        })
    }
}

/// 缺失的 header 视为空字符串
fn header_str(headers: &HeaderMap, name: HeaderName) -> String {
    headers
        .get(name)
        .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
        .unwrap_or_default()
}
