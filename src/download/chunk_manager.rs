use std::sync::Arc;

use futures_util::stream::FuturesUnordered;
use futures_util::StreamExt;
use log::{debug, error, warn};
use reqwest::header::HeaderMap;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::download::chunk_collection::ChunkCollection;
use crate::download::chunk_item::ChunkItem;
use crate::download::chunk_range::{ChunkInfo, ChunkRangeIterator};
use crate::download::client::HttpClient;
use crate::download::config::{ChunkFailurePolicy, DownloadConfig};
use crate::download::error::DownloadError;
use crate::download::file::ChunkFailure;

pub struct ChunkDownload {
    pub collection: ChunkCollection,
    pub failures: Vec<ChunkFailure>,
}

/// 以不超过 `connection_count` 的并发下载所有 chunk
pub struct ChunkManager<C> {
    client: Arc<C>,
    config: Arc<DownloadConfig>,
    cancel_token: CancellationToken,
    len_sender: watch::Sender<u64>,
}

impl<C: HttpClient> ChunkManager<C> {
    pub fn new(
        client: Arc<C>,
        config: Arc<DownloadConfig>,
        cancel_token: CancellationToken,
        len_sender: watch::Sender<u64>,
    ) -> Self {
        Self {
            client,
            config,
            cancel_token,
            len_sender,
        }
    }

    fn chunk_item(&self, chunk_info: ChunkInfo, content_length: u64) -> ChunkItem<C> {
        ChunkItem::new(
            chunk_info,
            self.client.clone(),
            self.config.clone(),
            self.cancel_token.clone(),
            self.len_sender.clone(),
            content_length,
        )
    }

    pub async fn download(
        &self,
        url: &str,
        extra_headers: Option<&HeaderMap>,
        mut chunk_iter: ChunkRangeIterator,
    ) -> Result<ChunkDownload, DownloadError> {
        let content_length = chunk_iter.content_length();
        let mut collection = ChunkCollection::new(chunk_iter.chunk_count());
        let mut failures = Vec::new();
        let mut futures_unordered = FuturesUnordered::new();

        // 下载连接数的 chunk
        for chunk_info in chunk_iter.by_ref().take(self.config.connection_count.get()) {
            futures_unordered.push(self.chunk_item(chunk_info, content_length).run(url, extra_headers));
        }

        while let Some((chunk_info, result)) = futures_unordered.next().await {
            match result {
                Ok(bytes) => {
                    if !collection.insert(chunk_info.index, bytes) {
                        warn!("Chunk {} was already filled, dropping duplicate", chunk_info.index);
                    }
                }
                Err(DownloadError::Cancelled) => {
                    debug!("Chunk {} cancelled", chunk_info.index);
                    return Err(DownloadError::Cancelled);
                }
                Err(err) => match self.config.failure_policy {
                    ChunkFailurePolicy::Abort => {
                        error!("Download chunk failed, aborting: {}", err);
                        self.cancel_token.cancel();
                        return Err(err);
                    }
                    ChunkFailurePolicy::BestEffort => {
                        warn!("Download chunk failed, leaving it empty: {}", err);
                        failures.push(ChunkFailure {
                            index: chunk_info.index,
                            range: chunk_info.range,
                            error: err,
                        });
                    }
                },
            }

            // 有 chunk 结束时补上下一个
            if let Some(chunk_info) = chunk_iter.next() {
                futures_unordered.push(self.chunk_item(chunk_info, content_length).run(url, extra_headers));
            }
        }

        failures.sort_by_key(|failure| failure.index);

        Ok(ChunkDownload { collection, failures })
    }
}
