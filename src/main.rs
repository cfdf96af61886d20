use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use futures_util::StreamExt;
use log::{debug, info, warn, LevelFilter};

use separated_downloader::download::config::Config;
use separated_downloader::download::logger::setup_logger;
use separated_downloader::Downloader;

use crate::cli::CliArgs;

mod cli;

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();

    let mut config = if Path::new(&args.config).exists() {
        Config::load_from_file(&args.config)?
    } else {
        Config::default()
    };
    if let Some(chunk_size) = args.chunk_size {
        config.chunk_size = chunk_size;
    }
    if let Some(connections) = args.connections {
        config.max_connections = connections;
    }

    let level = if args.verbose { LevelFilter::Debug } else { LevelFilter::Info };
    setup_logger(level, config.log_file.as_deref())?;

    let downloader = Downloader::with_reqwest(config.download_config()?);

    let mut progress = Box::pin(downloader.downloaded_len_stream());
    tokio::spawn(async move {
        while let Some(len) = progress.next().await {
            debug!("Downloaded {} bytes", len);
        }
    });

    let file = downloader.download(&args.url, None).await?;
    if file.is_partial() {
        warn!("{} chunks failed, the file is incomplete", file.failed_chunks.len());
    }

    let file_path = config.download_dir.join(format!("{}{}", args.name, file.file_type));
    tokio::fs::write(&file_path, &file.data)
        .await
        .with_context(|| format!("Write file failed: {}", file_path.display()))?;

    info!("Download is done. content length: {}, saved to {}", file.data.len(), file_path.display());

    Ok(())
}
