use clap::Parser;

#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct CliArgs {
    /// 下载地址，服务端需要支持 `Accept-Ranges: bytes`
    pub url: String,

    #[arg(short, long, default_value = "config.json")]
    pub config: String,

    /// 保存的文件名，后缀由 `Content-Type` 决定
    #[arg(short, long, default_value = "download")]
    pub name: String,

    #[arg(long)]
    pub chunk_size: Option<u64>,

    #[arg(long)]
    pub connections: Option<usize>,

    #[arg(short, long)]
    pub verbose: bool,
}
