//! Keep Alive 主程序入口

use anyhow::Result;
use clap::Parser;
use keep_alive::cli::Args;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    keep_alive::core::run(args).await
}
