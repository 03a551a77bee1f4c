//! # CLI 模块
//!
//! 使用 `clap` 定义命令行参数。
//!
//! ## 依赖关系
//! - 被 `main.rs` 使用
//! - 子模块: convert

pub mod convert;

use clap::Parser;

/// audiobatch - 批量 M4A 转 MP3 工具
#[derive(Parser)]
#[command(name = "audiobatch")]
#[command(author = "Changjiang Wu")]
#[command(version)]
#[command(about = "Batch M4A to MP3 converter with parallel ffmpeg jobs", long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub args: convert::ConvertArgs,

    /// Print debug diagnostics (RUST_LOG takes precedence)
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}
