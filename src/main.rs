//! # audiobatch - 批量音频转换工具
//!
//! 发现输入中的 M4A 文件，通过外部 ffmpeg 并行转换为 MP3，
//! 同时限制同时进行的转换数量并报告进度。
//!
//! ## 依赖关系
//! ```text
//! main.rs
//!   ├── cli/        (命令行参数定义)
//!   ├── commands/   (命令执行逻辑与进度显示)
//!   │     ├── batch/     (解析、映射、调度、状态汇总)
//!   │     └── codec/     (ffmpeg 转换器)
//!   ├── utils/      (输出与进度条)
//!   └── error.rs    (错误处理)
//! ```
//!
//! ## 退出码
//! - 0: 全部成功，或没有需要转换的文件
//! - 1: 致命错误（路径不存在、目录无法创建等），或任一文件转换失败

mod batch;
mod cli;
mod codec;
mod commands;
mod error;
mod utils;

use clap::Parser;
use cli::Cli;
use tracing_subscriber::EnvFilter;

fn main() {
    // Initialize colored output for Windows compatibility
    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = commands::run(cli.args) {
        utils::output::print_error(&format!("{}", e));
        std::process::exit(1);
    }
}

/// 初始化诊断日志：优先使用 RUST_LOG，否则根据 --verbose 选择级别
fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("audiobatch=debug")
        } else {
            EnvFilter::new("audiobatch=error")
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
