//! # 统一错误处理模块
//!
//! 定义 audiobatch 的所有错误类型，使用 `thiserror` 派生。
//!
//! - [`AudioBatchError`]: 批处理级错误，致命错误会在任何转换开始前终止整个批次
//! - [`ConversionError`]: 单个文件的转换错误，只记录到对应条目，从不向外传播
//!
//! ## 依赖关系
//! - 被所有其他模块使用
//! - 无外部模块依赖

use std::path::PathBuf;
use thiserror::Error;

/// audiobatch 统一错误类型
#[derive(Error, Debug)]
pub enum AudioBatchError {
    // ─────────────────────────────────────────────────────────────
    // 路径解析错误（致命）
    // ─────────────────────────────────────────────────────────────
    #[error("Path not found: {}", path.display())]
    PathNotFound { path: PathBuf },

    #[error("Failed to read directory: {}", path.display())]
    DirectoryRead {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    /// 只用作警告文本，不会中断批次
    #[error("Not a .{extension} file, skipping: {}", path.display())]
    UnsupportedFile { path: PathBuf, extension: String },

    // ─────────────────────────────────────────────────────────────
    // 输出规划错误（致命）
    // ─────────────────────────────────────────────────────────────
    #[error("Failed to create output directory: {}", path.display())]
    DirectoryCreation {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(
        "Output collision: {} and {} both map to {}",
        first.display(),
        second.display(),
        output.display()
    )]
    OutputCollision {
        first: PathBuf,
        second: PathBuf,
        output: PathBuf,
    },

    // ─────────────────────────────────────────────────────────────
    // 调度错误
    // ─────────────────────────────────────────────────────────────
    #[error("Failed to build worker pool: {0}")]
    ThreadPool(String),

    #[error("{failed} of {total} conversion(s) failed")]
    BatchFailed { failed: usize, total: usize },

    // ─────────────────────────────────────────────────────────────
    // 参数错误
    // ─────────────────────────────────────────────────────────────
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    // ─────────────────────────────────────────────────────────────
    // 报告输出
    // ─────────────────────────────────────────────────────────────
    #[error("Failed to write file: {path}")]
    FileWriteError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
}

/// 单个文件的转换错误
#[derive(Error, Debug)]
pub enum ConversionError {
    #[error("External command '{command}' not found in PATH")]
    CommandNotFound { command: String },

    #[error("External command failed: {command}\n{stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error("I/O error during conversion: {0}")]
    Io(#[from] std::io::Error),

    #[error("Conversion panicked: {0}")]
    Panicked(String),
}

/// Result 类型别名
pub type Result<T> = std::result::Result<T, AudioBatchError>;

/// 状态表拒绝的非法状态变更
#[derive(Error, Debug, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Unknown file: {}", path.display())]
    UnknownPath { path: PathBuf },

    #[error("Illegal status change for {}: {from} -> {to}", path.display())]
    Illegal {
        path: PathBuf,
        from: crate::batch::FileStatus,
        to: crate::batch::FileStatus,
    },
}
