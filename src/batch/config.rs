//! # 批处理配置
//!
//! 引擎接收的不可变配置。所有取值范围由 CLI 层（`cli/convert.rs`）校验。
//!
//! ## 依赖关系
//! - 由 `cli/convert.rs` 构造
//! - 被 `batch/driver.rs` 使用

use crate::codec::CodecOptions;
use std::path::PathBuf;

/// 并行作业数上限
pub const MAX_JOBS: usize = 50;

/// 默认并行作业数
pub const DEFAULT_JOBS: usize = 10;

/// 批处理配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchConfig {
    /// 输入文件或目录
    pub inputs: Vec<PathBuf>,
    /// 输入扩展名过滤
    pub extension: String,
    /// 输出扩展名
    pub target_extension: String,
    /// 是否递归
    pub recursive: bool,
    /// 输出根目录
    pub output_dir: Option<PathBuf>,
    /// 单文件输出路径
    pub output_file: Option<PathBuf>,
    /// 并行作业数 (1-50)
    pub jobs: usize,
    /// 编码参数
    pub codec: CodecOptions,
}

impl Default for BatchConfig {
    fn default() -> Self {
        BatchConfig {
            inputs: Vec::new(),
            extension: "m4a".to_string(),
            target_extension: "mp3".to_string(),
            recursive: false,
            output_dir: None,
            output_file: None,
            jobs: DEFAULT_JOBS,
            codec: CodecOptions::default(),
        }
    }
}
