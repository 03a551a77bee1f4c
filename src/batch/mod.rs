//! # 批量处理模块
//!
//! 有界并发的批量转换引擎。
//!
//! ## 功能
//! - 自动检测输入类型（文件/目录），收集并排序匹配文件
//! - 推导输出路径，调度前一次性创建输出目录
//! - 有界并行转换，单个失败不影响其他文件
//! - 串行化的状态汇总与非阻塞进度事件
//!
//! ## 依赖关系
//! - 被 `commands/convert.rs` 使用
//! - 使用 `rayon` 进行并行处理
//! - 使用 `walkdir` 遍历目录

pub mod config;
pub mod driver;
pub mod mapper;
pub mod resolver;
pub mod scheduler;
pub mod status;

pub use config::BatchConfig;
pub use driver::BatchDriver;
pub use scheduler::BatchResult;
pub use status::{event_channel, FileStatus, StatusEvent};
