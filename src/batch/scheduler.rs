//! # 批量调度器
//!
//! 在有界线程池中执行转换任务。
//!
//! ## 功能
//! - 基于 rayon 线程池，最多 `jobs` 个转换同时进行
//! - 任务按列表顺序开始，完成顺序不固定
//! - 单个任务失败（包括 panic）只记录到该条目，不影响其他任务
//! - 汇总最终结果
//!
//! ## 依赖关系
//! - 被 `batch/driver.rs` 调用
//! - 通过 `batch/status.rs` 的 `StatusAggregator` 报告状态
//! - 使用 `rayon` 进行并行调度

use super::mapper::PlannedOutput;
use super::status::{FileItem, FileStatus, StatusAggregator};
use crate::error::{AudioBatchError, ConversionError, Result};

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

/// 单个失败条目
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedItem {
    pub input: PathBuf,
    pub error: String,
}

/// 批量处理结果统计
#[derive(Debug, Default, Clone)]
pub struct BatchResult {
    /// 总数
    pub total: usize,
    /// 成功数量
    pub completed: usize,
    /// 失败详情
    pub failures: Vec<FailedItem>,
    /// 全部条目的最终状态（按计划顺序）
    pub items: Vec<FileItem>,
}

impl BatchResult {
    /// 从最终条目列表汇总
    pub fn from_items(items: Vec<FileItem>) -> Self {
        let mut result = BatchResult {
            total: items.len(),
            ..BatchResult::default()
        };

        for item in &items {
            match item.status {
                FileStatus::Completed => result.completed += 1,
                // 未结束的条目也计为失败，保证 completed + failed == total
                status => result.failures.push(FailedItem {
                    input: item.input.clone(),
                    error: if status.is_terminal() {
                        item.error.clone().unwrap_or_else(|| "unknown error".to_string())
                    } else {
                        format!("not converted (status: {})", status)
                    },
                }),
            }
        }

        result.items = items;
        result
    }

    /// 失败数量
    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    /// 是否全部成功
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// 批量调度器
pub struct BatchScheduler {
    /// 并行作业数
    jobs: usize,
}

impl BatchScheduler {
    /// 创建新的调度器，`jobs` 须至少为 1（由 CLI 层保证）
    pub fn new(jobs: usize) -> Self {
        debug_assert!(jobs >= 1, "job limit must be at least 1");
        Self { jobs }
    }

    /// 执行全部任务，返回时每个条目都已处于终止状态
    pub fn run<F>(
        &self,
        items: &[PlannedOutput],
        aggregator: &StatusAggregator,
        convert: F,
    ) -> Result<()>
    where
        F: Fn(&Path, &Path) -> std::result::Result<(), ConversionError> + Sync,
    {
        if items.is_empty() {
            return Ok(());
        }

        let workers = self.jobs.min(items.len());

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("audiobatch-worker-{}", i))
            .build()
            .map_err(|e| AudioBatchError::ThreadPool(e.to_string()))?;

        tracing::debug!(items = items.len(), workers, "starting scheduler");

        // 共享游标：每个 worker 依次领取下一个条目，保证按列表顺序开始
        let cursor = AtomicUsize::new(0);
        let convert = &convert;

        pool.scope(|scope| {
            for _ in 0..workers {
                let cursor = &cursor;
                scope.spawn(move |_| {
                    while let Some(item) = items.get(cursor.fetch_add(1, Ordering::SeqCst)) {
                        run_job(item, aggregator, convert);
                    }
                });
            }
        });

        Ok(())
    }
}

/// 执行单个任务
fn run_job<F>(item: &PlannedOutput, aggregator: &StatusAggregator, convert: &F)
where
    F: Fn(&Path, &Path) -> std::result::Result<(), ConversionError> + Sync,
{
    report(aggregator, &item.input, FileStatus::Processing, None);

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| convert(&item.input, &item.output)))
        .unwrap_or_else(|payload| Err(ConversionError::Panicked(panic_message(payload.as_ref()))));

    match outcome {
        Ok(()) => {
            tracing::debug!(input = %item.input.display(), "conversion completed");
            report(aggregator, &item.input, FileStatus::Completed, None);
        }
        Err(e) => {
            tracing::warn!(input = %item.input.display(), error = %e, "conversion failed");
            report(aggregator, &item.input, FileStatus::Error, Some(e.to_string()));
        }
    }
}

fn report(aggregator: &StatusAggregator, path: &Path, status: FileStatus, error: Option<String>) {
    if let Err(e) = aggregator.on_status_change(path, status, error) {
        tracing::error!(error = %e, "status change rejected");
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
