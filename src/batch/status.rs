//! # 状态汇总器
//!
//! 维护每个文件的转换状态与整体计数，并把状态变更推送给进度显示端。
//!
//! ## 约束
//! - 所有状态变更都经过 [`StatusAggregator::on_status_change`]，在同一把锁下串行执行
//! - 每个文件只允许 `Pending -> Processing -> Completed | Error`
//! - 事件通过有界通道 `try_send` 发送，通道满或已断开时丢弃，从不阻塞调度
//!
//! ## 依赖关系
//! - 被 `batch/scheduler.rs` 和 `batch/driver.rs` 使用
//! - 事件由 `commands/convert.rs` 的进度渲染线程消费

use super::mapper::PlannedOutput;
use crate::error::TransitionError;

use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// 单个文件的转换状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Pending,
    Processing,
    Completed,
    Error,
}

impl FileStatus {
    /// 是否为终止状态
    pub fn is_terminal(self) -> bool {
        matches!(self, FileStatus::Completed | FileStatus::Error)
    }

    fn can_transition_to(self, next: FileStatus) -> bool {
        matches!(
            (self, next),
            (FileStatus::Pending, FileStatus::Processing)
                | (FileStatus::Processing, FileStatus::Completed)
                | (FileStatus::Processing, FileStatus::Error)
        )
    }
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileStatus::Pending => write!(f, "pending"),
            FileStatus::Processing => write!(f, "processing"),
            FileStatus::Completed => write!(f, "completed"),
            FileStatus::Error => write!(f, "error"),
        }
    }
}

/// 一个转换单元
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileItem {
    pub input: PathBuf,
    pub output: PathBuf,
    pub status: FileStatus,
    pub error: Option<String>,
}

/// 推送给进度显示端的状态事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEvent {
    pub path: PathBuf,
    pub status: FileStatus,
    pub error: Option<String>,
}

/// 事件发送端
pub type EventSink = SyncSender<StatusEvent>;

/// 创建有界事件通道
pub fn event_channel(capacity: usize) -> (EventSink, Receiver<StatusEvent>) {
    mpsc::sync_channel(capacity.max(1))
}

/// 各状态计数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub pending: usize,
    pub processing: usize,
    pub completed: usize,
    pub error: usize,
}

impl StatusCounts {
    pub fn total(&self) -> usize {
        self.pending + self.processing + self.completed + self.error
    }

    /// 已结束（成功或失败）的数量
    pub fn finished(&self) -> usize {
        self.completed + self.error
    }

    fn slot(&mut self, status: FileStatus) -> &mut usize {
        match status {
            FileStatus::Pending => &mut self.pending,
            FileStatus::Processing => &mut self.processing,
            FileStatus::Completed => &mut self.completed,
            FileStatus::Error => &mut self.error,
        }
    }
}

/// 状态快照
#[derive(Debug, Clone)]
pub struct BatchSnapshot {
    pub counts: StatusCounts,
    pub items: Vec<FileItem>,
}

struct StatusTable {
    items: Vec<FileItem>,
    index: HashMap<PathBuf, usize>,
    counts: StatusCounts,
}

/// 状态汇总器
pub struct StatusAggregator {
    table: Mutex<StatusTable>,
    sink: Option<EventSink>,
    dropped: AtomicUsize,
}

impl StatusAggregator {
    /// 根据转换计划创建，所有条目初始为 `Pending`
    pub fn new(plan: &[PlannedOutput], sink: Option<EventSink>) -> Self {
        let items: Vec<FileItem> = plan
            .iter()
            .map(|entry| FileItem {
                input: entry.input.clone(),
                output: entry.output.clone(),
                status: FileStatus::Pending,
                error: None,
            })
            .collect();

        let index = items
            .iter()
            .enumerate()
            .map(|(i, item)| (item.input.clone(), i))
            .collect();

        let counts = StatusCounts {
            pending: items.len(),
            ..StatusCounts::default()
        };

        Self {
            table: Mutex::new(StatusTable {
                items,
                index,
                counts,
            }),
            sink,
            dropped: AtomicUsize::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, StatusTable> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 应用一次状态变更；非法变更被拒绝且不修改状态表
    pub fn on_status_change(
        &self,
        path: &Path,
        status: FileStatus,
        error: Option<String>,
    ) -> Result<(), TransitionError> {
        let event = {
            let mut table = self.lock();
            let index = *table
                .index
                .get(path)
                .ok_or_else(|| TransitionError::UnknownPath {
                    path: path.to_path_buf(),
                })?;

            let current = table.items[index].status;
            if !current.can_transition_to(status) {
                return Err(TransitionError::Illegal {
                    path: path.to_path_buf(),
                    from: current,
                    to: status,
                });
            }

            *table.counts.slot(current) -= 1;
            *table.counts.slot(status) += 1;

            let item = &mut table.items[index];
            item.status = status;
            item.error = error.clone();

            StatusEvent {
                path: path.to_path_buf(),
                status,
                error,
            }
        };

        self.emit(event);
        Ok(())
    }

    /// 非阻塞推送事件
    fn emit(&self, event: StatusEvent) {
        let Some(sink) = &self.sink else {
            return;
        };

        match sink.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// 当前计数
    pub fn counts(&self) -> StatusCounts {
        self.lock().counts
    }

    /// 所有条目是否都已结束
    pub fn is_finished(&self) -> bool {
        let counts = self.counts();
        counts.finished() == counts.total()
    }

    /// 被丢弃的事件数
    pub fn dropped_events(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }

    /// 获取状态快照
    pub fn snapshot(&self) -> BatchSnapshot {
        let table = self.lock();
        BatchSnapshot {
            counts: table.counts,
            items: table.items.clone(),
        }
    }
}
