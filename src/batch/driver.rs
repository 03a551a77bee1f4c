//! # 批处理驱动
//!
//! 串联解析、映射、调度与汇总：
//!
//! ```text
//! Init -> Resolving -> Mapping -> Scheduling -> Aggregating -> Done
//!             |           |
//!             +-----------+------> Failed（任何转换开始之前）
//! ```
//!
//! 解析结果为空时直接进入 `Done`。单个文件的转换失败不会让驱动返回错误，
//! 而是记录在 [`BatchResult`] 中，由调用方决定退出码。
//! 被跳过的显式输入记录在 [`BatchPlan::skipped`]。
//!
//! ## 依赖关系
//! - 被 `commands/convert.rs` 调用
//! - 使用 `batch/` 下的 resolver, mapper, scheduler, status

use super::config::BatchConfig;
use super::mapper::{self, OutputMapper, PlannedOutput};
use super::resolver::{self, PathResolver};
use super::scheduler::{BatchResult, BatchScheduler};
use super::status::{EventSink, StatusAggregator};
use crate::error::{AudioBatchError, ConversionError, Result};

use std::fmt;
use std::path::{Path, PathBuf};

/// 驱动状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    Init,
    Resolving,
    Mapping,
    Scheduling,
    Aggregating,
    Done,
    Failed,
}

impl fmt::Display for BatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BatchState::Init => "init",
            BatchState::Resolving => "resolving",
            BatchState::Mapping => "mapping",
            BatchState::Scheduling => "scheduling",
            BatchState::Aggregating => "aggregating",
            BatchState::Done => "done",
            BatchState::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

/// 解析与映射后的批次计划
#[derive(Debug, Default, Clone)]
pub struct BatchPlan {
    pub entries: Vec<PlannedOutput>,
    /// 显式指定但扩展名不匹配的文件
    pub skipped: Vec<PathBuf>,
}

impl BatchPlan {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// 批处理驱动
pub struct BatchDriver {
    config: BatchConfig,
    sink: Option<EventSink>,
    state: BatchState,
}

impl BatchDriver {
    /// 创建新的驱动
    pub fn new(config: BatchConfig) -> Self {
        Self {
            config,
            sink: None,
            state: BatchState::Init,
        }
    }

    /// 设置进度事件接收端
    pub fn with_sink(mut self, sink: EventSink) -> Self {
        self.sink = Some(sink);
        self
    }

    /// 当前状态
    pub fn state(&self) -> BatchState {
        self.state
    }

    fn transition(&mut self, next: BatchState) {
        tracing::debug!(from = %self.state, to = %next, "batch state");
        self.state = next;
    }

    /// 出错时进入 `Failed`
    fn guard<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            tracing::debug!(error = %e, "batch aborted");
            self.transition(BatchState::Failed);
        }
        result
    }

    /// 解析输入并生成转换计划（不创建目录，不执行转换）
    pub fn plan(&mut self) -> Result<BatchPlan> {
        self.transition(BatchState::Resolving);
        let resolved = PathResolver::new(self.config.inputs.clone())
            .with_extension(&self.config.extension)
            .recursive(self.config.recursive)
            .resolve();
        let resolution = self.guard(resolved)?;

        if resolution.files.is_empty() {
            self.transition(BatchState::Done);
            return Ok(BatchPlan {
                entries: Vec::new(),
                skipped: resolution.skipped,
            });
        }

        self.transition(BatchState::Mapping);
        let planned = self.build_mapper().and_then(|m| m.plan(&resolution.files));
        let entries = self.guard(planned)?;

        Ok(BatchPlan {
            entries,
            skipped: resolution.skipped,
        })
    }

    fn build_mapper(&self) -> Result<OutputMapper> {
        let output_root = self
            .config
            .output_dir
            .as_deref()
            .map(absolute)
            .transpose()?;
        let output_file = self
            .config
            .output_file
            .as_deref()
            .map(absolute)
            .transpose()?;

        Ok(OutputMapper::new(&self.config.target_extension)
            .with_output_root(output_root)
            .with_output_file(output_file))
    }

    /// 执行计划：预先创建输出目录，然后并行转换
    pub fn execute<F>(&mut self, plan: BatchPlan, convert: F) -> Result<BatchResult>
    where
        F: Fn(&Path, &Path) -> std::result::Result<(), ConversionError> + Sync,
    {
        let sink = self.sink.take();

        if plan.is_empty() {
            self.transition(BatchState::Done);
            return Ok(BatchResult::default());
        }

        let prepared = mapper::prepare_directories(&plan.entries);
        self.guard(prepared)?;

        self.transition(BatchState::Scheduling);
        let aggregator = StatusAggregator::new(&plan.entries, sink);
        let scheduled =
            BatchScheduler::new(self.config.jobs).run(&plan.entries, &aggregator, convert);
        self.guard(scheduled)?;

        self.transition(BatchState::Aggregating);
        debug_assert!(aggregator.is_finished());
        let snapshot = aggregator.snapshot();
        let dropped = aggregator.dropped_events();
        if dropped > 0 {
            tracing::debug!(dropped, "progress events dropped");
        }
        let result = BatchResult::from_items(snapshot.items);

        self.transition(BatchState::Done);
        tracing::info!(
            total = result.total,
            completed = snapshot.counts.completed,
            failed = snapshot.counts.error,
            "batch finished"
        );

        Ok(result)
    }

    /// 完整执行一个批次
    pub fn run<F>(&mut self, convert: F) -> Result<BatchResult>
    where
        F: Fn(&Path, &Path) -> std::result::Result<(), ConversionError> + Sync,
    {
        let plan = self.plan()?;
        self.execute(plan, convert)
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    resolver::normalize(path).map_err(|e| {
        AudioBatchError::InvalidArgument(format!("Invalid path '{}': {}", path.display(), e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::status::{event_channel, FileStatus, StatusEvent};
    use std::collections::HashMap;
    use std::fs::{self, File};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    fn library(names: &[&str]) -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        for name in names {
            let path = dir.path().join(name);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            File::create(path).unwrap();
        }
        dir
    }

    fn config(inputs: Vec<PathBuf>) -> BatchConfig {
        BatchConfig {
            inputs,
            recursive: true,
            jobs: 4,
            ..BatchConfig::default()
        }
    }

    /// 模拟转换：写出一个空的输出文件
    fn fake_convert(_input: &Path, output: &Path) -> std::result::Result<(), ConversionError> {
        File::create(output)?;
        Ok(())
    }

    #[test]
    fn test_every_resolved_file_appears_once() {
        let dir = library(&["a.m4a", "x/b.m4a", "x/y/c.m4a", "x/readme.txt"]);
        let mut driver = BatchDriver::new(config(vec![dir.path().to_path_buf()]));

        let result = driver.run(fake_convert).unwrap();

        assert_eq!(driver.state(), BatchState::Done);
        assert_eq!(result.total, 3);
        assert_eq!(result.items.len(), 3);
        assert_eq!(result.completed, 3);
        assert!(result.is_success());
        assert!(dir.path().join("x/y/c.mp3").is_file());
    }

    #[test]
    fn test_output_dir_preserves_structure() {
        let dir = library(&["in/a.m4a", "in/sub/b.m4a"]);
        let out = dir.path().join("out");
        let mut cfg = config(vec![dir.path().join("in")]);
        cfg.output_dir = Some(out.clone());

        let result = BatchDriver::new(cfg).run(fake_convert).unwrap();

        assert_eq!(result.completed, 2);
        assert!(out.join("a.mp3").is_file());
        assert!(out.join("sub/b.mp3").is_file());
        assert!(!dir.path().join("in/a.mp3").exists());
    }

    #[test]
    fn test_partial_failure_is_reported_not_raised() {
        let dir = library(&["a.m4a", "b.m4a", "c.m4a"]);
        let mut driver = BatchDriver::new(config(vec![dir.path().to_path_buf()]));

        let result = driver
            .run(|input, output| {
                if input.ends_with("b.m4a") {
                    return Err(ConversionError::CommandFailed {
                        command: "ffmpeg".to_string(),
                        stderr: "moov atom not found".to_string(),
                    });
                }
                fake_convert(input, output)
            })
            .unwrap();

        assert_eq!(driver.state(), BatchState::Done);
        assert_eq!(result.completed, 2);
        assert_eq!(result.failed(), 1);
        assert_eq!(result.failures[0].input, dir.path().join("b.m4a"));
        assert!(!result.is_success());
        // 成功的输出保留在磁盘上
        assert!(dir.path().join("a.mp3").is_file());
        assert!(dir.path().join("c.mp3").is_file());
    }

    #[test]
    fn test_empty_batch_is_done_without_error() {
        let dir = library(&["cover.jpg"]);
        let mut driver = BatchDriver::new(config(vec![dir.path().to_path_buf()]));
        let calls = AtomicUsize::new(0);

        let result = driver
            .run(|_, _| {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .unwrap();

        assert_eq!(driver.state(), BatchState::Done);
        assert_eq!(result.total, 0);
        assert_eq!(result.completed, 0);
        assert_eq!(result.failed(), 0);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_missing_root_aborts_before_conversion() {
        let dir = library(&["a.m4a"]);
        let missing = dir.path().join("nope");
        let mut driver = BatchDriver::new(config(vec![dir.path().to_path_buf(), missing]));
        let calls = AtomicUsize::new(0);

        let result = driver.run(|_, _| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        assert!(matches!(result, Err(AudioBatchError::PathNotFound { .. })));
        assert_eq!(driver.state(), BatchState::Failed);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_aliased_roots_convert_each_file_once() {
        let dir = library(&["m/a.m4a"]);
        let root = dir.path().join("m");
        let alias = root.join("..").join("m");
        let calls = std::sync::Mutex::new(Vec::new());

        let result = BatchDriver::new(config(vec![root.clone(), alias]))
            .run(|input, output| {
                calls
                    .lock()
                    .unwrap()
                    .push((input.to_path_buf(), output.to_path_buf()));
                fake_convert(input, output)
            })
            .unwrap();

        assert_eq!(result.total, 1);
        assert_eq!(
            calls.into_inner().unwrap(),
            vec![(root.join("a.m4a"), root.join("a.mp3"))]
        );
    }

    #[test]
    fn test_aliased_output_file_collides_with_input() {
        let dir = library(&["m/a.m4a"]);
        let input = dir.path().join("m/a.m4a");
        let mut cfg = config(vec![input.clone()]);
        cfg.output_file = Some(dir.path().join("m/../m/a.m4a"));

        let result = BatchDriver::new(cfg).run(fake_convert);

        assert!(matches!(
            result,
            Err(AudioBatchError::OutputCollision { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_directory_aborts_before_conversion() {
        use std::os::unix::fs::PermissionsExt;

        let dir = library(&["a.m4a", "locked/b.m4a"]);
        let locked = dir.path().join("locked");
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
        // root 用户不受权限位限制
        if fs::read_dir(&locked).is_ok() {
            fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let mut driver = BatchDriver::new(config(vec![dir.path().to_path_buf()]));
        let calls = AtomicUsize::new(0);
        let result = driver.run(|_, _| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        assert!(matches!(result, Err(AudioBatchError::DirectoryRead { .. })));
        assert_eq!(driver.state(), BatchState::Failed);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_directory_creation_failure_aborts() {
        let dir = library(&["in/a.m4a", "blocker"]);
        let mut cfg = config(vec![dir.path().join("in")]);
        cfg.output_dir = Some(dir.path().join("blocker"));
        let mut driver = BatchDriver::new(cfg);
        let calls = AtomicUsize::new(0);

        let result = driver.run(|_, _| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        assert!(matches!(
            result,
            Err(AudioBatchError::DirectoryCreation { .. })
        ));
        assert_eq!(driver.state(), BatchState::Failed);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_collision_aborts_before_conversion() {
        let dir = library(&["x/song.m4a", "y/song.m4a"]);
        let mut cfg = config(vec![dir.path().join("x"), dir.path().join("y")]);
        cfg.output_dir = Some(dir.path().join("out"));
        let mut driver = BatchDriver::new(cfg);

        let result = driver.run(fake_convert);

        assert!(matches!(
            result,
            Err(AudioBatchError::OutputCollision { .. })
        ));
        assert_eq!(driver.state(), BatchState::Failed);
        assert!(!dir.path().join("out").exists());
    }

    #[test]
    fn test_sink_receives_ordered_events_per_file() {
        let dir = library(&["a.m4a", "b.m4a", "c.m4a", "d.m4a"]);
        let (sink, events) = event_channel(64);
        let mut driver = BatchDriver::new(config(vec![dir.path().to_path_buf()])).with_sink(sink);

        driver.run(fake_convert).unwrap();
        drop(driver);

        let mut per_file: HashMap<PathBuf, Vec<FileStatus>> = HashMap::new();
        for StatusEvent { path, status, .. } in events.iter() {
            per_file.entry(path).or_default().push(status);
        }

        assert_eq!(per_file.len(), 4);
        for statuses in per_file.values() {
            assert_eq!(statuses, &[FileStatus::Processing, FileStatus::Completed]);
        }
    }

    #[test]
    fn test_plan_only_does_not_touch_filesystem() {
        let dir = library(&["in/a.m4a"]);
        let mut cfg = config(vec![dir.path().join("in")]);
        cfg.output_dir = Some(dir.path().join("out"));
        let mut driver = BatchDriver::new(cfg);

        let plan = driver.plan().unwrap();

        assert_eq!(driver.state(), BatchState::Mapping);
        assert_eq!(plan.entries.len(), 1);
        assert_eq!(plan.entries[0].output, dir.path().join("out/a.mp3"));
        assert!(!dir.path().join("out").exists());
    }
}
