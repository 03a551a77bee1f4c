//! # convert 命令实现
//!
//! 批量把音频文件转换为 MP3。
//!
//! ## 功能
//! - 解析输入、规划输出路径
//! - 在独立线程中渲染进度（消费批处理引擎的状态事件）
//! - 汇总失败列表，可选写出 CSV 报告
//! - `--dry-run` 时只打印转换计划
//!
//! ## 依赖关系
//! - 使用 `cli/convert.rs` 定义的参数
//! - 使用 `batch/` 执行批处理，`codec/` 执行单个转换
//! - 使用 `utils/output.rs`, `utils/progress.rs`

use crate::batch::{event_channel, BatchDriver, BatchResult, FileStatus, StatusEvent};
use crate::cli::convert::ConvertArgs;
use crate::codec::FfmpegConverter;
use crate::error::{AudioBatchError, Result};
use crate::utils::{output, progress};

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Receiver;
use std::thread::{self, JoinHandle};
use tabled::{Table, Tabled};

/// 进度事件通道容量
const EVENT_CAPACITY: usize = 1024;

/// 汇总中最多列出的失败文件数
const MAX_LISTED_FAILURES: usize = 10;

/// 失败列表行
#[derive(Debug, Clone, Tabled)]
struct FailureRow {
    #[tabled(rename = "File")]
    file: String,
    #[tabled(rename = "Error")]
    error: String,
}

/// CSV 报告行
#[derive(Debug, Serialize)]
struct ReportRow<'a> {
    input: String,
    output: String,
    status: FileStatus,
    error: &'a str,
}

/// 执行转换
pub fn execute(args: ConvertArgs) -> Result<()> {
    output::print_header("Converting audio files to MP3");

    let config = args.to_config();
    let mut driver = BatchDriver::new(config.clone());

    let spinner = progress::create_spinner("Scanning inputs...");
    let plan = driver.plan();
    spinner.finish_and_clear();
    let plan = plan?;

    warn_skipped(&plan.skipped, &config.extension);

    if plan.is_empty() {
        output::print_warning(&format!("No .{} files found", config.extension));
        return Ok(());
    }

    output::print_info(&format!(
        "Found {} .{} file(s)",
        plan.entries.len(),
        config.extension
    ));
    if let Some(dir) = &config.output_dir {
        output::print_info(&format!("Output directory: {}", dir.display()));
    }
    output::print_info(&format!(
        "Starting conversion with {} parallel job(s)",
        config.jobs
    ));

    let converter = FfmpegConverter::new(args.ffmpeg.clone(), config.codec);
    let (sink, events) = event_channel(EVENT_CAPACITY);
    let renderer = spawn_renderer(events, plan.entries.len() as u64);

    let mut driver = driver.with_sink(sink);
    let outcome = driver.execute(plan, |input, out| converter.convert(input, out));

    // 驱动返回后事件发送端已全部释放，渲染线程随之结束
    if renderer.join().is_err() {
        tracing::warn!("progress renderer panicked");
    }

    let result = outcome?;
    print_summary(&result);

    if let Some(report) = &args.report {
        write_report(report, &result)?;
        output::print_success(&format!("Report written to '{}'", report.display()));
    }

    if result.is_success() {
        Ok(())
    } else {
        Err(AudioBatchError::BatchFailed {
            failed: result.failed(),
            total: result.total,
        })
    }
}

/// 只打印转换计划
pub fn preview(args: ConvertArgs) -> Result<()> {
    output::print_header("Conversion plan (dry run)");

    let config = args.to_config();
    let plan = BatchDriver::new(config.clone()).plan()?;

    warn_skipped(&plan.skipped, &config.extension);

    if plan.is_empty() {
        output::print_warning(&format!("No .{} files found", config.extension));
        return Ok(());
    }

    let base = std::env::current_dir().ok();
    for entry in &plan.entries {
        output::print_conversion(
            &display_path(&entry.input, base.as_deref()),
            &display_path(&entry.output, base.as_deref()),
        );
    }

    output::print_separator();
    output::print_info(&format!(
        "{} file(s) would be converted with {} parallel job(s)",
        plan.entries.len(),
        config.jobs
    ));

    Ok(())
}

fn warn_skipped(skipped: &[PathBuf], extension: &str) {
    for path in skipped {
        let warning = AudioBatchError::UnsupportedFile {
            path: path.clone(),
            extension: extension.to_string(),
        };
        output::print_warning(&warning.to_string());
    }
}

/// 启动进度渲染线程
fn spawn_renderer(events: Receiver<StatusEvent>, total: u64) -> JoinHandle<()> {
    let base = std::env::current_dir().ok();

    thread::spawn(move || {
        let pb = progress::create_progress_bar(total, "Converting");

        for event in events {
            let path = display_path(&event.path, base.as_deref());
            match event.status {
                FileStatus::Pending => {}
                FileStatus::Processing => pb.set_message(path),
                FileStatus::Completed => {
                    pb.suspend(|| output::print_success(&path));
                    pb.inc(1);
                }
                FileStatus::Error => {
                    let reason = event.error.as_deref().unwrap_or("unknown error");
                    pb.suspend(|| output::print_error(&format!("{}: {}", path, first_line(reason))));
                    pb.inc(1);
                }
            }
        }

        pb.finish_and_clear();
    })
}

/// 打印统计
fn print_summary(result: &BatchResult) {
    output::print_separator();

    if result.is_success() {
        output::print_done(&format!("Converted {} file(s)", result.completed));
        return;
    }

    output::print_warning(&format!(
        "Batch complete: {} converted, {} failed",
        result.completed,
        result.failed()
    ));

    let base = std::env::current_dir().ok();
    let rows: Vec<FailureRow> = result
        .failures
        .iter()
        .take(MAX_LISTED_FAILURES)
        .map(|f| FailureRow {
            file: display_path(&f.input, base.as_deref()),
            error: first_line(&f.error).to_string(),
        })
        .collect();

    println!("{}", Table::new(&rows));

    if result.failed() > MAX_LISTED_FAILURES {
        output::print_warning(&format!(
            "  ... and {} more",
            result.failed() - MAX_LISTED_FAILURES
        ));
    }
}

/// 写出 CSV 报告
fn write_report(path: &Path, result: &BatchResult) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;

    for item in &result.items {
        wtr.serialize(ReportRow {
            input: item.input.display().to_string(),
            output: item.output.display().to_string(),
            status: item.status,
            error: item.error.as_deref().unwrap_or(""),
        })?;
    }

    wtr.flush().map_err(|e| AudioBatchError::FileWriteError {
        path: path.display().to_string(),
        source: e,
    })?;

    Ok(())
}

/// 相对当前目录显示路径
fn display_path(path: &Path, base: Option<&Path>) -> String {
    base.and_then(|b| path.strip_prefix(b).ok())
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(path)
        .display()
        .to_string()
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::status::FileItem;
    use std::fs;

    #[test]
    fn test_display_path_relative_to_base() {
        let base = Path::new("/home/user/music");
        assert_eq!(
            display_path(Path::new("/home/user/music/a/b.m4a"), Some(base)),
            "a/b.m4a"
        );
        assert_eq!(
            display_path(Path::new("/other/b.m4a"), Some(base)),
            "/other/b.m4a"
        );
        assert_eq!(display_path(Path::new("/x/b.m4a"), None), "/x/b.m4a");
    }

    #[test]
    fn test_first_line() {
        assert_eq!(first_line("moov atom not found\nInvalid data"), "moov atom not found");
        assert_eq!(first_line(""), "");
    }

    #[test]
    fn test_write_report() {
        let dir = tempfile::tempdir().unwrap();
        let report = dir.path().join("report.csv");
        let result = BatchResult::from_items(vec![
            FileItem {
                input: PathBuf::from("/in/a.m4a"),
                output: PathBuf::from("/out/a.mp3"),
                status: FileStatus::Completed,
                error: None,
            },
            FileItem {
                input: PathBuf::from("/in/b.m4a"),
                output: PathBuf::from("/out/b.mp3"),
                status: FileStatus::Error,
                error: Some("ffmpeg exited with 1".to_string()),
            },
        ]);

        write_report(&report, &result).unwrap();

        let content = fs::read_to_string(&report).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "input,output,status,error");
        assert_eq!(lines[1], "/in/a.m4a,/out/a.mp3,completed,");
        assert_eq!(lines[2], "/in/b.m4a,/out/b.mp3,error,ffmpeg exited with 1");
    }
}
