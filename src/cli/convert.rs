//! # 转换参数 CLI 定义
//!
//! 批量转换 M4A -> MP3。所有数值参数在此校验范围，
//! 校验通过后转换为不可变的 [`BatchConfig`]。
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/convert.rs`

use crate::batch::config::{DEFAULT_JOBS, MAX_JOBS};
use crate::batch::BatchConfig;
use crate::codec::CodecOptions;

use clap::Args;
use std::path::PathBuf;

/// 转换参数
#[derive(Args, Debug)]
pub struct ConvertArgs {
    /// Input files or directories to convert
    #[arg(required = true, value_name = "INPUTS")]
    pub inputs: Vec<PathBuf>,

    /// Output file path (only valid when exactly one file is converted)
    #[arg(short, long, conflicts_with = "output_dir")]
    pub output: Option<PathBuf>,

    /// Output directory; subdirectory structure is preserved
    #[arg(short = 'd', long)]
    pub output_dir: Option<PathBuf>,

    /// Recurse into subdirectories
    #[arg(short, long, default_value_t = false)]
    pub recursive: bool,

    /// VBR quality (0 = best, 9 = smallest)
    #[arg(short, long, default_value_t = 2, value_parser = clap::value_parser!(u8).range(0..=9))]
    pub quality: u8,

    /// Constant bitrate in kbps (32-320)
    #[arg(short, long, value_parser = clap::value_parser!(u16).range(32..=320))]
    pub bitrate: Option<u16>,

    /// Sample rate in Hz (8000-192000)
    #[arg(short, long, value_parser = clap::value_parser!(u32).range(8000..=192000))]
    pub sample_rate: Option<u32>,

    /// Number of audio channels (1-2)
    #[arg(short, long, default_value_t = 2, value_parser = clap::value_parser!(u8).range(1..=2))]
    pub channels: u8,

    /// Number of parallel conversions (0 = auto, max 50)
    #[arg(short, long, env = "AUDIOBATCH_JOBS", default_value_t = DEFAULT_JOBS, value_parser = parse_jobs)]
    pub jobs: usize,

    /// Input file extension to look for
    #[arg(long, default_value = "m4a")]
    pub extension: String,

    /// ffmpeg executable
    #[arg(long, env = "AUDIOBATCH_FFMPEG", default_value = "ffmpeg")]
    pub ffmpeg: PathBuf,

    /// Write a CSV report of every file to this path
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Only list what would be converted
    #[arg(long, default_value_t = false)]
    pub dry_run: bool,
}

/// 解析并行作业数（0 表示按 CPU 数自动选择）
pub fn parse_jobs(input: &str) -> Result<usize, String> {
    let jobs: usize = input
        .parse()
        .map_err(|_| format!("Invalid job count '{}'. Use a number between 0 and {}", input, MAX_JOBS))?;

    if jobs > MAX_JOBS {
        return Err(format!("Job count {} exceeds the maximum of {}", jobs, MAX_JOBS));
    }

    Ok(jobs)
}

impl ConvertArgs {
    /// 构造批处理配置
    pub fn to_config(&self) -> BatchConfig {
        let jobs = if self.jobs == 0 {
            num_cpus::get().clamp(1, MAX_JOBS)
        } else {
            self.jobs
        };

        BatchConfig {
            inputs: self.inputs.clone(),
            extension: self.extension.trim_start_matches('.').to_lowercase(),
            target_extension: "mp3".to_string(),
            recursive: self.recursive,
            output_dir: self.output_dir.clone(),
            output_file: self.output.clone(),
            jobs,
            codec: CodecOptions {
                quality: self.quality,
                bitrate_kbps: self.bitrate,
                sample_rate_hz: self.sample_rate,
                channels: self.channels,
            },
        }
    }
}
