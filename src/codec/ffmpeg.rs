//! # ffmpeg 转换器
//!
//! 调用外部 `ffmpeg` 将音频编码为 MP3 (libmp3lame)。
//!
//! ## 依赖关系
//! - 被 `commands/convert.rs` 调用
//! - 使用 `codec::CodecOptions`
//! - 需要 `ffmpeg` 在 PATH 中（或通过 `--ffmpeg` 指定）

use super::CodecOptions;
use crate::error::ConversionError;

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// ffmpeg 转换器，可在多个线程中并发调用
#[derive(Debug, Clone)]
pub struct FfmpegConverter {
    binary: PathBuf,
    options: CodecOptions,
}

impl FfmpegConverter {
    /// 创建新的转换器
    pub fn new(binary: impl Into<PathBuf>, options: CodecOptions) -> Self {
        Self {
            binary: binary.into(),
            options,
        }
    }

    /// 构造 ffmpeg 参数
    fn build_args(&self, input: &Path, output: &Path) -> Vec<String> {
        let mut args = vec![
            "-y".to_string(),
            "-hide_banner".to_string(),
            "-loglevel".to_string(),
            "error".to_string(),
            "-i".to_string(),
            input.to_string_lossy().to_string(),
            // 丢弃封面等视频流
            "-vn".to_string(),
            "-codec:a".to_string(),
            "libmp3lame".to_string(),
            "-q:a".to_string(),
            self.options.quality.to_string(),
        ];

        if let Some(bitrate) = self.options.bitrate_kbps {
            args.extend(["-b:a".to_string(), format!("{}k", bitrate)]);
        }

        if let Some(rate) = self.options.sample_rate_hz {
            args.extend(["-ar".to_string(), rate.to_string()]);
        }

        args.extend([
            "-ac".to_string(),
            self.options.channels.to_string(),
            "-f".to_string(),
            "mp3".to_string(),
            output.to_string_lossy().to_string(),
        ]);

        args
    }

    /// 转换单个文件
    pub fn convert(&self, input: &Path, output: &Path) -> Result<(), ConversionError> {
        let command = self.binary.display().to_string();

        let result = Command::new(&self.binary)
            .args(self.build_args(input, output))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output();

        match result {
            Ok(out) if out.status.success() => Ok(()),
            Ok(out) => Err(ConversionError::CommandFailed {
                command,
                stderr: String::from_utf8_lossy(&out.stderr).trim().to_string(),
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(ConversionError::CommandNotFound { command })
            }
            Err(e) => Err(ConversionError::Io(e)),
        }
    }
}
