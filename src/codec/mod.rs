//! # 编解码协作模块
//!
//! 批处理引擎只把转换视为一个不透明操作：
//! `convert(input, output) -> Result<(), ConversionError>`。
//! 本模块提供该操作的默认实现（外部 `ffmpeg` + `libmp3lame`）。
//!
//! ## 依赖关系
//! - 被 `commands/convert.rs` 使用
//! - 子模块: ffmpeg

pub mod ffmpeg;

pub use ffmpeg::FfmpegConverter;

/// 编码参数（取值范围已由 CLI 层校验）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodecOptions {
    /// VBR 质量 (0-9，0 最好)
    pub quality: u8,
    /// 固定码率 (kbps, 32-320)
    pub bitrate_kbps: Option<u16>,
    /// 采样率 (Hz, 8000-192000)
    pub sample_rate_hz: Option<u32>,
    /// 声道数 (1-2)
    pub channels: u8,
}

impl Default for CodecOptions {
    fn default() -> Self {
        CodecOptions {
            quality: 2,
            bitrate_kbps: None,
            sample_rate_hz: None,
            channels: 2,
        }
    }
}
