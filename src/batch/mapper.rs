//! # 输出路径映射
//!
//! 为每个输入文件推导输出路径，并在调度前一次性创建所有输出目录。
//!
//! ## 规则
//! - 未指定输出目录：输出与输入同目录，仅替换扩展名
//! - 指定输出目录：保留输入相对其根目录的子目录结构
//! - 两个输入映射到同一输出（或输出覆盖输入本身）视为致命错误
//!
//! ## 依赖关系
//! - 被 `batch/driver.rs` 调用
//! - 使用 `batch/resolver.rs` 的 `ResolvedFile`

use super::resolver::ResolvedFile;
use crate::error::{AudioBatchError, Result};

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

/// 一条转换计划
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedOutput {
    pub input: PathBuf,
    pub output: PathBuf,
}

/// 输出路径映射器
pub struct OutputMapper {
    /// 目标扩展名（不含点）
    extension: String,
    /// 输出根目录
    output_root: Option<PathBuf>,
    /// 显式指定的单个输出文件
    output_file: Option<PathBuf>,
}

impl OutputMapper {
    /// 创建新的映射器
    pub fn new(extension: &str) -> Self {
        Self {
            extension: extension.trim_start_matches('.').to_string(),
            output_root: None,
            output_file: None,
        }
    }

    /// 设置输出根目录
    pub fn with_output_root(mut self, output_root: Option<PathBuf>) -> Self {
        self.output_root = output_root;
        self
    }

    /// 设置单文件输出路径（仅在恰好一个输入时有效）
    pub fn with_output_file(mut self, output_file: Option<PathBuf>) -> Self {
        self.output_file = output_file;
        self
    }

    /// 计算单个输入的输出路径
    pub fn map(&self, input: &Path, input_root: &Path) -> PathBuf {
        let base = match &self.output_root {
            Some(output_root) => {
                let relative = match input.strip_prefix(input_root) {
                    Ok(relative) => relative.to_path_buf(),
                    Err(_) => input.file_name().map(PathBuf::from).unwrap_or_default(),
                };
                output_root.join(relative)
            }
            None => input.to_path_buf(),
        };

        base.with_extension(&self.extension)
    }

    /// 为整个批次生成转换计划并检测输出冲突
    pub fn plan(&self, files: &[ResolvedFile]) -> Result<Vec<PlannedOutput>> {
        if self.output_file.is_some() && files.len() != 1 {
            return Err(AudioBatchError::InvalidArgument(format!(
                "--output requires exactly one input file, but {} were found",
                files.len()
            )));
        }

        let plan: Vec<PlannedOutput> = files
            .iter()
            .map(|file| PlannedOutput {
                input: file.path.clone(),
                output: match &self.output_file {
                    Some(output_file) => output_file.clone(),
                    None => self.map(&file.path, &file.root),
                },
            })
            .collect();

        check_collisions(&plan)?;

        Ok(plan)
    }
}

/// 检查输出冲突
fn check_collisions(plan: &[PlannedOutput]) -> Result<()> {
    let mut seen: HashMap<&Path, &Path> = HashMap::with_capacity(plan.len());

    for entry in plan {
        if entry.output == entry.input {
            return Err(AudioBatchError::OutputCollision {
                first: entry.input.clone(),
                second: entry.input.clone(),
                output: entry.output.clone(),
            });
        }

        if let Some(first) = seen.insert(&entry.output, &entry.input) {
            return Err(AudioBatchError::OutputCollision {
                first: first.to_path_buf(),
                second: entry.input.clone(),
                output: entry.output.clone(),
            });
        }
    }

    Ok(())
}

/// 在任何转换开始前创建所有输出目录，返回涉及的目录数
pub fn prepare_directories(plan: &[PlannedOutput]) -> Result<usize> {
    let directories: BTreeSet<&Path> = plan
        .iter()
        .filter_map(|entry| entry.output.parent())
        .filter(|dir| !dir.as_os_str().is_empty())
        .collect();

    for dir in &directories {
        fs::create_dir_all(dir).map_err(|e| AudioBatchError::DirectoryCreation {
            path: dir.to_path_buf(),
            source: e,
        })?;
    }

    tracing::debug!(directories = directories.len(), "prepared output directories");

    Ok(directories.len())
}
