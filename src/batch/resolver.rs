//! # 路径解析器
//!
//! 把用户给出的文件/目录列表展开为去重、排序后的待转换文件列表。
//!
//! ## 功能
//! - 支持单文件和目录输入
//! - 扩展名过滤（不区分大小写）
//! - 可选递归目录搜索，多个输入并行遍历
//! - 结果按路径字典序排序，保证同一文件系统快照下结果确定
//!
//! ## 依赖关系
//! - 被 `batch/driver.rs` 调用
//! - 使用 `walkdir` 遍历目录
//! - 使用 `rayon` 并行遍历多个输入

use crate::error::{AudioBatchError, Result};

use rayon::prelude::*;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

/// 转为绝对路径，并按词法消去 `.` 与 `..`
///
/// 同一文件的不同写法（如 `m` 与 `m/../m`）得到相同结果，
/// 去重与输出冲突检测都以此为键。
pub fn normalize(path: &Path) -> io::Result<PathBuf> {
    let absolute = std::path::absolute(path)?;
    let mut normalized = PathBuf::new();

    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }

    Ok(normalized)
}

/// 一个待转换的输入文件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFile {
    /// 文件绝对路径
    pub path: PathBuf,
    /// 发现该文件时所在的输入根（目录本身，或单文件的父目录）
    pub root: PathBuf,
}

/// 解析结果
#[derive(Debug, Default)]
pub struct Resolution {
    /// 符合条件的文件，按路径排序且唯一
    pub files: Vec<ResolvedFile>,
    /// 被显式指定但扩展名不匹配的文件
    pub skipped: Vec<PathBuf>,
}

/// 路径解析器
pub struct PathResolver {
    /// 输入路径
    inputs: Vec<PathBuf>,
    /// 扩展名（小写，不含点）
    extension: String,
    /// 是否递归
    recursive: bool,
}

impl PathResolver {
    /// 创建新的路径解析器
    pub fn new(inputs: Vec<PathBuf>) -> Self {
        Self {
            inputs,
            extension: "m4a".to_string(),
            recursive: false,
        }
    }

    /// 设置扩展名过滤（可带前导点）
    pub fn with_extension(mut self, extension: &str) -> Self {
        self.extension = extension.trim_start_matches('.').to_lowercase();
        self
    }

    /// 设置是否递归搜索
    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// 解析所有输入
    ///
    /// 任一输入不存在时立即返回 [`AudioBatchError::PathNotFound`]，
    /// 此时不会遍历任何目录。
    pub fn resolve(&self) -> Result<Resolution> {
        let mut roots = Vec::with_capacity(self.inputs.len());
        for input in &self.inputs {
            let root = normalize(input).map_err(|_| AudioBatchError::PathNotFound {
                path: input.clone(),
            })?;
            if !root.exists() {
                return Err(AudioBatchError::PathNotFound { path: root });
            }
            roots.push(root);
        }

        let scanned = roots
            .par_iter()
            .map(|root| self.scan(root))
            .collect::<Result<Vec<_>>>()?;

        let mut resolution = Resolution::default();
        for part in scanned {
            resolution.files.extend(part.files);
            resolution.skipped.extend(part.skipped);
        }

        // 稳定排序：同一文件被多个输入覆盖时保留第一个输入的根
        resolution.files.sort_by(|a, b| a.path.cmp(&b.path));
        resolution.files.dedup_by(|later, earlier| later.path == earlier.path);
        resolution.skipped.sort();
        resolution.skipped.dedup();

        tracing::debug!(
            files = resolution.files.len(),
            skipped = resolution.skipped.len(),
            "resolved inputs"
        );

        Ok(resolution)
    }

    /// 扫描单个输入
    fn scan(&self, root: &Path) -> Result<Resolution> {
        let mut part = Resolution::default();

        let metadata = fs::metadata(root).map_err(|_| AudioBatchError::PathNotFound {
            path: root.to_path_buf(),
        })?;

        if metadata.is_file() {
            if self.matches_extension(root) {
                let parent = root.parent().unwrap_or(root).to_path_buf();
                part.files.push(ResolvedFile {
                    path: root.to_path_buf(),
                    root: parent,
                });
            } else {
                part.skipped.push(root.to_path_buf());
            }
            return Ok(part);
        }

        if !metadata.is_dir() {
            part.skipped.push(root.to_path_buf());
            return Ok(part);
        }

        let max_depth = if self.recursive { usize::MAX } else { 1 };

        let walker = WalkDir::new(root)
            .min_depth(1)
            .max_depth(max_depth)
            .follow_links(false);

        for entry in walker {
            let entry = entry.map_err(|e| {
                let path = e
                    .path()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| root.to_path_buf());
                AudioBatchError::DirectoryRead { path, source: e }
            })?;

            if entry.file_type().is_file() && self.matches_extension(entry.path()) {
                part.files.push(ResolvedFile {
                    path: entry.into_path(),
                    root: root.to_path_buf(),
                });
            }
        }

        tracing::trace!(root = %root.display(), files = part.files.len(), "scanned directory");

        Ok(part)
    }

    /// 检查扩展名是否匹配
    fn matches_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case(&self.extension))
            .unwrap_or(false)
    }
}
