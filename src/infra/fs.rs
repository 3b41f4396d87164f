//! # File System Operations Module / 文件系统操作模块
//!
//! Per-job working directories. Every variant gets a fresh temporary
//! directory, optionally seeded with a copy of the workspace, which is removed
//! when the job's guard is dropped.
//!
//! 每个作业的工作目录。每个变体都会获得一个全新的临时目录（可选地以工作区
//! 副本作为初始内容），当作业的守卫被丢弃时该目录会被删除。
//!
//! Cache entries are tar archives of a path relative to the working directory,
//! so a cached path may be a single file or a whole directory tree.
//!
//! 缓存条目是相对于工作目录的某个路径的 tar 归档，因此被缓存的路径既可以是
//! 单个文件，也可以是整个目录树。

use anyhow::{Context, Result};
use fs_extra::dir::{copy, CopyOptions};
use std::io;
use std::path::Path;
use tar::{Archive, Builder};
use tempfile::TempDir;

/// Replaces everything but ASCII alphanumerics with `_`.
pub fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// Creates a unique, temporary working directory for a variant.
///
/// # Arguments
/// * `variant_id` - Used to make the directory name recognizable
/// * `seed` - Directory whose contents are copied in, if any
///
/// # Returns
/// The `TempDir` guard; the directory lives as long as the guard does.
pub fn create_work_dir(variant_id: &str, seed: Option<&Path>) -> Result<TempDir> {
    let work_dir = tempfile::Builder::new()
        .prefix(&format!("run_matrix_{}_", sanitize(variant_id)))
        .tempdir()
        .context("Failed to create temporary working directory")?;

    if let Some(seed) = seed {
        copy_dir_all(seed, work_dir.path()).with_context(|| {
            format!(
                "Failed to seed working directory from {}",
                seed.display()
            )
        })?;
    }

    Ok(work_dir)
}

/// Copies the contents of `from` into the existing directory `to`.
pub fn copy_dir_all(from: &Path, to: &Path) -> Result<()> {
    let mut options = CopyOptions::new();
    options.overwrite = true;
    options.content_only = true;
    copy(from, to, &options)?;
    Ok(())
}

/// Archives `root/relative` (a file or a directory) under the name `relative`.
pub fn pack_path(root: &Path, relative: &Path) -> io::Result<Vec<u8>> {
    let source = root.join(relative);
    let mut builder = Builder::new(Vec::new());
    builder.follow_symlinks(false);
    if source.is_dir() {
        builder.append_dir_all(relative, &source)?;
    } else {
        builder.append_path_with_name(&source, relative)?;
    }
    builder.into_inner()
}

/// Extracts an archive produced by [`pack_path`] back under `root`.
///
/// Existing files are overwritten; entries escaping `root` are refused by `tar`.
pub fn unpack_into(root: &Path, archive: &[u8]) -> io::Result<()> {
    let mut archive = Archive::new(archive);
    archive.set_overwrite(true);
    archive.unpack(root)
}
