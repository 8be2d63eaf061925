//! Per-test output directories and must-gather output discovery.
//!
//! Layout produced for a test:
//!   `<output_dir>/<dir relative to test root>/<file stem>/[<class>/]<test name>`

use crate::error::{CollectorError, Result};
use crate::types::TestIdentity;
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Make a name safe to use as a single path segment.
pub fn sanitize_segment(name: &str) -> String {
    name.trim().replace(['/', '\\'], "_")
}

/// Components of `source_dir` after the last occurrence of `test_root`.
fn relative_to_test_root(source_dir: &Path, test_root: &Path) -> Option<PathBuf> {
    let dir: Vec<Component> = source_dir.components().collect();
    let root: Vec<Component> = test_root
        .components()
        .filter(|c| matches!(c, Component::Normal(_)))
        .collect();
    if root.is_empty() || root.len() > dir.len() {
        return None;
    }
    let start = (0..=dir.len() - root.len())
        .rev()
        .find(|&i| dir[i..i + root.len()] == root[..])?;
    Some(dir[start + root.len()..].iter().collect())
}

/// Create (if needed) and return the absolute output directory for a test.
pub fn prepare_item_directory(identity: &TestIdentity, output_dir: &Path) -> Result<PathBuf> {
    let test_root = identity
        .test_root
        .as_deref()
        .map(str::trim)
        .filter(|root| !root.is_empty())
        .ok_or_else(|| {
            CollectorError::Configuration("test root (pytest testpaths) is not configured".into())
        })?;

    if identity.test_name.trim().is_empty() {
        return Err(CollectorError::InvalidArgument("test name is empty".into()));
    }

    let source_dir = identity.source_path.parent().unwrap_or(Path::new(""));
    let relative = relative_to_test_root(source_dir, Path::new(test_root)).ok_or_else(|| {
        CollectorError::Configuration(format!(
            "{} is not under test root '{}'",
            identity.source_path.display(),
            test_root
        ))
    })?;

    let file_stem = identity.source_path.file_stem().ok_or_else(|| {
        CollectorError::InvalidArgument(format!(
            "no file name in source path {}",
            identity.source_path.display()
        ))
    })?;

    let mut dir = output_dir.join(relative).join(file_stem);
    if let Some(class_name) = identity.class_name.as_deref().filter(|c| !c.trim().is_empty()) {
        dir.push(sanitize_segment(class_name));
    }
    dir.push(sanitize_segment(&identity.test_name));

    let dir = std::path::absolute(&dir)?;
    fs::create_dir_all(&dir)?;
    debug!("Prepared item directory {}", dir.display());
    Ok(dir)
}

/// First directory (by name) directly under `parent`.
pub fn locate_output_subdirectory(parent: &Path) -> Result<PathBuf> {
    let mut dirs = Vec::new();
    for entry in fs::read_dir(parent)? {
        let path = entry?.path();
        if path.is_dir() {
            dirs.push(path);
        }
    }
    dirs.sort();
    dirs.into_iter().next().ok_or_else(|| {
        CollectorError::NotFound(format!(
            "No log directory was created in '{}'",
            parent.display()
        ))
    })
}
