//! Scratch files handed to the type checker.
//!
//! One file per (template path, provenance stack) pair, addressed by content
//! hash so two inclusion contexts of the same template never share a file.
//! Files are overwritten on every run and left behind for debugging.

use std::fs;
use std::path::{Path, PathBuf};

use lens_core::{stack_json, StackFrame};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::AnalysisError;

const SUFFIX: &str = "-blade-compiled.php";

/// `<dir>/<sha256(template_path + stack json)>-blade-compiled.php`
pub fn scratch_path(dir: &Path, template_path: &str, stack: &[StackFrame]) -> PathBuf {
    let mut hasher = Sha256::new();
    hasher.update(template_path.as_bytes());
    hasher.update(stack_json(stack).as_bytes());
    dir.join(format!("{}{SUFFIX}", hex::encode(hasher.finalize())))
}

/// Write `contents` to the scratch path, creating `dir` on demand.
pub fn write_scratch(
    dir: &Path,
    template_path: &str,
    stack: &[StackFrame],
    contents: &str,
) -> Result<PathBuf, AnalysisError> {
    fs::create_dir_all(dir).map_err(|e| AnalysisError::io(dir, e))?;
    let path = scratch_path(dir, template_path, stack);
    fs::write(&path, contents).map_err(|e| AnalysisError::io(&path, e))?;
    debug!(path = %path.display(), bytes = contents.len(), "wrote scratch file");
    Ok(path)
}
