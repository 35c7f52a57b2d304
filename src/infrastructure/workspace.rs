/// Work area for build and capture artifacts.
///
/// Layout, one directory per function:
/// - `<root>/<func>/to_debug` - instrumented debug binary
/// - `<root>/<func>/layout.gdb`, `layout.log` - layout pass script and transcript
/// - `<root>/<func>/values.gdb`, `values.log` - value pass script and transcript
/// - `<root>/<func>/<func>.c`, `<func>_test.c` - synthesized units
///
/// Re-running a function overwrites its directory contents.
use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::error::{SynthError, SynthResult};
use crate::domain::script::CapturePass;

pub const BINARY_NAME: &str = "to_debug";

#[derive(Debug, Clone)]
pub struct WorkArea {
    root: PathBuf,
}

impl WorkArea {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory for `function`, created on demand.
    pub fn function_dir(&self, function: &str) -> SynthResult<PathBuf> {
        let dir = self.root.join(function);
        fs::create_dir_all(&dir).map_err(|e| SynthError::io(&dir, e))?;
        Ok(dir)
    }
}

pub fn binary_path(work_dir: &Path) -> PathBuf {
    work_dir.join(BINARY_NAME)
}

pub fn script_path(work_dir: &Path, pass: CapturePass) -> PathBuf {
    work_dir.join(format!("{}.gdb", pass.stem()))
}

pub fn transcript_path(work_dir: &Path, pass: CapturePass) -> PathBuf {
    work_dir.join(format!("{}.log", pass.stem()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_function_dirs_are_disjoint() {
        let tmp = tempfile::tempdir().unwrap();
        let area = WorkArea::new(tmp.path().join("work"));
        let foo = area.function_dir("foo").unwrap();
        let bar = area.function_dir("bar").unwrap();
        assert!(foo.is_dir() && bar.is_dir());
        assert_ne!(foo, bar);
        // Second call reuses the directory.
        assert_eq!(area.function_dir("foo").unwrap(), foo);
    }

    #[test]
    fn test_artifact_paths() {
        let dir = Path::new("tmp/sum");
        assert_eq!(binary_path(dir), PathBuf::from("tmp/sum/to_debug"));
        assert_eq!(script_path(dir, CapturePass::Layout), PathBuf::from("tmp/sum/layout.gdb"));
        assert_eq!(transcript_path(dir, CapturePass::Values), PathBuf::from("tmp/sum/values.log"));
    }
}
