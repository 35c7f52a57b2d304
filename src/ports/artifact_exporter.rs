//! Artifact Exporter
//!
//! Writes the synthesized units as `<func>.c` and `<func>_test.c`.

use std::fs;
use std::path::{Path, PathBuf};

use super::ArtifactExporter;
use crate::domain::error::{SynthError, SynthResult};
use crate::domain::synth::SynthesizedTest;

pub struct FileExporter;

impl FileExporter {
    pub fn closure_path(work_dir: &Path, function: &str) -> PathBuf {
        work_dir.join(format!("{}.c", function))
    }

    pub fn driver_path(work_dir: &Path, function: &str) -> PathBuf {
        work_dir.join(format!("{}_test.c", function))
    }
}

impl ArtifactExporter for FileExporter {
    fn export(&self, test: &SynthesizedTest, work_dir: &Path) -> SynthResult<Vec<PathBuf>> {
        fs::create_dir_all(work_dir).map_err(|e| SynthError::io(work_dir, e))?;

        let closure = Self::closure_path(work_dir, &test.function);
        fs::write(&closure, &test.closure_unit).map_err(|e| SynthError::io(&closure, e))?;

        let driver = Self::driver_path(work_dir, &test.function);
        fs::write(&driver, &test.driver_unit).map_err(|e| SynthError::io(&driver, e))?;

        tracing::info!(function = %test.function, path = %driver.display(), "[Export] wrote test units");
        Ok(vec![closure, driver])
    }

    fn discard(&self, function: &str, work_dir: &Path) -> SynthResult<()> {
        for path in [Self::closure_path(work_dir, function), Self::driver_path(work_dir, function)] {
            match fs::remove_file(&path) {
                Ok(()) => tracing::debug!(function, path = %path.display(), "[Export] removed stale unit"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(SynthError::io(&path, e)),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_writes_both_units() {
        let dir = tempfile::tempdir().unwrap();
        let work = dir.path().join("add");
        let test = SynthesizedTest {
            function: "add".to_string(),
            closure_unit: "int add(int a, int b) { return a + b; }\n".to_string(),
            driver_unit: "int main(void) {\n}\n".to_string(),
        };
        let paths = FileExporter.export(&test, &work).unwrap();
        assert_eq!(paths, vec![work.join("add.c"), work.join("add_test.c")]);
        assert_eq!(fs::read_to_string(&paths[0]).unwrap(), test.closure_unit);
        assert_eq!(fs::read_to_string(&paths[1]).unwrap(), test.driver_unit);

        FileExporter.discard("add", &work).unwrap();
        assert!(!paths[0].exists() && !paths[1].exists());
        // Nothing left to remove is not an error.
        FileExporter.discard("add", &work).unwrap();
    }
}
