use std::path::{Path, PathBuf};

use crate::domain::callgraph::CallGraph;
use crate::domain::error::{SourceError, SynthResult};
use crate::domain::script::DebugScript;
use crate::domain::synth::SynthesizedTest;

pub mod artifact_exporter;

pub trait CallGraphBuilder {
    fn build_call_graph(&self, source: &str) -> Result<CallGraph, SourceError>;
}

/// Expands the translation unit under test the way the debug build sees it.
pub trait SourcePreprocessor {
    /// Preprocessor output with line markers kept.
    fn preprocess(&self) -> Result<String, SourceError>;
}

/// Compiler and debugger collaborators for one capture session.
pub trait Toolchain {
    /// Build the instrumented debug binary into `work_dir`.
    fn build_debug(&self, function: &str, work_dir: &Path) -> SynthResult<PathBuf>;

    /// Run `script` to completion and return its combined transcript.
    fn run_debugger(&self, function: &str, script: &DebugScript, work_dir: &Path) -> SynthResult<String>;
}

pub trait ArtifactExporter {
    /// Write both units and return their paths (closure unit first).
    fn export(&self, test: &SynthesizedTest, work_dir: &Path) -> SynthResult<Vec<PathBuf>>;

    /// Remove units left over from an earlier run of `function`.
    fn discard(&self, function: &str, work_dir: &Path) -> SynthResult<()>;
}
