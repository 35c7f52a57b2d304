/// Error taxonomy for test synthesis.
///
/// Every variant is local to one function of the closure: the pipeline
/// records it in the run report and moves on to the next function.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SynthError {
    /// A parameter shape the builder or synthesizer cannot express.
    #[error("unsupported parameter in `{function}`: {reason}")]
    Unsupported { function: String, reason: String },

    /// The instrumented debug build did not compile.
    #[error("debug build of `{function}` failed (exit code {code:?}): {stderr}")]
    Build {
        function: String,
        code: Option<i32>,
        stderr: String,
    },

    /// The debugger never produced a usable capture.
    #[error("capture of `{function}` failed: {kind}")]
    Capture { function: String, kind: CaptureFailure },

    /// A captured value could not be decomposed into scalar/array/struct.
    #[error("cannot parse captured value of `{param}`: {text:?}")]
    Parse { param: String, text: String },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Reasons a debugger session yields no valid capture.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptureFailure {
    #[error("breakpoint was never reached")]
    BreakpointNotHit,

    #[error("unrecognized address description: {0:?}")]
    UnrecognizedAddress(String),

    #[error("stack address reported without a matching frame variable")]
    DanglingStackAddress,

    #[error("no layout resolved for pointer parameter `{0}`")]
    MissingLayout(String),

    #[error("no element size reported for pointer parameter `{0}`")]
    MissingElementSize(String),

    #[error("no result line ${index} for parameter `{param}`")]
    MissingResult { index: usize, param: String },
}

impl SynthError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SynthError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn capture(function: &str, kind: CaptureFailure) -> Self {
        SynthError::Capture {
            function: function.to_string(),
            kind,
        }
    }

    /// Short category name used in run reports.
    pub fn category(&self) -> &'static str {
        match self {
            SynthError::Unsupported { .. } => "unsupported",
            SynthError::Build { .. } => "build",
            SynthError::Capture { .. } => "capture",
            SynthError::Parse { .. } => "parse",
            SynthError::Io { .. } => "io",
        }
    }
}

pub type SynthResult<T> = std::result::Result<T, SynthError>;

/// The translation unit itself could not be read into a call graph.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    #[error("lexer error at line {line}: {message}")]
    Lex { line: usize, message: String },

    #[error("parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("preprocessing failed (exit code {code:?}): {stderr}")]
    Preprocess { code: Option<i32>, stderr: String },
}
