/// Compiler and debugger runner.
///
/// - Preprocessor: `<cc> -E [extra] [-I..] <src>` (stdout, line markers kept)
/// - Compiler: `<cc> -ggdb -g3 -O0 -fsanitize=address [extra] [-I..] <src> -o <work>/to_debug`
/// - Debugger: `<gdb> -q -batch -nx -x <work>/<pass>.gdb`
///
/// Both block until the child exits. The debugger transcript is stdout
/// followed by stderr and is also kept as `<work>/<pass>.log`.
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use super::workspace::{binary_path, script_path, transcript_path};
use crate::config::ToolchainConfig;
use crate::domain::error::{SourceError, SynthError, SynthResult};
use crate::domain::script::DebugScript;
use crate::ports::{SourcePreprocessor, Toolchain};

// ═══════════════════════════════════════════════════════════════════════════
// Public API
// ═══════════════════════════════════════════════════════════════════════════

/// Toolchain that compiles one C source with clang-style flags and drives
/// gdb-style batch sessions against the result.
pub struct ClangGdbToolchain {
    config: ToolchainConfig,
    source: PathBuf,
}

impl ClangGdbToolchain {
    pub fn new(config: ToolchainConfig, source: impl Into<PathBuf>) -> Self {
        Self {
            config,
            source: source.into(),
        }
    }

    pub fn config(&self) -> &ToolchainConfig {
        &self.config
    }
}

impl Toolchain for ClangGdbToolchain {
    fn build_debug(&self, function: &str, work_dir: &Path) -> SynthResult<PathBuf> {
        let output = binary_path(work_dir);
        let spec = compile_command_spec(&self.config, &self.source, &output);
        tracing::info!(function, program = %spec.program, "[Build] compiling instrumented binary");

        let result = spec.to_command().output().map_err(|e| SynthError::Build {
            function: function.to_string(),
            code: None,
            stderr: format!("failed to run {}: {}", spec.program, e),
        })?;

        if !result.status.success() {
            return Err(SynthError::Build {
                function: function.to_string(),
                code: result.status.code(),
                stderr: String::from_utf8_lossy(&result.stderr).trim().to_string(),
            });
        }
        if !output.exists() {
            return Err(SynthError::Build {
                function: function.to_string(),
                code: result.status.code(),
                stderr: format!("expected binary was not created at {}", output.display()),
            });
        }
        Ok(output)
    }

    fn run_debugger(&self, function: &str, script: &DebugScript, work_dir: &Path) -> SynthResult<String> {
        let script_file = script_path(work_dir, script.pass);
        fs::write(&script_file, script.render()).map_err(|e| SynthError::io(&script_file, e))?;

        let spec = debugger_command_spec(&self.config, &script_file);
        tracing::debug!(function, pass = %script.pass, "[Capture] starting debugger session");

        let result = spec
            .to_command()
            .env("ASAN_OPTIONS", "detect_leaks=0")
            .output()
            .map_err(|e| SynthError::io(&script_file, e))?;

        let mut transcript = String::from_utf8_lossy(&result.stdout).into_owned();
        transcript.push_str(&String::from_utf8_lossy(&result.stderr));

        let log_file = transcript_path(work_dir, script.pass);
        if let Err(e) = fs::write(&log_file, &transcript) {
            tracing::warn!(function, path = %log_file.display(), "[Capture] failed to keep transcript: {}", e);
        }
        Ok(transcript)
    }
}

impl SourcePreprocessor for ClangGdbToolchain {
    fn preprocess(&self) -> Result<String, SourceError> {
        let spec = preprocess_command_spec(&self.config, &self.source);
        tracing::info!(program = %spec.program, source = %self.source.display(), "[Parse] preprocessing");

        let result = spec.to_command().output().map_err(|e| SourceError::Preprocess {
            code: None,
            stderr: format!("failed to run {}: {}", spec.program, e),
        })?;
        if !result.status.success() {
            return Err(SourceError::Preprocess {
                code: result.status.code(),
                stderr: String::from_utf8_lossy(&result.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&result.stdout).into_owned())
    }
}

/// Check that `program --version` runs. Returns the first line of its output.
pub fn check_tool_available(program: &str) -> anyhow::Result<String> {
    let output = Command::new(program)
        .arg("--version")
        .output()
        .map_err(|e| anyhow::anyhow!("{} not found in PATH: {}", program, e))?;
    if !output.status.success() {
        anyhow::bail!("{} found but returned error: {:?}", program, output.status.code());
    }
    let version = String::from_utf8_lossy(&output.stdout);
    Ok(version.lines().next().unwrap_or("").trim().to_string())
}

// ═══════════════════════════════════════════════════════════════════════════
// Testable Command Builder
// ═══════════════════════════════════════════════════════════════════════════

/// Program and argv of an external command, without running it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn to_command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        command
    }
}

/// `-E` without `-P`: the line markers tell main-file items from header items.
pub fn preprocess_command_spec(config: &ToolchainConfig, source: &Path) -> CommandSpec {
    let mut args = vec!["-E".to_string()];
    args.extend(config.extra_flags.iter().cloned());
    args.extend(config.include_dirs.iter().map(|d| format!("-I{}", d.display())));
    args.push(source.display().to_string());
    CommandSpec {
        program: config.compiler.clone(),
        args,
    }
}

pub fn compile_command_spec(config: &ToolchainConfig, source: &Path, output: &Path) -> CommandSpec {
    let mut args: Vec<String> = Vec::new();
    args.extend(config.debug_flags.iter().cloned());
    args.extend(config.sanitizer_flags.iter().cloned());
    args.extend(config.extra_flags.iter().cloned());
    args.extend(config.include_dirs.iter().map(|d| format!("-I{}", d.display())));
    args.push(source.display().to_string());
    args.push("-o".to_string());
    args.push(output.display().to_string());
    CommandSpec {
        program: config.compiler.clone(),
        args,
    }
}

pub fn debugger_command_spec(config: &ToolchainConfig, script: &Path) -> CommandSpec {
    CommandSpec {
        program: config.debugger.clone(),
        args: vec![
            "-q".to_string(),
            "-batch".to_string(),
            "-nx".to_string(),
            "-x".to_string(),
            script.display().to_string(),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_command_spec() {
        let mut config = ToolchainConfig::default();
        config.include_dirs.push(PathBuf::from("stubs"));
        let spec = compile_command_spec(&config, Path::new("prog.c"), Path::new("tmp/sum/to_debug"));
        assert_eq!(spec.program, "clang");
        assert_eq!(
            spec.args,
            ["-ggdb", "-g3", "-O0", "-fsanitize=address", "-Istubs", "prog.c", "-o", "tmp/sum/to_debug"]
        );
    }

    #[test]
    fn test_preprocess_command_spec() {
        let config = ToolchainConfig {
            extra_flags: vec!["-DFAST".to_string()],
            include_dirs: vec![PathBuf::from("stubs")],
            ..ToolchainConfig::default()
        };
        let spec = preprocess_command_spec(&config, Path::new("prog.c"));
        assert_eq!(spec.program, "clang");
        assert_eq!(spec.args, ["-E", "-DFAST", "-Istubs", "prog.c"]);
    }

    #[test]
    fn test_preprocess_failure_is_reported() {
        let config = ToolchainConfig {
            compiler: "definitely-not-a-compiler-xyz".to_string(),
            ..ToolchainConfig::default()
        };
        let toolchain = ClangGdbToolchain::new(config, "prog.c");
        assert!(matches!(toolchain.preprocess(), Err(SourceError::Preprocess { code: None, .. })));
    }

    #[test]
    #[ignore] // Requires clang
    fn test_preprocess_real_compiler() {
        let tmp = tempfile::tempdir().unwrap();
        let source = tmp.path().join("prog.c");
        fs::write(
            &source,
            "#include <stdio.h>\n#define CALL(x) helper(x)\nint helper(int x) { return x; }\nint f(int x) { return CALL(x); }\n",
        )
        .unwrap();
        let toolchain = ClangGdbToolchain::new(ToolchainConfig::default(), &source);
        let expanded = toolchain.preprocess().unwrap();
        let original = fs::read_to_string(&source).unwrap();
        let cg = crate::infrastructure::c_parser::parse_preprocessed(&expanded, &original).unwrap();
        assert_eq!(cg.get("f").unwrap().callees, ["helper"]);
        assert_eq!(cg.preamble[0].text, "#include <stdio.h>");
        assert!(cg.get("printf").is_none());
    }

    #[test]
    fn test_debugger_command_spec() {
        let spec = debugger_command_spec(&ToolchainConfig::default(), Path::new("tmp/sum/layout.gdb"));
        assert_eq!(spec.program, "gdb");
        assert_eq!(spec.args, ["-q", "-batch", "-nx", "-x", "tmp/sum/layout.gdb"]);
    }

    #[test]
    fn test_build_failure_is_reported() {
        let tmp = tempfile::tempdir().unwrap();
        let config = ToolchainConfig {
            compiler: "definitely-not-a-compiler-xyz".to_string(),
            ..ToolchainConfig::default()
        };
        let toolchain = ClangGdbToolchain::new(config, tmp.path().join("prog.c"));
        let err = toolchain.build_debug("f", tmp.path()).unwrap_err();
        assert_eq!(err.category(), "build");
    }

    #[test]
    #[ignore] // Requires clang with AddressSanitizer
    fn test_build_debug_real_compiler() {
        let tmp = tempfile::tempdir().unwrap();
        let source = tmp.path().join("prog.c");
        fs::write(&source, "int add(int a, int b) { return a + b; }\nint main(void) { return add(2, 3) - 5; }\n")
            .unwrap();
        let toolchain = ClangGdbToolchain::new(ToolchainConfig::default(), &source);
        let binary = toolchain.build_debug("add", tmp.path()).unwrap();
        assert!(binary.exists());
    }
}
