/// Toolchain configuration.
///
/// Loaded from an optional TOML file; every key has a default so an empty
/// file (or no file) yields a clang + gdb setup with 4-byte dump words.
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolchainConfig {
    /// C compiler used for the instrumented debug build.
    pub compiler: String,
    /// Debugger driven in batch mode.
    pub debugger: String,
    pub debug_flags: Vec<String>,
    pub sanitizer_flags: Vec<String>,
    pub extra_flags: Vec<String>,
    pub include_dirs: Vec<PathBuf>,
    /// Byte width of one word in pointer dumps (`p/x *(T *) addr@N`).
    pub word_size: u64,
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        Self {
            compiler: "clang".to_string(),
            debugger: "gdb".to_string(),
            debug_flags: vec!["-ggdb".to_string(), "-g3".to_string(), "-O0".to_string()],
            sanitizer_flags: vec!["-fsanitize=address".to_string()],
            extra_flags: Vec::new(),
            include_dirs: Vec::new(),
            word_size: 4,
        }
    }
}

impl ToolchainConfig {
    /// Defaults when `path` is `None`, otherwise the parsed file.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            None => Self::default(),
            Some(path) => {
                let text = fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config {}", path.display()))?;
                Self::from_toml(&text).with_context(|| format!("Invalid config {}", path.display()))?
            }
        };
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if !matches!(self.word_size, 1 | 2 | 4 | 8) {
            bail!("word_size must be 1, 2, 4 or 8 (got {})", self.word_size);
        }
        if self.compiler.trim().is_empty() || self.debugger.trim().is_empty() {
            bail!("compiler and debugger must be non-empty");
        }
        Ok(())
    }
}
