// Debugger command scripts for the two capture passes.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use crate::domain::callgraph::FunctionNode;
use crate::domain::ctype::ParamShape;
use crate::domain::error::{CaptureFailure, SynthError, SynthResult};
use crate::domain::layout::PointerLayout;

/// Which capture pass a script belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapturePass {
    Layout,
    Values,
}

impl CapturePass {
    /// File stem for the script and its transcript.
    pub fn stem(&self) -> &'static str {
        match self {
            CapturePass::Layout => "layout",
            CapturePass::Values => "values",
        }
    }
}

impl fmt::Display for CapturePass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.stem())
    }
}

/// A debugger command file: load, break, run, queries, quit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebugScript {
    pub pass: CapturePass,
    commands: Vec<String>,
}

impl DebugScript {
    fn prologue(pass: CapturePass, binary: &Path, function: &str) -> Self {
        Self {
            pass,
            commands: vec![
                "set pagination off".to_string(),
                "set confirm off".to_string(),
                "set width 0".to_string(),
                "set print elements unlimited".to_string(),
                "set print repeats 10".to_string(),
                format!("file {}", binary.display()),
                format!("break {}", function),
                "run".to_string(),
            ],
        }
    }

    /// Address description and element size for every pointer parameter.
    pub fn layout_pass(binary: &Path, function: &FunctionNode) -> Self {
        let mut script = Self::prologue(CapturePass::Layout, binary, &function.name);
        for param in &function.params {
            match &param.shape {
                ParamShape::Pointer { pointee: element } | ParamShape::Array { element, .. } => {
                    script
                        .commands
                        .push(format!("p (void) __asan_describe_address({})", param.name));
                    script.commands.push(format!(
                        "printf \"sizeof {} %d\\n\", (int) sizeof({})",
                        param.name, element
                    ));
                }
                ParamShape::Scalar | ParamShape::Struct { .. } => {}
            }
        }
        script.commands.push("quit".to_string());
        script
    }

    /// One print per parameter, in declaration order, so that result `$i+1`
    /// belongs to parameter `i`. Pointers dump `word_size`-byte words from
    /// the base of the object they point into.
    pub fn value_pass(
        binary: &Path,
        function: &FunctionNode,
        layouts: &HashMap<String, PointerLayout>,
        word_size: u64,
    ) -> SynthResult<Self> {
        let mut script = Self::prologue(CapturePass::Values, binary, &function.name);
        for param in &function.params {
            let command = match &param.shape {
                ParamShape::Pointer { .. } | ParamShape::Array { .. } => {
                    let layout = layouts.get(&param.name).ok_or_else(|| {
                        SynthError::capture(
                            &function.name,
                            CaptureFailure::MissingLayout(param.name.clone()),
                        )
                    })?;
                    format!(
                        "p/x *({} *) {:#x}@{}",
                        word_type(word_size),
                        layout.base_address,
                        layout.dump_words(word_size)
                    )
                }
                ParamShape::Scalar if param.is_floating() => format!("p {}", param.name),
                ParamShape::Scalar | ParamShape::Struct { .. } => format!("p/x {}", param.name),
            };
            script.commands.push(command);
        }
        script.commands.push("quit".to_string());
        Ok(script)
    }

    pub fn commands(&self) -> &[String] {
        &self.commands
    }

    pub fn render(&self) -> String {
        let mut out = self.commands.join("\n");
        out.push('\n');
        out
    }
}

/// Unsigned C type of a dump word.
pub fn word_type(word_size: u64) -> &'static str {
    match word_size {
        1 => "unsigned char",
        2 => "unsigned short",
        8 => "unsigned long long",
        _ => "unsigned int",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ctype::{ParameterDescriptor, ReturnKind, ReturnType};
    use crate::domain::layout::{RegionKind, ResolvedRegion};

    fn sum_node() -> FunctionNode {
        FunctionNode {
            name: "sum".to_string(),
            params: vec![
                ParameterDescriptor {
                    name: "arr".to_string(),
                    type_prefix: "int *".to_string(),
                    type_suffix: String::new(),
                    shape: ParamShape::Pointer {
                        pointee: "int".to_string(),
                    },
                },
                ParameterDescriptor {
                    name: "n".to_string(),
                    type_prefix: "int".to_string(),
                    type_suffix: String::new(),
                    shape: ParamShape::Scalar,
                },
            ],
            return_type: ReturnType::new("int", ReturnKind::Integer),
            signature: "int sum(int *arr, int n)".to_string(),
            body: "{ return 0; }".to_string(),
            callees: vec![],
            unsupported: None,
            line: 1,
        }
    }

    #[test]
    fn test_layout_pass_queries_only_pointers() {
        let script = DebugScript::layout_pass(Path::new("/tmp/sum/to_debug"), &sum_node());
        let rendered = script.render();
        assert!(rendered.contains("file /tmp/sum/to_debug\nbreak sum\nrun\n"));
        assert!(rendered.contains("p (void) __asan_describe_address(arr)"));
        assert!(rendered.contains("printf \"sizeof arr %d\\n\", (int) sizeof(int)"));
        assert!(!rendered.contains("(n)"));
        assert!(rendered.ends_with("quit\n"));
    }

    #[test]
    fn test_value_pass_dumps_words_from_base() {
        let mut layouts = HashMap::new();
        layouts.insert(
            "arr".to_string(),
            PointerLayout::new(
                ResolvedRegion {
                    kind: RegionKind::Heap,
                    byte_offset: 8,
                    byte_size: 28,
                    base_address: 0x1000,
                },
                4,
            ),
        );
        let script = DebugScript::value_pass(Path::new("bin"), &sum_node(), &layouts, 4).unwrap();
        let queries: Vec<&String> = script.commands().iter().skip(8).collect();
        assert_eq!(queries, ["p/x *(unsigned int *) 0x1000@7", "p/x n", "quit"]);
    }

    #[test]
    fn test_value_pass_requires_layout() {
        let err = DebugScript::value_pass(Path::new("bin"), &sum_node(), &HashMap::new(), 4).unwrap_err();
        assert_eq!(err.category(), "capture");
    }
}
